//! Card primitives.
//!
//! A card is an integer 0-51 with rank = id/4 and suit = id%4. Boards are
//! plain slices of cards; the [`Deck`] tracks the live remainder of the 52
//! cards for sampling runouts.

pub mod equity;
pub mod eval;

use std::fmt;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::SolverError;

/// Rank indices (0-12: deuce through ace).
pub const RANK_2: u8 = 0;
pub const RANK_T: u8 = 8;
pub const RANK_J: u8 = 9;
pub const RANK_Q: u8 = 10;
pub const RANK_K: u8 = 11;
pub const RANK_A: u8 = 12;

/// Rank characters in index order.
const RANK_CHARS: [char; 13] = ['2', '3', '4', '5', '6', '7', '8', '9', 'T', 'J', 'Q', 'K', 'A'];

/// Suit characters in index order (clubs, diamonds, hearts, spades).
const SUIT_CHARS: [char; 4] = ['c', 'd', 'h', 's'];

/// A single playing card, encoded as an id 0-51.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Card(u8);

impl Card {
    /// Create a card from rank (0-12) and suit (0-3).
    #[inline]
    pub fn new(rank: u8, suit: u8) -> Self {
        debug_assert!(rank < 13 && suit < 4);
        Card(rank * 4 + suit)
    }

    /// Create a card from its id (0-51).
    #[inline]
    pub fn from_id(id: u8) -> Self {
        debug_assert!(id < 52);
        Card(id)
    }

    /// Parse a card from text like `As`, `kd`, `2C`. Rank and suit letters
    /// are case-insensitive; output formatting is always canonical.
    pub fn parse(s: &str) -> Result<Self, SolverError> {
        let chars: Vec<char> = s.chars().collect();
        if chars.len() != 2 {
            return Err(SolverError::parse(s, 0));
        }
        let rank = RANK_CHARS
            .iter()
            .position(|&c| c == chars[0].to_ascii_uppercase())
            .ok_or_else(|| SolverError::parse(s, 0))?;
        let suit = SUIT_CHARS
            .iter()
            .position(|&c| c == chars[1].to_ascii_lowercase())
            .ok_or_else(|| SolverError::parse(s, 0))?;
        Ok(Card::new(rank as u8, suit as u8))
    }

    /// The card's id (0-51).
    #[inline]
    pub fn id(self) -> u8 {
        self.0
    }

    /// The card's rank (0-12).
    #[inline]
    pub fn rank(self) -> u8 {
        self.0 / 4
    }

    /// The card's suit (0-3).
    #[inline]
    pub fn suit(self) -> u8 {
        self.0 % 4
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}",
            RANK_CHARS[self.rank() as usize],
            SUIT_CHARS[self.suit() as usize]
        )
    }
}

impl fmt::Debug for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

/// Parse a board string like `As Kd Qc`, `AsKdQc`, or an empty string.
pub fn parse_board(s: &str) -> Result<Vec<Card>, SolverError> {
    let compact: String = s.chars().filter(|c| !c.is_whitespace() && *c != ',').collect();
    if !compact.is_ascii() || compact.len() % 2 != 0 {
        return Err(SolverError::parse(s, 0));
    }
    let mut cards = Vec::with_capacity(compact.len() / 2);
    for i in (0..compact.len()).step_by(2) {
        let card = Card::parse(&compact[i..i + 2]).map_err(|_| SolverError::parse(&compact[i..i + 2], i))?;
        if cards.contains(&card) {
            return Err(SolverError::parse(&compact[i..i + 2], i));
        }
        cards.push(card);
    }
    Ok(cards)
}

/// Render a board as canonical text.
pub fn board_to_string(board: &[Card]) -> String {
    board.iter().map(|c| c.to_string()).collect()
}

/// Betting round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Street {
    Preflop,
    Flop,
    Turn,
    River,
}

impl Street {
    /// The street that follows this one, if any.
    pub fn next(self) -> Option<Street> {
        match self {
            Street::Preflop => Some(Street::Flop),
            Street::Flop => Some(Street::Turn),
            Street::Turn => Some(Street::River),
            Street::River => None,
        }
    }

    /// Street index 0-3.
    pub fn index(self) -> usize {
        match self {
            Street::Preflop => 0,
            Street::Flop => 1,
            Street::Turn => 2,
            Street::River => 3,
        }
    }

    /// Number of board cards once this street has been dealt.
    pub fn board_len(self) -> usize {
        match self {
            Street::Preflop => 0,
            Street::Flop => 3,
            Street::Turn => 4,
            Street::River => 5,
        }
    }

    /// Number of cards the transition into this street deals.
    pub fn cards_dealt(self) -> usize {
        match self {
            Street::Preflop => 0,
            Street::Flop => 3,
            Street::Turn | Street::River => 1,
        }
    }

    /// The street implied by a board of the given length.
    pub fn from_board_len(len: usize) -> Option<Street> {
        match len {
            0 => Some(Street::Preflop),
            3 => Some(Street::Flop),
            4 => Some(Street::Turn),
            5 => Some(Street::River),
            _ => None,
        }
    }
}

impl fmt::Display for Street {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Street::Preflop => write!(f, "preflop"),
            Street::Flop => write!(f, "flop"),
            Street::Turn => write!(f, "turn"),
            Street::River => write!(f, "river"),
        }
    }
}

/// The live remainder of a 52-card deck.
#[derive(Clone)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Deck {
    /// A deck with the given cards removed.
    pub fn without(dead: &[Card]) -> Self {
        let mut mask = [false; 52];
        for &c in dead {
            mask[c.id() as usize] = true;
        }
        let cards = (0..52u8)
            .filter(|&id| !mask[id as usize])
            .map(Card::from_id)
            .collect();
        Deck { cards }
    }

    /// Number of cards remaining.
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    /// Whether the deck is empty.
    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// The remaining cards.
    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    /// Draw one card uniformly, removing it from the deck.
    pub fn draw<R: Rng>(&mut self, rng: &mut R) -> Option<Card> {
        if self.cards.is_empty() {
            return None;
        }
        let idx = rng.gen_range(0..self.cards.len());
        Some(self.cards.swap_remove(idx))
    }

    /// Draw `n` cards uniformly without replacement.
    pub fn draw_n<R: Rng>(&mut self, rng: &mut R, n: usize) -> Vec<Card> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            match self.draw(rng) {
                Some(c) => out.push(c),
                None => break,
            }
        }
        out
    }

    /// Shuffle the remaining cards in place.
    pub fn shuffle<R: Rng>(&mut self, rng: &mut R) {
        self.cards.shuffle(rng);
    }
}

impl fmt::Debug for Deck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Deck({} remaining)", self.len())
    }
}
