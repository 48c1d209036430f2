//! Weighted hand ranges.
//!
//! A [`Range`] maps each of the 1326 two-card combos to a weight in
//! [0, 1]. Ranges parse from comma-separated notation (`AA`, `AKs`,
//! `QQ-99`, `A5s-A2s`, `KQo:0.5`, `TT+`) and expose enumeration, board
//! masking, and normalized sampling for the CFR driver.

use std::fmt;

use rand::Rng;

use crate::cards::{Card, RANK_A};
use crate::error::SolverError;

/// Number of distinct two-card combos.
pub const NUM_COMBOS: usize = 1326;

/// An unordered pair of distinct cards. Canonical order keeps the higher
/// card id first.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Combo {
    hi: Card,
    lo: Card,
}

impl Combo {
    /// Create a combo from two distinct cards, normalizing order.
    pub fn new(a: Card, b: Card) -> Self {
        debug_assert_ne!(a.id(), b.id(), "combo cards must differ");
        if a.id() > b.id() {
            Combo { hi: a, lo: b }
        } else {
            Combo { hi: b, lo: a }
        }
    }

    /// Parse a combo from text like `AhKs`.
    pub fn parse(s: &str) -> Result<Self, SolverError> {
        if s.len() != 4 || !s.is_ascii() {
            return Err(SolverError::parse(s, 0));
        }
        let a = Card::parse(&s[0..2])?;
        let b = Card::parse(&s[2..4])?;
        if a.id() == b.id() {
            return Err(SolverError::parse(s, 0));
        }
        Ok(Combo::new(a, b))
    }

    /// The higher-id card.
    pub fn high(self) -> Card {
        self.hi
    }

    /// The lower-id card.
    pub fn low(self) -> Card {
        self.lo
    }

    /// Both cards as an array.
    pub fn cards(self) -> [Card; 2] {
        [self.hi, self.lo]
    }

    /// Dense index 0-1325.
    pub fn index(self) -> usize {
        let h = self.hi.id() as usize;
        let l = self.lo.id() as usize;
        h * (h - 1) / 2 + l
    }

    /// Combo from its dense index.
    pub fn from_index(index: usize) -> Self {
        debug_assert!(index < NUM_COMBOS);
        // Invert the triangular encoding.
        let mut h = 1usize;
        while (h + 1) * h / 2 <= index {
            h += 1;
        }
        let l = index - h * (h - 1) / 2;
        Combo {
            hi: Card::from_id(h as u8),
            lo: Card::from_id(l as u8),
        }
    }

    /// Whether the combo uses the given card.
    pub fn contains(self, card: Card) -> bool {
        self.hi == card || self.lo == card
    }

    /// Whether the combo shares a card with `other`.
    pub fn collides_with(self, other: Combo) -> bool {
        self.contains(other.hi) || self.contains(other.lo)
    }

    /// Whether the combo shares a card with the board.
    pub fn collides_with_board(self, board: &[Card]) -> bool {
        board.iter().any(|&c| self.contains(c))
    }

    /// Whether both cards share a suit.
    pub fn is_suited(self) -> bool {
        self.hi.suit() == self.lo.suit()
    }

    /// Whether both cards share a rank.
    pub fn is_pair(self) -> bool {
        self.hi.rank() == self.lo.rank()
    }

    /// The hand class this combo belongs to (`AA`, `AKs`, `72o`).
    pub fn hand_class(self) -> HandClass {
        let (r1, r2) = if self.hi.rank() >= self.lo.rank() {
            (self.hi.rank(), self.lo.rank())
        } else {
            (self.lo.rank(), self.hi.rank())
        };
        HandClass {
            hi: r1,
            lo: r2,
            suited: !self.is_pair() && self.is_suited(),
        }
    }
}

impl fmt::Display for Combo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Higher rank printed first for readability.
        if self.hi.rank() >= self.lo.rank() {
            write!(f, "{}{}", self.hi, self.lo)
        } else {
            write!(f, "{}{}", self.lo, self.hi)
        }
    }
}

impl fmt::Debug for Combo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

/// One of the 169 strategically distinct preflop hand shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandClass {
    /// Higher rank (0-12).
    pub hi: u8,
    /// Lower rank (0-12, equal to `hi` for pairs).
    pub lo: u8,
    /// Suited flag; always false for pairs.
    pub suited: bool,
}

const RANK_CHARS: [char; 13] = ['2', '3', '4', '5', '6', '7', '8', '9', 'T', 'J', 'Q', 'K', 'A'];

impl HandClass {
    /// Enumerate the member combos (6 for pairs, 4 suited, 12 offsuit).
    pub fn combos(self) -> Vec<Combo> {
        let mut out = Vec::new();
        if self.hi == self.lo {
            for s1 in 0..4u8 {
                for s2 in (s1 + 1)..4 {
                    out.push(Combo::new(Card::new(self.hi, s1), Card::new(self.lo, s2)));
                }
            }
        } else if self.suited {
            for s in 0..4u8 {
                out.push(Combo::new(Card::new(self.hi, s), Card::new(self.lo, s)));
            }
        } else {
            for s1 in 0..4u8 {
                for s2 in 0..4u8 {
                    if s1 != s2 {
                        out.push(Combo::new(Card::new(self.hi, s1), Card::new(self.lo, s2)));
                    }
                }
            }
        }
        out
    }

    /// All 169 classes in canonical order: pairs AA..22, suited by high
    /// rank then kicker, offsuit likewise.
    pub fn all() -> Vec<HandClass> {
        let mut out = Vec::with_capacity(169);
        for r in (0..13u8).rev() {
            out.push(HandClass { hi: r, lo: r, suited: false });
        }
        for suited in [true, false] {
            for hi in (1..13u8).rev() {
                for lo in (0..hi).rev() {
                    out.push(HandClass { hi, lo, suited });
                }
            }
        }
        out
    }
}

impl fmt::Display for HandClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let h = RANK_CHARS[self.hi as usize];
        let l = RANK_CHARS[self.lo as usize];
        if self.hi == self.lo {
            write!(f, "{}{}", h, l)
        } else {
            write!(f, "{}{}{}", h, l, if self.suited { 's' } else { 'o' })
        }
    }
}

/// A weighted distribution over the 1326 combos.
#[derive(Clone)]
pub struct Range {
    weights: Box<[f64; NUM_COMBOS]>,
}

impl Default for Range {
    fn default() -> Self {
        Range::empty()
    }
}

impl Range {
    /// An empty range (all weights zero).
    pub fn empty() -> Self {
        Range {
            weights: Box::new([0.0; NUM_COMBOS]),
        }
    }

    /// Parse range notation. Duplicate combos across tokens keep the
    /// maximum weight; unknown tokens fail with their text and position.
    pub fn parse(notation: &str) -> Result<Self, SolverError> {
        let mut range = Range::empty();
        let mut offset = 0usize;
        for raw in notation.split(',') {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                let position = offset + (raw.len() - raw.trim_start().len());
                range.apply_token(trimmed, position)?;
            }
            offset += raw.len() + 1;
        }
        Ok(range)
    }

    fn apply_token(&mut self, token: &str, position: usize) -> Result<(), SolverError> {
        // Split off an optional ":w" weight suffix.
        let (body, weight) = match token.split_once(':') {
            Some((body, w)) => {
                let weight: f64 = w
                    .parse()
                    .map_err(|_| SolverError::parse(token, position))?;
                if !(weight > 0.0 && weight <= 1.0) {
                    return Err(SolverError::parse(token, position));
                }
                (body, weight)
            }
            None => (token, 1.0),
        };

        let classes = expand_token(body).ok_or_else(|| SolverError::parse(token, position))?;
        for class in classes {
            for combo in class.combos() {
                let w = &mut self.weights[combo.index()];
                *w = w.max(weight);
            }
        }
        Ok(())
    }

    /// Weight of a combo.
    pub fn weight(&self, combo: Combo) -> f64 {
        self.weights[combo.index()]
    }

    /// Set a combo weight directly.
    pub fn set_weight(&mut self, combo: Combo, weight: f64) {
        self.weights[combo.index()] = weight;
    }

    /// All combos with positive weight.
    pub fn combos(&self) -> Vec<(Combo, f64)> {
        (0..NUM_COMBOS)
            .filter(|&i| self.weights[i] > 0.0)
            .map(|i| (Combo::from_index(i), self.weights[i]))
            .collect()
    }

    /// Total weight across all combos.
    pub fn total_weight(&self) -> f64 {
        self.weights.iter().sum()
    }

    /// Number of combos with positive weight.
    pub fn len(&self) -> usize {
        self.weights.iter().filter(|&&w| w > 0.0).count()
    }

    /// Whether no combo has positive weight.
    pub fn is_empty(&self) -> bool {
        self.weights.iter().all(|&w| w == 0.0)
    }

    /// Zero out every combo that uses one of the given cards.
    pub fn mask(&mut self, dead: &[Card]) {
        for i in 0..NUM_COMBOS {
            if self.weights[i] > 0.0 && Combo::from_index(i).collides_with_board(dead) {
                self.weights[i] = 0.0;
            }
        }
    }

    /// Combos not colliding with the given cards, with their weights.
    pub fn feasible(&self, dead: &[Card]) -> Vec<(Combo, f64)> {
        self.combos()
            .into_iter()
            .filter(|(c, _)| !c.collides_with_board(dead))
            .collect()
    }

    /// Normalized probability vector over the feasible combos. Returns an
    /// empty vector when nothing is feasible.
    pub fn normalized(&self, dead: &[Card]) -> Vec<(Combo, f64)> {
        let feasible = self.feasible(dead);
        let total: f64 = feasible.iter().map(|(_, w)| w).sum();
        if total <= 0.0 {
            return Vec::new();
        }
        feasible
            .into_iter()
            .map(|(c, w)| (c, w / total))
            .collect()
    }

    /// Serialize back to canonical tokens. Classes whose members share one
    /// weight emit a single token; partially masked classes are skipped.
    pub fn to_notation(&self) -> String {
        let mut tokens = Vec::new();
        for class in HandClass::all() {
            let members = class.combos();
            let w = self.weight(members[0]);
            if w > 0.0 && members.iter().all(|&c| self.weight(c) == w) {
                if w == 1.0 {
                    tokens.push(class.to_string());
                } else {
                    tokens.push(format!("{}:{}", class, w));
                }
            }
        }
        tokens.join(",")
    }
}

impl fmt::Debug for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Range({} combos)", self.len())
    }
}

/// Draw a combo from a normalized distribution.
pub fn sample_combo<R: Rng>(dist: &[(Combo, f64)], rng: &mut R) -> Option<Combo> {
    if dist.is_empty() {
        return None;
    }
    let roll: f64 = rng.gen();
    let mut acc = 0.0;
    for &(combo, p) in dist {
        acc += p;
        if roll < acc {
            return Some(combo);
        }
    }
    // Floating point slack lands on the last entry.
    Some(dist[dist.len() - 1].0)
}

/// Expand a single token body (no weight suffix) into hand classes.
fn expand_token(body: &str) -> Option<Vec<HandClass>> {
    if let Some((start, end)) = body.split_once('-') {
        return expand_span(start, end);
    }
    if let Some(stripped) = body.strip_suffix('+') {
        return expand_plus(stripped);
    }
    expand_single(body)
}

fn parse_rank(c: char) -> Option<u8> {
    RANK_CHARS
        .iter()
        .position(|&r| r == c.to_ascii_uppercase())
        .map(|i| i as u8)
}

/// `AA`, `AKs`, `AKo`, or untagged `AK` (both suited and offsuit).
fn expand_single(body: &str) -> Option<Vec<HandClass>> {
    let chars: Vec<char> = body.chars().collect();
    if chars.len() < 2 || chars.len() > 3 {
        return None;
    }
    let r1 = parse_rank(chars[0])?;
    let r2 = parse_rank(chars[1])?;
    let (hi, lo) = (r1.max(r2), r1.min(r2));

    if hi == lo {
        if chars.len() != 2 {
            return None;
        }
        return Some(vec![HandClass { hi, lo, suited: false }]);
    }
    match chars.get(2).copied() {
        Some('s') | Some('S') => Some(vec![HandClass { hi, lo, suited: true }]),
        Some('o') | Some('O') => Some(vec![HandClass { hi, lo, suited: false }]),
        Some(_) => None,
        None => Some(vec![
            HandClass { hi, lo, suited: true },
            HandClass { hi, lo, suited: false },
        ]),
    }
}

/// `TT+` (pairs up to AA) or `ATs+` (kickers up to the high rank).
fn expand_plus(body: &str) -> Option<Vec<HandClass>> {
    let base = expand_single(body)?;
    let mut out = Vec::new();
    for class in base {
        if class.hi == class.lo {
            for r in class.hi..=RANK_A {
                out.push(HandClass { hi: r, lo: r, suited: false });
            }
        } else {
            for lo in class.lo..class.hi {
                out.push(HandClass { hi: class.hi, lo, suited: class.suited });
            }
        }
    }
    Some(out)
}

/// `AA-77` (pair run) or `AKs-ATs` (kicker run with a shared high card).
fn expand_span(start: &str, end: &str) -> Option<Vec<HandClass>> {
    let a = expand_single(start)?;
    let b = expand_single(end)?;
    // Untagged non-pair spans expand both suited and offsuit runs.
    if a.len() != b.len() {
        return None;
    }
    let mut out = Vec::new();
    for (ca, cb) in a.into_iter().zip(b) {
        if ca.suited != cb.suited {
            return None;
        }
        if ca.hi == ca.lo && cb.hi == cb.lo {
            let (top, bottom) = (ca.hi.max(cb.hi), ca.hi.min(cb.hi));
            for r in bottom..=top {
                out.push(HandClass { hi: r, lo: r, suited: false });
            }
        } else if ca.hi == cb.hi && ca.hi != ca.lo && cb.hi != cb.lo {
            let (top, bottom) = (ca.lo.max(cb.lo), ca.lo.min(cb.lo));
            for lo in bottom..=top {
                out.push(HandClass { hi: ca.hi, lo, suited: ca.suited });
            }
        } else {
            return None;
        }
    }
    Some(out)
}
