//! Game tree for heads-up no-limit betting.
//!
//! The tree is an arena of nodes addressed by integer ids. Action nodes
//! own their (action, child) edges; chance nodes mark street transitions
//! whose cards are sampled during traversal rather than enumerated; fold
//! and showdown terminals carry the chips needed to settle the hand.
//!
//! Chips are held in integer centi-chips so action amounts hash and
//! compare exactly across the tree and the infoset table.

pub mod builder;

use std::fmt;

use crate::cards::eval::rank_with_board;
use crate::cards::{Card, Street};
use crate::range::Combo;

pub use builder::{build, BettingConfig};

/// Integer chip amount in hundredths of a chip.
pub type Chips = u32;

/// Convert a real chip amount to centi-chips.
#[inline]
pub fn to_centi(chips: f64) -> Chips {
    (chips * 100.0).round() as Chips
}

/// Convert centi-chips back to real chips.
#[inline]
pub fn from_centi(centi: Chips) -> f64 {
    centi as f64 / 100.0
}

/// A betting action. Bet and raise amounts are the chips added on top of
/// any call, in centi-chips; all-in carries the actor's full remaining
/// stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Surrender the pot.
    Fold,
    /// Pass with no bet to face.
    Check,
    /// Match the outstanding bet.
    Call,
    /// Open the betting for the given amount.
    Bet(Chips),
    /// Add the given amount on top of calling.
    Raise(Chips),
    /// Commit the entire remaining stack.
    AllIn(Chips),
}

impl Action {
    /// Compact code used in canonical history encodings.
    ///
    /// All-in encodes without its amount: the amount is a function of the
    /// preceding history, so the bare code stays canonical.
    pub fn code(&self) -> String {
        match self {
            Action::Fold => "f".to_string(),
            Action::Check => "x".to_string(),
            Action::Call => "c".to_string(),
            Action::Bet(amt) => format!("b{}", amt),
            Action::Raise(amt) => format!("r{}", amt),
            Action::AllIn(_) => "a".to_string(),
        }
    }

    /// Human-readable label for reports.
    pub fn label(&self) -> String {
        match self {
            Action::Fold => "fold".to_string(),
            Action::Check => "check".to_string(),
            Action::Call => "call".to_string(),
            Action::Bet(amt) => format!("bet {:.2}", from_centi(*amt)),
            Action::Raise(amt) => format!("raise {:.2}", from_centi(*amt)),
            Action::AllIn(_) => "allin".to_string(),
        }
    }

    /// Whether this action adds chips aggressively.
    pub fn is_aggressive(&self) -> bool {
        matches!(self, Action::Bet(_) | Action::Raise(_) | Action::AllIn(_))
    }
}

/// How a terminal node resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalKind {
    /// A player folded; the other wins the pot.
    Fold {
        /// The non-folding player.
        winner: u8,
    },
    /// Both hands are compared at showdown.
    Showdown,
}

/// Index of a node in the tree arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

/// A node in the game tree.
#[derive(Debug)]
pub enum TreeNode {
    /// A decision point for one player.
    Action {
        /// Acting player: 0 = OOP, 1 = IP.
        player: u8,
        /// Street this decision belongs to.
        street: Street,
        /// Pot at this node (entry pot plus both commitments), centi-chips.
        pot: Chips,
        /// Chips the actor must add to continue.
        to_call: Chips,
        /// Legal actions with their successor nodes, in generation order.
        edges: Vec<(Action, NodeId)>,
    },
    /// A street transition whose cards are sampled during traversal.
    Chance {
        /// The street being dealt into.
        street: Street,
        /// Successor once the cards are dealt.
        child: NodeId,
    },
    /// Hand over.
    Terminal {
        /// Fold or showdown.
        kind: TerminalKind,
        /// Gross pot (entry pot plus both commitments), centi-chips.
        pot: Chips,
        /// Total chips each player committed inside the tree.
        committed: [Chips; 2],
    },
}

/// An immutable game tree built for one solve.
pub struct GameTree {
    nodes: Vec<TreeNode>,
    root: NodeId,
    entry_street: Street,
    pot_size: Chips,
    starting_stack: Chips,
}

impl GameTree {
    /// The root node (first decision of the entry street).
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The street the tree starts on.
    pub fn entry_street(&self) -> Street {
        self.entry_street
    }

    /// Entry pot in centi-chips.
    pub fn pot_size(&self) -> Chips {
        self.pot_size
    }

    /// Effective starting stack in centi-chips.
    pub fn starting_stack(&self) -> Chips {
        self.starting_stack
    }

    /// Total node count.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Access a node by id.
    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id.0 as usize]
    }

    /// Edges of an action node; empty for chance and terminal nodes.
    pub fn children(&self, id: NodeId) -> &[(Action, NodeId)] {
        match self.node(id) {
            TreeNode::Action { edges, .. } => edges,
            _ => &[],
        }
    }

    /// Whether the node is terminal.
    pub fn is_terminal(&self, id: NodeId) -> bool {
        matches!(self.node(id), TreeNode::Terminal { .. })
    }

    /// Whether the node is a chance node.
    pub fn is_chance(&self, id: NodeId) -> bool {
        matches!(self.node(id), TreeNode::Chance { .. })
    }

    /// Acting player at an action node.
    pub fn acting_player(&self, id: NodeId) -> Option<u8> {
        match self.node(id) {
            TreeNode::Action { player, .. } => Some(*player),
            _ => None,
        }
    }

    /// Payoffs for both players at a terminal, in real chips, net of what
    /// each committed inside the tree. Uncalled chips return to the bettor
    /// before the pot is awarded.
    ///
    /// A fold terminal never consults the evaluator; a showdown compares
    /// the two sampled combos on the full board.
    pub fn terminal_payoff(&self, id: NodeId, combos: [Combo; 2], board: &[Card]) -> [f64; 2] {
        let (kind, pot, committed) = match self.node(id) {
            TreeNode::Terminal { kind, pot, committed } => (*kind, *pot, *committed),
            _ => panic!("terminal_payoff on non-terminal node"),
        };

        let entry = from_centi(pot - committed[0] - committed[1]);
        let matched = from_centi(committed[0].min(committed[1]));

        match kind {
            TerminalKind::Fold { winner } => {
                let folder = 1 - winner as usize;
                let lost = from_centi(committed[folder]);
                let mut payoff = [0.0; 2];
                payoff[winner as usize] = entry + lost;
                payoff[folder] = -lost;
                payoff
            }
            TerminalKind::Showdown => {
                let r0 = rank_with_board(combos[0].cards(), board);
                let r1 = rank_with_board(combos[1].cards(), board);
                match r0.cmp(&r1) {
                    std::cmp::Ordering::Greater => [entry + matched, -matched],
                    std::cmp::Ordering::Less => [-matched, entry + matched],
                    std::cmp::Ordering::Equal => [entry / 2.0, entry / 2.0],
                }
            }
        }
    }
}

impl fmt::Debug for GameTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GameTree({} nodes, entry {}, pot {:.2}, stack {:.2})",
            self.nodes.len(),
            self.entry_street,
            from_centi(self.pot_size),
            from_centi(self.starting_stack)
        )
    }
}
