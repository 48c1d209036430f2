//! Strategy read-out after training.
//!
//! The reporter walks the entry street's decision nodes, re-derives the
//! canonical infoset keys, and aggregates averaged strategies per hand
//! class weighted by range weight. It also computes per-combo equity
//! against the opponent range and tags the board texture.

use std::collections::BTreeMap;

use rayon::prelude::*;

use crate::cards::equity::equity;
use crate::cards::{Card, RANK_Q};
use crate::cfr::solver::infoset_key;
use crate::cfr::InfosetTable;
use crate::range::Range;
use crate::tree::{GameTree, NodeId, TreeNode};

/// Aggregated strategy per hand class: class -> action label -> probability.
pub type ClassStrategy = BTreeMap<String, BTreeMap<String, f64>>;

/// Read-only view over a finished (or partially finished) solve.
pub struct Reporter<'a> {
    tree: &'a GameTree,
    table: &'a InfosetTable,
    board: Vec<Card>,
    ranges: [&'a Range; 2],
}

impl<'a> Reporter<'a> {
    /// Create a reporter over the solve's tree, table, entry board, and
    /// the two (unmasked) ranges.
    pub fn new(
        tree: &'a GameTree,
        table: &'a InfosetTable,
        board: Vec<Card>,
        oop_range: &'a Range,
        ip_range: &'a Range,
    ) -> Self {
        Reporter {
            tree,
            table,
            board,
            ranges: [oop_range, ip_range],
        }
    }

    /// Hand-class strategy at a player's first decision point: the root
    /// for OOP, the node after the opening check for IP.
    pub fn first_decision_strategy(&self, player: u8) -> ClassStrategy {
        match self.first_decision_node(player) {
            Some((node, history)) => self.class_strategy_at(node, &history),
            None => ClassStrategy::new(),
        }
    }

    /// Aggregated strategy at a specific entry-street decision node,
    /// identified by its action history (codes as stored in infoset keys,
    /// e.g. `x` for the node IP faces after a check).
    pub fn strategy_at_history(&self, history: &str) -> Option<ClassStrategy> {
        let (node, found) = self.find_by_history(self.tree.root(), String::new(), history)?;
        Some(self.class_strategy_at(node, &found))
    }

    /// Every visited infoset's averaged strategy, keyed by the canonical
    /// infoset key. Probabilities follow the node's edge order.
    pub fn all_strategies(&self) -> BTreeMap<String, Vec<f64>> {
        let mut out = BTreeMap::new();
        let mut keys = self.table.visited_keys();
        keys.sort();
        for key in keys {
            if let Some(avg) = self.table.average_strategy_if_visited(&key) {
                out.insert(key, avg);
            }
        }
        out
    }

    /// Equity of each combo in a player's range against the opponent
    /// range on the entry board. Trials fan out across combos; each combo
    /// gets a seed derived from `seed` so results stay deterministic
    /// regardless of thread scheduling.
    pub fn equity_report(
        &self,
        player: u8,
        trials: usize,
        seed: u64,
    ) -> Vec<(String, f64)> {
        let p = player as usize;
        let hero_combos = self.ranges[p].feasible(&self.board);
        let villain = self.ranges[1 - p];

        hero_combos
            .par_iter()
            .map(|&(combo, _)| {
                let combo_seed = seed ^ (combo.index() as u64).wrapping_mul(0x9e3779b97f4a7c15);
                let eq = equity(combo, villain, &self.board, trials, combo_seed)
                    .unwrap_or(f64::NAN);
                (combo.to_string(), eq)
            })
            .collect()
    }

    /// Depth-first search for the first decision node belonging to
    /// `player` on the entry street, following edge order.
    fn first_decision_node(&self, player: u8) -> Option<(NodeId, String)> {
        self.find_first(self.tree.root(), String::new(), player)
    }

    fn find_first(&self, node: NodeId, history: String, player: u8) -> Option<(NodeId, String)> {
        match self.tree.node(node) {
            TreeNode::Action { player: p, edges, .. } => {
                if *p == player {
                    return Some((node, history));
                }
                for (action, child) in edges {
                    let mut next = history.clone();
                    if !next.is_empty() {
                        next.push('-');
                    }
                    next.push_str(&action.code());
                    if let Some(found) = self.find_first(*child, next, player) {
                        return Some(found);
                    }
                }
                None
            }
            _ => None,
        }
    }

    fn find_by_history(
        &self,
        node: NodeId,
        history: String,
        target: &str,
    ) -> Option<(NodeId, String)> {
        match self.tree.node(node) {
            TreeNode::Action { edges, .. } => {
                if history == target {
                    return Some((node, history));
                }
                for (action, child) in edges {
                    let mut next = history.clone();
                    if !next.is_empty() {
                        next.push('-');
                    }
                    next.push_str(&action.code());
                    if target.starts_with(next.as_str()) {
                        if let Some(found) = self.find_by_history(*child, next, target) {
                            return Some(found);
                        }
                    }
                }
                None
            }
            _ => None,
        }
    }

    /// Combine the averaged strategies of every combo sharing a hand
    /// class at this node, weighted by range weight. Unvisited combos are
    /// skipped; classes with no visited combo are omitted.
    fn class_strategy_at(&self, node: NodeId, history: &str) -> ClassStrategy {
        let (player, edges) = match self.tree.node(node) {
            TreeNode::Action { player, edges, .. } => (*player, edges),
            _ => return ClassStrategy::new(),
        };
        let labels: Vec<String> = edges.iter().map(|(a, _)| a.label()).collect();

        let mut sums: BTreeMap<String, (f64, Vec<f64>)> = BTreeMap::new();
        for (combo, weight) in self.ranges[player as usize].feasible(&self.board) {
            let key = infoset_key(player, &self.board, history, combo);
            let Some(avg) = self.table.average_strategy_if_visited(&key) else {
                continue;
            };
            let class = combo.hand_class().to_string();
            let entry = sums
                .entry(class)
                .or_insert_with(|| (0.0, vec![0.0; labels.len()]));
            entry.0 += weight;
            for (slot, &p) in entry.1.iter_mut().zip(avg.iter()) {
                *slot += weight * p;
            }
        }

        sums.into_iter()
            .map(|(class, (total, weighted))| {
                let dist: BTreeMap<String, f64> = labels
                    .iter()
                    .cloned()
                    .zip(weighted.into_iter().map(|w| w / total))
                    .collect();
                (class, dist)
            })
            .collect()
    }
}

/// High-level board texture tags joined into one string.
///
/// Suit structure (monotone / two-tone / rainbow) plus paired, connected,
/// and high-card flags; an uncoordinated low board reads as dry.
pub fn board_texture(board: &[Card]) -> String {
    if board.is_empty() {
        return "preflop".to_string();
    }

    let mut tags: Vec<&str> = Vec::new();

    let mut suits = [0u8; 4];
    let mut ranks = [0u8; 13];
    for c in board {
        suits[c.suit() as usize] += 1;
        ranks[c.rank() as usize] += 1;
    }
    let distinct_suits = suits.iter().filter(|&&n| n > 0).count();
    if board.len() >= 3 {
        match distinct_suits {
            1 => tags.push("monotone"),
            2 => tags.push("two-tone"),
            _ => tags.push("rainbow"),
        }
    }

    if ranks.iter().any(|&n| n >= 2) {
        tags.push("paired");
    }

    // Three ranks inside a four-rank window make straights plausible.
    let present: Vec<u8> = (0..13u8).filter(|&r| ranks[r as usize] > 0).collect();
    let connected = present
        .windows(3)
        .any(|w| w[2] - w[0] <= 3);
    if connected {
        tags.push("connected");
    }

    if board.iter().any(|c| c.rank() >= RANK_Q) {
        tags.push("high-card");
    } else if !connected && !ranks.iter().any(|&n| n >= 2) {
        tags.push("dry");
    }

    tags.join(",")
}
