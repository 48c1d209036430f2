//! Storage for per-infoset regrets and strategy sums.
//!
//! Keys are canonical byte strings encoding the acting player, visible
//! board, action history, and private combo. Each entry holds two dense
//! float vectors sized by the legal actions at that node; entries are
//! created on first visit and only ever mutated by CFR updates.
//!
//! Interior mutability keeps the table share-safe: updates take the write
//! lock per call, so a multi-threaded driver gets per-table critical
//! sections without further coordination.

use rustc_hash::FxHashMap;
use std::sync::RwLock;

/// Thread-safe table of regrets and cumulative strategies.
#[derive(Debug, Default)]
pub struct InfosetTable {
    /// Cumulative regrets: key -> regret per action.
    regrets: RwLock<FxHashMap<String, Vec<f64>>>,
    /// Cumulative strategy weights: key -> weight per action.
    strategy_sums: RwLock<FxHashMap<String, Vec<f64>>>,
}

impl InfosetTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current strategy for an infoset via regret matching: proportional
    /// to positive regrets, uniform when none are positive or the infoset
    /// is unseen.
    pub fn current_strategy(&self, key: &str, num_actions: usize) -> Vec<f64> {
        let regrets = self.regrets.read().unwrap();
        match regrets.get(key) {
            Some(r) => {
                let positive: Vec<f64> = r.iter().map(|&x| x.max(0.0)).collect();
                let sum: f64 = positive.iter().sum();
                if sum > 0.0 {
                    positive.iter().map(|&x| x / sum).collect()
                } else {
                    vec![1.0 / num_actions as f64; num_actions]
                }
            }
            None => vec![1.0 / num_actions as f64; num_actions],
        }
    }

    /// Average strategy: normalized cumulative strategy sums, uniform when
    /// the denominator is zero or the infoset is unseen.
    pub fn average_strategy(&self, key: &str, num_actions: usize) -> Vec<f64> {
        let sums = self.strategy_sums.read().unwrap();
        match sums.get(key) {
            Some(s) => normalize_or_uniform(s, num_actions),
            None => vec![1.0 / num_actions as f64; num_actions],
        }
    }

    /// Average strategy only if the infoset was visited.
    pub fn average_strategy_if_visited(&self, key: &str) -> Option<Vec<f64>> {
        let sums = self.strategy_sums.read().unwrap();
        sums.get(key).map(|s| normalize_or_uniform(s, s.len()))
    }

    /// Accumulate regret deltas for an infoset, creating it on first
    /// visit. With `plus` set, negative accumulated regrets clip to zero.
    pub fn update_regrets(&self, key: &str, deltas: &[f64], plus: bool) {
        let mut regrets = self.regrets.write().unwrap();
        let entry = regrets
            .entry(key.to_string())
            .or_insert_with(|| vec![0.0; deltas.len()]);
        debug_assert_eq!(entry.len(), deltas.len(), "action count changed for {}", key);
        for (slot, &delta) in entry.iter_mut().zip(deltas) {
            *slot += delta;
            if plus && *slot < 0.0 {
                *slot = 0.0;
            }
        }
    }

    /// Accumulate a weighted strategy into the cumulative sums.
    pub fn add_strategy(&self, key: &str, strategy: &[f64], weight: f64) {
        let mut sums = self.strategy_sums.write().unwrap();
        let entry = sums
            .entry(key.to_string())
            .or_insert_with(|| vec![0.0; strategy.len()]);
        for (slot, &p) in entry.iter_mut().zip(strategy) {
            *slot += p * weight;
        }
    }

    /// Number of infosets seen so far.
    pub fn len(&self) -> usize {
        self.regrets.read().unwrap().len()
    }

    /// Whether no infoset has been visited.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All keys with a strategy sum, for reporting.
    pub fn visited_keys(&self) -> Vec<String> {
        self.strategy_sums.read().unwrap().keys().cloned().collect()
    }

    /// Snapshot the regrets for convergence measurement.
    pub fn snapshot_regrets(&self) -> RegretSnapshot {
        RegretSnapshot {
            regrets: self.regrets.read().unwrap().clone(),
        }
    }

    /// L2 norm of the elementwise regret change since a snapshot. Infosets
    /// created after the snapshot count in full.
    pub fn regret_delta_l2(&self, snapshot: &RegretSnapshot) -> f64 {
        let regrets = self.regrets.read().unwrap();
        let mut sum_sq = 0.0;
        for (key, now) in regrets.iter() {
            match snapshot.regrets.get(key) {
                Some(then) => {
                    for (a, b) in now.iter().zip(then.iter()) {
                        let d = a - b;
                        sum_sq += d * d;
                    }
                }
                None => {
                    for v in now {
                        sum_sq += v * v;
                    }
                }
            }
        }
        sum_sq.sqrt()
    }
}

fn normalize_or_uniform(values: &[f64], num_actions: usize) -> Vec<f64> {
    let total: f64 = values.iter().sum();
    if total > 0.0 {
        values.iter().map(|&x| x / total).collect()
    } else {
        vec![1.0 / num_actions as f64; num_actions]
    }
}

/// A frozen copy of the regret table.
#[derive(Debug, Clone, Default)]
pub struct RegretSnapshot {
    regrets: FxHashMap<String, Vec<f64>>,
}
