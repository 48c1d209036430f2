//! The CFR training driver and tree traversal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::cards::{board_to_string, Card, Deck};
use crate::cfr::config::{CfrConfig, ConvergencePoint, TrainStats};
use crate::cfr::storage::InfosetTable;
use crate::error::SolverError;
use crate::range::{sample_combo, Combo, Range};
use crate::tree::{GameTree, NodeId, TreeNode};

/// Cooperative cancellation flag checked between iterations.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A fresh, un-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Result of a training run.
#[derive(Debug, Clone)]
pub struct TrainOutcome {
    /// Iterations actually completed.
    pub completed: u64,
    /// Whether the run stopped early on cancellation or timeout.
    pub cancelled: bool,
}

/// External-sampling CFR trainer bound to one tree and one pair of
/// ranges.
pub struct Trainer<'a> {
    tree: &'a GameTree,
    /// Entry board cards, fixed for the whole solve.
    board: Vec<Card>,
    /// Normalized combo distributions per player, masked by the board.
    dists: [Vec<(Combo, f64)>; 2],
    table: InfosetTable,
    config: CfrConfig,
    rng: StdRng,
    iteration: u64,
    stats: TrainStats,
    convergence: Vec<ConvergencePoint>,
}

impl<'a> Trainer<'a> {
    /// Create a trainer. The ranges are masked against the entry board and
    /// normalized; a range left empty by the mask is a config error.
    pub fn new(
        tree: &'a GameTree,
        oop_range: &Range,
        ip_range: &Range,
        board: Vec<Card>,
        config: CfrConfig,
    ) -> Result<Self, SolverError> {
        let dists = [
            oop_range.normalized(&board),
            ip_range.normalized(&board),
        ];
        for (i, dist) in dists.iter().enumerate() {
            if dist.is_empty() {
                return Err(SolverError::InvalidConfig(format!(
                    "{} range has no combos consistent with the board",
                    if i == 0 { "oop" } else { "ip" }
                )));
            }
        }

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Trainer {
            tree,
            board,
            dists,
            table: InfosetTable::new(),
            config,
            rng,
            iteration: 0,
            stats: TrainStats::default(),
            convergence: Vec::new(),
        })
    }

    /// Run `iterations` iterations, stopping early on cancellation or when
    /// the deadline passes. Partial progress stays in the table either
    /// way; no iteration is half-applied because the stop checks sit
    /// between iterations.
    pub fn train(
        &mut self,
        iterations: u64,
        cancel: Option<&CancelToken>,
        deadline: Option<Instant>,
    ) -> Result<TrainOutcome, SolverError> {
        self.train_with_callback(iterations, cancel, deadline, |_, _| {})
    }

    /// As [`train`](Self::train), invoking `progress` at every convergence
    /// interval with the iteration count and running stats.
    pub fn train_with_callback<F>(
        &mut self,
        iterations: u64,
        cancel: Option<&CancelToken>,
        deadline: Option<Instant>,
        mut progress: F,
    ) -> Result<TrainOutcome, SolverError>
    where
        F: FnMut(u64, &TrainStats),
    {
        let start = Instant::now();
        let interval = self.config.convergence_interval.max(1);
        let mut snapshot = self.table.snapshot_regrets();
        let mut completed = 0u64;
        let mut cancelled = false;

        for _ in 0..iterations {
            if cancel.map_or(false, |t| t.is_cancelled())
                || deadline.map_or(false, |d| Instant::now() >= d)
            {
                cancelled = true;
                break;
            }

            self.run_iteration()?;
            completed += 1;

            if self.iteration % interval == 0 {
                let metric = self.table.regret_delta_l2(&snapshot);
                self.convergence.push(ConvergencePoint {
                    iteration: self.iteration,
                    metric,
                });
                snapshot = self.table.snapshot_regrets();

                self.refresh_stats(start);
                progress(self.iteration, &self.stats);
            }
        }

        self.refresh_stats(start);
        log::info!(
            "training {}: {} iterations, {} infosets, {:.2}s",
            if cancelled { "stopped" } else { "done" },
            self.stats.iterations,
            self.stats.info_sets,
            self.stats.elapsed_seconds
        );

        Ok(TrainOutcome { completed, cancelled })
    }

    fn refresh_stats(&mut self, start: Instant) {
        self.stats.iterations = self.iteration;
        self.stats.info_sets = self.table.len();
        self.stats.elapsed_seconds = start.elapsed().as_secs_f64();
        self.stats.update_rate();
    }

    /// One iteration: sample combos, alternate the update player, walk the
    /// tree from the root with unit reach.
    fn run_iteration(&mut self) -> Result<(), SolverError> {
        let combos = self.sample_combos()?;
        let update = (self.iteration % 2) as usize;
        self.iteration += 1;

        let mut board = self.board.clone();
        let mut history = String::new();
        self.traverse(
            self.tree.root(),
            [1.0, 1.0],
            combos,
            &mut board,
            &mut history,
            update,
        )?;
        Ok(())
    }

    /// Draw one combo per player, rejecting colliding pairs up to the
    /// retry cap.
    fn sample_combos(&mut self) -> Result<[Combo; 2], SolverError> {
        for _ in 0..self.config.sample_retry_cap {
            let c0 = sample_combo(&self.dists[0], &mut self.rng)
                .ok_or(SolverError::NoViableSample)?;
            let c1 = sample_combo(&self.dists[1], &mut self.rng)
                .ok_or(SolverError::NoViableSample)?;
            if !c0.collides_with(c1) {
                return Ok([c0, c1]);
            }
        }
        Err(SolverError::NoViableSample)
    }

    /// Recursive external-sampling traversal returning counterfactual
    /// utilities for both players.
    fn traverse(
        &mut self,
        node: NodeId,
        reach: [f64; 2],
        combos: [Combo; 2],
        board: &mut Vec<Card>,
        history: &mut String,
        update: usize,
    ) -> Result<[f64; 2], SolverError> {
        match self.tree.node(node) {
            TreeNode::Terminal { .. } => Ok(self.tree.terminal_payoff(node, combos, board)),

            TreeNode::Chance { street, child } => {
                let child = *child;
                let deal = street.cards_dealt();

                let mut used = board.clone();
                used.extend_from_slice(&combos[0].cards());
                used.extend_from_slice(&combos[1].cards());
                let mut deck = Deck::without(&used);
                let mut cards = deck.draw_n(&mut self.rng, deal);
                if cards.len() < deal {
                    return Err(SolverError::InternalInvariantViolated(
                        "deck exhausted at chance node".into(),
                    ));
                }
                // Canonical order within a single deal; the flop's three
                // cards carry no ordering information.
                cards.sort_by_key(|c| c.id());

                let board_len = board.len();
                let history_len = history.len();
                board.extend_from_slice(&cards);
                history.push('/');

                let result = self.traverse(child, reach, combos, board, history, update);

                board.truncate(board_len);
                history.truncate(history_len);
                result
            }

            TreeNode::Action { player, edges, .. } => {
                let i = *player as usize;
                let num_actions = edges.len();
                let edges: Vec<_> = edges.clone();

                let key = infoset_key(*player, board, history, combos[i]);
                let strategy = self.table.current_strategy(&key, num_actions);

                let weight = if self.config.linear_weighting {
                    reach[i] * (self.iteration as f64)
                } else {
                    reach[i]
                };
                self.table.add_strategy(&key, &strategy, weight);

                if i == update {
                    // Walk every action, then regret-update against the
                    // strategy's expected value.
                    let mut action_utils = vec![[0.0; 2]; num_actions];
                    for (j, (action, child)) in edges.iter().enumerate() {
                        let mut child_reach = reach;
                        child_reach[i] *= strategy[j];

                        let history_len = history.len();
                        push_action_code(history, action);
                        action_utils[j] = self.traverse(
                            *child,
                            child_reach,
                            combos,
                            board,
                            history,
                            update,
                        )?;
                        history.truncate(history_len);
                    }

                    let mut node_util = [0.0; 2];
                    for (j, u) in action_utils.iter().enumerate() {
                        node_util[0] += strategy[j] * u[0];
                        node_util[1] += strategy[j] * u[1];
                    }

                    let opponent_reach = reach[1 - i];
                    let deltas: Vec<f64> = action_utils
                        .iter()
                        .map(|u| opponent_reach * (u[i] - node_util[i]))
                        .collect();
                    self.table
                        .update_regrets(&key, &deltas, self.config.regret_matching_plus);

                    Ok(node_util)
                } else {
                    // Opponent: sample a single action from the strategy.
                    let j = sample_index(&strategy, &mut self.rng);
                    let (action, child) = edges[j];
                    let mut child_reach = reach;
                    child_reach[i] *= strategy[j];

                    let history_len = history.len();
                    push_action_code(history, &action);
                    let result =
                        self.traverse(child, child_reach, combos, board, history, update);
                    history.truncate(history_len);
                    result
                }
            }
        }
    }

    /// Iterations completed so far.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Training statistics.
    pub fn stats(&self) -> &TrainStats {
        &self.stats
    }

    /// Convergence history recorded so far.
    pub fn convergence_history(&self) -> &[ConvergencePoint] {
        &self.convergence
    }

    /// The infoset table, for the reporter.
    pub fn table(&self) -> &InfosetTable {
        &self.table
    }

    /// The normalized combo distribution for a player.
    pub fn distribution(&self, player: usize) -> &[(Combo, f64)] {
        &self.dists[player]
    }
}

/// Canonical infoset key: acting player, visible board, action history,
/// private combo. Field order and separators are fixed.
pub fn infoset_key(player: u8, board: &[Card], history: &str, combo: Combo) -> String {
    format!(
        "{}|{}|{}|{}",
        player,
        board_to_string(board),
        history,
        combo
    )
}

fn push_action_code(history: &mut String, action: &crate::tree::Action) {
    if !history.is_empty() && !history.ends_with('/') {
        history.push('-');
    }
    history.push_str(&action.code());
}

/// Sample an index from a probability vector.
fn sample_index<R: Rng>(probs: &[f64], rng: &mut R) -> usize {
    let roll: f64 = rng.gen();
    let mut acc = 0.0;
    for (i, &p) in probs.iter().enumerate() {
        acc += p;
        if roll < acc {
            return i;
        }
    }
    probs.len() - 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::parse_board;
    use crate::cards::Street;
    use crate::tree::{build, BettingConfig};

    fn river_value_setup() -> (BettingConfig, Vec<Card>) {
        let config = BettingConfig {
            bet_sizes: vec![1.0],
            max_bets_per_street: [1, 1, 1, 1],
            allow_all_in: false,
            min_raise_size: 0.1,
            starting_stack: 100.0,
            pot_size: 10.0,
            node_ceiling: 1_000_000,
        };
        let board = parse_board("As Kd Qc 7h 2s").unwrap();
        (config, board)
    }

    #[test]
    fn strategies_sum_to_one_after_training() {
        let (config, board) = river_value_setup();
        let tree = build(Street::River, &config).unwrap();
        let oop = Range::parse("KK,QQ,JJ").unwrap();
        let ip = Range::parse("AA,KK").unwrap();

        let mut trainer = Trainer::new(
            &tree,
            &oop,
            &ip,
            board,
            CfrConfig::default().with_seed(3),
        )
        .unwrap();
        trainer.train(2_000, None, None).unwrap();

        for key in trainer.table().visited_keys() {
            let avg = trainer.table().average_strategy_if_visited(&key).unwrap();
            let total: f64 = avg.iter().sum();
            assert!((total - 1.0).abs() < 1e-9, "{} summed to {}", key, total);
        }
    }

    #[test]
    fn identical_seeds_reproduce_identical_runs() {
        let (config, board) = river_value_setup();
        let tree = build(Street::River, &config).unwrap();
        let oop = Range::parse("KK,QQ,JJ").unwrap();
        let ip = Range::parse("AA,AKs").unwrap();

        let mut runs = Vec::new();
        for _ in 0..2 {
            let mut trainer = Trainer::new(
                &tree,
                &oop,
                &ip,
                board.clone(),
                CfrConfig::default().with_seed(99),
            )
            .unwrap();
            trainer.train(3_000, None, None).unwrap();

            let mut keys = trainer.table().visited_keys();
            keys.sort();
            let strategies: Vec<(String, Vec<f64>)> = keys
                .iter()
                .map(|k| (k.clone(), trainer.table().average_strategy_if_visited(k).unwrap()))
                .collect();
            let convergence: Vec<(u64, f64)> = trainer
                .convergence_history()
                .iter()
                .map(|p| (p.iteration, p.metric))
                .collect();
            runs.push((strategies, convergence));
        }

        assert_eq!(runs[0].0, runs[1].0);
        assert_eq!(runs[0].1, runs[1].1);
    }

    #[test]
    fn cancellation_returns_partial_progress() {
        let (config, board) = river_value_setup();
        let tree = build(Street::River, &config).unwrap();
        let oop = Range::parse("KK,QQ").unwrap();
        let ip = Range::parse("AA").unwrap();

        let mut trainer =
            Trainer::new(&tree, &oop, &ip, board, CfrConfig::default().with_seed(5)).unwrap();

        let token = CancelToken::new();
        token.cancel();
        let outcome = trainer.train(10_000, Some(&token), None).unwrap();
        assert!(outcome.cancelled);
        assert_eq!(outcome.completed, 0);

        // A fresh token lets training proceed.
        let token = CancelToken::new();
        let outcome = trainer.train(500, Some(&token), None).unwrap();
        assert!(!outcome.cancelled);
        assert_eq!(outcome.completed, 500);
        assert!(trainer.table().len() > 0);
    }

    #[test]
    fn impossible_combo_pair_fails_as_no_viable_sample() {
        // Both players restricted to the same two pair combos that always
        // collide: OOP and IP can never hold disjoint hands.
        let config = BettingConfig {
            starting_stack: 100.0,
            pot_size: 10.0,
            ..BettingConfig::default()
        };
        let board = parse_board("Ah Ad 5c").unwrap();
        let tree = build(Street::Flop, &config).unwrap();
        // Only AcAs remains for both ranges once the board blocks Ah/Ad.
        let oop = Range::parse("AA").unwrap();
        let ip = Range::parse("AA").unwrap();

        let mut trainer =
            Trainer::new(&tree, &oop, &ip, board, CfrConfig::default().with_seed(1)).unwrap();
        assert!(matches!(
            trainer.train(10, None, None),
            Err(SolverError::NoViableSample)
        ));
    }
}
