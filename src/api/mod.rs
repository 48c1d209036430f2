//! Boundary types and the solve driver.
//!
//! [`SolveRequest`] and [`SolveResponse`] are the serde-encoded contract
//! with whatever transport sits above the solver. All validation happens
//! here before any CFR iteration begins; cancellation and timeouts are
//! honored between iterations and surface the partial result.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::cards::{parse_board, Card, Street};
use crate::cfr::{CancelToken, CfrConfig, ConvergencePoint, TrainStats, Trainer};
use crate::error::SolverError;
use crate::range::Range;
use crate::report::{board_texture, Reporter};
use crate::tree::builder::DEFAULT_NODE_CEILING;
use crate::tree::{build, BettingConfig};

/// A solve request as delivered by the transport layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveRequest {
    /// Out-of-position range notation.
    #[serde(default)]
    pub oop_range: String,
    /// In-position range notation.
    #[serde(default)]
    pub ip_range: String,
    /// Effective stack behind, chips.
    pub starting_stack: f64,
    /// Pot at tree entry, chips.
    pub pot_size: f64,
    /// Board cards in canonical text (empty for preflop).
    #[serde(default)]
    pub board_cards: String,
    /// Street the solve starts on; must match the board length.
    pub street: Street,
    /// CFR iterations to run.
    #[serde(default)]
    pub iterations: u64,
    /// Bet and raise sizes as pot fractions.
    #[serde(default = "default_bet_sizes")]
    pub bet_sizes: Vec<f64>,
    /// Per-street caps on bets plus raises; overrides `max_bets`.
    #[serde(default)]
    pub max_bets_per_street: Option<[u8; 4]>,
    /// Single cap applied to every street when the per-street map is
    /// absent.
    #[serde(default)]
    pub max_bets: Option<u8>,
    /// Whether all-in is always offered alongside the configured sizes.
    #[serde(default = "default_true")]
    pub allow_all_in: bool,
    /// Minimum raise as a fraction of the current pot.
    #[serde(default = "default_min_raise")]
    pub min_raise_size: f64,
    /// Ceiling for the pre-build node estimate.
    #[serde(default = "default_node_ceiling")]
    pub node_ceiling: u64,
    /// RNG seed; fixing it makes single-threaded solves reproducible.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_bet_sizes() -> Vec<f64> {
    vec![0.5, 1.0]
}

fn default_true() -> bool {
    true
}

fn default_min_raise() -> f64 {
    0.1
}

fn default_node_ceiling() -> u64 {
    DEFAULT_NODE_CEILING
}

/// Default cap on bets plus raises per street.
const DEFAULT_MAX_BETS: u8 = 2;

impl SolveRequest {
    /// Resolve the per-street caps from the two request fields.
    pub fn caps(&self) -> [u8; 4] {
        match (self.max_bets_per_street, self.max_bets) {
            (Some(caps), _) => caps,
            (None, Some(cap)) => [cap; 4],
            (None, None) => [DEFAULT_MAX_BETS; 4],
        }
    }

    /// The betting configuration this request describes.
    pub fn betting_config(&self) -> BettingConfig {
        BettingConfig {
            bet_sizes: self.bet_sizes.clone(),
            max_bets_per_street: self.caps(),
            allow_all_in: self.allow_all_in,
            min_raise_size: self.min_raise_size,
            starting_stack: self.starting_stack,
            pot_size: self.pot_size,
            node_ceiling: self.node_ceiling,
        }
    }
}

/// Strategy map: hand class -> action label -> probability.
pub type StrategyMap = BTreeMap<String, BTreeMap<String, f64>>;

/// Result of a solve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveResponse {
    /// Averaged OOP strategy at its first decision point.
    pub oop_strategy: StrategyMap,
    /// Averaged IP strategy at its first decision point.
    pub ip_strategy: StrategyMap,
    /// Iterations actually completed.
    pub training_iterations: u64,
    /// Wall time spent solving.
    pub computation_time_seconds: f64,
    /// Total nodes in the built tree.
    pub nodes_count: usize,
    /// Last convergence metric recorded, 0 when none was.
    pub final_convergence: f64,
    /// Convergence history, one point per interval.
    pub convergence_history: Vec<ConvergencePoint>,
    /// Board texture tags.
    pub board_texture: String,
    /// Echo of the bet sizes used.
    pub bet_sizes_used: Vec<f64>,
    /// Echo of the per-street caps used.
    pub max_bets_per_street: [u8; 4],
}

/// Result of a configuration validation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigReport {
    /// Whether a solve with this configuration would start.
    pub is_valid: bool,
    /// Non-fatal observations about the configuration.
    pub warnings: Vec<String>,
    /// Closed-form upper bound on tree nodes.
    pub estimated_nodes: u64,
    /// Rough wall-time estimate for the recommended iteration count.
    pub estimated_training_time_seconds: f64,
    /// Suggested iteration count for stable frequencies.
    pub recommended_iterations: u64,
}

/// Liveness and version information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    /// Always "ok" when the process can respond.
    pub status: String,
    /// Crate version string.
    pub version: String,
}

/// Health call.
pub fn health() -> Health {
    Health {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }
}

/// Validate the betting subset of a request and estimate its cost without
/// building anything.
pub fn validate_config(request: &SolveRequest) -> ConfigReport {
    let config = request.betting_config();
    let mut warnings = Vec::new();

    let valid = config.validate().is_ok();
    let estimated_nodes = if valid {
        config.estimate_nodes(request.street)
    } else {
        0
    };
    let is_valid = valid && estimated_nodes > 0 && estimated_nodes <= request.node_ceiling;

    if estimated_nodes > request.node_ceiling {
        warnings.push(format!(
            "estimated {} nodes exceeds the ceiling of {}",
            estimated_nodes, request.node_ceiling
        ));
    } else if estimated_nodes > request.node_ceiling / 2 {
        warnings.push("node estimate is within a factor of two of the ceiling".to_string());
    }
    if request.bet_sizes.len() > 4 {
        warnings.push("more than four bet sizes grows the tree rapidly".to_string());
    }
    if request.min_raise_size >= 1.0 {
        warnings.push("min_raise_size of a full pot elides most raise sizes".to_string());
    }
    if request.iterations > 0 && request.iterations < 10_000 {
        warnings.push("fewer than 10k iterations rarely produces stable frequencies".to_string());
    }

    // Recommend more iterations for bigger trees, clamped to a practical
    // band, with a rough nodes-per-second calibration for the time guess.
    let recommended_iterations =
        ((estimated_nodes.max(1)).saturating_mul(50)).clamp(10_000, 200_000);
    let per_iteration_nodes = (estimated_nodes.max(1) as f64).sqrt();
    let estimated_training_time_seconds =
        recommended_iterations as f64 * per_iteration_nodes / 5_000_000.0;

    ConfigReport {
        is_valid,
        warnings,
        estimated_nodes,
        estimated_training_time_seconds,
        recommended_iterations,
    }
}

/// Run a solve to completion.
pub fn solve(request: &SolveRequest) -> Result<SolveResponse, SolverError> {
    solve_with(request, None, None, |_, _| {})
}

/// Run a solve with cancellation, timeout, and a progress callback
/// invoked at every convergence interval.
///
/// Cancellation and timeout both return [`SolverError::Cancelled`]
/// carrying the response built from the iterations that completed.
pub fn solve_with<F>(
    request: &SolveRequest,
    cancel: Option<&CancelToken>,
    timeout: Option<Duration>,
    progress: F,
) -> Result<SolveResponse, SolverError>
where
    F: FnMut(u64, &TrainStats),
{
    let started = Instant::now();
    let (board, oop_range, ip_range) = validate_request(request)?;

    let config = request.betting_config();
    let tree = build(request.street, &config)?;
    log::info!(
        "solving {} on '{}': {} nodes, {} iterations",
        request.street,
        request.board_cards,
        tree.len(),
        request.iterations
    );

    let cfr_config = CfrConfig {
        seed: request.seed,
        ..CfrConfig::default()
    };
    let mut trainer = Trainer::new(&tree, &oop_range, &ip_range, board.clone(), cfr_config)?;

    let deadline = timeout.map(|t| started + t);
    let outcome = trainer.train_with_callback(request.iterations, cancel, deadline, progress)?;

    let reporter = Reporter::new(&tree, trainer.table(), board.clone(), &oop_range, &ip_range);
    let response = SolveResponse {
        oop_strategy: reporter.first_decision_strategy(0),
        ip_strategy: reporter.first_decision_strategy(1),
        training_iterations: outcome.completed,
        computation_time_seconds: started.elapsed().as_secs_f64(),
        nodes_count: tree.len(),
        final_convergence: trainer
            .convergence_history()
            .last()
            .map(|p| p.metric)
            .unwrap_or(0.0),
        convergence_history: trainer.convergence_history().to_vec(),
        board_texture: board_texture(&board),
        bet_sizes_used: request.bet_sizes.clone(),
        max_bets_per_street: request.caps(),
    };

    if outcome.cancelled {
        return Err(SolverError::Cancelled(Box::new(response)));
    }
    Ok(response)
}

/// All request validation; nothing past this point fails on user input.
fn validate_request(request: &SolveRequest) -> Result<(Vec<Card>, Range, Range), SolverError> {
    request.betting_config().validate()?;

    if request.iterations == 0 {
        return Err(SolverError::InvalidConfig(
            "iterations must be positive".into(),
        ));
    }

    let board = parse_board(&request.board_cards)?;
    match Street::from_board_len(board.len()) {
        Some(street) if street == request.street => {}
        Some(street) => {
            return Err(SolverError::InvalidConfig(format!(
                "board has {} cards which is {}, not {}",
                board.len(),
                street,
                request.street
            )))
        }
        None => {
            return Err(SolverError::InvalidConfig(format!(
                "board must have 0, 3, 4, or 5 cards, got {}",
                board.len()
            )))
        }
    }

    let oop_range = Range::parse(&request.oop_range)?;
    let ip_range = Range::parse(&request.ip_range)?;
    for (name, range) in [("oop", &oop_range), ("ip", &ip_range)] {
        if range.feasible(&board).is_empty() {
            return Err(SolverError::InvalidConfig(format!(
                "{} range is empty after removing board conflicts",
                name
            )));
        }
    }

    Ok((board, oop_range, ip_range))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::equity::equity;
    use crate::range::Combo;

    fn request(
        oop: &str,
        ip: &str,
        board: &str,
        street: Street,
        stack: f64,
        pot: f64,
        iterations: u64,
    ) -> SolveRequest {
        SolveRequest {
            oop_range: oop.to_string(),
            ip_range: ip.to_string(),
            starting_stack: stack,
            pot_size: pot,
            board_cards: board.to_string(),
            street,
            iterations,
            bet_sizes: vec![1.0],
            max_bets_per_street: None,
            max_bets: None,
            allow_all_in: true,
            min_raise_size: 0.1,
            node_ceiling: DEFAULT_NODE_CEILING,
            seed: Some(42),
        }
    }

    #[test]
    fn health_reports_version() {
        let h = health();
        assert_eq!(h.status, "ok");
        assert_eq!(h.version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn request_roundtrips_through_json() {
        let req = request("AA,KK", "QQ+", "", Street::Preflop, 100.0, 1.5, 1000);
        let json = serde_json::to_string(&req).unwrap();
        let back: SolveRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.oop_range, "AA,KK");
        assert_eq!(back.street, Street::Preflop);
        assert_eq!(back.seed, Some(42));
    }

    #[test]
    fn validation_rejects_inconsistent_board_and_street() {
        let req = request("AA", "KK", "As Kd Qc", Street::Preflop, 100.0, 10.0, 1000);
        assert!(matches!(solve(&req), Err(SolverError::InvalidConfig(_))));

        let req = request("AA", "KK", "As Kd", Street::Flop, 100.0, 10.0, 1000);
        assert!(matches!(solve(&req), Err(SolverError::InvalidConfig(_))));
    }

    #[test]
    fn validation_rejects_zero_iterations_and_bad_ranges() {
        let req = request("AA", "KK", "", Street::Preflop, 100.0, 1.5, 0);
        assert!(matches!(solve(&req), Err(SolverError::InvalidConfig(_))));

        let req = request("notarange", "KK", "", Street::Preflop, 100.0, 1.5, 100);
        assert!(matches!(solve(&req), Err(SolverError::Parse { .. })));

        // Board consumes the whole OOP range.
        let req = request("AA", "KK", "Ah Ad Ac", Street::Flop, 100.0, 10.0, 100);
        assert!(matches!(solve(&req), Err(SolverError::InvalidConfig(_))));
    }

    #[test]
    fn tree_size_gate_rejects_before_iterating() {
        let mut req = request("AA", "KK", "", Street::Preflop, 1000.0, 1.0, 100_000);
        req.bet_sizes = vec![0.25, 0.33, 0.5, 0.66, 0.75, 1.0, 1.5, 2.0];
        req.max_bets_per_street = Some([4, 4, 4, 4]);
        req.node_ceiling = 1_000_000;

        let report = validate_config(&req);
        assert!(!report.is_valid);
        assert!(report.estimated_nodes > 1_000_000);
        assert!(!report.warnings.is_empty());

        assert!(matches!(solve(&req), Err(SolverError::TreeTooLarge { .. })));
    }

    #[test]
    fn validate_config_accepts_reasonable_setups() {
        let req = request("AA", "KK", "", Street::Preflop, 100.0, 1.5, 20_000);
        let report = validate_config(&req);
        assert!(report.is_valid);
        assert!(report.estimated_nodes > 0);
        assert!(report.recommended_iterations >= 10_000);
        assert!(report.estimated_training_time_seconds > 0.0);
    }

    #[test]
    fn cancellation_carries_partial_response() {
        let req = request("AA", "AA", "", Street::Preflop, 100.0, 1.5, 50_000);
        let token = CancelToken::new();
        token.cancel();
        match solve_with(&req, Some(&token), None, |_, _| {}) {
            Err(SolverError::Cancelled(partial)) => {
                assert_eq!(partial.training_iterations, 0);
                assert!(partial.nodes_count > 0);
            }
            other => panic!("expected Cancelled, got {:?}", other.map(|_| ())),
        }
    }

    // Scenario: mirrored AA stacks behind a tiny pot. Facing a jam, both
    // players converge on calling since folding forfeits the overlay.
    #[test]
    fn preflop_all_in_math() {
        let mut req = request("AA", "AA", "", Street::Preflop, 100.0, 1.5, 20_000);
        req.max_bets_per_street = Some([1, 1, 1, 1]);

        let tree = build(Street::Preflop, &req.betting_config()).unwrap();
        let oop = Range::parse("AA").unwrap();
        let ip = Range::parse("AA").unwrap();
        let mut trainer = Trainer::new(
            &tree,
            &oop,
            &ip,
            Vec::new(),
            CfrConfig::default().with_seed(42),
        )
        .unwrap();
        trainer.train(20_000, None, None).unwrap();
        let reporter = Reporter::new(&tree, trainer.table(), Vec::new(), &oop, &ip);

        // IP facing the OOP jam.
        let facing_jam = reporter.strategy_at_history("a").unwrap();
        let aa = &facing_jam["AA"];
        assert!(aa["call"] > 0.95, "IP call was {}", aa["call"]);
        assert!(aa["fold"] < 0.05, "IP fold was {}", aa["fold"]);

        // OOP facing the IP jam after checking.
        let oop_facing = reporter.strategy_at_history("x-a").unwrap();
        let aa = &oop_facing["AA"];
        assert!(aa["call"] > 0.95, "OOP call was {}", aa["call"]);

        // Mirrored aces split the pot.
        let eq = equity(
            Combo::parse("AhAs").unwrap(),
            &Range::parse("AA").unwrap(),
            &[],
            20_000,
            42,
        )
        .unwrap();
        assert!((eq - 0.5).abs() < 0.01, "AA vs AA equity was {}", eq);
    }

    // Scenario: garbage against aces. IP value-bets its whole range and
    // the garbage folds rather than chase two overcards' worth of equity.
    #[test]
    fn trivial_fold() {
        let mut req = request("72o", "AA", "", Street::Preflop, 100.0, 10.0, 20_000);
        req.max_bets_per_street = Some([1, 1, 1, 1]);
        req.allow_all_in = false;

        let response = solve(&req).unwrap();

        // IP bet decision after the OOP check.
        let ip = &response.ip_strategy["AA"];
        let bet = ip
            .iter()
            .filter(|(label, _)| label.starts_with("bet"))
            .map(|(_, p)| p)
            .sum::<f64>();
        assert!(bet > 0.9, "IP bet frequency was {}", bet);

        // OOP facing the pot-size bet.
        let tree = build(Street::Preflop, &req.betting_config()).unwrap();
        let oop = Range::parse("72o").unwrap();
        let aa = Range::parse("AA").unwrap();
        let mut trainer = Trainer::new(
            &tree,
            &oop,
            &aa,
            Vec::new(),
            CfrConfig::default().with_seed(42),
        )
        .unwrap();
        trainer.train(20_000, None, None).unwrap();
        let reporter = Reporter::new(&tree, trainer.table(), Vec::new(), &oop, &aa);

        let facing = reporter.strategy_at_history("x-b1000").unwrap();
        let hand = &facing["72o"];
        assert!(hand["fold"] > 0.9, "OOP fold was {}", hand["fold"]);
    }

    // Scenario: river value betting with the nuts against bluff-catchers.
    // The nut hand bets nearly always; facing a range that only ever bets
    // the nuts, the catchers fold.
    #[test]
    fn river_value() {
        let mut req = request(
            "KK,QQ,JJ",
            "AA",
            "As Kd Qc 7h 2s",
            Street::River,
            100.0,
            10.0,
            50_000,
        );
        req.max_bets_per_street = Some([1, 1, 1, 1]);
        req.allow_all_in = false;

        let response = solve(&req).unwrap();
        assert_eq!(response.board_texture, "rainbow,connected,high-card");

        let aa = &response.ip_strategy["AA"];
        let bet = aa
            .iter()
            .filter(|(label, _)| label.starts_with("bet"))
            .map(|(_, p)| p)
            .sum::<f64>();
        assert!(bet >= 0.95, "AA bet frequency was {}", bet);

        let tree = build(Street::River, &req.betting_config()).unwrap();
        let board = parse_board(&req.board_cards).unwrap();
        let villain = Range::parse("KK,QQ,JJ").unwrap();
        let hero = Range::parse("AA").unwrap();
        let mut trainer = Trainer::new(
            &tree,
            &villain,
            &hero,
            board.clone(),
            CfrConfig::default().with_seed(42),
        )
        .unwrap();
        trainer.train(50_000, None, None).unwrap();
        let reporter = Reporter::new(&tree, trainer.table(), board, &villain, &hero);

        // Facing a bet that is always the nuts, every catcher folds; the
        // weakest catcher folds hardest.
        let facing = reporter.strategy_at_history("x-b1000").unwrap();
        assert!(
            facing["JJ"]["fold"] >= 0.8,
            "JJ fold was {}",
            facing["JJ"]["fold"]
        );
        assert!(
            facing["KK"]["fold"] >= 0.5,
            "KK fold was {}",
            facing["KK"]["fold"]
        );
    }

    #[test]
    fn identical_seeds_give_identical_responses() {
        let req = request(
            "AA,KK",
            "QQ,JJ",
            "As Kd Qc 7h 2s",
            Street::River,
            50.0,
            10.0,
            5_000,
        );
        let a = solve(&req).unwrap();
        let b = solve(&req).unwrap();
        assert_eq!(a.oop_strategy, b.oop_strategy);
        assert_eq!(a.ip_strategy, b.ip_strategy);
        assert_eq!(
            a.convergence_history
                .iter()
                .map(|p| (p.iteration, p.metric))
                .collect::<Vec<_>>(),
            b.convergence_history
                .iter()
                .map(|p| (p.iteration, p.metric))
                .collect::<Vec<_>>()
        );
    }
}
