//! # GTO Solver
//!
//! Approximate Game-Theoretic-Optimal strategies for heads-up No-Limit
//! Texas Hold'em over a single betting tree spanning preflop through
//! river. Given two weighted starting ranges, a board, stacks, a pot, and
//! a betting abstraction, the solver produces a probability distribution
//! over legal actions at every decision point that approximates a Nash
//! equilibrium of the abstracted game.
//!
//! ## Quick start
//!
//! ```ignore
//! use gto_solver::api::{solve, SolveRequest};
//!
//! let request: SolveRequest = serde_json::from_str(json)?;
//! let response = solve(&request)?;
//! println!("{:#?}", response.oop_strategy);
//! ```
//!
//! ## Modules
//!
//! - [`cards`]: card encoding, deck, hand ranking, Monte-Carlo equity
//! - [`range`]: weighted combo ranges and range notation
//! - [`tree`]: betting tree arena and its abstraction rules
//! - [`cfr`]: chance-sampled external-sampling CFR engine
//! - [`report`]: strategy read-out, class aggregation, board texture
//! - [`api`]: solve request/response boundary and validation
//!
//! ## Architecture
//!
//! ```text
//!  SolveRequest ──> validate ──> tree::build ──> cfr::Trainer
//!                                                    │
//!  SolveResponse <── report::Reporter <── InfosetTable
//! ```

#![warn(missing_docs)]

pub mod api;
pub mod cards;
pub mod cfr;
pub mod error;
pub mod range;
pub mod report;
pub mod tree;

pub use api::{health, solve, solve_with, SolveRequest, SolveResponse};
pub use cfr::{CancelToken, CfrConfig, Trainer};
pub use error::SolverError;
pub use range::{Combo, Range};
pub use tree::{build, BettingConfig, GameTree};
