//! Solver error types.
//!
//! All fallible operations in the crate surface one of these variants.
//! Validation errors are raised before any CFR iteration begins; errors
//! that occur mid-solve either retry (`NoViableSample`) or abort.

use std::fmt;

use crate::api::SolveResponse;

/// Error surfaced to callers of the solver.
#[derive(Debug)]
pub enum SolverError {
    /// Malformed range token or card string. Carries the offending
    /// substring and its byte offset in the input.
    Parse {
        /// The text that failed to parse.
        token: String,
        /// Byte offset of the token within the input string.
        position: usize,
    },

    /// Inconsistent or out-of-range solve configuration.
    InvalidConfig(String),

    /// The pre-build tree size estimate exceeds the node ceiling.
    TreeTooLarge {
        /// Closed-form node estimate for the requested configuration.
        estimated: u64,
        /// Configured ceiling the estimate was checked against.
        ceiling: u64,
    },

    /// No non-colliding combo sample could be drawn within the retry cap.
    NoViableSample,

    /// The solve was cancelled or timed out. Carries the strategy
    /// averaged over the iterations that completed.
    Cancelled(Box<SolveResponse>),

    /// A postcondition of the game model failed at runtime.
    InternalInvariantViolated(String),
}

impl fmt::Display for SolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverError::Parse { token, position } => {
                write!(f, "parse error at byte {}: {:?}", position, token)
            }
            SolverError::InvalidConfig(msg) => write!(f, "invalid config: {}", msg),
            SolverError::TreeTooLarge { estimated, ceiling } => {
                write!(
                    f,
                    "tree too large: estimated {} nodes exceeds ceiling {}",
                    estimated, ceiling
                )
            }
            SolverError::NoViableSample => {
                write!(f, "no viable combo sample within the retry cap")
            }
            SolverError::Cancelled(_) => write!(f, "solve cancelled; partial result available"),
            SolverError::InternalInvariantViolated(msg) => {
                write!(f, "internal invariant violated: {}", msg)
            }
        }
    }
}

impl std::error::Error for SolverError {}

impl SolverError {
    /// Shorthand for a parse error.
    pub fn parse(token: impl Into<String>, position: usize) -> Self {
        SolverError::Parse {
            token: token.into(),
            position,
        }
    }
}
