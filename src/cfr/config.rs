//! CFR engine configuration and training statistics.

use serde::{Deserialize, Serialize};

/// Options controlling the CFR variant and bookkeeping cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CfrConfig {
    /// Clip negative regrets to zero at update time (regret matching
    /// plus). Speeds convergence in practice.
    pub regret_matching_plus: bool,

    /// Weight strategy-sum contributions by the iteration index instead
    /// of uniformly. Off by default so the average is the plain
    /// cumulative mean.
    pub linear_weighting: bool,

    /// Record a convergence point every this many iterations.
    pub convergence_interval: u64,

    /// How many times a colliding combo sample is redrawn before the
    /// iteration, and then the solve, gives up.
    pub sample_retry_cap: u32,

    /// Seed for the driver RNG. `None` draws one from entropy, which
    /// forfeits reproducibility.
    pub seed: Option<u64>,
}

impl Default for CfrConfig {
    fn default() -> Self {
        CfrConfig {
            regret_matching_plus: true,
            linear_weighting: false,
            convergence_interval: 1000,
            sample_retry_cap: 1000,
            seed: None,
        }
    }
}

impl CfrConfig {
    /// Builder method: set the seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Builder method: toggle regret matching plus.
    pub fn with_regret_matching_plus(mut self, enable: bool) -> Self {
        self.regret_matching_plus = enable;
        self
    }

    /// Builder method: set the convergence recording interval.
    pub fn with_convergence_interval(mut self, interval: u64) -> Self {
        self.convergence_interval = interval.max(1);
        self
    }
}

/// Statistics from a training run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainStats {
    /// Iterations completed.
    pub iterations: u64,
    /// Unique infosets created.
    pub info_sets: usize,
    /// Wall time spent training, seconds.
    pub elapsed_seconds: f64,
    /// Iterations per second.
    pub iterations_per_second: f64,
}

impl TrainStats {
    /// Recompute the rate from iterations and elapsed time.
    pub fn update_rate(&mut self) {
        if self.elapsed_seconds > 0.0 {
            self.iterations_per_second = self.iterations as f64 / self.elapsed_seconds;
        }
    }
}

/// One entry of the convergence history: the L2 norm of the per-infoset
/// regret delta accumulated over the preceding window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvergencePoint {
    /// Iteration the measurement was taken at.
    pub iteration: u64,
    /// Regret-delta L2 norm over the window. Lower is more settled.
    pub metric: f64,
}
