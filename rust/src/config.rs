//! Configuration types for the scheduling engine.

use serde::Deserialize;

/// Top-level configuration for a [`SchedulingEngine`](crate::SchedulingEngine).
#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Verbosity level: 0=silent, 1=changes, 2=checks, 3=debug.
    pub verbosity: u8,
    /// Analyze portfolio projects on separate worker threads.
    pub parallel_analysis: bool,
    /// Maximum number of zero-float chains listed per schedule.
    pub max_critical_chains: usize,
    pub optimizer: OptimizerConfig,
    pub portfolio: PortfolioConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            verbosity: 0,
            parallel_analysis: true,
            max_critical_chains: 32,
            optimizer: OptimizerConfig::default(),
            portfolio: PortfolioConfig::default(),
        }
    }
}

/// Configuration for the timeline optimizer's local search.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OptimizerConfig {
    /// Upper bound on accepted moves per run. Hitting it is not an error.
    pub max_iterations: usize,
    /// How far past its dependency-earliest start the placement pass may push
    /// a task while looking for free capacity.
    pub max_extension_days: i64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            max_extension_days: 3650,
        }
    }
}

/// Configuration for the portfolio scheduler.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PortfolioConfig {
    /// Number of project orderings scored (baseline priority order included).
    pub max_candidates: usize,
    /// Delay tasks of later projects instead of over-booking claimed capacity.
    pub delay_to_resolve_conflicts: bool,
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            max_candidates: 8,
            delay_to_resolve_conflicts: true,
        }
    }
}
