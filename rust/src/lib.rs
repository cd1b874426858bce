//! Critical-path and resource-constrained scheduling for project portfolios.
//!
//! The pipeline per project is: build the task graph, run the CPM passes,
//! overlay resource demand, then optimize. Portfolio requests run the first
//! stages per project (concurrently) and place projects onto shared resource
//! timelines in priority order.
//!
//! [`SchedulingEngine`] exposes the three request entry points over any
//! [`ProjectStore`].

pub mod cancel;
pub mod config;
pub mod critical_path;
pub mod engine;
pub mod error;
pub mod graph;
pub mod logging;
pub mod models;
pub mod objectives;
pub mod optimizer;
pub mod portfolio;
pub mod resources;
pub mod storage;

#[cfg(feature = "python")]
mod python;

pub use cancel::{CancellationToken, Stage};
pub use config::{EngineConfig, OptimizerConfig, PortfolioConfig};
pub use engine::{
    AnalyzeCriticalPathParams, AnalyzeCriticalPathResult, OptimizeDeliveryParams,
    OptimizeDeliveryResult, OptimizeTimelineParams, OptimizeTimelineResult, SchedulingEngine,
    TimelineSummary,
};
pub use error::{EngineError, InfeasibleDeadline, Result, StorageError};
pub use models::{
    Dependency, FloatStats, PortfolioSummary, ProjectInfo, ResourceAssignment, Schedule,
    ScheduledTask, Task, TimeRange,
};
pub use objectives::{ObjectiveKind, OptimizationObjective};
pub use storage::{AssignmentScope, InMemoryStore, ProjectStore, StoreSnapshot};
