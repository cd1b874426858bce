//! Types for critical path analysis.

use serde::Serialize;

/// Per-task timing from the forward and backward passes, in whole days
/// relative to the project start.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TaskTiming {
    /// Earliest possible start (forward pass).
    pub earliest_start: i64,
    /// Earliest possible finish (forward pass).
    pub earliest_finish: i64,
    /// Latest allowable start (backward pass).
    pub latest_start: i64,
    /// Latest allowable finish (backward pass).
    pub latest_finish: i64,
    /// Float = latest_start - earliest_start.
    pub float: i64,
}

/// Result of a full CPM computation over a task graph.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CpmTimings {
    /// Timings indexed by task index.
    pub timings: Vec<TaskTiming>,
    /// Earliest start over all tasks (0 when empty).
    pub project_start: i64,
    /// Earliest finish over all tasks (0 when empty).
    pub project_finish: i64,
    /// Latest finish assigned to sink tasks.
    pub finish_anchor: i64,
    /// Smallest float of any task; tasks at this float drive the finish.
    ///
    /// 0 when the backward pass is anchored on the project's own finish.
    pub driving_float: i64,
}

impl CpmTimings {
    /// No slack left: zero float, or negative against an unreachable deadline.
    pub fn is_critical(&self, idx: usize) -> bool {
        self.timings[idx].float <= 0
    }

    /// On the longest chain, whatever the deadline leaves it in float.
    pub fn is_driving(&self, idx: usize) -> bool {
        self.timings[idx].float <= self.driving_float
    }

    pub fn duration(&self) -> i64 {
        self.project_finish - self.project_start
    }
}

/// Summary figures returned alongside a critical path analysis.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CriticalPathMetadata {
    pub total_tasks: usize,
    pub critical_tasks_count: usize,
    pub average_float: f64,
    pub project_duration_days: i64,
}

/// Float distribution of a schedule, with near-critical tasks flagged.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FloatAnalysis {
    pub min_float: i64,
    pub max_float: i64,
    pub average_float: f64,
    pub total_float: i64,
    /// Risk threshold the near-critical list was computed with.
    pub risk_threshold: i64,
    /// Non-critical tasks whose float is at most `risk_threshold`.
    pub near_critical_tasks: Vec<String>,
    /// Tasks with negative float (imposed deadline cannot be met).
    pub infeasible_tasks: Vec<String>,
}
