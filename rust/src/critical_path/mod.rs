//! Critical path analysis.
//!
//! Runs the CPM forward and backward passes over a validated [`TaskGraph`]
//! and materializes the result as an immutable [`Schedule`].

mod calculation;
mod chains;
mod types;

use chrono::NaiveDate;

use crate::error::InfeasibleDeadline;
use crate::graph::TaskGraph;
use crate::log_debug;
use crate::models::{add_days, days_between, FloatStats, Schedule, ScheduledTask};

pub use calculation::{calculate_timings, forward_pass, FinishAnchor};
pub use chains::{find_critical_chains, CriticalChains};
pub use types::{CpmTimings, CriticalPathMetadata, FloatAnalysis, TaskTiming};

/// Computes CPM schedules for one project at a time.
#[derive(Clone, Debug)]
pub struct CriticalPathAnalyzer {
    max_chains: usize,
    verbosity: u8,
}

impl CriticalPathAnalyzer {
    pub fn new(max_chains: usize, verbosity: u8) -> Self {
        Self {
            max_chains,
            verbosity,
        }
    }

    /// Full CPM schedule, optionally against an imposed deadline.
    ///
    /// A deadline before the earliest finish does not fail: the schedule
    /// carries negative float and an [`InfeasibleDeadline`].
    pub fn analyze(
        &self,
        graph: &TaskGraph,
        project_start: NaiveDate,
        deadline: Option<NaiveDate>,
    ) -> Schedule {
        let anchor = match deadline {
            Some(date) => FinishAnchor::Deadline(days_between(project_start, date)),
            None => FinishAnchor::ProjectFinish,
        };
        let cpm = calculate_timings(graph, None, anchor);
        self.materialize(graph, project_start, &cpm, deadline)
    }

    /// CPM schedule where each task also waits for its release offset.
    pub fn analyze_with_releases(
        &self,
        graph: &TaskGraph,
        project_start: NaiveDate,
        releases: &[i64],
    ) -> Schedule {
        let cpm = calculate_timings(graph, Some(releases), FinishAnchor::ProjectFinish);
        self.materialize(graph, project_start, &cpm, None)
    }

    /// Turn day offsets into a dated schedule.
    pub fn materialize(
        &self,
        graph: &TaskGraph,
        project_start: NaiveDate,
        cpm: &CpmTimings,
        deadline: Option<NaiveDate>,
    ) -> Schedule {
        let date = |offset: i64| add_days(project_start, offset);

        let tasks: Vec<ScheduledTask> = graph
            .topo_order()
            .iter()
            .map(|&idx| {
                let task = graph.task(idx);
                let timing = &cpm.timings[idx];
                log_debug!(
                    self.verbosity,
                    task = %task.id,
                    es = timing.earliest_start,
                    ls = timing.latest_start,
                    float = timing.float,
                    "cpm timing"
                );
                ScheduledTask {
                    task_id: task.id.clone(),
                    name: task.name.clone(),
                    duration_days: task.duration_days,
                    earliest_start: date(timing.earliest_start),
                    earliest_finish: date(timing.earliest_finish),
                    latest_start: date(timing.latest_start),
                    latest_finish: date(timing.latest_finish),
                    float_days: timing.float,
                    is_critical: cpm.is_critical(idx),
                    is_driving: cpm.is_driving(idx),
                }
            })
            .collect();

        let chains = find_critical_chains(graph, cpm, self.max_chains);
        let id_of = |idx: &usize| graph.task(*idx).id.clone();

        // Stable sort keeps topological order among equal starts
        let mut critical: Vec<usize> = graph
            .topo_order()
            .iter()
            .copied()
            .filter(|&idx| cpm.is_critical(idx))
            .collect();
        critical.sort_by_key(|&idx| cpm.timings[idx].earliest_start);

        let infeasibility = match deadline {
            Some(deadline) if cpm.finish_anchor < cpm.project_finish => Some(InfeasibleDeadline {
                project_id: graph.project_id().to_string(),
                deadline,
                earliest_finish: date(cpm.project_finish),
                shortfall_days: cpm.project_finish - cpm.finish_anchor,
            }),
            _ => None,
        };

        Schedule {
            project_id: graph.project_id().to_string(),
            project_start,
            start_date: date(cpm.project_start),
            finish_date: date(cpm.project_finish),
            total_duration_days: cpm.duration(),
            float_stats: float_stats(cpm),
            tasks,
            critical_path: critical.iter().map(id_of).collect(),
            driving_path: chains.ordered.iter().map(id_of).collect(),
            critical_chains: chains
                .chains
                .iter()
                .map(|chain| chain.iter().map(id_of).collect())
                .collect(),
            chains_truncated: chains.truncated,
            infeasibility,
        }
    }
}

fn float_stats(cpm: &CpmTimings) -> FloatStats {
    let total_tasks = cpm.timings.len();
    if total_tasks == 0 {
        return FloatStats::default();
    }
    let total_float: i64 = cpm.timings.iter().map(|t| t.float).sum();
    FloatStats {
        total_tasks,
        critical_tasks: (0..total_tasks).filter(|&i| cpm.is_critical(i)).count(),
        average_float: total_float as f64 / total_tasks as f64,
        min_float: cpm.timings.iter().map(|t| t.float).min().unwrap_or(0),
        max_float: cpm.timings.iter().map(|t| t.float).max().unwrap_or(0),
        total_float,
    }
}

/// Summary figures of a schedule.
pub fn metadata(schedule: &Schedule) -> CriticalPathMetadata {
    CriticalPathMetadata {
        total_tasks: schedule.float_stats.total_tasks,
        critical_tasks_count: schedule.float_stats.critical_tasks,
        average_float: schedule.float_stats.average_float,
        project_duration_days: schedule.total_duration_days,
    }
}

/// Float distribution with tasks at risk of becoming critical.
pub fn float_analysis(schedule: &Schedule, risk_threshold: i64) -> FloatAnalysis {
    let stats = &schedule.float_stats;
    FloatAnalysis {
        min_float: stats.min_float,
        max_float: stats.max_float,
        average_float: stats.average_float,
        total_float: stats.total_float,
        risk_threshold,
        near_critical_tasks: schedule
            .tasks
            .iter()
            .filter(|t| !t.is_critical && t.float_days <= risk_threshold)
            .map(|t| t.task_id.clone())
            .collect(),
        infeasible_tasks: schedule
            .tasks
            .iter()
            .filter(|t| t.float_days < 0)
            .map(|t| t.task_id.clone())
            .collect(),
    }
}
