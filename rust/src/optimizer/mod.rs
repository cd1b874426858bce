//! Timeline optimization.
//!
//! Local search over task release offsets. Each iteration generates the
//! neighbouring timelines (see [`moves`]), scores them against the requested
//! goals and keeps the best one that strictly improves on the current
//! timeline. The search never lengthens the project. In portfolio mode a final
//! placement pass may delay tasks past their float to respect capacity other
//! projects have already claimed.

mod evaluation;
mod moves;
mod placement;

use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Ordering;

use crate::cancel::{CancellationToken, Stage};
use crate::config::OptimizerConfig;
use crate::critical_path::{calculate_timings, CriticalPathAnalyzer, FinishAnchor};
use crate::error::Result;
use crate::graph::TaskGraph;
use crate::models::{add_days, days_between, Schedule};
use crate::objectives::ObjectiveKind;
use crate::resources::{CapacityTable, DemandTable, ResourceLedger, HOURS_EPSILON};
use crate::{log_changes, log_checks};

pub use evaluation::{compare_scores, score, Evaluated, Evaluator, ScheduleMetrics};
pub use moves::{Move, MoveKind};

/// A change the optimizer kept.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedMove {
    pub task_id: String,
    pub kind: MoveKind,
    pub from: NaiveDate,
    pub to: NaiveDate,
}

/// What changed between the original and the optimized timeline.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Improvements {
    /// Days saved; never negative.
    pub duration_reduction: i64,
    pub excess_hours_before: f64,
    pub excess_hours_after: f64,
    /// Over-allocated (resource, day) pairs that no longer are.
    pub conflicts_resolved: usize,
    pub utilization_before: f64,
    pub utilization_after: f64,
    pub iterations: usize,
    pub iteration_cap_reached: bool,
    pub moves: Vec<AppliedMove>,
}

/// Original and optimized timelines of one project.
#[derive(Clone, Debug)]
pub struct OptimizationOutcome {
    pub original: Schedule,
    pub optimized: Schedule,
    pub original_metrics: ScheduleMetrics,
    pub optimized_metrics: ScheduleMetrics,
    /// Release offsets that reproduce `optimized`.
    pub releases: Vec<i64>,
    pub improvements: Improvements,
}

/// Release offsets from planned starts; tasks without one are released at
/// the project start.
pub fn planned_releases(graph: &TaskGraph, project_start: NaiveDate) -> Vec<i64> {
    graph
        .tasks()
        .iter()
        .map(|task| {
            task.planned_start
                .map(|date| days_between(project_start, date).max(0))
                .unwrap_or(0)
        })
        .collect()
}

/// Improves one project's timeline for an ordered list of goals.
pub struct TimelineOptimizer<'a> {
    evaluator: Evaluator<'a>,
    analyzer: &'a CriticalPathAnalyzer,
    config: &'a OptimizerConfig,
    cancel: &'a CancellationToken,
    project_start: NaiveDate,
    place_on_conflict: bool,
    verbosity: u8,
}

impl<'a> TimelineOptimizer<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        graph: &'a TaskGraph,
        demands: &'a DemandTable,
        capacities: &'a CapacityTable,
        analyzer: &'a CriticalPathAnalyzer,
        config: &'a OptimizerConfig,
        cancel: &'a CancellationToken,
        project_start: NaiveDate,
        verbosity: u8,
    ) -> Self {
        Self {
            evaluator: Evaluator::new(graph, demands, capacities, None, project_start, None),
            analyzer,
            config,
            cancel,
            project_start,
            place_on_conflict: false,
            verbosity,
        }
    }

    /// Score delay against this date.
    pub fn with_target(mut self, target: NaiveDate) -> Self {
        self.evaluator = self.evaluator.with_target(days_between(self.project_start, target));
        self
    }

    /// Count capacity claimed by other projects as already in use.
    ///
    /// With `place_on_conflict` set, conflicts the search cannot clear within
    /// float are handed to the placement pass, which may delay the project.
    pub fn with_claims(mut self, claims: &'a ResourceLedger, place_on_conflict: bool) -> Self {
        self.evaluator = self.evaluator.with_external(claims);
        self.place_on_conflict = place_on_conflict;
        self
    }

    pub fn optimize(&self, goals: &[ObjectiveKind], releases: Vec<i64>) -> Result<OptimizationOutcome> {
        let graph = self.evaluator.graph();
        let original = self.evaluator.evaluate(releases);
        let finish_limit = original.metrics.finish;
        let duration_limit = original.metrics.duration;
        let allow_pulls = goals.iter().any(|g| {
            matches!(
                g,
                ObjectiveKind::MinimizeDuration | ObjectiveKind::MinimizeTotalDelay
            )
        });

        let mut current = original.clone();
        let mut applied: Vec<AppliedMove> = Vec::new();
        let mut iterations = 0;
        let mut iteration_cap_reached = false;

        loop {
            self.cancel.check(Stage::Optimize)?;
            if iterations >= self.config.max_iterations {
                iteration_cap_reached = true;
                break;
            }

            let bound = calculate_timings(
                graph,
                Some(&current.releases),
                FinishAnchor::Deadline(finish_limit),
            );
            let current_score = score(&current.metrics, goals);

            let mut best: Option<(Vec<f64>, Move, Evaluated)> = None;
            for mv in moves::candidate_moves(&self.evaluator, &current, &bound, allow_pulls) {
                let mut releases = current.releases.clone();
                releases[mv.task] = mv.release;
                let candidate = self.evaluator.evaluate(releases);
                if candidate.metrics.finish > finish_limit
                    || candidate.metrics.duration > duration_limit
                {
                    continue;
                }
                let candidate_score = score(&candidate.metrics, goals);
                if compare_scores(&candidate_score, &current_score) != Ordering::Less {
                    continue;
                }
                let better = best
                    .as_ref()
                    .map_or(true, |(s, _, _)| compare_scores(&candidate_score, s) == Ordering::Less);
                if better {
                    best = Some((candidate_score, mv, candidate));
                }
            }

            let Some((_, mv, next)) = best else {
                break;
            };
            applied.push(self.applied(mv.task, mv.kind, &current, &next));
            log_changes!(
                self.verbosity,
                project = graph.project_id(),
                task = %graph.task(mv.task).id,
                kind = ?mv.kind,
                release = mv.release,
                "accepted move"
            );
            current = next;
            iterations += 1;
        }

        if self.place_on_conflict && current.metrics.excess_hours > HOURS_EPSILON {
            let releases = placement::place(&self.evaluator, &current, self.config.max_extension_days);
            let placed = self.evaluator.evaluate(releases);
            log_checks!(
                self.verbosity,
                project = graph.project_id(),
                excess_before = current.metrics.excess_hours,
                excess_after = placed.metrics.excess_hours,
                "placement pass"
            );
            if placed.metrics.excess_hours + HOURS_EPSILON < current.metrics.excess_hours {
                for idx in 0..graph.len() {
                    if placed.cpm.timings[idx].earliest_start != current.cpm.timings[idx].earliest_start {
                        applied.push(self.applied(idx, MoveKind::Place, &current, &placed));
                    }
                }
                current = placed;
            }
        }

        let original_schedule =
            self.analyzer
                .materialize(graph, self.project_start, &original.cpm, None);
        let optimized_schedule = if applied.is_empty() {
            original_schedule.clone()
        } else {
            self.analyzer
                .materialize(graph, self.project_start, &current.cpm, None)
        };

        let improvements = Improvements {
            duration_reduction: (original.metrics.duration - current.metrics.duration).max(0),
            excess_hours_before: original.metrics.excess_hours,
            excess_hours_after: current.metrics.excess_hours,
            conflicts_resolved: original
                .metrics
                .conflict_days
                .saturating_sub(current.metrics.conflict_days),
            utilization_before: original.metrics.utilization,
            utilization_after: current.metrics.utilization,
            iterations,
            iteration_cap_reached,
            moves: applied,
        };

        Ok(OptimizationOutcome {
            original: original_schedule,
            optimized: optimized_schedule,
            original_metrics: original.metrics,
            optimized_metrics: current.metrics,
            releases: current.releases,
            improvements,
        })
    }

    fn applied(&self, idx: usize, kind: MoveKind, before: &Evaluated, after: &Evaluated) -> AppliedMove {
        AppliedMove {
            task_id: self.evaluator.graph().task(idx).id.clone(),
            kind,
            from: add_days(self.project_start, before.cpm.timings[idx].earliest_start),
            to: add_days(self.project_start, after.cpm.timings[idx].earliest_start),
        }
    }
}
