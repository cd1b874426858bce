//! Weighted scoring of a portfolio ordering.
//!
//! Every component is normalized to roughly [0, 1] so the objective weights
//! are comparable. Lower is better.

use serde::Serialize;

use crate::objectives::ObjectiveWeights;

/// Figures of one project after a greedy pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProjectFigures {
    pub priority: i32,
    /// Days past the target date.
    pub delay_days: i64,
    /// Days the finish moved past the unconstrained finish.
    pub shift_days: i64,
    pub start: i64,
    pub finish: i64,
    pub baseline_start: i64,
    pub baseline_finish: i64,
    pub excess_hours: f64,
    pub demand_hours: f64,
    pub utilization: f64,
}

/// Score of one candidate ordering, with its parts.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateScore {
    pub total: f64,
    pub delay: f64,
    pub priority_violation: f64,
    pub conflicts: f64,
    pub duration: f64,
    pub utilization: f64,
}

/// Score figures for the same projects, all offsets in days from one epoch.
pub fn score_candidate(figures: &[ProjectFigures], weights: &ObjectiveWeights) -> CandidateScore {
    if figures.is_empty() {
        return CandidateScore::default();
    }
    let n = figures.len() as f64;
    let baseline_days: i64 = figures
        .iter()
        .map(|f| f.baseline_finish - f.baseline_start)
        .sum();
    let scale = baseline_days.max(1) as f64;

    let delay = figures.iter().map(|f| f.delay_days).sum::<i64>() as f64 / scale;

    // Higher-priority projects absorbing more shift than lower ones
    let mut violation = 0_i64;
    let mut pairs = 0_i64;
    for high in figures {
        for low in figures.iter().filter(|low| high.priority > low.priority) {
            pairs += 1;
            violation += (high.shift_days - low.shift_days).max(0);
        }
    }
    let priority_violation = if pairs == 0 {
        0.0
    } else {
        violation as f64 / (pairs as f64 * (scale / n).max(1.0))
    };

    let demand: f64 = figures.iter().map(|f| f.demand_hours).sum();
    let conflicts = if demand > 0.0 {
        figures.iter().map(|f| f.excess_hours).sum::<f64>() / demand
    } else {
        0.0
    };

    let span = |start: fn(&ProjectFigures) -> i64, finish: fn(&ProjectFigures) -> i64| {
        let first = figures.iter().map(start).min().unwrap_or(0);
        let last = figures.iter().map(finish).max().unwrap_or(0);
        (last - first).max(0)
    };
    let makespan = span(|f| f.start, |f| f.finish);
    let baseline_makespan = span(|f| f.baseline_start, |f| f.baseline_finish);
    let duration = makespan as f64 / baseline_makespan.max(1) as f64;

    let utilization = 1.0 - figures.iter().map(|f| f.utilization).sum::<f64>() / n;

    let total = weights.total_delay * delay
        + weights.priority_adherence * priority_violation
        + weights.resource_conflicts * conflicts
        + weights.duration * duration
        + weights.resource_utilization * utilization;

    CandidateScore {
        total,
        delay,
        priority_violation,
        conflicts,
        duration,
        utilization,
    }
}
