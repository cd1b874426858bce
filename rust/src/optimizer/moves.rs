//! Neighbourhood of a candidate timeline.
//!
//! A move changes the release offset of one task. Pulls bring a task held back
//! by its planned start towards its dependency-ready day; shifts delay a
//! non-critical task inside its float to clear an over-allocated day.

use serde::Serialize;

use crate::critical_path::CpmTimings;
use crate::graph::TaskIdx;
use crate::resources::HOURS_EPSILON;

use super::evaluation::{Evaluated, Evaluator};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveKind {
    /// Start earlier than the planned start.
    Pull,
    /// Delay within float to relieve a resource.
    Shift,
    /// Delay until claimed capacity frees up.
    Place,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Move {
    pub kind: MoveKind,
    pub task: TaskIdx,
    pub release: i64,
}

/// Every move worth evaluating from `current`.
///
/// `bound` holds timings of `current` anchored on the finish the optimizer
/// may not exceed; its latest starts cap how far a shift may go.
pub fn candidate_moves(
    evaluator: &Evaluator,
    current: &Evaluated,
    bound: &CpmTimings,
    allow_pulls: bool,
) -> Vec<Move> {
    let graph = evaluator.graph();
    let mut moves: Vec<Move> = Vec::new();
    let mut push = |mv: Move| {
        if !moves.contains(&mv) {
            moves.push(mv);
        }
    };

    if allow_pulls {
        for &idx in graph.topo_order() {
            let start = current.cpm.timings[idx].earliest_start;
            let ready = graph
                .predecessors(idx)
                .iter()
                .map(|&pred| current.cpm.timings[pred].earliest_finish)
                .fold(0, i64::max);
            if current.releases[idx] <= ready || start <= ready {
                continue;
            }
            push(Move {
                kind: MoveKind::Pull,
                task: idx,
                release: ready,
            });
            if let Some(fit) = first_fit(evaluator, current, idx, ready, start - 1) {
                push(Move {
                    kind: MoveKind::Pull,
                    task: idx,
                    release: fit,
                });
            }
        }
    }

    let mut conflicts: Vec<(usize, i64)> = current
        .loads
        .iter()
        .filter(|&(&(slot, day), &own)| {
            own + evaluator.external_load(slot, day) > evaluator.capacity(slot) + HOURS_EPSILON
        })
        .map(|(&key, _)| key)
        .collect();
    conflicts.sort_unstable();

    for (slot, day) in conflicts {
        for &idx in graph.topo_order() {
            let timing = &current.cpm.timings[idx];
            let uses_slot = evaluator.task_demand(idx).iter().any(|&(s, _)| s == slot);
            let covers_day = timing.earliest_start <= day && day < timing.earliest_finish;
            if !uses_slot || !covers_day || current.cpm.is_critical(idx) {
                continue;
            }
            let latest = bound.timings[idx].latest_start;
            if latest <= timing.earliest_start {
                continue;
            }
            if let Some(fit) = first_fit(evaluator, current, idx, timing.earliest_start + 1, latest)
            {
                push(Move {
                    kind: MoveKind::Shift,
                    task: idx,
                    release: fit,
                });
            }
            if day < latest {
                push(Move {
                    kind: MoveKind::Shift,
                    task: idx,
                    release: day + 1,
                });
            }
        }
    }

    moves
}

/// First start in `from..=to` at which the task's demand fits next to
/// everything else booked in `current`.
fn first_fit(
    evaluator: &Evaluator,
    current: &Evaluated,
    idx: TaskIdx,
    from: i64,
    to: i64,
) -> Option<i64> {
    let demand = evaluator.task_demand(idx);
    let duration = evaluator.graph().duration(idx);
    if demand.is_empty() || duration == 0 {
        return (from <= to).then_some(from);
    }
    let timing = &current.cpm.timings[idx];

    (from..=to).find(|&start| {
        (start..start + duration).all(|day| {
            demand.iter().all(|&(slot, hours)| {
                let mut booked = current.loads.get(&(slot, day)).copied().unwrap_or(0.0);
                if timing.earliest_start <= day && day < timing.earliest_finish {
                    booked -= hours;
                }
                booked + evaluator.external_load(slot, day) + hours
                    <= evaluator.capacity(slot) + HOURS_EPSILON
            })
        })
    })
}
