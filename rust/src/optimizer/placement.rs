//! Serial placement against claimed capacity.
//!
//! Tasks are placed one at a time in start order. Each goes to the first day,
//! no earlier than its current start and its placed predecessors' finish,
//! on which every resource it uses has room for its daily hours.

use rustc_hash::FxHashMap;

use crate::graph::TaskIdx;
use crate::resources::HOURS_EPSILON;

use super::evaluation::{Evaluated, Evaluator};

/// Release offsets that place every task where its demand fits.
///
/// A task that finds no room within `max_extension_days` of its earliest day,
/// or needs more per day than a resource ever offers, stays at its earliest
/// day and keeps its conflict.
pub fn place(evaluator: &Evaluator, current: &Evaluated, max_extension_days: i64) -> Vec<i64> {
    let graph = evaluator.graph();
    let mut position = vec![0; graph.len()];
    for (pos, &idx) in graph.topo_order().iter().enumerate() {
        position[idx] = pos;
    }
    let mut order: Vec<TaskIdx> = (0..graph.len()).collect();
    order.sort_by_key(|&idx| (current.cpm.timings[idx].earliest_start, position[idx]));

    let mut booked: FxHashMap<(usize, i64), f64> = FxHashMap::default();
    let mut finish = vec![0_i64; graph.len()];
    let mut releases = vec![0_i64; graph.len()];

    for idx in order {
        let earliest = graph
            .predecessors(idx)
            .iter()
            .map(|&pred| finish[pred])
            .fold(current.cpm.timings[idx].earliest_start, i64::max);
        let duration = graph.duration(idx);
        let demand = evaluator.task_demand(idx);

        let fits = |start: i64| {
            (start..start + duration).all(|day| {
                demand.iter().all(|&(slot, hours)| {
                    booked.get(&(slot, day)).copied().unwrap_or(0.0)
                        + evaluator.external_load(slot, day)
                        + hours
                        <= evaluator.capacity(slot) + HOURS_EPSILON
                })
            })
        };
        let never_fits = demand
            .iter()
            .any(|&(slot, hours)| hours > evaluator.capacity(slot) + HOURS_EPSILON);

        let start = if never_fits {
            earliest
        } else {
            (earliest..=earliest + max_extension_days)
                .find(|&s| fits(s))
                .unwrap_or(earliest)
        };

        for &(slot, hours) in demand {
            for day in start..start + duration {
                *booked.entry((slot, day)).or_default() += hours;
            }
        }
        finish[idx] = start + duration;
        releases[idx] = start;
    }

    releases
}
