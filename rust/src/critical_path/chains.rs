//! Critical chain enumeration.
//!
//! A critical edge joins two driving tasks (those at the schedule's minimum
//! float) where the predecessor's earliest finish is exactly the successor's
//! earliest start. Chains follow critical edges from a task with no critical
//! predecessor to one with no critical successor. Parallel chains are all
//! reported. Without an imposed deadline the driving tasks are exactly the
//! zero-float tasks.

use crate::graph::{TaskGraph, TaskIdx};

use super::types::CpmTimings;

/// Driving tasks of a schedule, as a flat ordering and as chains.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CriticalChains {
    /// All driving tasks ordered by earliest start, then topological position.
    pub ordered: Vec<TaskIdx>,
    pub chains: Vec<Vec<TaskIdx>>,
    /// Set when more than `max_chains` chains exist.
    pub truncated: bool,
}

pub fn find_critical_chains(graph: &TaskGraph, cpm: &CpmTimings, max_chains: usize) -> CriticalChains {
    let n = graph.len();
    let mut position = vec![0usize; n];
    for (pos, &idx) in graph.topo_order().iter().enumerate() {
        position[idx] = pos;
    }

    let critical: Vec<bool> = (0..n).map(|idx| cpm.is_driving(idx)).collect();

    let mut critical_succ: Vec<Vec<TaskIdx>> = vec![Vec::new(); n];
    let mut has_critical_pred = vec![false; n];
    for idx in (0..n).filter(|&i| critical[i]) {
        let finish = cpm.timings[idx].earliest_finish;
        let mut succs: Vec<TaskIdx> = graph
            .successors(idx)
            .iter()
            .copied()
            .filter(|&s| critical[s] && cpm.timings[s].earliest_start == finish)
            .collect();
        succs.sort_by_key(|&s| position[s]);
        for &s in &succs {
            has_critical_pred[s] = true;
        }
        critical_succ[idx] = succs;
    }

    let by_start = |a: &TaskIdx, b: &TaskIdx| {
        cpm.timings[*a]
            .earliest_start
            .cmp(&cpm.timings[*b].earliest_start)
            .then(position[*a].cmp(&position[*b]))
    };

    let mut ordered: Vec<TaskIdx> = (0..n).filter(|&i| critical[i]).collect();
    ordered.sort_by(by_start);

    let sources: Vec<TaskIdx> = ordered
        .iter()
        .copied()
        .filter(|&i| !has_critical_pred[i])
        .collect();

    let mut chains: Vec<Vec<TaskIdx>> = Vec::new();
    let mut truncated = false;

    'sources: for source in sources {
        let mut stack: Vec<(TaskIdx, usize)> = vec![(source, 0)];
        while let Some(frame) = stack.last_mut() {
            let node = frame.0;
            let succs = &critical_succ[node];

            if succs.is_empty() {
                if chains.len() == max_chains {
                    truncated = true;
                    break 'sources;
                }
                chains.push(stack.iter().map(|(idx, _)| *idx).collect());
                stack.pop();
                continue;
            }

            match succs.get(frame.1) {
                Some(&next) => {
                    frame.1 += 1;
                    stack.push((next, 0));
                }
                None => {
                    stack.pop();
                }
            }
        }
    }

    CriticalChains {
        ordered,
        chains,
        truncated,
    }
}
