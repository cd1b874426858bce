//! Critical path calculation using forward and backward passes.

use crate::graph::TaskGraph;

use super::types::{CpmTimings, TaskTiming};

/// What the backward pass anchors sink tasks' latest finish on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FinishAnchor {
    /// The project's own earliest finish. Float is never negative.
    ProjectFinish,
    /// An imposed finish offset. Float goes negative if it is too early.
    Deadline(i64),
}

/// Forward pass: earliest (start, finish) per task index.
///
/// Tasks start no earlier than the project start (offset 0), their release
/// offset if one is given, and the latest finish of their predecessors.
pub fn forward_pass(graph: &TaskGraph, releases: Option<&[i64]>) -> Vec<(i64, i64)> {
    let mut earliest = vec![(0_i64, 0_i64); graph.len()];

    for &idx in graph.topo_order() {
        let release = releases.map(|r| r[idx]).unwrap_or(0).max(0);
        let earliest_start = graph
            .predecessors(idx)
            .iter()
            .map(|&pred| earliest[pred].1)
            .fold(release, i64::max);
        earliest[idx] = (earliest_start, earliest_start + graph.duration(idx));
    }

    earliest
}

/// Run the forward and backward passes over the whole graph.
pub fn calculate_timings(
    graph: &TaskGraph,
    releases: Option<&[i64]>,
    anchor: FinishAnchor,
) -> CpmTimings {
    if graph.is_empty() {
        return CpmTimings::default();
    }

    let earliest = forward_pass(graph, releases);

    let project_start = earliest.iter().map(|e| e.0).min().unwrap_or(0);
    let project_finish = earliest.iter().map(|e| e.1).max().unwrap_or(0);
    let finish_anchor = match anchor {
        FinishAnchor::ProjectFinish => project_finish,
        FinishAnchor::Deadline(offset) => offset,
    };

    // Backward pass in reverse topological order
    let mut timings = vec![TaskTiming::default(); graph.len()];
    for &idx in graph.topo_order().iter().rev() {
        let latest_finish = graph
            .successors(idx)
            .iter()
            .map(|&succ| timings[succ].latest_start)
            .min()
            .unwrap_or(finish_anchor);
        let latest_start = latest_finish - graph.duration(idx);
        let (earliest_start, earliest_finish) = earliest[idx];

        timings[idx] = TaskTiming {
            earliest_start,
            earliest_finish,
            latest_start,
            latest_finish,
            float: latest_start - earliest_start,
        };
    }

    let driving_float = match anchor {
        FinishAnchor::ProjectFinish => 0,
        FinishAnchor::Deadline(_) => timings.iter().map(|t| t.float).min().unwrap_or(0),
    };

    CpmTimings {
        timings,
        project_start,
        project_finish,
        finish_anchor,
        driving_float,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Task;

    fn timing_of<'a>(graph: &TaskGraph, cpm: &'a CpmTimings, id: &str) -> &'a TaskTiming {
        &cpm.timings[graph.index_of(id).unwrap()]
    }

    #[test]
    fn test_single_task_critical_path() {
        let graph = TaskGraph::build("p", vec![Task::new("a", 5)], &[]).unwrap();
        let cpm = calculate_timings(&graph, None, FinishAnchor::ProjectFinish);

        assert_eq!(cpm.project_finish, 5);
        assert!(cpm.is_critical(0));
        assert_eq!(cpm.timings[0].float, 0);
    }

    #[test]
    fn test_chain_critical_path() {
        let tasks = vec![
            Task::new("a", 3),
            Task::new("b", 2).after("a"),
            Task::new("c", 4).after("b"),
        ];
        let graph = TaskGraph::build("p", tasks, &[]).unwrap();
        let cpm = calculate_timings(&graph, None, FinishAnchor::ProjectFinish);

        assert_eq!(cpm.project_finish, 9);
        let c = timing_of(&graph, &cpm, "c");
        assert_eq!((c.earliest_start, c.earliest_finish), (5, 9));
        assert!((0..3).all(|i| cpm.is_critical(i)));
    }

    #[test]
    fn test_parallel_paths_with_slack() {
        // a(5) -> c(2), b(2) -> c(2): b has 3 days of float
        let tasks = vec![
            Task::new("a", 5),
            Task::new("b", 2),
            Task::new("c", 2).after("a").after("b"),
        ];
        let graph = TaskGraph::build("p", tasks, &[]).unwrap();
        let cpm = calculate_timings(&graph, None, FinishAnchor::ProjectFinish);

        let b = timing_of(&graph, &cpm, "b");
        assert_eq!(b.latest_start, 3);
        assert_eq!(b.latest_finish, 5);
        assert_eq!(b.float, 3);
        assert!(!cpm.is_critical(graph.index_of("b").unwrap()));
        assert!(cpm.is_critical(graph.index_of("a").unwrap()));
    }

    #[test]
    fn test_diamond_dependency() {
        let tasks = vec![
            Task::new("a", 2),
            Task::new("b", 3).after("a"),
            Task::new("c", 5).after("a"),
            Task::new("d", 4).after("b").after("c"),
        ];
        let graph = TaskGraph::build("p", tasks, &[]).unwrap();
        let cpm = calculate_timings(&graph, None, FinishAnchor::ProjectFinish);

        assert_eq!(cpm.project_finish, 11);
        assert_eq!(timing_of(&graph, &cpm, "b").float, 2);
        assert_eq!(timing_of(&graph, &cpm, "c").float, 0);
        assert_eq!(timing_of(&graph, &cpm, "d").earliest_start, 7);
    }

    #[test]
    fn test_sinks_share_project_finish() {
        // Two independent chains; the short one floats against the long one.
        let tasks = vec![Task::new("long", 10), Task::new("short", 4)];
        let graph = TaskGraph::build("p", tasks, &[]).unwrap();
        let cpm = calculate_timings(&graph, None, FinishAnchor::ProjectFinish);

        assert_eq!(timing_of(&graph, &cpm, "short").latest_finish, 10);
        assert_eq!(timing_of(&graph, &cpm, "short").float, 6);
    }

    #[test]
    fn test_early_deadline_gives_negative_float() {
        let tasks = vec![Task::new("a", 3), Task::new("b", 3).after("a")];
        let graph = TaskGraph::build("p", tasks, &[]).unwrap();
        let cpm = calculate_timings(&graph, None, FinishAnchor::Deadline(4));

        assert_eq!(timing_of(&graph, &cpm, "a").float, -2);
        assert_eq!(timing_of(&graph, &cpm, "b").float, -2);
        assert_eq!(cpm.driving_float, -2);
        assert!(cpm.is_critical(0) && cpm.is_critical(1));
        assert!(cpm.is_driving(0) && cpm.is_driving(1));
    }

    #[test]
    fn test_late_deadline_leaves_no_critical_task() {
        let tasks = vec![Task::new("a", 3), Task::new("b", 1)];
        let graph = TaskGraph::build("p", tasks, &[]).unwrap();
        let cpm = calculate_timings(&graph, None, FinishAnchor::Deadline(10));
        let (a, b) = (graph.index_of("a").unwrap(), graph.index_of("b").unwrap());

        assert_eq!(cpm.driving_float, 7);
        assert!(!cpm.is_critical(a) && !cpm.is_critical(b));
        assert!(cpm.is_driving(a));
        assert!(!cpm.is_driving(b));
    }

    #[test]
    fn test_releases_hold_tasks_back() {
        let tasks = vec![Task::new("a", 2), Task::new("b", 2).after("a")];
        let graph = TaskGraph::build("p", tasks, &[]).unwrap();
        let releases = vec![0, 5];
        let cpm = calculate_timings(&graph, Some(&releases), FinishAnchor::ProjectFinish);

        assert_eq!(timing_of(&graph, &cpm, "b").earliest_start, 5);
        assert_eq!(cpm.project_finish, 7);
        // a may now slip until b's release
        assert_eq!(timing_of(&graph, &cpm, "a").float, 3);
    }

    #[test]
    fn test_empty_graph() {
        let graph = TaskGraph::build("p", Vec::new(), &[]).unwrap();
        let cpm = calculate_timings(&graph, None, FinishAnchor::ProjectFinish);
        assert!(cpm.timings.is_empty());
        assert_eq!(cpm.duration(), 0);
    }
}
