//! Task graph construction and validation.
//!
//! Turns loaded task rows and dependency edges into an index-based DAG.
//! Tasks keep their load order as their integer index, which makes every
//! traversal downstream deterministic.

use rustc_hash::{FxHashMap, FxHashSet};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::error::{EngineError, Result};
use crate::models::{Dependency, Task, TimeRange};
use crate::storage::ProjectStore;

/// Index of a task inside a [`TaskGraph`].
pub type TaskIdx = usize;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Validated dependency DAG of one project.
#[derive(Clone, Debug)]
pub struct TaskGraph {
    project_id: String,
    tasks: Vec<Task>,
    index: FxHashMap<String, TaskIdx>,
    predecessors: Vec<Vec<TaskIdx>>,
    successors: Vec<Vec<TaskIdx>>,
    topo_order: Vec<TaskIdx>,
}

impl TaskGraph {
    /// Build a graph from task rows plus explicit edges.
    ///
    /// Edges whose successor was not loaded are ignored; a loaded task whose
    /// predecessor is missing fails with `UnknownDependency`.
    pub fn build(project_id: &str, tasks: Vec<Task>, edges: &[Dependency]) -> Result<Self> {
        Self::build_within(project_id, tasks, edges, &FxHashSet::default())
    }

    /// Like [`TaskGraph::build`], for a time-filtered subset of a project.
    ///
    /// `outside` names tasks of the project that were filtered out. A
    /// predecessor among them is treated as already satisfied and its edge
    /// is dropped; any other missing predecessor still fails.
    pub fn build_within(
        project_id: &str,
        tasks: Vec<Task>,
        edges: &[Dependency],
        outside: &FxHashSet<String>,
    ) -> Result<Self> {
        let mut index: FxHashMap<String, TaskIdx> =
            FxHashMap::with_capacity_and_hasher(tasks.len(), Default::default());
        for (idx, task) in tasks.iter().enumerate() {
            if index.insert(task.id.clone(), idx).is_some() {
                return Err(EngineError::DuplicateTask {
                    project_id: project_id.to_string(),
                    task_id: task.id.clone(),
                });
            }
        }

        let n = tasks.len();
        let mut predecessors: Vec<Vec<TaskIdx>> = vec![Vec::new(); n];

        let declared = tasks.iter().flat_map(|task| {
            task.dependencies
                .iter()
                .map(move |dep| (dep.as_str(), task.id.as_str()))
        });
        let explicit = edges
            .iter()
            .map(|e| (e.predecessor_id.as_str(), e.successor_id.as_str()));

        for (pred_id, succ_id) in declared.chain(explicit) {
            let Some(&succ) = index.get(succ_id) else {
                continue;
            };
            let Some(&pred) = index.get(pred_id) else {
                if outside.contains(pred_id) {
                    continue;
                }
                return Err(EngineError::UnknownDependency {
                    project_id: project_id.to_string(),
                    task_id: succ_id.to_string(),
                    dependency_id: pred_id.to_string(),
                });
            };
            predecessors[succ].push(pred);
        }

        let mut successors: Vec<Vec<TaskIdx>> = vec![Vec::new(); n];
        for (succ, preds) in predecessors.iter_mut().enumerate() {
            preds.sort_unstable();
            preds.dedup();
            for &pred in preds.iter() {
                successors[pred].push(succ);
            }
        }

        if let Some(cycle) = find_cycle(&successors) {
            return Err(EngineError::CyclicDependency {
                project_id: project_id.to_string(),
                cycle: cycle.into_iter().map(|idx| tasks[idx].id.clone()).collect(),
            });
        }

        let topo_order = topological_order(&predecessors, &successors);

        Ok(Self {
            project_id: project_id.to_string(),
            tasks,
            index,
            predecessors,
            successors,
            topo_order,
        })
    }

    /// Load a project's tasks and edges from storage and build its graph.
    pub fn load<S: ProjectStore + ?Sized>(
        store: &S,
        project_id: &str,
        range: &TimeRange,
    ) -> Result<Self> {
        let tasks = store
            .load_project_tasks(project_id, range)
            .map_err(|e| EngineError::from_storage(project_id, e))?;
        let edges = store
            .load_dependencies(project_id)
            .map_err(|e| EngineError::from_storage(project_id, e))?;

        let outside: FxHashSet<String> = {
            let loaded: FxHashSet<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
            let dangling = tasks
                .iter()
                .flat_map(|t| t.dependencies.iter())
                .chain(edges.iter().map(|e| &e.predecessor_id))
                .any(|id| !loaded.contains(id.as_str()));
            if dangling {
                store
                    .load_task_ids(project_id)
                    .map_err(|e| EngineError::from_storage(project_id, e))?
                    .into_iter()
                    .filter(|id| !loaded.contains(id.as_str()))
                    .collect()
            } else {
                FxHashSet::default()
            }
        };
        Self::build_within(project_id, tasks, &edges, &outside)
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn task(&self, idx: TaskIdx) -> &Task {
        &self.tasks[idx]
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn index_of(&self, task_id: &str) -> Option<TaskIdx> {
        self.index.get(task_id).copied()
    }

    pub fn duration(&self, idx: TaskIdx) -> i64 {
        self.tasks[idx].duration_days as i64
    }

    pub fn predecessors(&self, idx: TaskIdx) -> &[TaskIdx] {
        &self.predecessors[idx]
    }

    pub fn successors(&self, idx: TaskIdx) -> &[TaskIdx] {
        &self.successors[idx]
    }

    /// Dependencies before dependents; ties broken by load order.
    pub fn topo_order(&self) -> &[TaskIdx] {
        &self.topo_order
    }
}

/// DFS coloring; returns the first cycle found as a closed path of indices.
fn find_cycle(successors: &[Vec<TaskIdx>]) -> Option<Vec<TaskIdx>> {
    let mut color = vec![Color::White; successors.len()];

    for root in 0..successors.len() {
        if color[root] != Color::White {
            continue;
        }
        color[root] = Color::Gray;
        let mut stack: Vec<(TaskIdx, usize)> = vec![(root, 0)];

        while let Some(frame) = stack.last_mut() {
            let node = frame.0;
            let Some(&next) = successors[node].get(frame.1) else {
                color[node] = Color::Black;
                stack.pop();
                continue;
            };
            frame.1 += 1;

            match color[next] {
                Color::White => {
                    color[next] = Color::Gray;
                    stack.push((next, 0));
                }
                Color::Gray => {
                    let start = stack.iter().position(|(n, _)| *n == next).unwrap_or(0);
                    let mut cycle: Vec<TaskIdx> = stack[start..].iter().map(|(n, _)| *n).collect();
                    cycle.push(next);
                    return Some(cycle);
                }
                Color::Black => {}
            }
        }
    }
    None
}

/// Kahn's algorithm, always releasing the lowest ready index first.
fn topological_order(predecessors: &[Vec<TaskIdx>], successors: &[Vec<TaskIdx>]) -> Vec<TaskIdx> {
    let mut in_degree: Vec<usize> = predecessors.iter().map(|p| p.len()).collect();
    let mut ready: BinaryHeap<Reverse<TaskIdx>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, &deg)| deg == 0)
        .map(|(idx, _)| Reverse(idx))
        .collect();

    let mut order = Vec::with_capacity(predecessors.len());
    while let Some(Reverse(idx)) = ready.pop() {
        order.push(idx);
        for &succ in &successors[idx] {
            in_degree[succ] -= 1;
            if in_degree[succ] == 0 {
                ready.push(Reverse(succ));
            }
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(graph: &TaskGraph, order: &[TaskIdx]) -> Vec<String> {
        order.iter().map(|&i| graph.task(i).id.clone()).collect()
    }

    #[test]
    fn test_topological_order_respects_dependencies() {
        let tasks = vec![
            Task::new("d", 1).after("b").after("c"),
            Task::new("c", 1).after("a"),
            Task::new("b", 1).after("a"),
            Task::new("a", 1),
        ];
        let graph = TaskGraph::build("p", tasks, &[]).unwrap();
        assert_eq!(ids(&graph, graph.topo_order()), vec!["a", "c", "b", "d"]);
        let d = graph.index_of("d").unwrap();
        assert_eq!(graph.predecessors(d).len(), 2);
    }

    #[test]
    fn test_explicit_edges_merged_and_deduplicated() {
        let tasks = vec![Task::new("a", 1), Task::new("b", 1).after("a")];
        let edges = vec![
            Dependency {
                predecessor_id: "a".to_string(),
                successor_id: "b".to_string(),
            },
            Dependency {
                predecessor_id: "a".to_string(),
                successor_id: "not_loaded".to_string(),
            },
        ];
        let graph = TaskGraph::build("p", tasks, &edges).unwrap();
        let b = graph.index_of("b").unwrap();
        assert_eq!(graph.predecessors(b), &[0]);
        assert_eq!(graph.successors(0), &[b]);
    }

    #[test]
    fn test_two_task_cycle_detected() {
        let tasks = vec![Task::new("a", 1).after("b"), Task::new("b", 1).after("a")];
        let err = TaskGraph::build("p", tasks, &[]).unwrap_err();
        match err {
            EngineError::CyclicDependency { project_id, cycle } => {
                assert_eq!(project_id, "p");
                assert_eq!(cycle.first(), cycle.last());
                assert_eq!(cycle.len(), 3);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_self_dependency_is_cycle() {
        let tasks = vec![Task::new("a", 1).after("a")];
        let err = TaskGraph::build("p", tasks, &[]).unwrap_err();
        assert_eq!(
            err,
            EngineError::CyclicDependency {
                project_id: "p".to_string(),
                cycle: vec!["a".to_string(), "a".to_string()],
            }
        );
    }

    #[test]
    fn test_unknown_dependency() {
        let tasks = vec![Task::new("a", 1), Task::new("b", 1).after("ghost")];
        let err = TaskGraph::build("p", tasks, &[]).unwrap_err();
        assert_eq!(
            err,
            EngineError::UnknownDependency {
                project_id: "p".to_string(),
                task_id: "b".to_string(),
                dependency_id: "ghost".to_string(),
            }
        );
    }

    #[test]
    fn test_filtered_predecessor_is_satisfied() {
        let outside: FxHashSet<String> = ["early".to_string()].into_iter().collect();
        let tasks = vec![Task::new("late", 2).after("early")];
        let graph = TaskGraph::build_within("p", tasks, &[], &outside).unwrap();
        assert_eq!(graph.len(), 1);
        assert!(graph.predecessors(0).is_empty());

        let tasks = vec![Task::new("late", 2).after("early").after("ghost")];
        let err = TaskGraph::build_within("p", tasks, &[], &outside).unwrap_err();
        assert!(matches!(
            err,
            EngineError::UnknownDependency { ref dependency_id, .. } if dependency_id == "ghost"
        ));
    }

    #[test]
    fn test_load_tells_filtered_from_unknown() {
        use crate::models::ProjectInfo;
        use crate::storage::InMemoryStore;
        use chrono::NaiveDate;

        let day = |m: u32, d: u32| NaiveDate::from_ymd_opt(2025, m, d).unwrap();
        let mut store = InMemoryStore::new();
        store.insert_project(
            ProjectInfo {
                id: "p".to_string(),
                name: "Filtered".to_string(),
                start_date: day(1, 1),
                end_date: day(6, 1),
                priority: 0,
                target_date: None,
            },
            vec![
                Task::new("early", 3).planned_at(day(1, 1)),
                Task::new("late", 2).after("early").planned_at(day(3, 1)),
            ],
        );

        let spring = TimeRange::new(day(2, 1), day(4, 1));
        let graph = TaskGraph::load(&store, "p", &spring).unwrap();
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.task(0).id, "late");

        store.add_dependency("p", "ghost", "late");
        assert!(matches!(
            TaskGraph::load(&store, "p", &spring).unwrap_err(),
            EngineError::UnknownDependency { ref dependency_id, .. } if dependency_id == "ghost"
        ));
    }

    #[test]
    fn test_duplicate_task_rejected() {
        let tasks = vec![Task::new("a", 1), Task::new("a", 2)];
        let err = TaskGraph::build("p", tasks, &[]).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateTask { task_id, .. } if task_id == "a"));
    }

    #[test]
    fn test_long_cycle_inside_larger_graph() {
        let tasks = vec![
            Task::new("root", 1),
            Task::new("x", 1).after("root").after("z"),
            Task::new("y", 1).after("x"),
            Task::new("z", 1).after("y"),
        ];
        let err = TaskGraph::build("p", tasks, &[]).unwrap_err();
        let EngineError::CyclicDependency { cycle, .. } = err else {
            panic!("expected cycle");
        };
        assert_eq!(cycle.len(), 4);
        assert!(!cycle.contains(&"root".to_string()));
    }
}
