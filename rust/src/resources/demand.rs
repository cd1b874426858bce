//! Resource demand per task and resource capacities.

use rustc_hash::FxHashMap;

use crate::error::{EngineError, Result};
use crate::graph::{TaskGraph, TaskIdx};
use crate::models::ResourceAssignment;
use crate::storage::ProjectStore;

/// Hours one resource spends on one task.
#[derive(Clone, Debug, PartialEq)]
pub struct TaskDemand {
    pub resource_id: String,
    pub total_hours: f64,
    /// `total_hours` spread evenly over the task's days.
    pub hours_per_day: f64,
}

/// Effective assignments of every task in a graph, indexed by task index.
///
/// Explicit assignment rows win. A resource listed on a task without a row
/// gets an equal share of the task's estimated effort.
#[derive(Clone, Debug, Default)]
pub struct DemandTable {
    per_task: Vec<Vec<TaskDemand>>,
}

impl DemandTable {
    pub fn build(graph: &TaskGraph, assignments: &[ResourceAssignment]) -> Self {
        let mut explicit: Vec<Vec<(String, f64)>> = vec![Vec::new(); graph.len()];
        for row in assignments {
            let Some(idx) = graph.index_of(&row.task_id) else {
                continue;
            };
            match explicit[idx].iter_mut().find(|(r, _)| *r == row.resource_id) {
                Some((_, hours)) => *hours += row.allocated_hours,
                None => explicit[idx].push((row.resource_id.clone(), row.allocated_hours)),
            }
        }

        let per_task = (0..graph.len())
            .map(|idx| {
                let task = graph.task(idx);
                let mut rows = std::mem::take(&mut explicit[idx]);

                let implicit: Vec<&String> = task
                    .assigned_resources
                    .iter()
                    .filter(|r| !rows.iter().any(|(id, _)| id == *r))
                    .collect();
                if !implicit.is_empty() {
                    let share = task.estimated_effort_hours / task.assigned_resources.len() as f64;
                    for resource in implicit {
                        if !rows.iter().any(|(id, _)| id == resource) {
                            rows.push((resource.clone(), share));
                        }
                    }
                }

                rows.sort_by(|a, b| a.0.cmp(&b.0));
                rows.into_iter()
                    .map(|(resource_id, total_hours)| TaskDemand {
                        hours_per_day: if task.duration_days == 0 {
                            0.0
                        } else {
                            total_hours / task.duration_days as f64
                        },
                        resource_id,
                        total_hours,
                    })
                    .collect()
            })
            .collect();

        Self { per_task }
    }

    pub fn for_task(&self, idx: TaskIdx) -> &[TaskDemand] {
        self.per_task.get(idx).map(|d| d.as_slice()).unwrap_or(&[])
    }

    /// The only resource assigned to a task, if exactly one is.
    pub fn sole_resource(&self, idx: TaskIdx) -> Option<&str> {
        match self.for_task(idx) {
            [only] => Some(only.resource_id.as_str()),
            _ => None,
        }
    }

    /// Every resource with demand, sorted and unique.
    pub fn resource_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .per_task
            .iter()
            .flatten()
            .map(|d| d.resource_id.clone())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

/// Available hours per day of each resource, read once per request.
#[derive(Clone, Debug, Default)]
pub struct CapacityTable {
    hours_per_day: FxHashMap<String, f64>,
}

impl CapacityTable {
    /// Read capacities for `resource_ids`, skipping ones already known.
    ///
    /// A missing or unusable capacity fails the stage with
    /// `ResourceDataUnavailable`.
    pub fn load<S: ProjectStore + ?Sized>(
        &mut self,
        store: &S,
        project_id: &str,
        resource_ids: &[String],
    ) -> Result<()> {
        for resource_id in resource_ids {
            if self.hours_per_day.contains_key(resource_id) {
                continue;
            }
            let hours = store.load_resource_capacity(resource_id).map_err(|e| {
                EngineError::ResourceDataUnavailable {
                    project_id: project_id.to_string(),
                    resource_id: resource_id.clone(),
                    reason: e.to_string(),
                }
            })?;
            if !hours.is_finite() || hours < 0.0 {
                return Err(EngineError::ResourceDataUnavailable {
                    project_id: project_id.to_string(),
                    resource_id: resource_id.clone(),
                    reason: format!("invalid capacity {hours}"),
                });
            }
            self.hours_per_day.insert(resource_id.clone(), hours);
        }
        Ok(())
    }

    pub fn insert(&mut self, resource_id: &str, hours_per_day: f64) {
        self.hours_per_day
            .insert(resource_id.to_string(), hours_per_day);
    }

    /// Take capacities read by another worker, keeping ones already known.
    pub fn merge(&mut self, other: CapacityTable) {
        for (resource_id, hours) in other.hours_per_day {
            self.hours_per_day.entry(resource_id).or_insert(hours);
        }
    }

    /// Capacity of a resource; unknown resources have none.
    pub fn get(&self, resource_id: &str) -> f64 {
        self.hours_per_day.get(resource_id).copied().unwrap_or(0.0)
    }
}
