//! Storage collaborator interface.
//!
//! The engine only reads; every read is scoped to the request that issued it.
//! [`InMemoryStore`] backs tests and the Python bindings.

use chrono::NaiveDate;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Deserialize;

use crate::error::StorageError;
use crate::models::{add_days, Dependency, ProjectInfo, ResourceAssignment, Task, TimeRange};

/// Which assignments to load.
#[derive(Clone, Copy, Debug)]
pub enum AssignmentScope<'a> {
    Project(&'a str),
    Resources(&'a [String]),
}

/// Read API of the relational store holding projects, tasks and resources.
///
/// Implementations must be shareable across the worker threads that analyze
/// portfolio projects concurrently.
pub trait ProjectStore: Sync {
    fn load_project(&self, project_id: &str) -> Result<ProjectInfo, StorageError>;

    /// Tasks of a project whose planned window intersects `range`.
    fn load_project_tasks(
        &self,
        project_id: &str,
        range: &TimeRange,
    ) -> Result<Vec<Task>, StorageError>;

    fn load_dependencies(&self, project_id: &str) -> Result<Vec<Dependency>, StorageError>;

    /// Ids of every task of a project, whatever its planned window.
    fn load_task_ids(&self, project_id: &str) -> Result<Vec<String>, StorageError> {
        let everything = TimeRange::new(NaiveDate::MIN, NaiveDate::MAX);
        Ok(self
            .load_project_tasks(project_id, &everything)?
            .into_iter()
            .map(|task| task.id)
            .collect())
    }

    fn load_resource_assignments(
        &self,
        scope: AssignmentScope<'_>,
        range: &TimeRange,
    ) -> Result<Vec<ResourceAssignment>, StorageError>;

    /// Available hours per day.
    fn load_resource_capacity(&self, resource_id: &str) -> Result<f64, StorageError>;
}

/// One project's stored rows.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    #[serde(flatten)]
    pub info: ProjectInfo,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
    #[serde(default)]
    pub assignments: Vec<ResourceAssignment>,
}

/// Serializable contents of an [`InMemoryStore`].
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    #[serde(default)]
    pub projects: Vec<ProjectRecord>,
    /// Hours per day by resource id.
    #[serde(default)]
    pub capacities: FxHashMap<String, f64>,
}

/// Store kept entirely in memory.
#[derive(Clone, Debug, Default)]
pub struct InMemoryStore {
    projects: FxHashMap<String, ProjectRecord>,
    capacities: FxHashMap<String, f64>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let mut store = Self::new();
        for record in snapshot.projects {
            store.projects.insert(record.info.id.clone(), record);
        }
        store.capacities = snapshot.capacities;
        store
    }

    pub fn insert_project(&mut self, info: ProjectInfo, tasks: Vec<Task>) {
        self.projects.insert(
            info.id.clone(),
            ProjectRecord {
                info,
                tasks,
                dependencies: Vec::new(),
                assignments: Vec::new(),
            },
        );
    }

    /// Add an explicit dependency edge. Unknown projects are ignored.
    pub fn add_dependency(&mut self, project_id: &str, predecessor_id: &str, successor_id: &str) {
        if let Some(record) = self.projects.get_mut(project_id) {
            record.dependencies.push(Dependency {
                predecessor_id: predecessor_id.to_string(),
                successor_id: successor_id.to_string(),
            });
        }
    }

    /// Add an explicit assignment row. Unknown projects are ignored.
    pub fn add_assignment(&mut self, project_id: &str, assignment: ResourceAssignment) {
        if let Some(record) = self.projects.get_mut(project_id) {
            record.assignments.push(assignment);
        }
    }

    pub fn set_capacity(&mut self, resource_id: &str, hours_per_day: f64) {
        self.capacities
            .insert(resource_id.to_string(), hours_per_day);
    }

    fn record(&self, project_id: &str) -> Result<&ProjectRecord, StorageError> {
        self.projects
            .get(project_id)
            .ok_or_else(|| StorageError::not_found("project", project_id))
    }

    fn task_in_range(task: &Task, range: &TimeRange) -> bool {
        match task.planned_start {
            None => true,
            Some(start) if task.duration_days == 0 => range.contains(start),
            Some(start) => range.intersects(start, add_days(start, task.duration_days as i64)),
        }
    }
}

impl ProjectStore for InMemoryStore {
    fn load_project(&self, project_id: &str) -> Result<ProjectInfo, StorageError> {
        Ok(self.record(project_id)?.info.clone())
    }

    fn load_project_tasks(
        &self,
        project_id: &str,
        range: &TimeRange,
    ) -> Result<Vec<Task>, StorageError> {
        Ok(self
            .record(project_id)?
            .tasks
            .iter()
            .filter(|task| Self::task_in_range(task, range))
            .cloned()
            .collect())
    }

    fn load_dependencies(&self, project_id: &str) -> Result<Vec<Dependency>, StorageError> {
        Ok(self.record(project_id)?.dependencies.clone())
    }

    fn load_task_ids(&self, project_id: &str) -> Result<Vec<String>, StorageError> {
        Ok(self
            .record(project_id)?
            .tasks
            .iter()
            .map(|task| task.id.clone())
            .collect())
    }

    fn load_resource_assignments(
        &self,
        scope: AssignmentScope<'_>,
        range: &TimeRange,
    ) -> Result<Vec<ResourceAssignment>, StorageError> {
        let in_range = |record: &ProjectRecord| -> FxHashSet<String> {
            record
                .tasks
                .iter()
                .filter(|task| Self::task_in_range(task, range))
                .map(|task| task.id.clone())
                .collect()
        };

        match scope {
            AssignmentScope::Project(project_id) => {
                let record = self.record(project_id)?;
                let task_ids = in_range(record);
                Ok(record
                    .assignments
                    .iter()
                    .filter(|a| task_ids.contains(&a.task_id))
                    .cloned()
                    .collect())
            }
            AssignmentScope::Resources(resource_ids) => {
                let wanted: FxHashSet<&str> = resource_ids.iter().map(|s| s.as_str()).collect();
                let mut project_ids: Vec<&String> = self.projects.keys().collect();
                project_ids.sort();

                let mut result = Vec::new();
                for project_id in project_ids {
                    let record = &self.projects[project_id];
                    let task_ids = in_range(record);
                    result.extend(
                        record
                            .assignments
                            .iter()
                            .filter(|a| {
                                wanted.contains(a.resource_id.as_str())
                                    && task_ids.contains(&a.task_id)
                            })
                            .cloned(),
                    );
                }
                Ok(result)
            }
        }
    }

    fn load_resource_capacity(&self, resource_id: &str) -> Result<f64, StorageError> {
        self.capacities
            .get(resource_id)
            .copied()
            .ok_or_else(|| StorageError::not_found("resource", resource_id))
    }
}
