//! Error taxonomy for the scheduling engine.
//!
//! Every fatal condition names the project (and task or resource) it concerns.
//! Infeasible deadlines are not fatal: they travel on the schedule as an
//! [`InfeasibleDeadline`] value.

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use crate::cancel::Stage;

/// Errors raised by the storage collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StorageError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },
    #[error("storage unavailable while reading {entity} {id}: {reason}")]
    Unavailable {
        entity: String,
        id: String,
        reason: String,
    },
}

impl StorageError {
    pub fn not_found(entity: &str, id: &str) -> Self {
        StorageError::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    pub fn unavailable(entity: &str, id: &str, reason: impl Into<String>) -> Self {
        StorageError::Unavailable {
            entity: entity.to_string(),
            id: id.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors that can occur while building, analyzing or optimizing schedules.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineError {
    #[error("project {project_id}: cyclic dependency {}", cycle.join(" -> "))]
    CyclicDependency {
        project_id: String,
        cycle: Vec<String>,
    },
    #[error("project {project_id}: task {task_id} depends on unknown task {dependency_id}")]
    UnknownDependency {
        project_id: String,
        task_id: String,
        dependency_id: String,
    },
    #[error("project {project_id}: duplicate task id {task_id}")]
    DuplicateTask { project_id: String, task_id: String },
    #[error("project {project_id}: resource data unavailable for {resource_id}: {reason}")]
    ResourceDataUnavailable {
        project_id: String,
        resource_id: String,
        reason: String,
    },
    #[error("project not found: {project_id}")]
    ProjectNotFound { project_id: String },
    #[error("project {project_id}: storage read failed: {source}")]
    Storage {
        project_id: String,
        #[source]
        source: StorageError,
    },
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("request cancelled before {stage}")]
    Cancelled { stage: Stage },
}

impl EngineError {
    /// Wrap a storage failure, mapping missing projects to their own variant.
    pub fn from_storage(project_id: &str, source: StorageError) -> Self {
        match &source {
            StorageError::NotFound { entity, id } if entity == "project" && id == project_id => {
                EngineError::ProjectNotFound {
                    project_id: project_id.to_string(),
                }
            }
            _ => EngineError::Storage {
                project_id: project_id.to_string(),
                source,
            },
        }
    }

    /// Whether a portfolio run may exclude the failing project and carry on.
    ///
    /// Graph-builder failures and unknown projects are isolated; storage,
    /// resource-data and cancellation errors abort the whole request.
    pub fn is_project_scoped(&self) -> bool {
        matches!(
            self,
            EngineError::CyclicDependency { .. }
                | EngineError::UnknownDependency { .. }
                | EngineError::DuplicateTask { .. }
                | EngineError::ProjectNotFound { .. }
        )
    }

    /// Project the error concerns, if any.
    pub fn project_id(&self) -> Option<&str> {
        match self {
            EngineError::CyclicDependency { project_id, .. }
            | EngineError::UnknownDependency { project_id, .. }
            | EngineError::DuplicateTask { project_id, .. }
            | EngineError::ResourceDataUnavailable { project_id, .. }
            | EngineError::ProjectNotFound { project_id }
            | EngineError::Storage { project_id, .. } => Some(project_id),
            EngineError::InvalidRequest(_) | EngineError::Cancelled { .. } => None,
        }
    }
}

/// A deadline that the dependency chain cannot meet.
///
/// Attached to the schedule; the analysis still completes and the affected
/// tasks carry negative float.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("project {project_id}: deadline {deadline} is {shortfall_days} day(s) before earliest finish {earliest_finish}")]
pub struct InfeasibleDeadline {
    pub project_id: String,
    pub deadline: NaiveDate,
    pub earliest_finish: NaiveDate,
    pub shortfall_days: i64,
}

pub type Result<T> = std::result::Result<T, EngineError>;
