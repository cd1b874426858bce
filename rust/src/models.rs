//! Core data types for the scheduling engine.
//!
//! Durations and dates are whole days. A task occupying `duration_days` from
//! `start` finishes on `start + duration_days`, the first day it no longer
//! occupies.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::InfeasibleDeadline;

/// Half-open date window `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl TimeRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }

    /// Whether the half-open window `[start, end)` shares at least one day.
    pub fn intersects(&self, start: NaiveDate, end: NaiveDate) -> bool {
        start < self.end && end > self.start
    }
}

/// Project metadata as stored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInfo {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Higher values are scheduled first.
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub target_date: Option<NaiveDate>,
}

impl ProjectInfo {
    /// Completion date the project is measured against.
    pub fn target(&self) -> NaiveDate {
        self.target_date.unwrap_or(self.end_date)
    }

    pub fn window(&self) -> TimeRange {
        TimeRange::new(self.start_date, self.end_date)
    }
}

/// A task to be scheduled.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub duration_days: u32,
    /// Predecessor task ids.
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub estimated_effort_hours: f64,
    #[serde(default)]
    pub assigned_resources: Vec<String>,
    /// Earliest date the current plan allows this task to start.
    #[serde(default)]
    pub planned_start: Option<NaiveDate>,
}

impl Task {
    pub fn new(id: &str, duration_days: u32) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            duration_days,
            dependencies: Vec::new(),
            estimated_effort_hours: 0.0,
            assigned_resources: Vec::new(),
            planned_start: None,
        }
    }

    pub fn after(mut self, predecessor: &str) -> Self {
        self.dependencies.push(predecessor.to_string());
        self
    }

    pub fn assigned_to(mut self, resource_id: &str, effort_hours: f64) -> Self {
        self.assigned_resources.push(resource_id.to_string());
        self.estimated_effort_hours += effort_hours;
        self
    }

    pub fn planned_at(mut self, date: NaiveDate) -> Self {
        self.planned_start = Some(date);
        self
    }
}

/// A dependency edge: `successor_id` cannot start before `predecessor_id` finishes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    pub predecessor_id: String,
    pub successor_id: String,
}

/// Hours a resource spends on a task, spread over the task's scheduled days.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceAssignment {
    pub resource_id: String,
    pub task_id: String,
    pub allocated_hours: f64,
}

/// CPM timing of one task.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledTask {
    pub task_id: String,
    pub name: String,
    pub duration_days: u32,
    pub earliest_start: NaiveDate,
    pub earliest_finish: NaiveDate,
    pub latest_start: NaiveDate,
    pub latest_finish: NaiveDate,
    /// Negative only when an imposed deadline cannot be met.
    pub float_days: i64,
    /// Float is zero, or negative against an unreachable deadline.
    pub is_critical: bool,
    /// At the schedule's minimum float. Differs from `is_critical` only when
    /// a deadline later than the earliest finish is imposed.
    pub is_driving: bool,
}

impl ScheduledTask {
    /// Scheduled window; tasks run at their earliest start.
    pub fn window(&self) -> TimeRange {
        TimeRange::new(self.earliest_start, self.earliest_finish)
    }
}

/// Aggregate float statistics of a schedule.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FloatStats {
    pub total_tasks: usize,
    pub critical_tasks: usize,
    pub average_float: f64,
    pub min_float: i64,
    pub max_float: i64,
    pub total_float: i64,
}

/// Materialized schedule of one project. Never mutated after construction.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub project_id: String,
    pub project_start: NaiveDate,
    pub start_date: NaiveDate,
    pub finish_date: NaiveDate,
    pub total_duration_days: i64,
    /// Tasks in topological order.
    pub tasks: Vec<ScheduledTask>,
    /// Every critical task, ordered by earliest start then topological order.
    pub critical_path: Vec<String>,
    /// Tasks at the minimum float, in the same order. Equal to
    /// `critical_path` unless a later deadline leaves every task some float.
    pub driving_path: Vec<String>,
    /// Driving chains from a source to a sink.
    pub critical_chains: Vec<Vec<String>>,
    pub chains_truncated: bool,
    pub float_stats: FloatStats,
    pub infeasibility: Option<InfeasibleDeadline>,
}

impl Schedule {
    pub fn task(&self, task_id: &str) -> Option<&ScheduledTask> {
        self.tasks.iter().find(|t| t.task_id == task_id)
    }

    pub fn is_feasible(&self) -> bool {
        self.infeasibility.is_none()
    }
}

/// Totals over a batch of scheduled projects.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSummary {
    /// Scheduled projects; always `on_time_projects + delayed_projects`.
    pub total_projects: usize,
    pub on_time_projects: usize,
    pub delayed_projects: usize,
    /// Mean delay over delayed projects only; 0 when none is delayed.
    pub average_delay: f64,
    /// Projects excluded from the schedule, listed under the result's failures.
    pub failed_projects: usize,
}

/// Add whole days to a date, saturating at chrono's range limits.
pub(crate) fn add_days(date: NaiveDate, days: i64) -> NaiveDate {
    if days >= 0 {
        date.checked_add_days(Days::new(days as u64))
            .unwrap_or(NaiveDate::MAX)
    } else {
        date.checked_sub_days(Days::new(days.unsigned_abs()))
            .unwrap_or(NaiveDate::MIN)
    }
}

/// Signed day distance `to - from`.
pub(crate) fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}
