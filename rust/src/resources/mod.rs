//! Resource constraint resolution.
//!
//! Overlays resource demand on a CPM schedule and reports over-allocation
//! conflicts and bottleneck resources. Nothing here moves a task; fixing
//! conflicts is the optimizer's job.

mod demand;
mod timeline;

use chrono::NaiveDate;
use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::graph::TaskGraph;
use crate::log_checks;
use crate::models::{add_days, days_between, Schedule, TimeRange};

pub use demand::{CapacityTable, DemandTable, TaskDemand};
pub use timeline::{DayLoad, ResourceLedger, ResourceTimeline, TaskRef, HOURS_EPSILON};

/// One day on which a resource is booked beyond its capacity.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceConflict {
    pub resource_id: String,
    pub date: NaiveDate,
    pub allocated_hours: f64,
    pub capacity_hours: f64,
    pub excess_hours: f64,
    pub tasks: Vec<TaskRef>,
    /// Another project holds part of the allocation.
    pub cross_project: bool,
}

/// A resource that alone staffs overlapping critical tasks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bottleneck {
    pub resource_id: String,
    pub task_ids: Vec<String>,
    pub overlapping_days: i64,
}

/// How much of a resource the project uses inside the analyzed window.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceUsage {
    pub resource_id: String,
    pub capacity_hours_per_day: f64,
    pub allocated_hours: f64,
    pub peak_daily_hours: f64,
    /// Hours usable within capacity over hours available across the schedule span.
    pub utilization: f64,
}

/// Result of overlaying resources on a schedule.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceAnalysis {
    pub project_id: String,
    pub window: TimeRange,
    pub conflicts: Vec<ResourceConflict>,
    pub bottlenecks: Vec<Bottleneck>,
    pub usage: Vec<ResourceUsage>,
    pub total_excess_hours: f64,
}

impl ResourceAnalysis {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

/// Detects over-allocation and bottlenecks for one project.
pub struct ResourceResolver<'a> {
    demands: &'a DemandTable,
    capacities: &'a CapacityTable,
    verbosity: u8,
}

impl<'a> ResourceResolver<'a> {
    pub fn new(demands: &'a DemandTable, capacities: &'a CapacityTable, verbosity: u8) -> Self {
        Self {
            demands,
            capacities,
            verbosity,
        }
    }

    /// Book every task's demand on its scheduled window.
    pub fn claim(&self, ledger: &mut ResourceLedger, graph: &TaskGraph, schedule: &Schedule) {
        for scheduled in &schedule.tasks {
            let Some(idx) = graph.index_of(&scheduled.task_id) else {
                continue;
            };
            let holder = TaskRef::new(graph.project_id(), &scheduled.task_id);
            for demand in self.demands.for_task(idx) {
                ledger
                    .timeline_mut(&demand.resource_id, self.capacities.get(&demand.resource_id))
                    .allocate(
                        scheduled.earliest_start,
                        scheduled.duration_days,
                        demand.hours_per_day,
                        holder.clone(),
                    );
            }
        }
    }

    /// Analyze a schedule inside `window`, on top of `external` claims if any.
    pub fn analyze(
        &self,
        graph: &TaskGraph,
        schedule: &Schedule,
        window: &TimeRange,
        external: Option<&ResourceLedger>,
    ) -> ResourceAnalysis {
        let mut own = ResourceLedger::new();
        self.claim(&mut own, graph, schedule);

        let mut merged = external.cloned().unwrap_or_default();
        self.claim(&mut merged, graph, schedule);

        let project_id = graph.project_id();
        let mut conflicts = Vec::new();
        for resource_id in merged.resource_ids() {
            let Some(timeline) = merged.timeline(resource_id) else {
                continue;
            };
            for (date, load) in timeline.overloaded_days(window) {
                if !load.holders.iter().any(|h| h.project_id == project_id) {
                    continue;
                }
                let mut tasks = load.holders.clone();
                tasks.sort();
                conflicts.push(ResourceConflict {
                    resource_id: resource_id.to_string(),
                    date: *date,
                    allocated_hours: load.hours,
                    capacity_hours: timeline.capacity,
                    excess_hours: load.hours - timeline.capacity,
                    cross_project: tasks.iter().any(|h| h.project_id != project_id),
                    tasks,
                });
            }
        }

        let total_excess_hours = conflicts.iter().map(|c| c.excess_hours).sum();
        log_checks!(
            self.verbosity,
            project = project_id,
            conflicts = conflicts.len(),
            excess_hours = total_excess_hours,
            "resource overlay"
        );

        ResourceAnalysis {
            project_id: project_id.to_string(),
            window: *window,
            bottlenecks: self.find_bottlenecks(graph, schedule),
            usage: usage(&own, schedule, window),
            conflicts,
            total_excess_hours,
        }
    }

    /// Resources that are the sole assignee of two or more critical tasks
    /// whose scheduled windows overlap.
    fn find_bottlenecks(&self, graph: &TaskGraph, schedule: &Schedule) -> Vec<Bottleneck> {
        let mut critical_by_resource: FxHashMap<&str, Vec<(&str, TimeRange)>> =
            FxHashMap::default();
        for scheduled in schedule.tasks.iter().filter(|t| t.is_critical) {
            let Some(idx) = graph.index_of(&scheduled.task_id) else {
                continue;
            };
            if scheduled.duration_days == 0 {
                continue;
            }
            if let Some(resource_id) = self.demands.sole_resource(idx) {
                critical_by_resource
                    .entry(resource_id)
                    .or_default()
                    .push((scheduled.task_id.as_str(), scheduled.window()));
            }
        }

        let mut bottlenecks = Vec::new();
        for (resource_id, tasks) in critical_by_resource {
            if tasks.len() < 2 {
                continue;
            }
            let mut coverage: FxHashMap<NaiveDate, usize> = FxHashMap::default();
            for (_, window) in &tasks {
                for offset in 0..days_between(window.start, window.end) {
                    *coverage.entry(add_days(window.start, offset)).or_default() += 1;
                }
            }
            let overlapping_days = coverage.values().filter(|&&n| n >= 2).count() as i64;
            if overlapping_days == 0 {
                continue;
            }

            let task_ids = tasks
                .iter()
                .filter(|(_, window)| {
                    (0..days_between(window.start, window.end))
                        .any(|o| coverage.get(&add_days(window.start, o)).copied() >= Some(2))
                })
                .map(|(id, _)| id.to_string())
                .collect();
            bottlenecks.push(Bottleneck {
                resource_id: resource_id.to_string(),
                task_ids,
                overlapping_days,
            });
        }
        bottlenecks.sort_by(|a, b| a.resource_id.cmp(&b.resource_id));
        bottlenecks
    }
}

fn usage(own: &ResourceLedger, schedule: &Schedule, window: &TimeRange) -> Vec<ResourceUsage> {
    let span_start = schedule.start_date.max(window.start);
    let span_end = schedule.finish_date.min(window.end);
    let span_days = days_between(span_start, span_end).max(0);

    own.resource_ids()
        .into_iter()
        .filter_map(|resource_id| own.timeline(resource_id))
        .map(|timeline| {
            let in_window: Vec<f64> = timeline
                .iter()
                .filter(|(date, _)| window.contains(**date))
                .map(|(_, load)| load.hours)
                .collect();
            let allocated_hours: f64 = in_window.iter().sum();
            let usable: f64 = in_window.iter().map(|h| h.min(timeline.capacity)).sum();
            let available = timeline.capacity * span_days as f64;
            ResourceUsage {
                resource_id: timeline.resource_id.clone(),
                capacity_hours_per_day: timeline.capacity,
                allocated_hours,
                peak_daily_hours: in_window.iter().copied().fold(0.0, f64::max),
                utilization: if available > 0.0 { usable / available } else { 0.0 },
            }
        })
        .collect()
}
