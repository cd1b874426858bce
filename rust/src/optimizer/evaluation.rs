//! Scoring of candidate timelines.
//!
//! A candidate is a vector of release offsets; evaluating it reruns CPM and
//! recomputes the project's daily resource load on top of any claims made by
//! other projects.

use chrono::NaiveDate;
use rustc_hash::FxHashMap;
use std::cmp::Ordering;

use crate::critical_path::{calculate_timings, CpmTimings, FinishAnchor};
use crate::graph::{TaskGraph, TaskIdx};
use crate::models::add_days;
use crate::objectives::ObjectiveKind;
use crate::resources::{CapacityTable, DemandTable, ResourceLedger, HOURS_EPSILON};

/// Figures a candidate timeline is judged by.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScheduleMetrics {
    pub start: i64,
    pub finish: i64,
    pub duration: i64,
    /// Hours this project books beyond remaining capacity.
    pub excess_hours: f64,
    /// (resource, day) pairs with excess.
    pub conflict_days: usize,
    pub utilization: f64,
    /// Days past the target date, 0 when on time or without target.
    pub delay_days: i64,
}

/// A timeline under consideration.
#[derive(Clone, Debug)]
pub struct Evaluated {
    pub releases: Vec<i64>,
    pub cpm: CpmTimings,
    pub metrics: ScheduleMetrics,
    /// Own booked hours keyed by (resource slot, day offset).
    pub loads: FxHashMap<(usize, i64), f64>,
}

/// Computes metrics for candidate release vectors of one project.
pub struct Evaluator<'a> {
    graph: &'a TaskGraph,
    capacities: &'a CapacityTable,
    external: Option<&'a ResourceLedger>,
    project_start: NaiveDate,
    target_offset: Option<i64>,
    /// Resource ids by slot.
    resources: Vec<String>,
    /// Per task: (resource slot, hours per day).
    task_demand: Vec<Vec<(usize, f64)>>,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        graph: &'a TaskGraph,
        demands: &'a DemandTable,
        capacities: &'a CapacityTable,
        external: Option<&'a ResourceLedger>,
        project_start: NaiveDate,
        target_offset: Option<i64>,
    ) -> Self {
        let resources = demands.resource_ids();
        let slot: FxHashMap<&str, usize> = resources
            .iter()
            .enumerate()
            .map(|(i, r)| (r.as_str(), i))
            .collect();
        let task_demand = (0..graph.len())
            .map(|idx| {
                demands
                    .for_task(idx)
                    .iter()
                    .filter(|d| d.hours_per_day > 0.0)
                    .filter_map(|d| slot.get(d.resource_id.as_str()).map(|&s| (s, d.hours_per_day)))
                    .collect()
            })
            .collect();

        Self {
            graph,
            capacities,
            external,
            project_start,
            target_offset,
            resources,
            task_demand,
        }
    }

    pub fn with_target(mut self, target_offset: i64) -> Self {
        self.target_offset = Some(target_offset);
        self
    }

    pub fn with_external(mut self, external: &'a ResourceLedger) -> Self {
        self.external = Some(external);
        self
    }

    pub fn graph(&self) -> &TaskGraph {
        self.graph
    }

    pub fn task_demand(&self, idx: TaskIdx) -> &[(usize, f64)] {
        &self.task_demand[idx]
    }

    pub fn capacity(&self, slot: usize) -> f64 {
        self.capacities.get(&self.resources[slot])
    }

    /// Hours already claimed by other projects.
    pub fn external_load(&self, slot: usize, day: i64) -> f64 {
        self.external
            .map(|ledger| ledger.load_on(&self.resources[slot], add_days(self.project_start, day)))
            .unwrap_or(0.0)
    }

    pub fn evaluate(&self, releases: Vec<i64>) -> Evaluated {
        let cpm = calculate_timings(self.graph, Some(&releases), FinishAnchor::ProjectFinish);

        let mut loads: FxHashMap<(usize, i64), f64> = FxHashMap::default();
        for idx in 0..self.graph.len() {
            let timing = &cpm.timings[idx];
            for &(slot, hours) in &self.task_demand[idx] {
                for day in timing.earliest_start..timing.earliest_finish {
                    *loads.entry((slot, day)).or_default() += hours;
                }
            }
        }

        let mut excess_hours = 0.0;
        let mut conflict_days = 0;
        let mut usable = 0.0;
        for (&(slot, day), &own) in &loads {
            let capacity = self.capacity(slot);
            let external = self.external_load(slot, day);
            let free = (capacity - external).max(0.0);
            let excess = (own - free).max(0.0).min(own);
            if excess > HOURS_EPSILON {
                excess_hours += excess;
                conflict_days += 1;
            }
            usable += own.min(free);
        }

        let duration = cpm.duration();
        let available: f64 = (0..self.resources.len())
            .map(|slot| self.capacity(slot) * duration as f64)
            .sum();

        let metrics = ScheduleMetrics {
            start: cpm.project_start,
            finish: cpm.project_finish,
            duration,
            excess_hours,
            conflict_days,
            utilization: if available > 0.0 { usable / available } else { 0.0 },
            delay_days: self
                .target_offset
                .map(|target| (cpm.project_finish - target).max(0))
                .unwrap_or(0),
        };

        Evaluated {
            releases,
            cpm,
            metrics,
            loads,
        }
    }
}

/// Lexicographic score: one entry per goal in preference order, then excess
/// hours and duration as tie-breakers. Lower is better.
pub fn score(metrics: &ScheduleMetrics, goals: &[ObjectiveKind]) -> Vec<f64> {
    let mut values: Vec<f64> = goals
        .iter()
        .filter_map(|goal| match goal {
            ObjectiveKind::MinimizeDuration => Some(metrics.duration as f64),
            ObjectiveKind::MaximizeResourceUtilization => Some(-metrics.utilization),
            ObjectiveKind::MinimizeResourceConflicts => Some(metrics.excess_hours),
            ObjectiveKind::MinimizeTotalDelay => Some(metrics.delay_days as f64),
            // Only meaningful across projects
            ObjectiveKind::MaximizePriorityAdherence => None,
        })
        .collect();
    values.push(metrics.excess_hours);
    values.push(metrics.duration as f64);
    values
}

/// Compare two scores entry by entry, ignoring differences below epsilon.
pub fn compare_scores(a: &[f64], b: &[f64]) -> Ordering {
    for (x, y) in a.iter().zip(b) {
        if (x - y).abs() > 1e-9 {
            return x.total_cmp(y);
        }
    }
    Ordering::Equal
}
