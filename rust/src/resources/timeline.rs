//! Per-resource daily allocation tracking.
//!
//! A [`ResourceTimeline`] records allocated hours per calendar day for one
//! resource; a [`ResourceLedger`] holds the timelines of every resource
//! claimed so far in a request.

use chrono::NaiveDate;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::{add_days, TimeRange};

/// Tolerance for comparing allocated hours against capacity.
pub const HOURS_EPSILON: f64 = 1e-6;

/// Identifies which task of which project holds an allocation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRef {
    pub project_id: String,
    pub task_id: String,
}

impl TaskRef {
    pub fn new(project_id: &str, task_id: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            task_id: task_id.to_string(),
        }
    }
}

/// Hours booked on one day and who booked them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DayLoad {
    pub hours: f64,
    pub holders: Vec<TaskRef>,
}

/// Daily allocation of a single resource, keyed by date.
///
/// Days without allocations are absent. `days` stays sorted, so windows are
/// read with a range query.
#[derive(Clone, Debug, PartialEq)]
pub struct ResourceTimeline {
    pub resource_id: String,
    /// Available hours per day.
    pub capacity: f64,
    days: BTreeMap<NaiveDate, DayLoad>,
}

impl ResourceTimeline {
    pub fn new(resource_id: &str, capacity: f64) -> Self {
        Self {
            resource_id: resource_id.to_string(),
            capacity,
            days: BTreeMap::new(),
        }
    }

    /// Book `hours_per_day` on each of `days` consecutive days from `start`.
    pub fn allocate(&mut self, start: NaiveDate, days: u32, hours_per_day: f64, holder: TaskRef) {
        if hours_per_day <= 0.0 {
            return;
        }
        for offset in 0..days as i64 {
            let load = self.days.entry(add_days(start, offset)).or_default();
            load.hours += hours_per_day;
            if !load.holders.contains(&holder) {
                load.holders.push(holder.clone());
            }
        }
    }

    pub fn load_on(&self, date: NaiveDate) -> f64 {
        self.days.get(&date).map(|l| l.hours).unwrap_or(0.0)
    }

    pub fn remaining_on(&self, date: NaiveDate) -> f64 {
        self.capacity - self.load_on(date)
    }

    /// Whether `hours_per_day` more fits on every day of the window.
    pub fn fits(&self, start: NaiveDate, days: u32, hours_per_day: f64) -> bool {
        if days == 0 || hours_per_day <= 0.0 {
            return true;
        }
        let end = add_days(start, days as i64);
        self.days
            .range(start..end)
            .all(|(_, load)| load.hours + hours_per_day <= self.capacity + HOURS_EPSILON)
    }

    /// Days with bookings, in date order.
    pub fn iter(&self) -> impl Iterator<Item = (&NaiveDate, &DayLoad)> {
        self.days.iter()
    }

    /// Days within `window` whose load exceeds capacity.
    pub fn overloaded_days<'a>(
        &'a self,
        window: &'a TimeRange,
    ) -> impl Iterator<Item = (&'a NaiveDate, &'a DayLoad)> + 'a {
        self.days
            .range(window.start..window.end)
            .filter(move |(_, load)| load.hours > self.capacity + HOURS_EPSILON)
    }
}

/// Timelines of every resource claimed so far.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResourceLedger {
    timelines: FxHashMap<String, ResourceTimeline>,
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeline(&self, resource_id: &str) -> Option<&ResourceTimeline> {
        self.timelines.get(resource_id)
    }

    /// Timeline for a resource, created with `capacity` on first use.
    pub fn timeline_mut(&mut self, resource_id: &str, capacity: f64) -> &mut ResourceTimeline {
        self.timelines
            .entry(resource_id.to_string())
            .or_insert_with(|| ResourceTimeline::new(resource_id, capacity))
    }

    pub fn load_on(&self, resource_id: &str, date: NaiveDate) -> f64 {
        self.timelines
            .get(resource_id)
            .map(|t| t.load_on(date))
            .unwrap_or(0.0)
    }

    /// Resource ids in sorted order.
    pub fn resource_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.timelines.keys().map(|s| s.as_str()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn is_empty(&self) -> bool {
        self.timelines.is_empty()
    }
}
