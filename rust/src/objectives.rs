//! Optimization goals and weighted objectives.
//!
//! Goals are a closed set: unknown tags fail at the boundary instead of being
//! silently ignored.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;

/// Kinds of optimization objective understood by the engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveKind {
    MinimizeTotalDelay,
    MaximizePriorityAdherence,
    MinimizeResourceConflicts,
    MinimizeDuration,
    MaximizeResourceUtilization,
}

impl ObjectiveKind {
    pub const ALL: [ObjectiveKind; 5] = [
        ObjectiveKind::MinimizeTotalDelay,
        ObjectiveKind::MaximizePriorityAdherence,
        ObjectiveKind::MinimizeResourceConflicts,
        ObjectiveKind::MinimizeDuration,
        ObjectiveKind::MaximizeResourceUtilization,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectiveKind::MinimizeTotalDelay => "minimize_total_delay",
            ObjectiveKind::MaximizePriorityAdherence => "maximize_priority_adherence",
            ObjectiveKind::MinimizeResourceConflicts => "minimize_resource_conflicts",
            ObjectiveKind::MinimizeDuration => "minimize_duration",
            ObjectiveKind::MaximizeResourceUtilization => "maximize_resource_utilization",
        }
    }
}

impl fmt::Display for ObjectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectiveKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_lowercase();
        ObjectiveKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == tag)
            .ok_or_else(|| EngineError::InvalidRequest(format!("unknown optimization goal: {s}")))
    }
}

/// A weighted objective for portfolio scheduling.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OptimizationObjective {
    pub kind: ObjectiveKind,
    pub weight: f64,
}

impl OptimizationObjective {
    pub fn new(kind: ObjectiveKind, weight: f64) -> Self {
        Self { kind, weight }
    }
}

/// Objective weights normalized to sum to 1.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ObjectiveWeights {
    pub total_delay: f64,
    pub priority_adherence: f64,
    pub resource_conflicts: f64,
    pub duration: f64,
    pub resource_utilization: f64,
}

impl ObjectiveWeights {
    /// Normalize a weighted objective list.
    ///
    /// Repeated kinds accumulate. Negative or non-finite weights are rejected.
    /// An empty list (or one whose weights sum to zero) falls back to equal
    /// weight on total delay and priority adherence.
    pub fn normalize(objectives: &[OptimizationObjective]) -> Result<Self, EngineError> {
        let mut weights = ObjectiveWeights::default();
        for objective in objectives {
            if !objective.weight.is_finite() || objective.weight < 0.0 {
                return Err(EngineError::InvalidRequest(format!(
                    "objective {} has invalid weight {}",
                    objective.kind, objective.weight
                )));
            }
            *weights.slot_mut(objective.kind) += objective.weight;
        }

        let sum = weights.sum();
        if sum <= 0.0 {
            return Ok(Self::default_portfolio());
        }

        for kind in ObjectiveKind::ALL {
            *weights.slot_mut(kind) /= sum;
        }
        Ok(weights)
    }

    pub fn default_portfolio() -> Self {
        Self {
            total_delay: 0.5,
            priority_adherence: 0.5,
            ..Self::default()
        }
    }

    pub fn get(&self, kind: ObjectiveKind) -> f64 {
        match kind {
            ObjectiveKind::MinimizeTotalDelay => self.total_delay,
            ObjectiveKind::MaximizePriorityAdherence => self.priority_adherence,
            ObjectiveKind::MinimizeResourceConflicts => self.resource_conflicts,
            ObjectiveKind::MinimizeDuration => self.duration,
            ObjectiveKind::MaximizeResourceUtilization => self.resource_utilization,
        }
    }

    /// Objective kinds with non-zero weight, heaviest first.
    ///
    /// Used as the goal preference order of each project's optimizer run.
    pub fn ranked_goals(&self) -> Vec<ObjectiveKind> {
        let mut goals: Vec<ObjectiveKind> = ObjectiveKind::ALL
            .into_iter()
            .filter(|kind| self.get(*kind) > 0.0)
            .collect();
        // Stable sort keeps declaration order for equal weights
        goals.sort_by(|a, b| self.get(*b).total_cmp(&self.get(*a)));
        goals
    }

    fn sum(&self) -> f64 {
        self.total_delay
            + self.priority_adherence
            + self.resource_conflicts
            + self.duration
            + self.resource_utilization
    }

    fn slot_mut(&mut self, kind: ObjectiveKind) -> &mut f64 {
        match kind {
            ObjectiveKind::MinimizeTotalDelay => &mut self.total_delay,
            ObjectiveKind::MaximizePriorityAdherence => &mut self.priority_adherence,
            ObjectiveKind::MinimizeResourceConflicts => &mut self.resource_conflicts,
            ObjectiveKind::MinimizeDuration => &mut self.duration,
            ObjectiveKind::MaximizeResourceUtilization => &mut self.resource_utilization,
        }
    }
}

/// Parse a list of goal tags, rejecting unknown ones and dropping repeats.
pub fn parse_goals<S: AsRef<str>>(tags: &[S]) -> Result<Vec<ObjectiveKind>, EngineError> {
    let mut goals = Vec::with_capacity(tags.len());
    for tag in tags {
        let kind: ObjectiveKind = tag.as_ref().parse()?;
        if !goals.contains(&kind) {
            goals.push(kind);
        }
    }
    Ok(goals)
}
