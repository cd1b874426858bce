//! Request entry points.
//!
//! A [`SchedulingEngine`] is built per request around an injected
//! [`ProjectStore`]. It keeps no state between calls; every call loads its own
//! data, builds its own graphs and returns owned results.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::cancel::{CancellationToken, Stage};
use crate::config::EngineConfig;
use crate::critical_path::{
    float_analysis, metadata, CriticalPathAnalyzer, CriticalPathMetadata, FloatAnalysis,
};
use crate::error::{EngineError, Result};
use crate::graph::TaskGraph;
use crate::models::{PortfolioSummary, ProjectInfo, Schedule, TimeRange};
use crate::objectives::{ObjectiveKind, ObjectiveWeights, OptimizationObjective};
use crate::optimizer::{planned_releases, Improvements, TimelineOptimizer};
use crate::portfolio::{
    summarize, CandidateScore, PortfolioScheduler, PreparedProject, ProjectFailure,
    ProjectScheduleResult,
};
use crate::resources::{CapacityTable, DemandTable, ResourceAnalysis, ResourceResolver};
use crate::storage::{AssignmentScope, ProjectStore};
use crate::{log_changes, log_checks};

/// Days of float at or below which a non-critical task is reported as near-critical.
pub const DEFAULT_RISK_THRESHOLD: i64 = 3;

/// Goals used when a timeline request names none.
pub const DEFAULT_TIMELINE_GOALS: [ObjectiveKind; 2] = [
    ObjectiveKind::MinimizeResourceConflicts,
    ObjectiveKind::MinimizeDuration,
];

fn default_risk_threshold() -> i64 {
    DEFAULT_RISK_THRESHOLD
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeTimelineParams {
    pub project_id: String,
    /// Defaults to the project's own start/end window.
    #[serde(default)]
    pub time_range: Option<TimeRange>,
    /// Preference order; earlier goals win trade-offs.
    #[serde(default)]
    pub optimization_goals: Vec<ObjectiveKind>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeCriticalPathParams {
    pub project_id: String,
    #[serde(default)]
    pub include_float_analysis: bool,
    #[serde(default = "default_risk_threshold")]
    pub risk_threshold: i64,
    /// Imposed finish date; an unreachable one yields negative float.
    #[serde(default)]
    pub deadline: Option<NaiveDate>,
    #[serde(default)]
    pub time_range: Option<TimeRange>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeDeliveryParams {
    pub project_ids: Vec<String>,
    #[serde(default)]
    pub time_range: Option<TimeRange>,
    #[serde(default)]
    pub optimization_objectives: Vec<OptimizationObjective>,
}

/// Headline figures of one timeline.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineSummary {
    pub start_date: NaiveDate,
    pub finish_date: NaiveDate,
    pub duration_days: i64,
    pub critical_path: Vec<String>,
    pub schedule: Schedule,
}

impl From<Schedule> for TimelineSummary {
    fn from(schedule: Schedule) -> Self {
        Self {
            start_date: schedule.start_date,
            finish_date: schedule.finish_date,
            duration_days: schedule.total_duration_days,
            critical_path: schedule.critical_path.clone(),
            schedule,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeTimelineResult {
    pub project_id: String,
    pub goals: Vec<ObjectiveKind>,
    pub original_timeline: TimelineSummary,
    pub optimized_timeline: TimelineSummary,
    pub improvements: Improvements,
    /// Resource overlay of the optimized timeline.
    pub resource_analysis: ResourceAnalysis,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeCriticalPathResult {
    pub project_id: String,
    pub schedule: Schedule,
    pub metadata: CriticalPathMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub float_analysis: Option<FloatAnalysis>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeDeliveryResult {
    pub per_project_results: Vec<ProjectScheduleResult>,
    pub portfolio_summary: PortfolioSummary,
    /// Projects excluded from the schedule, with their errors.
    pub failures: Vec<ProjectFailure>,
    pub score: CandidateScore,
    pub candidates_evaluated: usize,
}

/// Stateless scheduling engine over an injected store.
pub struct SchedulingEngine<'a, S: ProjectStore + ?Sized> {
    store: &'a S,
    config: EngineConfig,
    cancel: CancellationToken,
}

impl<'a, S: ProjectStore + ?Sized> SchedulingEngine<'a, S> {
    pub fn new(store: &'a S, config: EngineConfig) -> Self {
        Self {
            store,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Observe `token` instead of a private one.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Handle that cancels requests running on this engine.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn analyzer(&self) -> CriticalPathAnalyzer {
        CriticalPathAnalyzer::new(self.config.max_critical_chains, self.config.verbosity)
    }

    fn load_project(&self, project_id: &str) -> Result<ProjectInfo> {
        self.store
            .load_project(project_id)
            .map_err(|e| EngineError::from_storage(project_id, e))
    }

    fn load_demands(
        &self,
        graph: &TaskGraph,
        window: &TimeRange,
        capacities: &mut CapacityTable,
    ) -> Result<DemandTable> {
        let project_id = graph.project_id();
        let assignments = self
            .store
            .load_resource_assignments(AssignmentScope::Project(project_id), window)
            .map_err(|e| EngineError::from_storage(project_id, e))?;
        let demands = DemandTable::build(graph, &assignments);
        capacities.load(self.store, project_id, &demands.resource_ids())?;
        Ok(demands)
    }

    /// Compare a project's current timeline with an optimized one.
    pub fn optimize_project_timeline(
        &self,
        params: &OptimizeTimelineParams,
    ) -> Result<OptimizeTimelineResult> {
        let verbosity = self.config.verbosity;
        let goals = if params.optimization_goals.is_empty() {
            DEFAULT_TIMELINE_GOALS.to_vec()
        } else {
            dedup_goals(&params.optimization_goals)
        };

        self.cancel.check(Stage::Build)?;
        let info = self.load_project(&params.project_id)?;
        let window = resolve_window(params.time_range, &info)?;
        let graph = TaskGraph::load(self.store, &info.id, &window)?;

        self.cancel.check(Stage::Resolve)?;
        let mut capacities = CapacityTable::default();
        let demands = self.load_demands(&graph, &window, &mut capacities)?;

        self.cancel.check(Stage::Optimize)?;
        let analyzer = self.analyzer();
        let outcome = TimelineOptimizer::new(
            &graph,
            &demands,
            &capacities,
            &analyzer,
            &self.config.optimizer,
            &self.cancel,
            info.start_date,
            verbosity,
        )
        .with_target(info.target())
        .optimize(&goals, planned_releases(&graph, info.start_date))?;

        let resource_analysis = ResourceResolver::new(&demands, &capacities, verbosity).analyze(
            &graph,
            &outcome.optimized,
            &window,
            None,
        );

        log_changes!(
            verbosity,
            project = %info.id,
            duration_before = outcome.original.total_duration_days,
            duration_after = outcome.optimized.total_duration_days,
            moves = outcome.improvements.moves.len(),
            "timeline optimized"
        );

        Ok(OptimizeTimelineResult {
            project_id: info.id,
            goals,
            original_timeline: outcome.original.into(),
            optimized_timeline: outcome.optimized.into(),
            improvements: outcome.improvements,
            resource_analysis,
        })
    }

    /// CPM schedule of a project from its dependencies alone.
    pub fn analyze_critical_path(
        &self,
        params: &AnalyzeCriticalPathParams,
    ) -> Result<AnalyzeCriticalPathResult> {
        if params.risk_threshold < 0 {
            return Err(EngineError::InvalidRequest(format!(
                "risk threshold must not be negative, got {}",
                params.risk_threshold
            )));
        }

        self.cancel.check(Stage::Build)?;
        let info = self.load_project(&params.project_id)?;
        let window = resolve_window(params.time_range, &info)?;
        let graph = TaskGraph::load(self.store, &info.id, &window)?;

        self.cancel.check(Stage::Analyze)?;
        let schedule = self
            .analyzer()
            .analyze(&graph, info.start_date, params.deadline);
        if let Some(infeasible) = &schedule.infeasibility {
            log_checks!(self.config.verbosity, project = %info.id, "{infeasible}");
        }

        Ok(AnalyzeCriticalPathResult {
            project_id: info.id,
            metadata: metadata(&schedule),
            float_analysis: params
                .include_float_analysis
                .then(|| float_analysis(&schedule, params.risk_threshold)),
            schedule,
        })
    }

    /// Schedule several projects against shared resources.
    ///
    /// Projects whose graph cannot be built, or that do not exist, are left
    /// out and reported in `failures`; any other error fails the request.
    pub fn optimize_delivery_schedule(
        &self,
        params: &OptimizeDeliveryParams,
    ) -> Result<OptimizeDeliveryResult> {
        let objectives = if params.optimization_objectives.is_empty() {
            vec![
                OptimizationObjective::new(ObjectiveKind::MinimizeTotalDelay, 1.0),
                OptimizationObjective::new(ObjectiveKind::MaximizePriorityAdherence, 1.0),
            ]
        } else {
            params.optimization_objectives.clone()
        };
        let weights = ObjectiveWeights::normalize(&objectives)?;
        if let Some(range) = &params.time_range {
            if range.is_empty() {
                return Err(empty_range(range));
            }
        }

        let mut project_ids: Vec<&str> = Vec::with_capacity(params.project_ids.len());
        for id in &params.project_ids {
            if !project_ids.contains(&id.as_str()) {
                project_ids.push(id);
            }
        }

        self.cancel.check(Stage::Build)?;
        let analyzer = self.analyzer();
        let outcomes = self.prepare_all(&project_ids, params.time_range, &analyzer);

        let mut prepared = Vec::new();
        let mut capacities = CapacityTable::default();
        let mut failures = Vec::new();
        for (project_id, outcome) in project_ids.iter().zip(outcomes) {
            match outcome {
                Ok((project, project_capacities)) => {
                    capacities.merge(project_capacities);
                    prepared.push(project);
                }
                Err(error) if error.is_project_scoped() => {
                    tracing::warn!(project = %project_id, %error, "project excluded from portfolio");
                    failures.push(ProjectFailure {
                        project_id: project_id.to_string(),
                        error,
                    });
                }
                Err(error) => return Err(error),
            }
        }

        let window = params.time_range.unwrap_or_else(|| {
            let start = prepared.iter().map(|p| p.info.start_date).min();
            let end = prepared.iter().map(|p| p.info.end_date).max();
            match (start, end) {
                (Some(start), Some(end)) => TimeRange::new(start, end),
                _ => TimeRange::new(NaiveDate::MIN, NaiveDate::MAX),
            }
        });

        let plan = PortfolioScheduler::new(
            &capacities,
            &analyzer,
            &self.config.optimizer,
            &self.config.portfolio,
            &self.cancel,
            self.config.verbosity,
        )
        .schedule(&prepared, &weights, &window)?;

        let portfolio_summary = summarize(&plan.results, failures.len());
        log_changes!(
            self.config.verbosity,
            projects = portfolio_summary.total_projects,
            delayed = portfolio_summary.delayed_projects,
            failed = portfolio_summary.failed_projects,
            "portfolio scheduled"
        );

        Ok(OptimizeDeliveryResult {
            per_project_results: plan.results,
            portfolio_summary,
            failures,
            score: plan.score,
            candidates_evaluated: plan.candidates_evaluated,
        })
    }

    /// Load and analyze every project, on worker threads when enabled.
    fn prepare_all(
        &self,
        project_ids: &[&str],
        range: Option<TimeRange>,
        analyzer: &CriticalPathAnalyzer,
    ) -> Vec<Result<(PreparedProject, CapacityTable)>> {
        if !self.config.parallel_analysis || project_ids.len() < 2 {
            return project_ids
                .iter()
                .map(|id| self.prepare(id, range, analyzer))
                .collect();
        }

        std::thread::scope(|scope| {
            let handles: Vec<_> = project_ids
                .iter()
                .map(|&id| scope.spawn(move || self.prepare(id, range, analyzer)))
                .collect();
            handles
                .into_iter()
                .map(|handle| {
                    handle
                        .join()
                        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
                })
                .collect()
        })
    }

    fn prepare(
        &self,
        project_id: &str,
        range: Option<TimeRange>,
        analyzer: &CriticalPathAnalyzer,
    ) -> Result<(PreparedProject, CapacityTable)> {
        self.cancel.check(Stage::Build)?;
        let info = self.load_project(project_id)?;
        let window = resolve_window(range, &info)?;
        let graph = TaskGraph::load(self.store, &info.id, &window)?;

        self.cancel.check(Stage::Resolve)?;
        let mut capacities = CapacityTable::default();
        let demands = self.load_demands(&graph, &window, &mut capacities)?;

        self.cancel.check(Stage::Analyze)?;
        Ok((
            PreparedProject::new(info, graph, demands, analyzer),
            capacities,
        ))
    }
}

fn resolve_window(range: Option<TimeRange>, info: &ProjectInfo) -> Result<TimeRange> {
    match range {
        Some(range) if range.is_empty() => Err(empty_range(&range)),
        Some(range) => Ok(range),
        None => Ok(info.window()),
    }
}

fn empty_range(range: &TimeRange) -> EngineError {
    EngineError::InvalidRequest(format!(
        "time range {} .. {} is empty",
        range.start, range.end
    ))
}

fn dedup_goals(goals: &[ObjectiveKind]) -> Vec<ObjectiveKind> {
    let mut unique = Vec::with_capacity(goals.len());
    for goal in goals {
        if !unique.contains(goal) {
            unique.push(*goal);
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ResourceAssignment, Task};
    use crate::objectives::parse_goals;
    use crate::storage::InMemoryStore;
    use chrono::Days;

    fn jan(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, day).unwrap()
    }

    fn project(id: &str, priority: i32, target: Option<NaiveDate>) -> ProjectInfo {
        ProjectInfo {
            id: id.to_string(),
            name: format!("Project {id}"),
            start_date: jan(1),
            end_date: jan(31),
            priority,
            target_date: target,
        }
    }

    fn hours(resource: &str, task: &str, allocated_hours: f64) -> ResourceAssignment {
        ResourceAssignment {
            resource_id: resource.to_string(),
            task_id: task.to_string(),
            allocated_hours,
        }
    }

    fn analyze_params(project_id: &str) -> AnalyzeCriticalPathParams {
        AnalyzeCriticalPathParams {
            project_id: project_id.to_string(),
            include_float_analysis: false,
            risk_threshold: DEFAULT_RISK_THRESHOLD,
            deadline: None,
            time_range: None,
        }
    }

    fn delivery_params(ids: &[&str]) -> OptimizeDeliveryParams {
        OptimizeDeliveryParams {
            project_ids: ids.iter().map(|s| s.to_string()).collect(),
            time_range: None,
            optimization_objectives: Vec::new(),
        }
    }

    /// Two projects contending for alice; a outranks b.
    fn contested_store() -> InMemoryStore {
        let mut store = InMemoryStore::new();
        store.insert_project(project("a", 10, Some(jan(4))), vec![Task::new("a1", 3)]);
        store.insert_project(project("b", 5, Some(jan(3))), vec![Task::new("b1", 2)]);
        store.add_assignment("a", hours("alice", "a1", 24.0));
        store.add_assignment("b", hours("alice", "b1", 16.0));
        store.set_capacity("alice", 8.0);
        store
    }

    #[test]
    fn test_linear_chain_metadata() {
        let mut store = InMemoryStore::new();
        let tasks = (0..5)
            .map(|i| {
                let task = Task::new(&format!("t{i}"), 2);
                if i == 0 {
                    task
                } else {
                    task.after(&format!("t{}", i - 1))
                }
            })
            .collect();
        store.insert_project(project("p", 0, None), tasks);

        let engine = SchedulingEngine::new(&store, EngineConfig::default());
        let result = engine.analyze_critical_path(&analyze_params("p")).unwrap();

        assert_eq!(result.metadata.total_tasks, 5);
        assert_eq!(result.metadata.critical_tasks_count, 5);
        assert_eq!(result.metadata.average_float, 0.0);
        assert_eq!(result.metadata.project_duration_days, 10);
        assert!(result.float_analysis.is_none());
    }

    #[test]
    fn test_cycle_is_reported_not_looped() {
        let mut store = InMemoryStore::new();
        store.insert_project(
            project("p", 0, None),
            vec![Task::new("a", 1).after("b"), Task::new("b", 1).after("a")],
        );

        let engine = SchedulingEngine::new(&store, EngineConfig::default());
        let err = engine.analyze_critical_path(&analyze_params("p")).unwrap_err();
        match err {
            EngineError::CyclicDependency { project_id, cycle } => {
                assert_eq!(project_id, "p");
                assert!(cycle.contains(&"a".to_string()));
                assert!(cycle.contains(&"b".to_string()));
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_project_and_dependency() {
        let mut store = InMemoryStore::new();
        store.insert_project(project("p", 0, None), vec![Task::new("a", 1).after("ghost")]);
        let engine = SchedulingEngine::new(&store, EngineConfig::default());

        assert_eq!(
            engine.analyze_critical_path(&analyze_params("nope")).unwrap_err(),
            EngineError::ProjectNotFound {
                project_id: "nope".to_string()
            }
        );
        assert!(matches!(
            engine.analyze_critical_path(&analyze_params("p")).unwrap_err(),
            EngineError::UnknownDependency { ref dependency_id, .. } if dependency_id == "ghost"
        ));
    }

    #[test]
    fn test_time_range_excluding_predecessor() {
        let march = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let mut store = InMemoryStore::new();
        let mut info = project("p", 0, None);
        info.end_date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        store.insert_project(
            info,
            vec![
                Task::new("early", 3).planned_at(jan(1)),
                Task::new("late", 2).after("early").planned_at(march),
            ],
        );
        let engine = SchedulingEngine::new(&store, EngineConfig::default());

        let mut params = analyze_params("p");
        params.time_range = Some(TimeRange::new(
            NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
        ));
        let result = engine.analyze_critical_path(&params).unwrap();
        assert_eq!(result.metadata.total_tasks, 1);
        assert_eq!(result.schedule.critical_path, vec!["late"]);
    }

    #[test]
    fn test_float_analysis_and_deadline() {
        let mut store = InMemoryStore::new();
        store.insert_project(
            project("p", 0, None),
            vec![
                Task::new("a", 5),
                Task::new("b", 3),
                Task::new("c", 2).after("a").after("b"),
            ],
        );
        let engine = SchedulingEngine::new(&store, EngineConfig::default());

        let mut params = analyze_params("p");
        params.include_float_analysis = true;
        let result = engine.analyze_critical_path(&params).unwrap();
        let analysis = result.float_analysis.unwrap();
        assert_eq!(analysis.near_critical_tasks, vec!["b"]);
        assert_eq!(analysis.risk_threshold, DEFAULT_RISK_THRESHOLD);

        params.deadline = Some(jan(6));
        let result = engine.analyze_critical_path(&params).unwrap();
        let infeasible = result.schedule.infeasibility.unwrap();
        assert_eq!(infeasible.shortfall_days, 2);
        assert_eq!(result.float_analysis.unwrap().infeasible_tasks.len(), 2);
    }

    #[test]
    fn test_analysis_is_bit_identical_across_runs() {
        let store = contested_store();
        let engine = SchedulingEngine::new(&store, EngineConfig::default());
        let first = engine.analyze_critical_path(&analyze_params("a")).unwrap();
        let second = engine.analyze_critical_path(&analyze_params("a")).unwrap();
        assert_eq!(first.schedule, second.schedule);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_optimize_timeline_levels_resources() {
        let mut store = InMemoryStore::new();
        store.insert_project(
            project("p", 0, None),
            vec![Task::new("a", 2), Task::new("b", 2), Task::new("c", 4)],
        );
        store.add_assignment("p", hours("alice", "a", 12.0));
        store.add_assignment("p", hours("alice", "b", 12.0));
        store.set_capacity("alice", 8.0);
        let engine = SchedulingEngine::new(&store, EngineConfig::default());

        let params = OptimizeTimelineParams {
            project_id: "p".to_string(),
            time_range: None,
            optimization_goals: parse_goals(&["minimize_duration", "minimize_resource_conflicts"])
                .unwrap(),
        };
        let result = engine.optimize_project_timeline(&params).unwrap();

        assert_eq!(result.original_timeline.duration_days, 4);
        assert_eq!(result.optimized_timeline.duration_days, 4);
        assert_eq!(result.improvements.duration_reduction, 0);
        assert!(!result.resource_analysis.has_conflicts());
        assert_eq!(result.improvements.conflicts_resolved, 2);
    }

    #[test]
    fn test_optimize_timeline_pulls_planned_work() {
        let mut store = InMemoryStore::new();
        store.insert_project(
            project("p", 0, None),
            vec![
                Task::new("design", 4),
                Task::new("docs", 2).planned_at(jan(1) + Days::new(6)),
            ],
        );
        let engine = SchedulingEngine::new(&store, EngineConfig::default());

        let params = OptimizeTimelineParams {
            project_id: "p".to_string(),
            time_range: None,
            optimization_goals: vec![ObjectiveKind::MinimizeDuration],
        };
        let result = engine.optimize_project_timeline(&params).unwrap();
        assert_eq!(result.original_timeline.duration_days, 8);
        assert_eq!(result.optimized_timeline.duration_days, 4);
        assert_eq!(result.improvements.duration_reduction, 4);
        assert_eq!(result.optimized_timeline.critical_path, vec!["design"]);
    }

    #[test]
    fn test_missing_capacity_fails_the_stage() {
        let mut store = InMemoryStore::new();
        store.insert_project(project("p", 0, None), vec![Task::new("a", 2)]);
        store.add_assignment("p", hours("zed", "a", 4.0));
        let engine = SchedulingEngine::new(&store, EngineConfig::default());

        let params = OptimizeTimelineParams {
            project_id: "p".to_string(),
            time_range: None,
            optimization_goals: Vec::new(),
        };
        assert!(matches!(
            engine.optimize_project_timeline(&params).unwrap_err(),
            EngineError::ResourceDataUnavailable { ref resource_id, .. } if resource_id == "zed"
        ));
    }

    #[test]
    fn test_empty_time_range_rejected() {
        let store = contested_store();
        let engine = SchedulingEngine::new(&store, EngineConfig::default());
        let mut params = analyze_params("a");
        params.time_range = Some(TimeRange::new(jan(5), jan(5)));
        assert!(matches!(
            engine.analyze_critical_path(&params).unwrap_err(),
            EngineError::InvalidRequest(_)
        ));
    }

    #[test]
    fn test_portfolio_delays_lower_priority() {
        let store = contested_store();
        let engine = SchedulingEngine::new(&store, EngineConfig::default());
        let result = engine
            .optimize_delivery_schedule(&delivery_params(&["b", "a"]))
            .unwrap();

        let a = &result.per_project_results[0];
        let b = &result.per_project_results[1];
        assert_eq!(a.project_id, "a");
        assert!(a.on_time);
        assert_eq!(b.project_id, "b");
        assert_eq!(b.delay_days, 3);
        assert_eq!(result.portfolio_summary.delayed_projects, 1);
        assert_eq!(result.portfolio_summary.average_delay, 3.0);
    }

    #[test]
    fn test_portfolio_keeps_priority_under_delay_objective() {
        let mut store = InMemoryStore::new();
        store.insert_project(project("a", 10, Some(jan(31))), vec![Task::new("a1", 2)]);
        store.insert_project(project("b", 5, Some(jan(3))), vec![Task::new("b1", 2)]);
        store.add_assignment("a", hours("alice", "a1", 16.0));
        store.add_assignment("b", hours("alice", "b1", 16.0));
        store.set_capacity("alice", 8.0);
        let engine = SchedulingEngine::new(&store, EngineConfig::default());

        let mut params = delivery_params(&["a", "b"]);
        params.optimization_objectives =
            vec![OptimizationObjective::new(ObjectiveKind::MinimizeTotalDelay, 1.0)];
        let result = engine.optimize_delivery_schedule(&params).unwrap();

        let a = &result.per_project_results[0];
        assert_eq!((a.project_id.as_str(), a.sequence), ("a", 0));
        assert_eq!(a.schedule.start_date, jan(1));
        assert_eq!(a.shift_days, 0);
        let b = &result.per_project_results[1];
        assert_eq!(b.project_id, "b");
        assert_eq!(b.schedule.start_date, jan(3));
        assert!(!b.on_time);
    }

    #[test]
    fn test_portfolio_isolates_broken_projects() {
        let mut store = contested_store();
        store.insert_project(
            project("loop", 1, None),
            vec![Task::new("x", 1).after("y"), Task::new("y", 1).after("x")],
        );

        let mut config = EngineConfig::default();
        config.parallel_analysis = false;
        let engine = SchedulingEngine::new(&store, config);
        let result = engine
            .optimize_delivery_schedule(&delivery_params(&["a", "loop", "missing", "b"]))
            .unwrap();

        assert_eq!(result.per_project_results.len(), 2);
        assert_eq!(result.failures.len(), 2);
        assert!(matches!(
            result.failures[0].error,
            EngineError::CyclicDependency { .. }
        ));
        assert!(matches!(
            result.failures[1].error,
            EngineError::ProjectNotFound { .. }
        ));
        let summary = &result.portfolio_summary;
        assert_eq!(summary.total_projects, 2);
        assert_eq!(summary.failed_projects, 2);
        assert_eq!(
            summary.on_time_projects + summary.delayed_projects,
            summary.total_projects
        );
    }

    #[test]
    fn test_portfolio_single_project_on_time() {
        let mut store = InMemoryStore::new();
        store.insert_project(
            project("solo", 3, Some(jan(20))),
            vec![Task::new("t1", 3), Task::new("t2", 2).after("t1")],
        );
        store.add_assignment("solo", hours("alice", "t1", 12.0));
        store.set_capacity("alice", 8.0);
        let engine = SchedulingEngine::new(&store, EngineConfig::default());

        let result = engine
            .optimize_delivery_schedule(&delivery_params(&["solo"]))
            .unwrap();
        assert_eq!(result.portfolio_summary.total_projects, 1);
        assert_eq!(result.portfolio_summary.delayed_projects, 0);
        assert_eq!(result.portfolio_summary.average_delay, 0.0);
        assert!(result.failures.is_empty());
    }

    #[test]
    fn test_parallel_and_sequential_preparation_agree() {
        let store = contested_store();
        let parallel = SchedulingEngine::new(&store, EngineConfig::default())
            .optimize_delivery_schedule(&delivery_params(&["a", "b"]))
            .unwrap();
        let mut config = EngineConfig::default();
        config.parallel_analysis = false;
        let sequential = SchedulingEngine::new(&store, config)
            .optimize_delivery_schedule(&delivery_params(&["a", "b"]))
            .unwrap();
        assert_eq!(
            serde_json::to_value(&parallel).unwrap(),
            serde_json::to_value(&sequential).unwrap()
        );
    }

    #[test]
    fn test_invalid_weight_rejected() {
        let store = contested_store();
        let engine = SchedulingEngine::new(&store, EngineConfig::default());
        let mut params = delivery_params(&["a"]);
        params.optimization_objectives =
            vec![OptimizationObjective::new(ObjectiveKind::MinimizeDuration, -1.0)];
        assert!(matches!(
            engine.optimize_delivery_schedule(&params).unwrap_err(),
            EngineError::InvalidRequest(_)
        ));
    }

    #[test]
    fn test_cancelled_request() {
        let store = contested_store();
        let engine = SchedulingEngine::new(&store, EngineConfig::default());
        engine.cancellation_token().cancel();
        assert_eq!(
            engine.analyze_critical_path(&analyze_params("a")).unwrap_err(),
            EngineError::Cancelled { stage: Stage::Build }
        );
        assert!(matches!(
            engine.optimize_delivery_schedule(&delivery_params(&["a", "b"])),
            Err(EngineError::Cancelled { .. })
        ));
    }

    #[test]
    fn test_params_wire_shape() {
        let params: OptimizeTimelineParams = serde_json::from_str(
            r#"{"projectId": "p", "optimizationGoals": ["minimize_duration"]}"#,
        )
        .unwrap();
        assert_eq!(params.optimization_goals, vec![ObjectiveKind::MinimizeDuration]);

        let bad = serde_json::from_str::<OptimizeTimelineParams>(
            r#"{"projectId": "p", "optimizationGoals": ["go_fast"]}"#,
        );
        assert!(bad.is_err());

        let params: AnalyzeCriticalPathParams =
            serde_json::from_str(r#"{"projectId": "p", "includeFloatAnalysis": true}"#).unwrap();
        assert_eq!(params.risk_threshold, DEFAULT_RISK_THRESHOLD);

        let store = contested_store();
        let engine = SchedulingEngine::new(&store, EngineConfig::default());
        let json = serde_json::to_value(engine.analyze_critical_path(&analyze_params("a")).unwrap())
            .unwrap();
        assert_eq!(json["metadata"]["criticalTasksCount"], 1);
        assert!(json.get("floatAnalysis").is_none());
    }
}
