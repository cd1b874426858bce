//! Portfolio scheduling.
//!
//! Projects are placed one after another onto shared resource timelines, in
//! descending priority, so earlier projects get first claim on contested
//! capacity. Each project runs the timeline optimizer against the claims made
//! before it. Projects of equal priority may go in either order, so a handful
//! of alternative orderings (adjacent swaps within a priority level) are
//! scored with the normalized objective weights and the cheapest one is kept.
//! A lower-priority project never goes ahead of a higher-priority one.

mod scoring;
mod summary;

use chrono::NaiveDate;
use serde::Serialize;

use crate::cancel::{CancellationToken, Stage};
use crate::config::{OptimizerConfig, PortfolioConfig};
use crate::critical_path::CriticalPathAnalyzer;
use crate::error::{EngineError, Result};
use crate::graph::TaskGraph;
use crate::models::{days_between, ProjectInfo, Schedule, TimeRange};
use crate::objectives::{ObjectiveKind, ObjectiveWeights};
use crate::optimizer::{planned_releases, Improvements, OptimizationOutcome, TimelineOptimizer};
use crate::resources::{CapacityTable, DemandTable, ResourceAnalysis, ResourceLedger, ResourceResolver};
use crate::{log_changes, log_checks};

pub use scoring::{score_candidate, CandidateScore, ProjectFigures};
pub use summary::summarize;

/// A project that passed graph building and analysis.
#[derive(Clone, Debug)]
pub struct PreparedProject {
    pub info: ProjectInfo,
    pub graph: TaskGraph,
    pub demands: DemandTable,
    /// Release offsets from planned starts.
    pub releases: Vec<i64>,
    /// Timeline with no other project competing for resources.
    pub baseline: Schedule,
}

impl PreparedProject {
    pub fn new(
        info: ProjectInfo,
        graph: TaskGraph,
        demands: DemandTable,
        analyzer: &CriticalPathAnalyzer,
    ) -> Self {
        let releases = planned_releases(&graph, info.start_date);
        let baseline = analyzer.analyze_with_releases(&graph, info.start_date, &releases);
        Self {
            info,
            graph,
            demands,
            releases,
            baseline,
        }
    }

    fn demand_hours(&self) -> f64 {
        (0..self.graph.len())
            .map(|idx| {
                let days = self.graph.duration(idx) as f64;
                self.demands
                    .for_task(idx)
                    .iter()
                    .map(|d| d.hours_per_day * days)
                    .sum::<f64>()
            })
            .sum()
    }
}

/// Outcome for one scheduled project.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectScheduleResult {
    pub project_id: String,
    pub priority: i32,
    /// Position in the placement order.
    pub sequence: usize,
    pub target_date: NaiveDate,
    pub baseline_finish: NaiveDate,
    pub schedule: Schedule,
    /// Days past the target date.
    pub delay_days: i64,
    /// Days the finish moved because of claims by earlier projects.
    pub shift_days: i64,
    pub on_time: bool,
    pub improvements: Improvements,
    pub resource_analysis: ResourceAnalysis,
}

/// A project excluded from the portfolio with the error that excluded it.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectFailure {
    pub project_id: String,
    pub error: EngineError,
}

/// The chosen cross-project schedule.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioPlan {
    /// Results in placement order.
    pub results: Vec<ProjectScheduleResult>,
    pub score: CandidateScore,
    pub candidates_evaluated: usize,
}

struct Pass {
    placed: Vec<(usize, OptimizationOutcome)>,
    score: CandidateScore,
}

/// Schedules a set of prepared projects against shared capacity.
pub struct PortfolioScheduler<'a> {
    capacities: &'a CapacityTable,
    analyzer: &'a CriticalPathAnalyzer,
    optimizer_config: &'a OptimizerConfig,
    config: &'a PortfolioConfig,
    cancel: &'a CancellationToken,
    verbosity: u8,
}

impl<'a> PortfolioScheduler<'a> {
    pub fn new(
        capacities: &'a CapacityTable,
        analyzer: &'a CriticalPathAnalyzer,
        optimizer_config: &'a OptimizerConfig,
        config: &'a PortfolioConfig,
        cancel: &'a CancellationToken,
        verbosity: u8,
    ) -> Self {
        Self {
            capacities,
            analyzer,
            optimizer_config,
            config,
            cancel,
            verbosity,
        }
    }

    pub fn schedule(
        &self,
        projects: &[PreparedProject],
        weights: &ObjectiveWeights,
        window: &TimeRange,
    ) -> Result<PortfolioPlan> {
        self.cancel.check(Stage::Portfolio)?;
        let goals = weights.ranked_goals();
        let epoch = projects
            .iter()
            .map(|p| p.info.start_date)
            .min()
            .unwrap_or(window.start);

        let orders = candidate_orders(projects, self.config.max_candidates);
        let candidates_evaluated = orders.len();
        let mut best: Option<Pass> = None;
        for order in &orders {
            let pass = self.run_pass(projects, order, &goals, weights, epoch)?;
            log_checks!(
                self.verbosity,
                order = ?order.iter().map(|&i| projects[i].info.id.as_str()).collect::<Vec<_>>(),
                score = pass.score.total,
                "portfolio candidate"
            );
            // Ties keep the earlier candidate
            let better = best
                .as_ref()
                .map_or(true, |b| pass.score.total + 1e-9 < b.score.total);
            if better {
                best = Some(pass);
            }
        }

        let Some(pass) = best else {
            return Ok(PortfolioPlan {
                results: Vec::new(),
                score: CandidateScore::default(),
                candidates_evaluated,
            });
        };

        Ok(PortfolioPlan {
            score: pass.score.clone(),
            results: self.results(projects, pass, window),
            candidates_evaluated,
        })
    }

    /// Greedy placement of projects in `order`.
    fn run_pass(
        &self,
        projects: &[PreparedProject],
        order: &[usize],
        goals: &[ObjectiveKind],
        weights: &ObjectiveWeights,
        epoch: NaiveDate,
    ) -> Result<Pass> {
        let mut ledger = ResourceLedger::new();
        let mut placed = Vec::with_capacity(order.len());
        let mut figures = Vec::with_capacity(order.len());

        for &i in order {
            self.cancel.check(Stage::Portfolio)?;
            let project = &projects[i];
            let outcome = TimelineOptimizer::new(
                &project.graph,
                &project.demands,
                self.capacities,
                self.analyzer,
                self.optimizer_config,
                self.cancel,
                project.info.start_date,
                self.verbosity,
            )
            .with_target(project.info.target())
            .with_claims(&ledger, self.config.delay_to_resolve_conflicts)
            .optimize(goals, project.releases.clone())?;

            ResourceResolver::new(&project.demands, self.capacities, self.verbosity).claim(
                &mut ledger,
                &project.graph,
                &outcome.optimized,
            );

            let optimized = &outcome.optimized;
            figures.push(ProjectFigures {
                priority: project.info.priority,
                delay_days: days_between(project.info.target(), optimized.finish_date).max(0),
                shift_days: days_between(project.baseline.finish_date, optimized.finish_date).max(0),
                start: days_between(epoch, optimized.start_date),
                finish: days_between(epoch, optimized.finish_date),
                baseline_start: days_between(epoch, project.baseline.start_date),
                baseline_finish: days_between(epoch, project.baseline.finish_date),
                excess_hours: outcome.optimized_metrics.excess_hours,
                demand_hours: project.demand_hours(),
                utilization: outcome.optimized_metrics.utilization,
            });
            placed.push((i, outcome));
        }

        Ok(Pass {
            placed,
            score: score_candidate(&figures, weights),
        })
    }

    fn results(
        &self,
        projects: &[PreparedProject],
        pass: Pass,
        window: &TimeRange,
    ) -> Vec<ProjectScheduleResult> {
        // Each project is analyzed against the final claims of all the others
        let analyses: Vec<ResourceAnalysis> = pass
            .placed
            .iter()
            .map(|(i, outcome)| {
                let mut others = ResourceLedger::new();
                for (j, other) in pass.placed.iter().filter(|(j, _)| j != i) {
                    let project = &projects[*j];
                    ResourceResolver::new(&project.demands, self.capacities, self.verbosity)
                        .claim(&mut others, &project.graph, &other.optimized);
                }
                let project = &projects[*i];
                ResourceResolver::new(&project.demands, self.capacities, self.verbosity).analyze(
                    &project.graph,
                    &outcome.optimized,
                    window,
                    Some(&others),
                )
            })
            .collect();

        pass.placed
            .into_iter()
            .zip(analyses)
            .enumerate()
            .map(|(sequence, ((i, outcome), resource_analysis))| {
                let project = &projects[i];
                let target_date = project.info.target();
                let finish = outcome.optimized.finish_date;
                let delay_days = days_between(target_date, finish).max(0);
                let shift_days = days_between(project.baseline.finish_date, finish).max(0);
                log_changes!(
                    self.verbosity,
                    project = %project.info.id,
                    sequence,
                    finish = %finish,
                    delay_days,
                    shift_days,
                    "portfolio placement"
                );
                ProjectScheduleResult {
                    project_id: project.info.id.clone(),
                    priority: project.info.priority,
                    sequence,
                    target_date,
                    baseline_finish: project.baseline.finish_date,
                    schedule: outcome.optimized,
                    delay_days,
                    shift_days,
                    on_time: finish <= target_date,
                    improvements: outcome.improvements,
                    resource_analysis,
                }
            })
            .collect()
    }
}

/// Baseline priority order (highest first, ties by id) followed by its
/// adjacent swaps of equal-priority projects, at most `max_candidates`
/// orders in total.
fn candidate_orders(projects: &[PreparedProject], max_candidates: usize) -> Vec<Vec<usize>> {
    let mut baseline: Vec<usize> = (0..projects.len()).collect();
    baseline.sort_by(|&a, &b| {
        let (a, b) = (&projects[a].info, &projects[b].info);
        b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id))
    });

    let limit = max_candidates.max(1);
    let mut orders = vec![baseline.clone()];
    for i in 0..baseline.len().saturating_sub(1) {
        if orders.len() >= limit {
            break;
        }
        if projects[baseline[i]].info.priority != projects[baseline[i + 1]].info.priority {
            continue;
        }
        let mut swapped = baseline.clone();
        swapped.swap(i, i + 1);
        orders.push(swapped);
    }
    orders
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ResourceAssignment, Task};
    use crate::objectives::OptimizationObjective;
    use chrono::Days;

    fn jan(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, day).unwrap()
    }

    fn info(id: &str, priority: i32, target: NaiveDate) -> ProjectInfo {
        ProjectInfo {
            id: id.to_string(),
            name: id.to_string(),
            start_date: jan(1),
            end_date: jan(31),
            priority,
            target_date: Some(target),
        }
    }

    fn prepared(info: ProjectInfo, tasks: Vec<Task>, hours: &[(&str, f64)]) -> PreparedProject {
        let graph = TaskGraph::build(&info.id, tasks, &[]).unwrap();
        let rows: Vec<ResourceAssignment> = hours
            .iter()
            .map(|(task, h)| ResourceAssignment {
                resource_id: "alice".to_string(),
                task_id: task.to_string(),
                allocated_hours: *h,
            })
            .collect();
        let demands = DemandTable::build(&graph, &rows);
        PreparedProject::new(info, graph, demands, &CriticalPathAnalyzer::new(8, 0))
    }

    struct Harness {
        capacities: CapacityTable,
        analyzer: CriticalPathAnalyzer,
        optimizer: OptimizerConfig,
        portfolio: PortfolioConfig,
        cancel: CancellationToken,
    }

    impl Harness {
        fn new() -> Self {
            let mut capacities = CapacityTable::default();
            capacities.insert("alice", 8.0);
            Self {
                capacities,
                analyzer: CriticalPathAnalyzer::new(8, 0),
                optimizer: OptimizerConfig::default(),
                portfolio: PortfolioConfig::default(),
                cancel: CancellationToken::new(),
            }
        }

        fn run(&self, projects: &[PreparedProject]) -> PortfolioPlan {
            self.run_with(projects, &ObjectiveWeights::default_portfolio())
        }

        fn run_with(&self, projects: &[PreparedProject], weights: &ObjectiveWeights) -> PortfolioPlan {
            PortfolioScheduler::new(
                &self.capacities,
                &self.analyzer,
                &self.optimizer,
                &self.portfolio,
                &self.cancel,
                0,
            )
            .schedule(projects, weights, &TimeRange::new(jan(1), jan(31)))
            .unwrap()
        }
    }

    fn contested() -> Vec<PreparedProject> {
        vec![
            prepared(info("b", 5, jan(3)), vec![Task::new("b1", 2)], &[("b1", 16.0)]),
            prepared(info("a", 10, jan(4)), vec![Task::new("a1", 3)], &[("a1", 24.0)]),
        ]
    }

    #[test]
    fn test_lower_priority_project_is_delayed() {
        let harness = Harness::new();
        let plan = harness.run(&contested());

        let a = &plan.results[0];
        let b = &plan.results[1];
        assert_eq!((a.project_id.as_str(), a.sequence), ("a", 0));
        assert!(a.on_time);
        assert_eq!(a.delay_days, 0);
        assert_eq!(a.schedule.start_date, jan(1));

        assert_eq!(b.project_id, "b");
        assert!(!b.on_time);
        assert_eq!(b.schedule.start_date, jan(4));
        assert_eq!(b.delay_days, 3);
        assert_eq!(b.shift_days, 3);
        assert!(!b.resource_analysis.has_conflicts());
        assert_eq!(plan.candidates_evaluated, 1);

        let summary = summarize(&plan.results, 0);
        assert_eq!(summary.delayed_projects, 1);
        assert_eq!(summary.on_time_projects, 1);
        assert_eq!(summary.average_delay, 3.0);
    }

    #[test]
    fn test_delay_weight_cannot_reorder_priorities() {
        // a has slack to spare and b does not, but a still goes first
        let projects = vec![
            prepared(info("b", 5, jan(3)), vec![Task::new("b1", 2)], &[("b1", 16.0)]),
            prepared(info("a", 10, jan(31)), vec![Task::new("a1", 2)], &[("a1", 16.0)]),
        ];
        let weights = ObjectiveWeights::normalize(&[OptimizationObjective::new(
            ObjectiveKind::MinimizeTotalDelay,
            1.0,
        )])
        .unwrap();
        let plan = Harness::new().run_with(&projects, &weights);

        let a = &plan.results[0];
        assert_eq!(a.project_id, "a");
        assert_eq!(a.schedule.start_date, jan(1));
        assert_eq!(a.shift_days, 0);
        let b = &plan.results[1];
        assert_eq!(b.schedule.start_date, jan(3));
        assert_eq!(b.delay_days, 2);
    }

    #[test]
    fn test_without_delay_conflicts_are_reported() {
        let mut harness = Harness::new();
        harness.portfolio.delay_to_resolve_conflicts = false;
        let plan = harness.run(&contested());

        let b = &plan.results[1];
        assert_eq!(b.project_id, "b");
        assert_eq!(b.schedule.start_date, jan(1));
        assert_eq!(b.resource_analysis.conflicts.len(), 2);
        assert!(b.resource_analysis.conflicts.iter().all(|c| c.cross_project));
    }

    #[test]
    fn test_single_project_without_overlap() {
        let harness = Harness::new();
        let projects = vec![prepared(
            info("solo", 1, jan(10)),
            vec![Task::new("t1", 2), Task::new("t2", 3).after("t1")],
            &[("t1", 8.0), ("t2", 12.0)],
        )];
        let plan = harness.run(&projects);

        let summary = summarize(&plan.results, 0);
        assert_eq!(summary.total_projects, 1);
        assert_eq!(summary.delayed_projects, 0);
        assert_eq!(summary.average_delay, 0.0);
        assert_eq!(plan.results[0].schedule.finish_date, jan(1) + Days::new(5));
    }

    #[test]
    fn test_candidate_orders() {
        let projects = vec![
            prepared(info("c", 1, jan(9)), Vec::new(), &[]),
            prepared(info("b", 5, jan(9)), Vec::new(), &[]),
            prepared(info("a", 5, jan(9)), Vec::new(), &[]),
        ];
        let orders = candidate_orders(&projects, 8);
        assert_eq!(orders[0], vec![2, 1, 0]);
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[1], vec![1, 2, 0]);
        assert!(orders.iter().all(|order| order[2] == 0));

        assert_eq!(candidate_orders(&projects, 0).len(), 1);
        assert_eq!(candidate_orders(&[], 8), vec![Vec::<usize>::new()]);
    }

    #[test]
    fn test_summary_counts_failures() {
        let harness = Harness::new();
        let plan = harness.run(&[]);
        let summary = summarize(&plan.results, 2);
        assert_eq!(summary.total_projects, 0);
        assert_eq!(summary.failed_projects, 2);
        assert_eq!(summary.average_delay, 0.0);
    }
}
