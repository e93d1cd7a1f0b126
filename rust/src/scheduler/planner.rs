//! Phase planning under a worker budget.

use chrono::Duration;
use rustc_hash::FxHashSet;

use crate::config::SchedulerConfig;
use crate::estimate::{duration_or_default, format_minutes, phase_duration, visualize};
use crate::graph::DependencyGraph;
use crate::interner::TaskId;
use crate::models::{ExecutionPlan, Phase, Task, TaskStatus};
use crate::priority::{cmp_rank, effective_ranks};
use crate::{log_decisions, log_details};

use super::solver::critical_path;

/// Splits an execution order into sequential phases of at most
/// `max_concurrent` ready tasks each.
#[derive(Debug, Clone)]
pub struct ConcurrencyPlanner {
    max_concurrent: usize,
    default_duration: Duration,
    verbosity: u8,
}

impl Default for ConcurrencyPlanner {
    fn default() -> Self {
        Self::new(&SchedulerConfig::default())
    }
}

impl ConcurrencyPlanner {
    pub fn new(config: &SchedulerConfig) -> Self {
        Self {
            max_concurrent: config.max_concurrent.max(1),
            default_duration: Duration::try_minutes(config.default_duration_minutes.max(0))
                .unwrap_or_else(|| Duration::minutes(30)),
            verbosity: config.verbosity,
        }
    }

    /// Override the worker budget. Values below 1 are treated as 1.
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Build phases until every task is placed or nothing more can start.
    ///
    /// Each round collects the ready tasks (not done, not blocked, every
    /// dependency already completed). A ready task listed in
    /// `must_finish_first` gets a phase of its own ahead of everything else;
    /// otherwise the `max_concurrent` most urgent ready tasks form the phase.
    /// Tasks marked done count as completed from the start and are not
    /// placed. Whatever is left when no task is ready (cycles, blocked tasks,
    /// dependencies outside the batch) is returned in `unscheduled`.
    pub fn plan(
        &self,
        tasks: &[Task],
        execution_order: &[String],
        must_finish_first: &[String],
    ) -> ExecutionPlan {
        let graph = DependencyGraph::from_tasks(tasks);
        let ranks = effective_ranks(&graph);
        let durations = self.task_durations(tasks, &graph);

        let must_first: FxHashSet<TaskId> = must_finish_first
            .iter()
            .filter_map(|id| graph.index.get(id))
            .collect();

        let mut completed = vec![false; graph.len()];
        for (i, status) in graph.statuses.iter().enumerate() {
            if *status == TaskStatus::Done {
                completed[i] = true;
            }
        }

        let mut remaining = candidate_order(&graph, execution_order);
        remaining.retain(|&id| !completed[id as usize]);

        let mut phases: Vec<Phase> = Vec::new();
        while !remaining.is_empty() {
            let ready: Vec<TaskId> = remaining
                .iter()
                .copied()
                .filter(|&id| is_ready(&graph, &completed, id))
                .collect();

            if ready.is_empty() {
                log_decisions!(
                    self.verbosity,
                    "No ready tasks, {} left unscheduled",
                    remaining.len()
                );
                break;
            }
            log_details!(
                self.verbosity,
                "Round {}: ready {:?}",
                phases.len(),
                graph.names(&ready)
            );

            let forced = ready.iter().copied().find(|id| must_first.contains(id));
            let (members, concurrent, reason) =
                if let Some(first) = forced {
                    (vec![first], false, "must complete first".to_string())
                } else {
                    let mut batch = ready;
                    batch.sort_by(|&a, &b| cmp_rank(&ranks, a, b));
                    batch.truncate(self.max_concurrent);
                    let reason = match batch.as_slice() {
                        [single] => single_task_reason(tasks, graph.index.name(*single)),
                        many => format!("{} tasks can run in parallel", many.len()),
                    };
                    let concurrent = batch.len() > 1;
                    (batch, concurrent, reason)
                };

            let phase_durations: Vec<Duration> =
                members.iter().map(|&id| durations[id as usize]).collect();
            let phase = Phase {
                index: phases.len(),
                tasks: graph.names(&members),
                concurrent,
                reason,
                estimated_minutes: phase_duration(&phase_durations, concurrent).num_minutes(),
            };
            log_decisions!(
                self.verbosity,
                "Phase {}: {:?} ({})",
                phase.index,
                phase.tasks,
                phase.reason
            );

            for &id in &members {
                completed[id as usize] = true;
            }
            remaining.retain(|&id| !completed[id as usize]);
            phases.push(phase);
        }

        let mut unscheduled = remaining;
        unscheduled.sort_unstable();

        let total_minutes = phases
            .iter()
            .fold(0i64, |total, p| total.saturating_add(p.estimated_minutes));

        ExecutionPlan {
            critical_path: critical_path(&graph, execution_order),
            estimated_total_time: format_minutes(total_minutes),
            estimated_total_minutes: total_minutes,
            visualization: visualize(&phases),
            unscheduled: graph.names(&unscheduled),
            phases,
        }
    }

    fn task_durations(&self, tasks: &[Task], graph: &DependencyGraph) -> Vec<Duration> {
        let mut durations = vec![self.default_duration; graph.len()];
        for task in tasks {
            if let Some(id) = graph.index.get(&task.id) {
                durations[id as usize] =
                    duration_or_default(task.estimated_time.as_deref(), self.default_duration);
            }
        }
        durations
    }
}

/// Tasks in `execution_order` first, then any others in id order.
fn candidate_order(graph: &DependencyGraph, execution_order: &[String]) -> Vec<TaskId> {
    let mut seen = vec![false; graph.len()];
    let mut order = Vec::with_capacity(graph.len());
    for task_id in execution_order {
        if let Some(id) = graph.index.get(task_id) {
            if !seen[id as usize] {
                seen[id as usize] = true;
                order.push(id);
            }
        }
    }
    for id in 0..graph.len() as TaskId {
        if !seen[id as usize] {
            order.push(id);
        }
    }
    order
}

fn is_ready(graph: &DependencyGraph, completed: &[bool], id: TaskId) -> bool {
    let idx = id as usize;
    !completed[idx]
        && graph.statuses[idx] != TaskStatus::Blocked
        && graph.unknown_deps[idx].is_empty()
        && graph.deps[idx].iter().all(|&d| completed[d as usize])
}

fn single_task_reason(tasks: &[Task], task_id: &str) -> String {
    let deps = tasks
        .iter()
        .find(|t| t.id == task_id)
        .map(|t| t.dependencies.as_slice())
        .unwrap_or(&[]);
    if deps.is_empty() {
        "no dependencies".to_string()
    } else {
        format!("depends on {}", deps.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;
    use crate::scheduler::DependencySolver;

    fn make_task(id: &str, priority: Priority, deps: &[&str], time: Option<&str>) -> Task {
        Task {
            id: id.to_string(),
            priority,
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
            estimated_time: time.map(|t| t.to_string()),
            ..Default::default()
        }
    }

    fn plan(tasks: &[Task], max_concurrent: usize, must_first: &[&str]) -> ExecutionPlan {
        let order = DependencySolver::default().solve(tasks).execution_order;
        let must_first: Vec<String> = must_first.iter().map(|s| s.to_string()).collect();
        ConcurrencyPlanner::default()
            .with_max_concurrent(max_concurrent)
            .plan(tasks, &order, &must_first)
    }

    fn phase_tasks(plan: &ExecutionPlan) -> Vec<Vec<String>> {
        plan.phases.iter().map(|p| p.tasks.clone()).collect()
    }

    #[test]
    fn test_fan_out_after_root() {
        let tasks = vec![
            make_task("t1", Priority::P0, &[], None),
            make_task("t2", Priority::P1, &["t1"], None),
            make_task("t3", Priority::P2, &["t1"], None),
        ];
        let plan = plan(&tasks, 3, &[]);

        assert_eq!(
            phase_tasks(&plan),
            vec![
                vec!["t1".to_string()],
                vec!["t2".to_string(), "t3".to_string()]
            ]
        );
        assert!(!plan.phases[0].concurrent);
        assert!(plan.phases[1].concurrent);
        assert_eq!(plan.phases[0].reason, "no dependencies");
        assert_eq!(plan.phases[1].reason, "2 tasks can run in parallel");
        assert_eq!(plan.visualization, "t1 → [t2, t3]");
    }

    #[test]
    fn test_worker_budget_splits_ready_set() {
        let tasks = vec![
            make_task("c", Priority::P1, &[], None),
            make_task("a", Priority::P1, &[], None),
            make_task("b", Priority::P1, &[], None),
        ];
        let plan = plan(&tasks, 2, &[]);
        assert_eq!(
            phase_tasks(&plan),
            vec![
                vec!["a".to_string(), "b".to_string()],
                vec!["c".to_string()]
            ]
        );
    }

    #[test]
    fn test_no_phase_exceeds_budget() {
        let tasks: Vec<Task> = (0..10)
            .map(|i| make_task(&format!("t{:02}", i), Priority::P1, &[], None))
            .collect();
        for max_concurrent in 1..=4 {
            let plan = plan(&tasks, max_concurrent, &[]);
            assert!(plan.phases.iter().all(|p| p.tasks.len() <= max_concurrent));
            let placed: usize = plan.phases.iter().map(|p| p.tasks.len()).sum();
            assert_eq!(placed, tasks.len());
        }
    }

    #[test]
    fn test_must_finish_first_runs_alone_before_higher_priority() {
        let tasks = vec![
            make_task("X", Priority::P2, &[], None),
            make_task("Y", Priority::P0, &[], None),
        ];
        let plan = plan(&tasks, 3, &["X"]);

        assert_eq!(
            phase_tasks(&plan),
            vec![vec!["X".to_string()], vec!["Y".to_string()]]
        );
        assert!(!plan.phases[0].concurrent);
        assert_eq!(plan.phases[0].reason, "must complete first");
    }

    #[test]
    fn test_must_finish_first_waits_until_ready() {
        let tasks = vec![
            make_task("a", Priority::P1, &[], None),
            make_task("b", Priority::P1, &[], None),
            make_task("gate", Priority::P1, &["a"], None),
        ];
        let plan = plan(&tasks, 3, &["gate"]);
        assert_eq!(
            phase_tasks(&plan),
            vec![
                vec!["a".to_string(), "b".to_string()],
                vec!["gate".to_string()]
            ]
        );
    }

    #[test]
    fn test_single_task_reason_lists_dependencies() {
        let tasks = vec![
            make_task("a", Priority::P1, &[], None),
            make_task("b", Priority::P1, &[], None),
            make_task("c", Priority::P1, &["a", "b"], None),
        ];
        let plan = plan(&tasks, 3, &[]);
        assert_eq!(plan.phases[1].reason, "depends on a, b");
    }

    #[test]
    fn test_time_estimate_uses_max_for_concurrent_phases() {
        let tasks = vec![
            make_task("a", Priority::P1, &[], Some("1h")),
            make_task("b", Priority::P1, &[], Some("30min")),
            make_task("c", Priority::P1, &["a", "b"], Some("1.5h")),
        ];
        let plan = plan(&tasks, 3, &[]);

        assert_eq!(plan.phases[0].estimated_minutes, 60);
        assert_eq!(plan.phases[1].estimated_minutes, 90);
        assert_eq!(plan.estimated_total_minutes, 150);
        assert_eq!(plan.estimated_total_time, "2h 30min");
    }

    #[test]
    fn test_unparseable_duration_defaults_to_thirty_minutes() {
        let tasks = vec![make_task("a", Priority::P1, &[], Some("a while"))];
        let plan = plan(&tasks, 3, &[]);
        assert_eq!(plan.estimated_total_minutes, 30);
        assert_eq!(plan.estimated_total_time, "30min");
    }

    #[test]
    fn test_cycle_leaves_tasks_unscheduled() {
        let tasks = vec![
            make_task("a", Priority::P1, &["b"], None),
            make_task("b", Priority::P1, &["a"], None),
            make_task("c", Priority::P1, &[], None),
        ];
        let plan = plan(&tasks, 3, &[]);
        assert_eq!(phase_tasks(&plan), vec![vec!["c".to_string()]]);
        assert_eq!(plan.unscheduled, vec!["a", "b"]);
    }

    #[test]
    fn test_unknown_dependency_leaves_task_unscheduled() {
        let tasks = vec![
            make_task("a", Priority::P1, &["external"], None),
            make_task("b", Priority::P1, &[], None),
        ];
        let plan = plan(&tasks, 3, &[]);
        assert_eq!(phase_tasks(&plan), vec![vec!["b".to_string()]]);
        assert_eq!(plan.unscheduled, vec!["a"]);
    }

    #[test]
    fn test_done_tasks_satisfy_dependencies_without_a_phase() {
        let mut done = make_task("a", Priority::P1, &[], None);
        done.status = TaskStatus::Done;
        let tasks = vec![done, make_task("b", Priority::P1, &["a"], None)];
        let plan = plan(&tasks, 3, &[]);
        assert_eq!(phase_tasks(&plan), vec![vec!["b".to_string()]]);
        assert!(plan.unscheduled.is_empty());
    }

    #[test]
    fn test_blocked_tasks_hold_back_dependents() {
        let mut blocked = make_task("a", Priority::P1, &[], None);
        blocked.status = TaskStatus::Blocked;
        let tasks = vec![
            blocked,
            make_task("b", Priority::P1, &["a"], None),
            make_task("c", Priority::P1, &[], None),
        ];
        let plan = plan(&tasks, 3, &[]);
        assert_eq!(phase_tasks(&plan), vec![vec!["c".to_string()]]);
        assert_eq!(plan.unscheduled, vec!["a", "b"]);
    }

    #[test]
    fn test_critical_path_and_empty_plan() {
        let empty = plan(&[], 3, &[]);
        assert!(empty.phases.is_empty());
        assert_eq!(empty.estimated_total_time, "0min");
        assert_eq!(empty.visualization, "");

        let tasks = vec![
            make_task("a", Priority::P1, &[], None),
            make_task("b", Priority::P1, &["a"], None),
        ];
        assert_eq!(plan(&tasks, 3, &[]).critical_path, vec!["a", "b"]);
    }

    #[test]
    fn test_several_must_finish_first_run_one_per_phase() {
        let tasks = vec![
            make_task("a", Priority::P1, &[], None),
            make_task("b", Priority::P1, &[], None),
            make_task("c", Priority::P1, &[], None),
        ];
        let plan = plan(&tasks, 3, &["b", "a"]);

        assert_eq!(
            phase_tasks(&plan),
            vec![
                vec!["a".to_string()],
                vec!["b".to_string()],
                vec!["c".to_string()]
            ]
        );
        assert!(!plan.phases[0].concurrent);
        assert!(!plan.phases[1].concurrent);
        assert_eq!(plan.phases[0].reason, "must complete first");
        assert_eq!(plan.phases[1].reason, "must complete first");
        assert_eq!(plan.phases[2].reason, "no dependencies");
    }

    #[test]
    fn test_configured_default_duration() {
        let config = SchedulerConfig {
            default_duration_minutes: 45,
            ..Default::default()
        };
        let tasks = vec![
            make_task("a", Priority::P1, &[], None),
            make_task("b", Priority::P1, &["a"], Some("1h")),
            make_task("c", Priority::P1, &["b"], Some("someday")),
        ];
        let order = DependencySolver::default().solve(&tasks).execution_order;
        let plan = ConcurrencyPlanner::new(&config).plan(&tasks, &order, &[]);

        assert_eq!(plan.phases[0].estimated_minutes, 45);
        assert_eq!(plan.phases[2].estimated_minutes, 45);
        assert_eq!(plan.estimated_total_minutes, 150);
        assert_eq!(plan.estimated_total_time, "2h 30min");
    }

    #[test]
    fn test_huge_total_keeps_text_and_minutes_in_step() {
        let tasks = vec![
            make_task("a", Priority::P1, &[], Some("2000000000000h")),
            make_task("b", Priority::P1, &["a"], Some("2000000000000h")),
        ];
        let plan = plan(&tasks, 3, &[]);

        assert_eq!(plan.estimated_total_minutes, 240_000_000_000_000);
        assert_eq!(plan.estimated_total_time, "4000000000000h");
    }

    #[test]
    fn test_zero_budget_treated_as_one() {
        let planner = ConcurrencyPlanner::default().with_max_concurrent(0);
        assert_eq!(planner.max_concurrent(), 1);
    }
}
