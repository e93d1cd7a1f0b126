//! Request-facing scheduling façade.

use rustc_hash::FxHashSet;
use serde::Deserialize;
use std::time::Instant;
use thiserror::Error;

use crate::config::{ScheduleConstraints, SchedulerConfig};
use crate::graph::{DependencyGraph, DependencyGraphBuilder, TagRules};
use crate::intent::IntentParser;
use crate::models::{ScheduleResult, Task};
use crate::{log_decisions, log_details};

use super::planner::ConcurrencyPlanner;
use super::solver::{critical_path, DependencySolver};

/// Reasons a scheduling request is rejected before any planning happens.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("No tasks to schedule")]
    EmptyTaskList,
    #[error("Duplicate task id: {0}")]
    DuplicateTaskId(String),
    #[error("Task {task} depends on unknown task {dependency}")]
    UnknownDependency { task: String, dependency: String },
    #[error("must_finish_first names unknown task {0}")]
    UnknownMustFinishFirst(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// JSON request body: `{"tasks": [...], "constraints": {...}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleRequest {
    pub tasks: Vec<Task>,
    #[serde(default, deserialize_with = "crate::models::null_as_default")]
    pub constraints: ScheduleConstraints,
}

/// Stateless scheduling service: validate, solve, plan, estimate.
///
/// Holds only configuration, so one instance can be shared across requests.
#[derive(Debug, Clone, Default)]
pub struct SchedulerService {
    config: SchedulerConfig,
    tag_rules: TagRules,
}

impl SchedulerService {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            tag_rules: TagRules::default(),
        }
    }

    /// Replace the tag-precedence table used by `plan_intent`.
    pub fn with_tag_rules(mut self, tag_rules: TagRules) -> Self {
        self.tag_rules = tag_rules;
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Reject input the algorithms would otherwise silently work around.
    pub fn validate(
        &self,
        tasks: &[Task],
        constraints: &ScheduleConstraints,
    ) -> Result<(), ScheduleError> {
        if tasks.is_empty() {
            return Err(ScheduleError::EmptyTaskList);
        }
        if constraints.resolve_max_concurrent(&self.config) == 0 {
            return Err(ScheduleError::InvalidConfig(
                "max_concurrent must be at least 1".to_string(),
            ));
        }

        let mut ids: FxHashSet<&str> = FxHashSet::default();
        for task in tasks {
            if !ids.insert(task.id.as_str()) {
                return Err(ScheduleError::DuplicateTaskId(task.id.clone()));
            }
        }
        for task in tasks {
            if let Some(dep) = task.dependencies.iter().find(|d| !ids.contains(d.as_str())) {
                return Err(ScheduleError::UnknownDependency {
                    task: task.id.clone(),
                    dependency: dep.clone(),
                });
            }
        }
        if let Some(id) = constraints
            .must_finish_first
            .iter()
            .find(|id| !ids.contains(id.as_str()))
        {
            return Err(ScheduleError::UnknownMustFinishFirst(id.clone()));
        }

        log_details!(self.config.verbosity, "Validated {} tasks", tasks.len());
        Ok(())
    }

    /// Schedule a batch of tasks.
    ///
    /// A dependency cycle is not an error: the result comes back with
    /// `has_cycle` set, the offending tasks, no phases and an "N/A" estimate.
    pub fn schedule(
        &self,
        tasks: &[Task],
        constraints: &ScheduleConstraints,
    ) -> Result<ScheduleResult, ScheduleError> {
        let started = Instant::now();
        self.validate(tasks, constraints)?;

        let verbosity = self.config.verbosity;
        let graph = DependencyGraph::from_tasks(tasks);
        let solved = DependencySolver::new(verbosity).solve_graph(&graph);

        if solved.has_cycle {
            log_decisions!(
                verbosity,
                "Rejecting plan, cycle through {:?}",
                solved.cycle_tasks
            );
            return Ok(ScheduleResult {
                execution_order: solved.execution_order,
                estimated_total_time: "N/A".to_string(),
                has_cycle: true,
                cycle_tasks: solved.cycle_tasks,
                computation_time_ms: elapsed_ms(started),
                ..Default::default()
            });
        }

        let max_concurrent = constraints.resolve_max_concurrent(&self.config);
        let plan = ConcurrencyPlanner::new(&self.config)
            .with_max_concurrent(max_concurrent)
            .plan(tasks, &solved.execution_order, &constraints.must_finish_first);
        let critical = critical_path(&graph, &solved.execution_order);

        log_decisions!(
            verbosity,
            "Scheduled {} tasks into {} phases (max_concurrent={}, total {})",
            tasks.len(),
            plan.phases.len(),
            max_concurrent,
            plan.estimated_total_time
        );

        Ok(ScheduleResult {
            execution_order: solved.execution_order,
            phases: plan.phases,
            critical_path: critical,
            estimated_total_time: plan.estimated_total_time,
            estimated_total_minutes: plan.estimated_total_minutes,
            visualization: plan.visualization,
            has_cycle: false,
            cycle_tasks: Vec::new(),
            unscheduled: plan.unscheduled,
            computation_time_ms: elapsed_ms(started),
        })
    }

    /// `schedule` for a JSON request body, returning the JSON result.
    pub fn schedule_json(&self, request: &str) -> Result<String, ScheduleError> {
        let request: ScheduleRequest = serde_json::from_str(request)
            .map_err(|e| ScheduleError::InvalidRequest(e.to_string()))?;
        let result = self.schedule(&request.tasks, &request.constraints)?;
        result
            .to_json()
            .map_err(|e| ScheduleError::InvalidRequest(e.to_string()))
    }

    /// Parse a free-text intent, decompose it into stage tasks, infer their
    /// order from tags and schedule them.
    pub fn plan_intent(
        &self,
        text: &str,
        prefix: &str,
        constraints: &ScheduleConstraints,
    ) -> Result<ScheduleResult, ScheduleError> {
        let parser = IntentParser;
        let intent = parser.parse(text);
        log_decisions!(
            self.config.verbosity,
            "Intent {:?}: {} / {} / {}",
            text,
            intent.intent_type,
            intent.scope,
            intent.complexity
        );

        let tasks = parser.decompose(&intent, prefix);
        let built =
            DependencyGraphBuilder::new(self.tag_rules.clone(), self.config.verbosity).build(&tasks);
        self.schedule(&built.tasks, constraints)
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    (started.elapsed().as_secs_f64() * 1000.0 * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Priority, TaskStatus};

    fn make_task(id: &str, priority: &str, deps: &[&str]) -> Task {
        Task {
            id: id.to_string(),
            priority: Priority::from_label(priority),
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
            ..Default::default()
        }
    }

    fn constraints(max_concurrent: usize, must_first: &[&str]) -> ScheduleConstraints {
        ScheduleConstraints {
            max_concurrent: Some(max_concurrent),
            must_finish_first: must_first.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_fan_out_scenario() {
        let tasks = vec![
            make_task("t1", "P0", &[]),
            make_task("t2", "P1", &["t1"]),
            make_task("t3", "P2", &["t1"]),
        ];
        let result = SchedulerService::default()
            .schedule(&tasks, &constraints(3, &[]))
            .unwrap();

        assert_eq!(result.execution_order, vec!["t1", "t2", "t3"]);
        assert_eq!(result.phases.len(), 2);
        assert_eq!(result.phases[0].tasks, vec!["t1"]);
        assert!(!result.phases[0].concurrent);
        assert_eq!(result.phases[1].tasks, vec!["t2", "t3"]);
        assert!(result.phases[1].concurrent);
        assert_eq!(result.critical_path, vec!["t1", "t2"]);
        assert_eq!(result.estimated_total_time, "1h");
        assert!(!result.has_cycle);
        assert!(result.computation_time_ms >= 0.0);
    }

    #[test]
    fn test_equal_priorities_split_by_budget() {
        let tasks = vec![
            make_task("b", "P1", &[]),
            make_task("c", "P1", &[]),
            make_task("a", "P1", &[]),
        ];
        let result = SchedulerService::default()
            .schedule(&tasks, &constraints(2, &[]))
            .unwrap();
        assert_eq!(result.phases[0].tasks, vec!["a", "b"]);
        assert_eq!(result.phases[1].tasks, vec!["c"]);
    }

    #[test]
    fn test_default_budget_is_three() {
        let tasks: Vec<Task> = ["a", "b", "c", "d"]
            .iter()
            .map(|id| make_task(id, "P1", &[]))
            .collect();
        let result = SchedulerService::default()
            .schedule(&tasks, &ScheduleConstraints::default())
            .unwrap();
        assert_eq!(result.phases[0].tasks.len(), 3);
        assert_eq!(result.phases[1].tasks, vec!["d"]);
    }

    #[test]
    fn test_cycle_short_circuits() {
        let tasks = vec![
            make_task("A", "P1", &["B"]),
            make_task("B", "P1", &["A"]),
        ];
        let result = SchedulerService::default()
            .schedule(&tasks, &ScheduleConstraints::default())
            .unwrap();

        assert!(result.has_cycle);
        assert_eq!(result.cycle_tasks, vec!["A", "B"]);
        assert!(result.phases.is_empty());
        assert_eq!(result.estimated_total_time, "N/A");
    }

    #[test]
    fn test_must_finish_first_constraint() {
        let tasks = vec![make_task("X", "P2", &[]), make_task("Y", "P0", &[])];
        let result = SchedulerService::default()
            .schedule(&tasks, &constraints(3, &["X"]))
            .unwrap();
        assert_eq!(result.phases[0].tasks, vec!["X"]);
        assert_eq!(result.phases[1].tasks, vec!["Y"]);
    }

    #[test]
    fn test_validation_errors() {
        let service = SchedulerService::default();
        let none = ScheduleConstraints::default();

        assert_eq!(service.schedule(&[], &none), Err(ScheduleError::EmptyTaskList));

        let dup = vec![make_task("a", "P1", &[]), make_task("a", "P1", &[])];
        assert_eq!(
            service.schedule(&dup, &none),
            Err(ScheduleError::DuplicateTaskId("a".to_string()))
        );

        let unknown = vec![make_task("a", "P1", &["ghost"])];
        assert_eq!(
            service.schedule(&unknown, &none),
            Err(ScheduleError::UnknownDependency {
                task: "a".to_string(),
                dependency: "ghost".to_string()
            })
        );

        let ok = vec![make_task("a", "P1", &[])];
        assert_eq!(
            service.schedule(&ok, &constraints(3, &["zzz"])),
            Err(ScheduleError::UnknownMustFinishFirst("zzz".to_string()))
        );
        assert!(matches!(
            service.schedule(&ok, &constraints(0, &[])),
            Err(ScheduleError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_error_messages() {
        let err = ScheduleError::UnknownDependency {
            task: "a".to_string(),
            dependency: "b".to_string(),
        };
        assert_eq!(err.to_string(), "Task a depends on unknown task b");
    }

    #[test]
    fn test_schedule_json_round_trip() {
        let request = r#"{
            "tasks": [
                {"id": "t1", "priority": "P0", "estimated_time": "1h"},
                {"id": "t2", "priority": "P1", "dependencies": ["t1"], "estimated_time": "45min"}
            ],
            "constraints": {"max_concurrent": 2}
        }"#;
        let json = SchedulerService::default().schedule_json(request).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["execution_order"], serde_json::json!(["t1", "t2"]));
        assert_eq!(value["estimated_total_time"], "1h 45min");
        assert_eq!(value["phases"][1]["reason"], "depends on t1");
        assert_eq!(value["has_cycle"], false);
    }

    #[test]
    fn test_schedule_json_accepts_null_fields() {
        let request = r#"{
            "tasks": [
                {"id": "a", "priority": null, "dependencies": null, "tags": null,
                 "estimated_time": null, "status": null},
                {"id": "b", "dependencies": ["a"]}
            ],
            "constraints": {"max_concurrent": null, "must_finish_first": null}
        }"#;
        let json = SchedulerService::default().schedule_json(request).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["execution_order"], serde_json::json!(["a", "b"]));
        assert_eq!(value["estimated_total_time"], "1h");
        assert_eq!(value["unscheduled"], serde_json::json!([]));

        let no_constraints = r#"{"tasks": [{"id": "a"}], "constraints": null}"#;
        assert!(SchedulerService::default()
            .schedule_json(no_constraints)
            .is_ok());
    }

    #[test]
    fn test_schedule_json_rejects_malformed_body() {
        let err = SchedulerService::default()
            .schedule_json(r#"{"tasks": "nope"}"#)
            .unwrap_err();
        assert!(matches!(err, ScheduleError::InvalidRequest(_)));
    }

    #[test]
    fn test_done_tasks_are_not_replanned() {
        let mut done = make_task("a", "P1", &[]);
        done.status = TaskStatus::Done;
        let tasks = vec![done, make_task("b", "P1", &["a"])];
        let result = SchedulerService::default()
            .schedule(&tasks, &ScheduleConstraints::default())
            .unwrap();
        assert_eq!(result.execution_order, vec!["a", "b"]);
        assert_eq!(result.phases.len(), 1);
        assert_eq!(result.phases[0].tasks, vec!["b"]);
        assert!(result.unscheduled.is_empty());
    }

    #[test]
    fn test_plan_intent_end_to_end() {
        let result = SchedulerService::default()
            .plan_intent(
                "Add tagging support to notes",
                "notes",
                &ScheduleConstraints::default(),
            )
            .unwrap();

        assert!(!result.has_cycle);
        // analysis -> design -> implementation -> {testing, documentation}
        assert_eq!(
            result.execution_order,
            vec!["notes-1", "notes-2", "notes-3", "notes-4", "notes-5"]
        );
        assert_eq!(result.phases.len(), 4);
        assert_eq!(result.phases[3].tasks, vec!["notes-4", "notes-5"]);
        assert_eq!(result.critical_path, vec!["notes-1", "notes-2", "notes-3", "notes-4"]);
        assert_eq!(result.estimated_total_minutes, 30 + 45 + 120 + 60);
    }

    #[test]
    fn test_plan_intent_parallel_stages() {
        // Refactor: analysis -> implementation -> {testing, review}
        let result = SchedulerService::default()
            .plan_intent("Refactor the notes parser", "rf", &ScheduleConstraints::default())
            .unwrap();
        let phases: Vec<Vec<String>> = result.phases.iter().map(|p| p.tasks.clone()).collect();
        assert_eq!(
            phases,
            vec![
                vec!["rf-1".to_string()],
                vec!["rf-2".to_string()],
                vec!["rf-3".to_string(), "rf-4".to_string()]
            ]
        );
    }
}
