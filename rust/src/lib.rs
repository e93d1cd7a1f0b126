//! Rust core of the Brain task scheduler.
//!
//! Orders a batch of tasks by dependencies and priority, groups them into
//! phases under a concurrency budget, and estimates the total time. Exposed
//! to Python as the `scheduler` module.

// Allow clippy warning triggered by PyO3 macro expansion
#![allow(clippy::useless_conversion)]

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use std::collections::HashMap;

mod config;
pub mod cycle;
pub mod estimate;
pub mod graph;
pub mod intent;
mod interner;
pub mod logging;
mod models;
pub mod priority;
pub mod scheduler;

pub use config::{ScheduleConstraints, SchedulerConfig};
pub use cycle::{detect_cycles, CycleReport};
pub use graph::{DependencyGraph, DependencyGraphBuilder, TagRules};
pub use intent::{IntentParser, ParsedIntent};
pub use interner::{TaskId, TaskIndex};
pub use models::{
    DependencyResult, ExecutionPlan, GraphBuildResult, Phase, Priority, ScheduleResult, Task,
    TaskStatus,
};
pub use priority::PriorityBuckets;
pub use scheduler::{
    ConcurrencyPlanner, DependencySolver, ScheduleError, ScheduleRequest, SchedulerService,
};

fn to_py_err(e: impl std::fmt::Display) -> PyErr {
    PyValueError::new_err(e.to_string())
}

/// Validate, order, plan and estimate a batch of tasks.
///
/// # Arguments
/// * `tasks` - Tasks to schedule (ids must be unique, dependencies known)
/// * `constraints` - Per-request worker budget and must-finish-first ids
/// * `config` - Service defaults (max_concurrent=3, 30min default duration)
///
/// # Returns
/// * ScheduleResult; a dependency cycle is reported through `has_cycle`
///
/// # Raises
/// * ValueError if the input fails validation
#[pyfunction]
#[pyo3(signature = (tasks, constraints=None, config=None))]
fn schedule_tasks(
    tasks: Vec<Task>,
    constraints: Option<ScheduleConstraints>,
    config: Option<SchedulerConfig>,
) -> PyResult<ScheduleResult> {
    SchedulerService::new(config.unwrap_or_default())
        .schedule(&tasks, &constraints.unwrap_or_default())
        .map_err(to_py_err)
}

/// `schedule_tasks` over a JSON body `{"tasks": [...], "constraints": {...}}`.
#[pyfunction]
#[pyo3(signature = (request, config=None))]
fn schedule_json(request: &str, config: Option<SchedulerConfig>) -> PyResult<String> {
    SchedulerService::new(config.unwrap_or_default())
        .schedule_json(request)
        .map_err(to_py_err)
}

/// Topologically order tasks, most urgent first among ready tasks.
#[pyfunction]
#[pyo3(signature = (tasks, verbosity=0))]
fn solve_dependencies(tasks: Vec<Task>, verbosity: u8) -> DependencyResult {
    DependencySolver::new(verbosity).solve(&tasks)
}

/// Longest dependency chain (in task count) along `execution_order`.
#[pyfunction]
fn find_critical_path(tasks: Vec<Task>, execution_order: Vec<String>) -> Vec<String> {
    DependencySolver::default().find_critical_path(&tasks, &execution_order)
}

/// Group an execution order into phases of at most `max_concurrent` tasks.
#[pyfunction]
#[pyo3(signature = (tasks, execution_order, must_finish_first=None, max_concurrent=None, config=None))]
fn plan_phases(
    tasks: Vec<Task>,
    execution_order: Vec<String>,
    must_finish_first: Option<Vec<String>>,
    max_concurrent: Option<usize>,
    config: Option<SchedulerConfig>,
) -> PyResult<ExecutionPlan> {
    let config = config.unwrap_or_default();
    let max_concurrent = max_concurrent.unwrap_or(config.max_concurrent);
    if max_concurrent == 0 {
        return Err(to_py_err("max_concurrent must be at least 1"));
    }
    Ok(ConcurrencyPlanner::new(&config)
        .with_max_concurrent(max_concurrent)
        .plan(
            &tasks,
            &execution_order,
            &must_finish_first.unwrap_or_default(),
        ))
}

/// Infer dependencies from task tags and analyze the resulting graph.
///
/// # Arguments
/// * `tasks` - Tasks to annotate; the originals are not modified
/// * `tag_rules` - Optional `{tag: [tags it must follow]}` table replacing the default
#[pyfunction]
#[pyo3(signature = (tasks, tag_rules=None, verbosity=0))]
fn build_dependency_graph(
    tasks: Vec<Task>,
    tag_rules: Option<HashMap<String, Vec<String>>>,
    verbosity: u8,
) -> GraphBuildResult {
    let rules = match &tag_rules {
        Some(table) => {
            let borrowed: Vec<(&str, Vec<&str>)> = table
                .iter()
                .map(|(tag, earlier)| (tag.as_str(), earlier.iter().map(String::as_str).collect()))
                .collect();
            TagRules::new(borrowed.iter().map(|(tag, earlier)| (*tag, earlier.as_slice())))
        }
        None => TagRules::default(),
    };
    DependencyGraphBuilder::new(rules, verbosity).build(&tasks)
}

/// Effective rank per task id (0 = most urgent) after the blocker bonus.
#[pyfunction]
fn effective_ranks(tasks: Vec<Task>) -> HashMap<String, i32> {
    let graph = DependencyGraph::from_tasks(&tasks);
    priority::effective_ranks(&graph)
        .into_iter()
        .enumerate()
        .map(|(i, rank)| (graph.index.name(i as TaskId).to_string(), rank))
        .collect()
}

/// Tasks sorted by (effective rank, id).
#[pyfunction]
fn sort_by_priority(tasks: Vec<Task>) -> Vec<Task> {
    priority::sort_by_priority(&tasks)
}

#[pyfunction]
fn group_by_priority(tasks: Vec<Task>) -> PriorityBuckets {
    priority::group_by_priority(&tasks)
}

#[pyfunction]
fn parse_intent(text: &str) -> ParsedIntent {
    IntentParser.parse(text)
}

/// Decompose a free-text intent into stage tasks and schedule them.
#[pyfunction]
#[pyo3(signature = (text, prefix="intent", constraints=None, config=None))]
fn plan_intent(
    text: &str,
    prefix: &str,
    constraints: Option<ScheduleConstraints>,
    config: Option<SchedulerConfig>,
) -> PyResult<ScheduleResult> {
    SchedulerService::new(config.unwrap_or_default())
        .plan_intent(text, prefix, &constraints.unwrap_or_default())
        .map_err(to_py_err)
}

/// Minutes in a duration label such as "1.5h" or "45min", or None if unparseable.
#[pyfunction]
fn parse_duration_minutes(label: &str) -> Option<i64> {
    estimate::parse_duration(label).map(|d| d.num_minutes())
}

/// The brain scheduler Python module.
#[pymodule]
#[pyo3(name = "scheduler")]
fn brain_scheduler(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Core data types
    m.add_class::<Task>()?;
    m.add_class::<Phase>()?;
    m.add_class::<DependencyResult>()?;
    m.add_class::<ExecutionPlan>()?;
    m.add_class::<GraphBuildResult>()?;
    m.add_class::<ScheduleResult>()?;
    m.add_class::<PriorityBuckets>()?;
    m.add_class::<ParsedIntent>()?;

    // Config types
    m.add_class::<SchedulerConfig>()?;
    m.add_class::<ScheduleConstraints>()?;

    // Algorithms
    m.add_function(wrap_pyfunction!(schedule_tasks, m)?)?;
    m.add_function(wrap_pyfunction!(schedule_json, m)?)?;
    m.add_function(wrap_pyfunction!(solve_dependencies, m)?)?;
    m.add_function(wrap_pyfunction!(find_critical_path, m)?)?;
    m.add_function(wrap_pyfunction!(plan_phases, m)?)?;
    m.add_function(wrap_pyfunction!(build_dependency_graph, m)?)?;
    m.add_function(wrap_pyfunction!(effective_ranks, m)?)?;
    m.add_function(wrap_pyfunction!(sort_by_priority, m)?)?;
    m.add_function(wrap_pyfunction!(group_by_priority, m)?)?;
    m.add_function(wrap_pyfunction!(parse_intent, m)?)?;
    m.add_function(wrap_pyfunction!(plan_intent, m)?)?;
    m.add_function(wrap_pyfunction!(parse_duration_minutes, m)?)?;

    Ok(())
}
