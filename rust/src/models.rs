//! Core data types for task scheduling and execution planning.

use pyo3::prelude::*;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Deserialize an explicit `null` as the field's default.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// Note: We use BTreeMap in results so both the Python dicts and the JSON output
// come out in a stable key order.

/// Priority tier of a task. `P0` is the most urgent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Priority {
    P0,
    #[default]
    P1,
    P2,
}

impl Priority {
    /// Parse a priority label. Unknown labels fall into the lowest tier.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "p0" | "critical" | "highest" | "high" => Priority::P0,
            "p1" | "medium" | "normal" => Priority::P1,
            "p2" | "low" | "lowest" => Priority::P2,
            _ => Priority::P2,
        }
    }

    /// Base rank used for ordering (lower = more urgent).
    pub fn rank(self) -> i32 {
        match self {
            Priority::P0 => 0,
            Priority::P1 => 1,
            Priority::P2 => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::P0 => "P0",
            Priority::P1 => "P1",
            Priority::P2 => "P2",
        }
    }
}

impl From<String> for Priority {
    fn from(label: String) -> Self {
        Priority::from_label(&label)
    }
}

impl From<Priority> for String {
    fn from(priority: Priority) -> Self {
        priority.as_str().to_string()
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a task, only consulted when planning phases.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskStatus {
    #[default]
    Queued,
    InProgress,
    Done,
    Blocked,
}

impl TaskStatus {
    /// Parse a status label. Unknown labels are treated as queued.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "in_progress" | "running" => TaskStatus::InProgress,
            "done" | "completed" => TaskStatus::Done,
            "blocked" => TaskStatus::Blocked,
            _ => TaskStatus::Queued,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Queued => "queued",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
            TaskStatus::Blocked => "blocked",
        }
    }
}

impl From<String> for TaskStatus {
    fn from(label: String) -> Self {
        TaskStatus::from_label(&label)
    }
}

impl From<TaskStatus> for String {
    fn from(status: TaskStatus) -> Self {
        status.as_str().to_string()
    }
}

/// A task to be ordered and planned.
#[pyclass]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[pyo3(get, set)]
    pub id: String,
    #[pyo3(get, set)]
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub priority: Priority,
    /// Ids of tasks that must be done before this one may start.
    #[pyo3(get, set)]
    #[serde(default, deserialize_with = "null_as_default")]
    pub dependencies: Vec<String>,
    /// Duration label such as "2h" or "45min".
    #[pyo3(get, set)]
    #[serde(default)]
    pub estimated_time: Option<String>,
    /// Free-text labels, only read by the dependency graph builder.
    #[pyo3(get, set)]
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: TaskStatus,
}

#[pymethods]
impl Task {
    #[new]
    #[pyo3(signature = (
        id,
        title=None,
        priority=None,
        dependencies=None,
        estimated_time=None,
        tags=None,
        status=None
    ))]
    fn new(
        id: String,
        title: Option<String>,
        priority: Option<String>,
        dependencies: Option<Vec<String>>,
        estimated_time: Option<String>,
        tags: Option<Vec<String>>,
        status: Option<String>,
    ) -> Self {
        Self {
            id,
            title: title.unwrap_or_default(),
            priority: priority
                .map(|p| Priority::from_label(&p))
                .unwrap_or_default(),
            dependencies: dependencies.unwrap_or_default(),
            estimated_time,
            tags: tags.unwrap_or_default(),
            status: status
                .map(|s| TaskStatus::from_label(&s))
                .unwrap_or_default(),
        }
    }

    #[getter(priority)]
    fn py_priority(&self) -> &'static str {
        self.priority.as_str()
    }

    #[setter(priority)]
    fn py_set_priority(&mut self, label: &str) {
        self.priority = Priority::from_label(label);
    }

    #[getter(status)]
    fn py_status(&self) -> &'static str {
        self.status.as_str()
    }

    #[setter(status)]
    fn py_set_status(&mut self, label: &str) {
        self.status = TaskStatus::from_label(label);
    }

    fn __repr__(&self) -> String {
        format!(
            "Task(id={:?}, priority={}, deps={}, tags={:?})",
            self.id,
            self.priority,
            self.dependencies.len(),
            self.tags
        )
    }
}

/// One step of an execution plan.
#[pyclass]
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Phase {
    #[pyo3(get)]
    pub index: usize,
    #[pyo3(get)]
    pub tasks: Vec<String>,
    /// True when the phase holds more than one task.
    #[pyo3(get)]
    pub concurrent: bool,
    #[pyo3(get)]
    pub reason: String,
    /// Time contribution of this phase to the plan total.
    #[pyo3(get)]
    pub estimated_minutes: i64,
}

#[pymethods]
impl Phase {
    fn __repr__(&self) -> String {
        format!(
            "Phase(index={}, tasks={:?}, concurrent={})",
            self.index, self.tasks, self.concurrent
        )
    }
}

/// Output of the dependency solver.
#[pyclass]
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DependencyResult {
    #[pyo3(get)]
    pub execution_order: Vec<String>,
    #[pyo3(get)]
    pub has_cycle: bool,
    /// Tasks whose in-degree never reached zero, sorted by id.
    #[pyo3(get)]
    pub cycle_tasks: Vec<String>,
}

#[pymethods]
impl DependencyResult {
    fn __repr__(&self) -> String {
        format!(
            "DependencyResult(order={}, has_cycle={}, cycle_tasks={:?})",
            self.execution_order.len(),
            self.has_cycle,
            self.cycle_tasks
        )
    }
}

/// Output of the phase planner.
#[pyclass]
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ExecutionPlan {
    #[pyo3(get)]
    pub phases: Vec<Phase>,
    #[pyo3(get)]
    pub critical_path: Vec<String>,
    #[pyo3(get)]
    pub estimated_total_time: String,
    #[pyo3(get)]
    pub estimated_total_minutes: i64,
    #[pyo3(get)]
    pub visualization: String,
    /// Tasks that could not be placed in any phase, sorted by id.
    #[pyo3(get)]
    pub unscheduled: Vec<String>,
}

#[pymethods]
impl ExecutionPlan {
    fn __repr__(&self) -> String {
        format!(
            "ExecutionPlan(phases={}, total={:?}, unscheduled={})",
            self.phases.len(),
            self.estimated_total_time,
            self.unscheduled.len()
        )
    }
}

/// Output of the tag-based dependency graph builder.
#[pyclass]
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct GraphBuildResult {
    /// Copies of the input tasks with inferred dependencies merged in.
    #[pyo3(get)]
    pub tasks: Vec<Task>,
    /// task id -> ids it depends on
    #[pyo3(get)]
    pub graph: BTreeMap<String, Vec<String>>,
    #[pyo3(get)]
    pub execution_order: Vec<String>,
    #[pyo3(get)]
    pub parallel_groups: Vec<Vec<String>>,
    #[pyo3(get)]
    pub has_cycle: bool,
    #[pyo3(get)]
    pub cycle_tasks: Vec<String>,
    /// Back-edges found by DFS as (dependent, dependency) pairs.
    #[pyo3(get)]
    pub cycle_edges: Vec<(String, String)>,
}

#[pymethods]
impl GraphBuildResult {
    fn __repr__(&self) -> String {
        format!(
            "GraphBuildResult(tasks={}, groups={}, has_cycle={})",
            self.tasks.len(),
            self.parallel_groups.len(),
            self.has_cycle
        )
    }
}

/// Composed result of a scheduling request.
#[pyclass]
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ScheduleResult {
    #[pyo3(get)]
    pub execution_order: Vec<String>,
    #[pyo3(get)]
    pub phases: Vec<Phase>,
    #[pyo3(get)]
    pub critical_path: Vec<String>,
    /// Formatted total, or "N/A" when a cycle blocked planning.
    #[pyo3(get)]
    pub estimated_total_time: String,
    #[pyo3(get)]
    pub estimated_total_minutes: i64,
    #[pyo3(get)]
    pub visualization: String,
    #[pyo3(get)]
    pub has_cycle: bool,
    #[pyo3(get)]
    pub cycle_tasks: Vec<String>,
    #[pyo3(get)]
    pub unscheduled: Vec<String>,
    /// Wall-clock time of the call, rounded to two decimals.
    #[pyo3(get)]
    pub computation_time_ms: f64,
}

impl ScheduleResult {
    /// Serialize to the JSON shape returned by the HTTP layer.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[pymethods]
impl ScheduleResult {
    #[pyo3(name = "to_json")]
    fn py_to_json(&self) -> PyResult<String> {
        self.to_json()
            .map_err(|e| pyo3::exceptions::PyValueError::new_err(e.to_string()))
    }

    fn __repr__(&self) -> String {
        format!(
            "ScheduleResult(order={}, phases={}, has_cycle={}, total={:?})",
            self.execution_order.len(),
            self.phases.len(),
            self.has_cycle,
            self.estimated_total_time
        )
    }
}
