//! Configuration types for the scheduling system.

use pyo3::prelude::*;
use serde::Deserialize;

/// Service-wide scheduling configuration.
#[pyclass]
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Worker budget: upper bound on tasks per phase (>= 1)
    #[pyo3(get, set)]
    pub max_concurrent: usize,
    /// Duration assumed for tasks with a missing or unparseable estimate
    #[pyo3(get, set)]
    pub default_duration_minutes: i64,
    /// Verbosity level: 0=silent, 1=decisions, 2=details, 3=trace
    #[pyo3(get, set)]
    pub verbosity: u8,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            default_duration_minutes: 30,
            verbosity: 0,
        }
    }
}

#[pymethods]
impl SchedulerConfig {
    #[new]
    #[pyo3(signature = (max_concurrent=None, default_duration_minutes=None, verbosity=None))]
    fn new(
        max_concurrent: Option<usize>,
        default_duration_minutes: Option<i64>,
        verbosity: Option<u8>,
    ) -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent: max_concurrent.unwrap_or(defaults.max_concurrent),
            default_duration_minutes: default_duration_minutes
                .unwrap_or(defaults.default_duration_minutes),
            verbosity: verbosity.unwrap_or(defaults.verbosity),
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "SchedulerConfig(max_concurrent={}, default_duration_minutes={}, verbosity={})",
            self.max_concurrent, self.default_duration_minutes, self.verbosity
        )
    }
}

/// Per-request constraints. Values here override `SchedulerConfig`.
#[pyclass]
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ScheduleConstraints {
    #[pyo3(get, set)]
    #[serde(default)]
    pub max_concurrent: Option<usize>,
    /// Tasks that must each run alone, ahead of normal batching, once ready
    #[pyo3(get, set)]
    #[serde(default, deserialize_with = "crate::models::null_as_default")]
    pub must_finish_first: Vec<String>,
}

#[pymethods]
impl ScheduleConstraints {
    #[new]
    #[pyo3(signature = (max_concurrent=None, must_finish_first=None))]
    fn new(max_concurrent: Option<usize>, must_finish_first: Option<Vec<String>>) -> Self {
        Self {
            max_concurrent,
            must_finish_first: must_finish_first.unwrap_or_default(),
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "ScheduleConstraints(max_concurrent={:?}, must_finish_first={:?})",
            self.max_concurrent, self.must_finish_first
        )
    }
}

impl ScheduleConstraints {
    /// Effective worker budget given the service defaults.
    pub fn resolve_max_concurrent(&self, config: &SchedulerConfig) -> usize {
        self.max_concurrent.unwrap_or(config.max_concurrent)
    }
}
