//! Priority model: base tiers plus the blocker bonus.
//!
//! A task's effective rank is its tier rank, pulled down (made more urgent)
//! to the rank of the most urgent task that directly depends on it. Lower
//! ranks are scheduled first; ties always fall back to the task id.

use pyo3::prelude::*;
use std::cmp::Ordering;

use crate::graph::DependencyGraph;
use crate::interner::TaskId;
use crate::models::{Priority, Task};

/// Effective rank of `task` within `all_tasks` (lower = more urgent).
pub fn effective_rank(task: &Task, all_tasks: &[Task]) -> i32 {
    let base = task.priority.rank();
    let bonus = all_tasks
        .iter()
        .filter(|other| other.id != task.id && other.dependencies.contains(&task.id))
        .map(|dependent| dependent.priority.rank() - base)
        .min()
        .unwrap_or(0)
        .min(0);
    base + bonus
}

/// Effective rank of every node in `graph`, indexed by `TaskId`.
pub fn effective_ranks(graph: &DependencyGraph) -> Vec<i32> {
    (0..graph.len())
        .map(|i| {
            let base = graph.base_ranks[i];
            graph.dependents[i]
                .iter()
                .filter(|&&d| d as usize != i)
                .map(|&d| graph.base_ranks[d as usize])
                .fold(base, i32::min)
        })
        .collect()
}

/// Compare two nodes by `(effective rank, id)`.
#[inline]
pub fn cmp_rank(ranks: &[i32], a: TaskId, b: TaskId) -> Ordering {
    ranks[a as usize]
        .cmp(&ranks[b as usize])
        .then_with(|| a.cmp(&b))
}

/// Copy of `tasks` stably sorted by `(effective rank, id)`.
pub fn sort_by_priority(tasks: &[Task]) -> Vec<Task> {
    let mut keyed: Vec<(i32, &Task)> = tasks
        .iter()
        .map(|t| (effective_rank(t, tasks), t))
        .collect();
    keyed.sort_by(|(ra, a), (rb, b)| ra.cmp(rb).then_with(|| a.id.cmp(&b.id)));
    keyed.into_iter().map(|(_, t)| t.clone()).collect()
}

/// Tasks bucketed by their declared tier.
#[pyclass]
#[derive(Clone, Debug, Default)]
pub struct PriorityBuckets {
    #[pyo3(get)]
    pub p0: Vec<Task>,
    #[pyo3(get)]
    pub p1: Vec<Task>,
    #[pyo3(get)]
    pub p2: Vec<Task>,
}

#[pymethods]
impl PriorityBuckets {
    fn __repr__(&self) -> String {
        format!(
            "PriorityBuckets(p0={}, p1={}, p2={})",
            self.p0.len(),
            self.p1.len(),
            self.p2.len()
        )
    }
}

/// Group tasks by tier, keeping input order within a bucket.
/// Unknown labels were already folded into `P2` when the task was parsed.
pub fn group_by_priority(tasks: &[Task]) -> PriorityBuckets {
    let mut buckets = PriorityBuckets::default();
    for task in tasks {
        match task.priority {
            Priority::P0 => buckets.p0.push(task.clone()),
            Priority::P1 => buckets.p1.push(task.clone()),
            Priority::P2 => buckets.p2.push(task.clone()),
        }
    }
    buckets
}
