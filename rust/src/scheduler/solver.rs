//! Topological ordering and critical path.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::graph::DependencyGraph;
use crate::interner::TaskId;
use crate::models::{DependencyResult, Task};
use crate::priority::effective_ranks;
use crate::{log_decisions, log_trace};

/// Kahn's algorithm with a `(effective rank, id)` ready queue.
#[derive(Debug, Clone, Default)]
pub struct DependencySolver {
    verbosity: u8,
}

impl DependencySolver {
    pub fn new(verbosity: u8) -> Self {
        Self { verbosity }
    }

    /// Order `tasks` so every task follows its dependencies.
    ///
    /// Dependencies on ids outside `tasks` are ignored. If a cycle prevents a
    /// complete order, `has_cycle` is set and `cycle_tasks` lists every task
    /// whose in-degree never reached zero (cycle members and anything behind them).
    pub fn solve(&self, tasks: &[Task]) -> DependencyResult {
        self.solve_graph(&DependencyGraph::from_tasks(tasks))
    }

    pub fn solve_graph(&self, graph: &DependencyGraph) -> DependencyResult {
        let ranks = effective_ranks(graph);
        let mut in_degree: Vec<usize> = graph.deps.iter().map(|d| d.len()).collect();

        // Min-heap on (rank, id): popping it matches re-sorting a ready list and
        // taking the front. Ids are interned in string order.
        let mut ready: BinaryHeap<Reverse<(i32, TaskId)>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &deg)| deg == 0)
            .map(|(i, _)| Reverse((ranks[i], i as TaskId)))
            .collect();

        let mut order: Vec<TaskId> = Vec::with_capacity(graph.len());
        while let Some(Reverse((rank, id))) = ready.pop() {
            log_trace!(
                self.verbosity,
                "pop {} (rank {})",
                graph.index.name(id),
                rank
            );
            order.push(id);

            for &dependent in &graph.dependents[id as usize] {
                let degree = &mut in_degree[dependent as usize];
                *degree -= 1;
                if *degree == 0 {
                    ready.push(Reverse((ranks[dependent as usize], dependent)));
                }
            }
        }

        let has_cycle = order.len() != graph.len();
        let cycle_tasks: Vec<TaskId> = if has_cycle {
            (0..graph.len() as TaskId)
                .filter(|&id| in_degree[id as usize] > 0)
                .collect()
        } else {
            Vec::new()
        };

        if has_cycle {
            log_decisions!(
                self.verbosity,
                "Cycle detected: {} of {} tasks ordered, stuck: {:?}",
                order.len(),
                graph.len(),
                graph.names(&cycle_tasks)
            );
        }

        DependencyResult {
            execution_order: graph.names(&order),
            has_cycle,
            cycle_tasks: graph.names(&cycle_tasks),
        }
    }

    /// Longest dependency chain, measured in tasks, following `execution_order`.
    ///
    /// Each task extends the longest chain ending at one of its dependencies;
    /// the first chain of maximal length wins.
    pub fn find_critical_path(&self, tasks: &[Task], execution_order: &[String]) -> Vec<String> {
        critical_path(&DependencyGraph::from_tasks(tasks), execution_order)
    }
}

/// `find_critical_path` over an already indexed graph.
pub fn critical_path(graph: &DependencyGraph, execution_order: &[String]) -> Vec<String> {
    let mut longest: Vec<Option<Vec<TaskId>>> = vec![None; graph.len()];
    let mut best: Vec<TaskId> = Vec::new();

    for task_id in execution_order {
        let Some(id) = graph.index.get(task_id) else {
            continue;
        };

        let mut path: Vec<TaskId> = Vec::new();
        for &dep in &graph.deps[id as usize] {
            if let Some(dep_path) = &longest[dep as usize] {
                if dep_path.len() > path.len() {
                    path = dep_path.clone();
                }
            }
        }
        path.push(id);

        if path.len() > best.len() {
            best = path.clone();
        }
        longest[id as usize] = Some(path);
    }

    graph.names(&best)
}
