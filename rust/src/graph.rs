//! Dependency graph construction.
//!
//! `DependencyGraph` is the indexed form of a task batch that every algorithm
//! in the crate runs on. `DependencyGraphBuilder` infers extra edges from task
//! tags using a tag-precedence table before handing the batch on.

use rustc_hash::FxHashSet;
use std::collections::BTreeMap;

use crate::cycle::detect_cycles;
use crate::interner::{TaskId, TaskIndex};
use crate::models::{GraphBuildResult, Task, TaskStatus};
use crate::priority::effective_ranks;
use crate::scheduler::DependencySolver;
use crate::{log_decisions, log_details};

/// Indexed dependency graph of one task batch.
///
/// Edges point from a task to the tasks it depends on. References to ids
/// outside the batch are kept aside in `unknown_deps` and contribute no edge.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    pub index: TaskIndex,
    /// Base priority rank per task.
    pub base_ranks: Vec<i32>,
    /// Known dependencies per task, deduplicated, in declaration order.
    pub deps: Vec<Vec<TaskId>>,
    /// Reverse edges: tasks that depend on each task.
    pub dependents: Vec<Vec<TaskId>>,
    /// Dependency ids that do not name a task in the batch.
    pub unknown_deps: Vec<Vec<String>>,
    pub statuses: Vec<TaskStatus>,
}

impl DependencyGraph {
    /// Index a batch of tasks. Duplicate ids collapse onto one node.
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let index = TaskIndex::from_ids(tasks.iter().map(|t| t.id.as_str()));
        let n = index.len();

        let mut base_ranks = vec![i32::MAX; n];
        let mut deps: Vec<Vec<TaskId>> = vec![Vec::new(); n];
        let mut dependents: Vec<Vec<TaskId>> = vec![Vec::new(); n];
        let mut unknown_deps: Vec<Vec<String>> = vec![Vec::new(); n];
        let mut statuses = vec![TaskStatus::Queued; n];

        for task in tasks {
            let Some(id) = index.get(&task.id) else {
                continue;
            };
            let idx = id as usize;
            base_ranks[idx] = base_ranks[idx].min(task.priority.rank());
            statuses[idx] = task.status;

            for dep in &task.dependencies {
                match index.get(dep) {
                    Some(dep_id) => {
                        if !deps[idx].contains(&dep_id) {
                            deps[idx].push(dep_id);
                            dependents[dep_id as usize].push(id);
                        }
                    }
                    None => {
                        if !unknown_deps[idx].contains(dep) {
                            unknown_deps[idx].push(dep.clone());
                        }
                    }
                }
            }
        }

        Self {
            index,
            base_ranks,
            deps,
            dependents,
            unknown_deps,
            statuses,
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Task ids for a list of node ids.
    pub fn names(&self, ids: &[TaskId]) -> Vec<String> {
        ids.iter().map(|&id| self.index.name(id).to_string()).collect()
    }

    /// Plain `task id -> dependency ids` view of the graph.
    pub fn to_map(&self) -> BTreeMap<String, Vec<String>> {
        (0..self.len())
            .map(|i| {
                (
                    self.index.name(i as TaskId).to_string(),
                    self.names(&self.deps[i]),
                )
            })
            .collect()
    }
}

/// Tag-precedence table: a tag maps to the tags whose tasks must finish first.
#[derive(Debug, Clone)]
pub struct TagRules {
    rules: Vec<(String, Vec<String>)>,
}

impl Default for TagRules {
    fn default() -> Self {
        Self::new([
            ("design", &["analysis", "research"][..]),
            ("implementation", &["design", "analysis"][..]),
            ("testing", &["implementation"][..]),
            ("review", &["implementation"][..]),
            ("documentation", &["implementation"][..]),
            ("integration", &["implementation"][..]),
            ("deployment", &["testing", "review", "integration"][..]),
        ])
    }
}

impl TagRules {
    /// Build a table from `(tag, prerequisite tags)` pairs. Tags are case-insensitive.
    pub fn new<'a, I>(rules: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a [&'a str])>,
    {
        Self {
            rules: rules
                .into_iter()
                .map(|(tag, prereqs)| {
                    (
                        tag.to_ascii_lowercase(),
                        prereqs.iter().map(|p| p.to_ascii_lowercase()).collect(),
                    )
                })
                .collect(),
        }
    }

    /// Prerequisite tags declared for `tag`.
    pub fn prerequisites(&self, tag: &str) -> &[String] {
        let tag = tag.to_ascii_lowercase();
        self.rules
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, p)| p.as_slice())
            .unwrap_or(&[])
    }

    /// Whether a task tagged `later_tags` must wait for one tagged `earlier_tags`.
    pub fn requires(&self, later_tags: &[String], earlier_tags: &[String]) -> bool {
        later_tags.iter().any(|later| {
            let prereqs = self.prerequisites(later);
            earlier_tags
                .iter()
                .any(|earlier| prereqs.iter().any(|p| p.eq_ignore_ascii_case(earlier)))
        })
    }
}

/// Infers dependencies from tags and reports the resulting graph.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraphBuilder {
    rules: TagRules,
    verbosity: u8,
}

impl DependencyGraphBuilder {
    pub fn new(rules: TagRules, verbosity: u8) -> Self {
        Self { rules, verbosity }
    }

    /// Infer tag-based dependencies and analyze the combined graph.
    ///
    /// The input is left untouched: the returned `tasks` are copies carrying
    /// their explicit dependencies followed by the inferred ones. Cycles are
    /// reported, never repaired; `execution_order` and `parallel_groups` then
    /// only cover the tasks outside of (and not downstream of) a cycle.
    pub fn build(&self, tasks: &[Task]) -> GraphBuildResult {
        let annotated = self.infer_dependencies(tasks);
        let graph = DependencyGraph::from_tasks(&annotated);

        let cycles = detect_cycles(&graph);
        if cycles.has_cycle() {
            log_decisions!(
                self.verbosity,
                "Inferred graph has a cycle through {:?}",
                cycles.cycle_tasks
            );
        }

        let order = DependencySolver::new(self.verbosity).solve_graph(&graph);
        let parallel_groups = parallel_groups(&graph);

        GraphBuildResult {
            graph: graph.to_map(),
            tasks: annotated,
            execution_order: order.execution_order,
            parallel_groups,
            has_cycle: cycles.has_cycle(),
            cycle_tasks: cycles.cycle_tasks,
            cycle_edges: cycles.back_edges,
        }
    }

    /// Copy `tasks`, adding an edge wherever a tag rule orders one task before another.
    pub fn infer_dependencies(&self, tasks: &[Task]) -> Vec<Task> {
        let mut annotated: Vec<Task> = tasks.to_vec();

        for (i, later) in tasks.iter().enumerate() {
            for (j, earlier) in tasks.iter().enumerate() {
                if i == j || later.id == earlier.id {
                    continue;
                }
                if !self.rules.requires(&later.tags, &earlier.tags) {
                    continue;
                }
                if !annotated[i].dependencies.contains(&earlier.id) {
                    log_details!(
                        self.verbosity,
                        "Inferred {} -> {} from tags {:?} / {:?}",
                        later.id,
                        earlier.id,
                        later.tags,
                        earlier.tags
                    );
                    annotated[i].dependencies.push(earlier.id.clone());
                }
            }
        }

        annotated
    }
}

/// Greedy grouping: each group holds every task whose dependencies all sit in
/// earlier groups. Groups are ordered by `(effective rank, id)`.
pub fn parallel_groups(graph: &DependencyGraph) -> Vec<Vec<String>> {
    let ranks = effective_ranks(graph);
    let mut completed: FxHashSet<TaskId> = FxHashSet::default();
    let mut groups = Vec::new();

    loop {
        let mut group: Vec<TaskId> = (0..graph.len() as TaskId)
            .filter(|id| !completed.contains(id))
            .filter(|&id| graph.deps[id as usize].iter().all(|d| completed.contains(d)))
            .collect();
        if group.is_empty() {
            break;
        }
        group.sort_by_key(|&id| (ranks[id as usize], id));
        completed.extend(group.iter().copied());
        groups.push(graph.names(&group));
    }

    groups
}
