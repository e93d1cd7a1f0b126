//! Cycle detection over a `DependencyGraph`.
//!
//! Two depth-first passes: Tarjan's algorithm finds every task that sits on
//! a cycle (non-trivial strongly connected components and self-loops), and a
//! coloring DFS names the back-edges that close those cycles. Nothing is
//! repaired here; callers decide what to do with the report.

use crate::graph::DependencyGraph;
use crate::interner::TaskId;

/// What cycle detection found.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    /// Each cycle's tasks, sorted by id. Cycles are ordered by their first id.
    pub cycles: Vec<Vec<String>>,
    /// All tasks on any cycle, sorted by id.
    pub cycle_tasks: Vec<String>,
    /// Back-edges as `(dependent, dependency)` pairs in DFS discovery order.
    pub back_edges: Vec<(String, String)>,
}

impl CycleReport {
    pub fn has_cycle(&self) -> bool {
        !self.cycles.is_empty()
    }
}

/// Run both passes and name the results.
pub fn detect_cycles(graph: &DependencyGraph) -> CycleReport {
    let mut components = strongly_connected_cycles(graph);
    for component in &mut components {
        component.sort_unstable();
    }
    components.sort();

    let mut members: Vec<TaskId> = components.iter().flatten().copied().collect();
    members.sort_unstable();

    CycleReport {
        cycles: components.iter().map(|c| graph.names(c)).collect(),
        cycle_tasks: graph.names(&members),
        back_edges: back_edges(graph)
            .into_iter()
            .map(|(from, to)| {
                (
                    graph.index.name(from).to_string(),
                    graph.index.name(to).to_string(),
                )
            })
            .collect(),
    }
}

const UNVISITED: usize = usize::MAX;

/// Tarjan's SCC algorithm (iterative). Returns only components that contain a cycle.
fn strongly_connected_cycles(graph: &DependencyGraph) -> Vec<Vec<TaskId>> {
    let n = graph.len();
    let mut order = vec![UNVISITED; n];
    let mut lowlink = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<usize> = Vec::new();
    let mut next_order = 0usize;
    let mut cycles = Vec::new();

    for root in 0..n {
        if order[root] != UNVISITED {
            continue;
        }

        // Frames of (node, position of the next edge to follow)
        let mut work: Vec<(usize, usize)> = vec![(root, 0)];
        order[root] = next_order;
        lowlink[root] = next_order;
        next_order += 1;
        stack.push(root);
        on_stack[root] = true;

        while let Some(frame) = work.last_mut() {
            let v = frame.0;
            if frame.1 < graph.deps[v].len() {
                let w = graph.deps[v][frame.1] as usize;
                frame.1 += 1;

                if order[w] == UNVISITED {
                    order[w] = next_order;
                    lowlink[w] = next_order;
                    next_order += 1;
                    stack.push(w);
                    on_stack[w] = true;
                    work.push((w, 0));
                } else if on_stack[w] {
                    lowlink[v] = lowlink[v].min(order[w]);
                }
                continue;
            }

            work.pop();
            if let Some(&(parent, _)) = work.last() {
                lowlink[parent] = lowlink[parent].min(lowlink[v]);
            }

            if lowlink[v] == order[v] {
                let mut component = Vec::new();
                while let Some(w) = stack.pop() {
                    on_stack[w] = false;
                    component.push(w as TaskId);
                    if w == v {
                        break;
                    }
                }
                let self_loop = graph.deps[v].contains(&(v as TaskId));
                if component.len() > 1 || self_loop {
                    cycles.push(component);
                }
            }
        }
    }

    cycles
}

#[derive(Clone, Copy, PartialEq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Coloring DFS (iterative), roots visited in id order. An edge into a gray
/// node is a back-edge.
fn back_edges(graph: &DependencyGraph) -> Vec<(TaskId, TaskId)> {
    let n = graph.len();
    let mut color = vec![Color::White; n];
    let mut edges = Vec::new();

    for root in 0..n {
        if color[root] != Color::White {
            continue;
        }
        let mut work: Vec<(usize, usize)> = vec![(root, 0)];
        color[root] = Color::Gray;

        while let Some(frame) = work.last_mut() {
            let v = frame.0;
            if frame.1 < graph.deps[v].len() {
                let w = graph.deps[v][frame.1] as usize;
                frame.1 += 1;
                match color[w] {
                    Color::White => {
                        color[w] = Color::Gray;
                        work.push((w, 0));
                    }
                    Color::Gray => edges.push((v as TaskId, w as TaskId)),
                    Color::Black => {}
                }
            } else {
                color[v] = Color::Black;
                work.pop();
            }
        }
    }

    edges
}
