// src/plan/graph.rs

//! Dependency graph and task ordering
//!
//! Nodes are package ids stored in an arena and addressed by index; edges
//! point from a dependent to its dependency. Cycle detection is an
//! iterative three-color DFS so deep chains cannot exhaust the stack.

use super::TaskType;
use crate::packages::PackageId;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// Arena-backed dependency graph
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: Vec<PackageId>,
    index: HashMap<PackageId, usize>,
    /// Outgoing edges: dependent -> dependencies
    edges: Vec<Vec<usize>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of `id`, inserting it if needed
    pub fn add_node(&mut self, id: &PackageId) -> usize {
        if let Some(&idx) = self.index.get(id) {
            return idx;
        }
        let idx = self.nodes.len();
        self.nodes.push(id.clone());
        self.index.insert(id.clone(), idx);
        self.edges.push(Vec::new());
        idx
    }

    /// Record that `dependent` depends on `dependency`
    pub fn add_edge(&mut self, dependent: usize, dependency: usize) {
        if !self.edges[dependent].contains(&dependency) {
            self.edges[dependent].push(dependency);
        }
    }

    pub fn node(&self, id: &PackageId) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn id(&self, idx: usize) -> &PackageId {
        &self.nodes[idx]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Direct dependencies of a node
    pub fn dependencies(&self, idx: usize) -> &[usize] {
        &self.edges[idx]
    }

    /// Find a cycle, returned as a closed path (`a -> b -> a`)
    pub fn find_cycle(&self) -> Option<Vec<PackageId>> {
        let mut color = vec![Color::White; self.nodes.len()];

        for start in 0..self.nodes.len() {
            if color[start] != Color::White {
                continue;
            }

            // (node, next edge to visit)
            let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
            color[start] = Color::Gray;

            while let Some(&(node, next)) = stack.last() {
                let Some(&dep) = self.edges[node].get(next) else {
                    color[node] = Color::Black;
                    stack.pop();
                    continue;
                };
                if let Some(top) = stack.last_mut() {
                    top.1 += 1;
                }

                match color[dep] {
                    Color::White => {
                        color[dep] = Color::Gray;
                        stack.push((dep, 0));
                    }
                    Color::Gray => {
                        let from = stack.iter().position(|&(n, _)| n == dep).unwrap_or(0);
                        let mut cycle: Vec<PackageId> = stack[from..]
                            .iter()
                            .map(|&(n, _)| self.nodes[n].clone())
                            .collect();
                        cycle.push(self.nodes[dep].clone());
                        return Some(cycle);
                    }
                    Color::Black => {}
                }
            }
        }

        None
    }

    /// Nodes reachable from `start` through one or more edges
    pub fn reachable(&self, start: usize) -> Vec<bool> {
        let mut seen = vec![false; self.nodes.len()];
        let mut stack: Vec<usize> = self.edges[start].clone();

        while let Some(node) = stack.pop() {
            if seen[node] {
                continue;
            }
            seen[node] = true;
            stack.extend(self.edges[node].iter().copied());
        }

        seen
    }
}

/// A task as seen by the scheduler
#[derive(Debug, Clone, Copy)]
pub struct ScheduleEntry {
    /// Submission key; smaller keys run first when nothing else constrains them
    pub key: (usize, usize),
    pub kind: TaskType,
    /// Graph node of the task's package
    pub node: usize,
}

/// Order tasks so installs follow their dependencies and uninstalls precede them
///
/// INSTALL x runs after INSTALL y when x depends on y (transitively).
/// UNINSTALL x runs before UNINSTALL y under the same relation. REMOVE and
/// EXTRACT carry no edges. Ties keep submission order. The graph must be
/// acyclic; returns indices into `entries`.
pub fn schedule(graph: &DependencyGraph, entries: &[ScheduleEntry]) -> Vec<usize> {
    let n = entries.len();
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut in_degree = vec![0usize; n];

    let reach: HashMap<usize, Vec<bool>> = entries
        .iter()
        .filter(|e| matches!(e.kind, TaskType::Install | TaskType::Uninstall))
        .map(|e| (e.node, graph.reachable(e.node)))
        .collect();

    for (a, ea) in entries.iter().enumerate() {
        let Some(from_a) = reach.get(&ea.node) else {
            continue;
        };
        for (b, eb) in entries.iter().enumerate() {
            if a == b || ea.kind != eb.kind || ea.node == eb.node || !from_a[eb.node] {
                continue;
            }
            // ea's package depends on eb's package
            let (first, second) = match ea.kind {
                TaskType::Install => (b, a),
                _ => (a, b),
            };
            successors[first].push(second);
            in_degree[second] += 1;
        }
    }

    let mut ready: BinaryHeap<Reverse<((usize, usize), usize)>> = entries
        .iter()
        .enumerate()
        .filter(|(i, _)| in_degree[*i] == 0)
        .map(|(i, e)| Reverse((e.key, i)))
        .collect();

    let mut order = Vec::with_capacity(n);
    while let Some(Reverse((_, i))) = ready.pop() {
        order.push(i);
        for &next in &successors[i] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.push(Reverse((entries[next].key, next)));
            }
        }
    }

    order
}
