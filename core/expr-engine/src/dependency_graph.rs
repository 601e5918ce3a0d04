//! FILENAME: core/expr-engine/src/dependency_graph.rs
//! PURPOSE: Directed graph of name-to-name dependencies with cycle detection.
//! CONTEXT: Custom report variables may read other variables. A variable
//! can only be evaluated after everything it reads, so the definition
//! loader uses this graph to reject cycles and to compute an evaluation
//! order for callers that do not supply one.
//!
//! TERMINOLOGY:
//! - Precedents: names a node reads (its inputs).
//!   If total = net + tax, then net and tax are precedents of total.

use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use thiserror::Error;

/// A dependency cycle, as found by `topological_order`.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("circular reference detected: {}", .cycle_path.join(" -> "))]
pub struct CycleError {
    /// The names involved in the cycle, in order.
    pub cycle_path: Vec<String>,
}

/// Tracks dependencies between named nodes.
/// Insertion order is remembered so that sorting is deterministic.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// Every node, in insertion order.
    nodes: Vec<String>,

    /// For each node, the nodes it directly depends on.
    precedents: FxHashMap<String, FxHashSet<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        DependencyGraph::default()
    }

    /// Registers a node with no dependencies (no-op if already known).
    pub fn add_node(&mut self, name: &str) {
        if !self.nodes.iter().any(|n| n == name) {
            self.nodes.push(name.to_string());
        }
    }

    /// Sets the dependencies for a node, replacing any previous ones.
    /// Precedents that were never added are registered as nodes.
    pub fn set_dependencies<I, S>(&mut self, name: &str, precedents: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_node(name);
        let precedents: FxHashSet<String> = precedents.into_iter().map(Into::into).collect();
        for prec in &precedents {
            self.add_node(prec);
        }
        if precedents.is_empty() {
            self.precedents.remove(name);
        } else {
            self.precedents.insert(name.to_string(), precedents);
        }
    }

    /// Orders every node so that each comes after all of its precedents,
    /// using Kahn's algorithm. Ties keep insertion order.
    pub fn topological_order(&self) -> Result<Vec<String>, CycleError> {
        let mut in_degree: FxHashMap<&str, usize> = self
            .nodes
            .iter()
            .map(|n| (n.as_str(), self.precedents.get(n).map_or(0, FxHashSet::len)))
            .collect();

        let mut queue: VecDeque<&str> = self
            .nodes
            .iter()
            .map(String::as_str)
            .filter(|n| in_degree.get(n).copied() == Some(0))
            .collect();

        let mut result = Vec::with_capacity(self.nodes.len());

        while let Some(name) = queue.pop_front() {
            result.push(name.to_string());

            // Release dependents in insertion order
            for node in &self.nodes {
                let reads_name = self
                    .precedents
                    .get(node)
                    .map_or(false, |precs| precs.contains(name));
                if !reads_name {
                    continue;
                }
                if let Some(deg) = in_degree.get_mut(node.as_str()) {
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push_back(node);
                    }
                }
            }
        }

        if result.len() != self.nodes.len() {
            let cycle_nodes: Vec<&str> = self
                .nodes
                .iter()
                .map(String::as_str)
                .filter(|n| in_degree.get(n).map_or(false, |&d| d > 0))
                .collect();
            return Err(CycleError {
                cycle_path: self.find_cycle_path(&cycle_nodes),
            });
        }

        Ok(result)
    }

    /// Traces a cycle through the unsorted nodes for the error message.
    /// Falls back to listing them when no closed path is found.
    fn find_cycle_path(&self, cycle_nodes: &[&str]) -> Vec<String> {
        let Some(&start) = cycle_nodes.first() else {
            return Vec::new();
        };

        let node_set: FxHashSet<&str> = cycle_nodes.iter().copied().collect();
        let mut path = vec![start.to_string()];
        let mut current = start;

        for _ in 0..cycle_nodes.len() {
            let next = self.precedents.get(current).and_then(|precs| {
                let mut in_cycle: Vec<&String> =
                    precs.iter().filter(|p| node_set.contains(p.as_str())).collect();
                in_cycle.sort();
                in_cycle.first().map(|p| p.as_str())
            });

            match next {
                Some(next) => {
                    let seen = path.iter().any(|p| p == next);
                    path.push(next.to_string());
                    if seen {
                        return path;
                    }
                    current = next;
                }
                None => break,
            }
        }

        cycle_nodes.iter().map(|n| n.to_string()).collect()
    }
}
