//! Dependency graph for tasks
//!
//! Edges point from a task to the tasks it depends on. Edges are accepted
//! as given: self-references and cycles are not rejected on insert. Use
//! [`DependencyGraph::cycles`] to report them.
//! Uses petgraph for graph operations.

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::HashMap;

use super::board::BoardSnapshot;
use super::id::TaskId;

/// A dependency graph over task ids
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// The underlying directed graph
    graph: DiGraph<TaskId, ()>,

    /// Map from TaskId to node index
    node_map: HashMap<TaskId, NodeIndex>,
}

impl DependencyGraph {
    /// Creates an empty dependency graph
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            node_map: HashMap::new(),
        }
    }

    /// Builds a graph from the dependency sets of every task on the board.
    ///
    /// Dependencies on tasks no longer in the snapshot still become edges.
    pub fn from_snapshot(snapshot: &BoardSnapshot) -> Self {
        let mut graph = Self::new();

        // First pass: add all nodes
        for id in snapshot.tasks.keys() {
            graph.node(id);
        }

        // Second pass: add all edges
        for task in snapshot.tasks.values() {
            for dep in &task.dependencies {
                graph.add_edge(&task.id, dep);
            }
        }

        graph
    }

    /// Returns the node for a task, adding it if needed
    fn node(&mut self, task_id: &TaskId) -> NodeIndex {
        if let Some(idx) = self.node_map.get(task_id) {
            return *idx;
        }
        let idx = self.graph.add_node(task_id.clone());
        self.node_map.insert(task_id.clone(), idx);
        idx
    }

    /// Adds an edge: `from` depends on `to`.
    ///
    /// Returns false if the edge already existed.
    pub fn add_edge(&mut self, from: &TaskId, to: &TaskId) -> bool {
        let from_idx = self.node(from);
        let to_idx = self.node(to);

        if self.graph.find_edge(from_idx, to_idx).is_some() {
            return false;
        }
        self.graph.add_edge(from_idx, to_idx, ());
        true
    }

    /// Removes an edge; returns false if it did not exist
    pub fn remove_edge(&mut self, from: &TaskId, to: &TaskId) -> bool {
        let (Some(from_idx), Some(to_idx)) = (self.node_map.get(from), self.node_map.get(to))
        else {
            return false;
        };

        match self.graph.find_edge(*from_idx, *to_idx) {
            Some(edge) => {
                self.graph.remove_edge(edge);
                true
            }
            None => false,
        }
    }

    /// Tasks that `task_id` depends on, sorted by id
    pub fn outgoing(&self, task_id: &TaskId) -> Vec<TaskId> {
        self.neighbors(task_id, Direction::Outgoing)
    }

    /// Tasks that depend on `task_id`, sorted by id
    pub fn incoming(&self, task_id: &TaskId) -> Vec<TaskId> {
        self.neighbors(task_id, Direction::Incoming)
    }

    fn neighbors(&self, task_id: &TaskId, direction: Direction) -> Vec<TaskId> {
        let Some(idx) = self.node_map.get(task_id) else {
            return vec![];
        };

        let mut ids: Vec<TaskId> = self
            .graph
            .neighbors_directed(*idx, direction)
            .filter_map(|n| self.graph.node_weight(n).cloned())
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    /// True if the task has no dependencies, or every dependency's checklist
    /// is empty or fully completed.
    ///
    /// A dependency that no longer exists on the board counts as unsatisfied.
    pub fn is_satisfied(&self, task_id: &TaskId, snapshot: &BoardSnapshot) -> bool {
        self.outgoing(task_id).iter().all(|dep| {
            snapshot
                .task(dep)
                .map(|t| t.checklist_complete())
                .unwrap_or(false)
        })
    }

    /// Dependency cycles currently in the graph.
    ///
    /// Each entry is a strongly connected component of two or more tasks,
    /// or a single task that depends on itself. Ids within an entry are sorted.
    pub fn cycles(&self) -> Vec<Vec<TaskId>> {
        let mut cycles: Vec<Vec<TaskId>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || component
                        .first()
                        .is_some_and(|n| self.graph.find_edge(*n, *n).is_some())
            })
            .map(|component| {
                let mut ids: Vec<TaskId> = component
                    .into_iter()
                    .filter_map(|n| self.graph.node_weight(n).cloned())
                    .collect();
                ids.sort();
                ids
            })
            .collect();
        cycles.sort();
        cycles
    }

    /// Returns true if the graph contains the task
    pub fn contains(&self, task_id: &TaskId) -> bool {
        self.node_map.contains_key(task_id)
    }

    /// Returns the number of tasks in the graph
    pub fn len(&self) -> usize {
        self.node_map.len()
    }

    /// Returns true if the graph is empty
    pub fn is_empty(&self) -> bool {
        self.node_map.is_empty()
    }

    /// Returns the number of dependency edges
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}
