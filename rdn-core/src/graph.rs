//! The "consumed" generic graph container `spec.md` §6 names as an external
//! collaborator: nodes identified by caller-supplied ids, directed edges with
//! a value, degree queries, and depth-first reachability. Backed by
//! `petgraph`, the same graph crate the rest of this workspace builds on.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use petgraph::Direction::{Incoming, Outgoing};

#[derive(Debug, Clone)]
pub struct Graph<K> {
    graph: DiGraph<K, i32>,
    index: HashMap<K, NodeIndex>,
}

impl<K> Default for Graph<K>
where
    K: Eq + Hash + Clone + Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> Graph<K>
where
    K: Eq + Hash + Clone + Debug,
{
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            index: HashMap::new(),
        }
    }

    pub fn from_list(edges: impl IntoIterator<Item = (K, K, i32)>) -> Self {
        let mut g = Self::new();
        for (from, to, value) in edges {
            g.add_edge(from, to, value);
        }
        g
    }

    pub fn add_node(&mut self, id: K) -> NodeIndex {
        if let Some(&i) = self.index.get(&id) {
            return i;
        }
        let i = self.graph.add_node(id.clone());
        self.index.insert(id, i);
        i
    }

    pub fn add_edge(&mut self, from: K, to: K, value: i32) {
        let a = self.add_node(from);
        let b = self.add_node(to);
        self.graph.update_edge(a, b, value);
    }

    pub fn contains(&self, id: &K) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn nodes(&self) -> Vec<K> {
        self.graph.node_weights().cloned().collect()
    }

    /// Nodes reachable by a single outgoing edge from `id` (`from_node=id`).
    pub fn nodes_from(&self, id: &K) -> Vec<K> {
        match self.index.get(id) {
            Some(&i) => self
                .graph
                .neighbors_directed(i, Outgoing)
                .map(|n| self.graph[n].clone())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Nodes with a single outgoing edge into `id` (`to_node=id`).
    pub fn nodes_to(&self, id: &K) -> Vec<K> {
        match self.index.get(id) {
            Some(&i) => self
                .graph
                .neighbors_directed(i, Incoming)
                .map(|n| self.graph[n].clone())
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn nodes_with_in_degree(&self, degree: usize) -> Vec<K> {
        self.graph
            .node_indices()
            .filter(|&i| self.graph.neighbors_directed(i, Incoming).count() == degree)
            .map(|i| self.graph[i].clone())
            .collect()
    }

    pub fn nodes_with_out_degree(&self, degree: usize) -> Vec<K> {
        self.graph
            .node_indices()
            .filter(|&i| self.graph.neighbors_directed(i, Outgoing).count() == degree)
            .map(|i| self.graph[i].clone())
            .collect()
    }

    /// True iff `end` is reachable from `start` following directed edges.
    pub fn depth_first_search(&self, start: &K, end: &K) -> bool {
        let (Some(&s), Some(&e)) = (self.index.get(start), self.index.get(end)) else {
            return false;
        };
        let mut dfs = Dfs::new(&self.graph, s);
        while let Some(next) = dfs.next(&self.graph) {
            if next == e {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_list_builds_topology() {
        let g = Graph::from_list([(1, 2, 1), (2, 3, 1), (3, 4, 1), (3, 2, 1)]);
        assert_eq!(g.len(), 4);
        assert_eq!(g.nodes_from(&1), vec![2]);
        assert!(g.nodes_to(&2).contains(&1));
        assert!(g.nodes_to(&2).contains(&3));
    }

    #[test]
    fn degree_queries() {
        let g = Graph::from_list([(1, 2, 1), (2, 3, 1)]);
        assert_eq!(g.nodes_with_in_degree(0), vec![1]);
        assert_eq!(g.nodes_with_out_degree(0), vec![3]);
    }

    #[test]
    fn dfs_detects_back_edge_cycle() {
        let g = Graph::from_list([(1, 2, 1), (2, 3, 1), (3, 4, 1), (3, 2, 1)]);
        assert!(g.depth_first_search(&2, &3));
        assert!(!g.depth_first_search(&4, &1));
    }

    #[test]
    fn missing_nodes_are_unreachable() {
        let g: Graph<i32> = Graph::new();
        assert!(!g.depth_first_search(&1, &2));
        assert!(g.nodes_from(&1).is_empty());
    }

    #[test]
    fn add_node_is_idempotent() {
        let mut g = Graph::new();
        let a = g.add_node(1);
        let b = g.add_node(1);
        assert_eq!(a, b);
        assert_eq!(g.len(), 1);
    }
}
