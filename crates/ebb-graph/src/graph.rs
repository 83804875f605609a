//! Detached graph snapshots.
//!
//! A `Graph` is what a neighborhood query hands back. It owns its data, so
//! callers can keep it, mutate it or serialize it without touching the
//! cache it came from.

use crate::view::{EdgeView, GraphView, VertexView};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::hash::Hash;

/// Vertices and weighted edges captured at query time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Graph<K: Eq + Hash, V> {
    /// Vertex values by key.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub vertices: HashMap<K, V>,

    /// Edge weights as `tail -> head -> weight`.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub edges: HashMap<K, HashMap<K, f64>>,
}

impl<K: Eq + Hash, V> Default for Graph<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash, V> Graph<K, V> {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self {
            vertices: HashMap::new(),
            edges: HashMap::new(),
        }
    }

    /// Inserts or replaces a vertex.
    pub fn add_vertex(&mut self, key: K, value: V) {
        self.vertices.insert(key, value);
    }

    /// Inserts or replaces the weight of `tail -> head`.
    pub fn add_edge(&mut self, tail: K, head: K, weight: f64) {
        self.edges.entry(tail).or_default().insert(head, weight);
    }

    /// Gets a vertex value.
    pub fn vertex(&self, key: &K) -> Option<&V> {
        self.vertices.get(key)
    }

    /// Gets the weight of `tail -> head`.
    pub fn weight(&self, tail: &K, head: &K) -> Option<f64> {
        self.edges.get(tail)?.get(head).copied()
    }

    /// Returns the outgoing edges of `tail`.
    pub fn heads(&self, tail: &K) -> Option<&HashMap<K, f64>> {
        self.edges.get(tail)
    }

    /// Returns the number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Returns the number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(HashMap::len).sum()
    }

    /// Returns true if the graph has neither vertices nor edges.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() && self.edges.is_empty()
    }

    /// Flattens the graph into the node/edge list form used by visualizers.
    ///
    /// Output is sorted by id so equal graphs render identically.
    pub fn render<F, L>(&self, key_to_id: F, value_to_label: L) -> GraphView
    where
        F: Fn(&K) -> u64,
        L: Fn(&V) -> String,
    {
        let mut nodes: Vec<VertexView> = self
            .vertices
            .iter()
            .map(|(key, value)| VertexView {
                id: key_to_id(key),
                label: value_to_label(value),
                value: None,
            })
            .collect();
        nodes.sort_by_key(|node| node.id);

        let mut edges: Vec<EdgeView> = self
            .edges
            .iter()
            .flat_map(|(tail, heads)| {
                let from = key_to_id(tail);
                heads.iter().map(move |(head, weight)| (from, head, *weight))
            })
            .map(|(from, head, value)| EdgeView {
                from,
                to: key_to_id(head),
                value,
            })
            .collect();
        edges.sort_by_key(|edge| (edge.from, edge.to));

        GraphView { nodes, edges }
    }
}

impl<K: Eq + Hash + Clone, V> Graph<K, V> {
    /// Builds a petgraph `DiGraph` with the same topology.
    ///
    /// Every vertex and every edge endpoint becomes a node, so endpoints
    /// whose vertex expired before the snapshot still show up. Returns the
    /// graph together with the key to node index mapping.
    pub fn to_digraph(&self) -> (DiGraph<K, f64>, HashMap<K, NodeIndex>) {
        let mut graph = DiGraph::new();
        let mut index: HashMap<K, NodeIndex> = HashMap::new();

        let mut node_for = |graph: &mut DiGraph<K, f64>, key: &K| -> NodeIndex {
            *index
                .entry(key.clone())
                .or_insert_with(|| graph.add_node(key.clone()))
        };

        for key in self.vertices.keys() {
            node_for(&mut graph, key);
        }
        for (tail, heads) in &self.edges {
            let from = node_for(&mut graph, tail);
            for (head, weight) in heads {
                let to = node_for(&mut graph, head);
                graph.add_edge(from, to, *weight);
            }
        }

        (graph, index)
    }
}
