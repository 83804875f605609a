//! Node/edge list form of a graph for visualizers.

use serde::{Deserialize, Serialize};

/// A vertex with a numeric id, a display label and an optional payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VertexView {
    pub id: u64,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// A weighted edge between two vertex ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeView {
    pub from: u64,
    pub to: u64,
    pub value: f64,
}

/// Flattened graph, serialized as `{"nodes": [...], "edges": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphView {
    pub nodes: Vec<VertexView>,
    pub edges: Vec<EdgeView>,
}
