//! Ebb Graph - Decaying weighted-graph cache
//!
//! This crate keeps a graph whose vertices and edge weights fade out over
//! time. Every write carries a TTL; repeated writes to the same edge add
//! up, and each contribution expires on its own schedule. Queries walk the
//! graph breadth-first from a seed and keep only the heaviest edges per
//! vertex, optionally dampening heads that everything links to.
//!
//! # Architecture
//!
//! - [`WeightAccumulator`]: an edge weight made of expiring contributions
//! - [`EdgeIndex`]: `tail -> head` weights plus per-head document frequency
//! - [`GraphCache`]: vertex store and edge index kept consistent by a
//!   periodic sweep, with the `neighbor` query on top
//! - [`Graph`]: the detached snapshot a query returns
//!
//! # Example
//!
//! ```no_run
//! use ebb_graph::GraphCache;
//! use std::time::Duration;
//!
//! # async fn run() {
//! let cache: GraphCache<&str, String> = GraphCache::new(Duration::from_secs(60));
//! let sweeper = cache.spawn_watch(Duration::from_secs(1));
//!
//! cache.add_edge("rust", "cargo", 1.0);
//! cache.add_edge("rust", "cargo", 1.0);
//! cache.add_edge("rust", "borrowck", 1.0);
//!
//! let graph = cache.neighbor(&"rust", 2, 3, true);
//! assert_eq!(graph.weight(&"rust", &"cargo"), Some(2.0));
//!
//! sweeper.stop().await;
//! # }
//! ```

mod cache;
mod edge;
mod graph;
mod neighbor;
mod view;
mod weight;

pub use cache::{CacheStats, GraphCache, SweepReport, WatchHandle};
pub use edge::EdgeIndex;
pub use graph::Graph;
pub use view::{EdgeView, GraphView, VertexView};
pub use weight::{Contribution, WeightAccumulator};
