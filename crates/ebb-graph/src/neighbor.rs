//! Neighborhood expansion.
//!
//! Breadth-first expansion from a seed vertex, keeping only the heaviest
//! outgoing edges of every visited tail. Hops run one after another; the
//! tails inside a hop are expanded in parallel on the rayon pool and each
//! produces its own result row, so no two tasks ever write the same key.

use crate::cache::GraphCache;
use crate::graph::Graph;
use ebb_core::top_k;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::time::Instant;
use tracing::debug;

impl<K, V> GraphCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Returns the pruned neighborhood of `seed` as a detached snapshot.
    ///
    /// * `steps` - number of hops to expand
    /// * `k` - outgoing edges kept per tail, heaviest first
    /// * `idf` - divide weights by `log2(1 + df[head])` before pruning
    ///
    /// A seed that is not a live vertex yields an empty graph. Edge
    /// endpoints whose vertex expired mid-query stay in `edges` but are
    /// missing from `vertices`. Which of several equal-weight edges
    /// survives pruning is unspecified.
    pub fn neighbor(&self, seed: &K, steps: usize, k: usize, idf: bool) -> Graph<K, V> {
        let start = Instant::now();
        let mut graph = Graph::new();

        let Some(seed_value) = self.vertices.get(seed) else {
            return graph;
        };
        graph.add_vertex(seed.clone(), seed_value);

        let mut targets: HashSet<K> = HashSet::from([seed.clone()]);
        let mut seen: HashSet<K> = HashSet::new();

        for hop in 0..steps {
            let frontier: Vec<K> = targets
                .iter()
                .filter(|tail| !seen.contains(*tail))
                .cloned()
                .collect();
            if frontier.is_empty() {
                break;
            }

            // Every task of this hop finishes before the next hop starts.
            let rows: Vec<(K, HashMap<K, f64>)> = frontier
                .par_iter()
                .filter_map(|tail| {
                    let candidates = self.edges.outgoing(tail, idf);
                    if candidates.is_empty() {
                        return None;
                    }
                    let kept: HashMap<K, f64> = top_k(candidates, k).into_iter().collect();
                    (!kept.is_empty()).then(|| (tail.clone(), kept))
                })
                .collect();

            debug!(
                "Hop {}: expanded {} tails, {} produced edges",
                hop + 1,
                frontier.len(),
                rows.len()
            );
            seen.extend(frontier);

            for (tail, heads) in rows {
                targets.extend(heads.keys().filter(|head| !seen.contains(*head)).cloned());
                graph.edges.insert(tail, heads);
            }
        }

        self.materialize_vertices(&mut graph);

        debug!(
            "Neighborhood query: {} vertices, {} edges in {:?}",
            graph.vertex_count(),
            graph.edge_count(),
            start.elapsed()
        );
        graph
    }

    /// Fills in current values for every edge endpoint that is still live.
    fn materialize_vertices(&self, graph: &mut Graph<K, V>) {
        let endpoints: HashSet<K> = graph
            .edges
            .iter()
            .flat_map(|(tail, heads)| std::iter::once(tail).chain(heads.keys()))
            .filter(|key| !graph.vertices.contains_key(*key))
            .cloned()
            .collect();

        for key in endpoints {
            if let Some(value) = self.vertices.get(&key) {
                graph.vertices.insert(key, value);
            }
        }
    }
}
