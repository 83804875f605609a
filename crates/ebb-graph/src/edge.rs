//! Edge index with document frequencies.
//!
//! Edges are stored as `tail -> head -> WeightAccumulator` ("term
//! frequency"), alongside a per-head count of how many tails point at it
//! ("document frequency"). The df count is what lets neighborhood queries
//! dampen heads that everything links to.
//!
//! The whole index sits behind one lock. Reads take it shared; a read that
//! finds a zero weight schedules the removal on a detached task instead of
//! upgrading.

use crate::weight::WeightAccumulator;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Lock-protected state of an [`EdgeIndex`].
#[derive(Debug)]
struct EdgeTable<K> {
    tf: HashMap<K, HashMap<K, WeightAccumulator>>,
    df: HashMap<K, usize>,
}

impl<K> Default for EdgeTable<K> {
    fn default() -> Self {
        Self {
            tf: HashMap::new(),
            df: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone> EdgeTable<K> {
    fn decrement_df(&mut self, head: &K) {
        if let Some(count) = self.df.get_mut(head) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.df.remove(head);
            }
        }
    }

    fn remove(&mut self, tail: &K, head: &K) -> bool {
        let Some(heads) = self.tf.get_mut(tail) else {
            return false;
        };
        if heads.remove(head).is_none() {
            return false;
        }
        if heads.is_empty() {
            self.tf.remove(tail);
        }
        self.decrement_df(head);
        true
    }
}

/// Concurrent `tail -> head` weight index.
///
/// Cloning is cheap and shares the underlying table.
#[derive(Debug)]
pub struct EdgeIndex<K> {
    table: Arc<RwLock<EdgeTable<K>>>,
}

impl<K> Clone for EdgeIndex<K> {
    fn clone(&self) -> Self {
        Self {
            table: Arc::clone(&self.table),
        }
    }
}

impl<K> Default for EdgeIndex<K> {
    fn default() -> Self {
        Self {
            table: Arc::new(RwLock::new(EdgeTable::default())),
        }
    }
}

impl<K> EdgeIndex<K>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
{
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a contribution to `tail -> head`, expiring `ttl` from now.
    pub fn add_with_ttl(&self, tail: K, head: K, weight: f64, ttl: Duration) {
        self.add_with_expiration(tail, head, weight, ebb_core::expiration_after(ttl));
    }

    /// Adds a contribution to `tail -> head` with an absolute expiration.
    ///
    /// The first contribution for a pair creates its accumulator and bumps
    /// the head's document frequency.
    pub fn add_with_expiration(&self, tail: K, head: K, weight: f64, expires_at: Instant) {
        let mut table = self.table.write();
        let EdgeTable { tf, df } = &mut *table;
        let accumulator = tf
            .entry(tail)
            .or_default()
            .entry(head.clone())
            .or_insert_with(|| {
                *df.entry(head).or_insert(0) += 1;
                WeightAccumulator::new()
            });
        accumulator.add_with_expiration(weight, expires_at);
    }

    /// Returns the live weight of `tail -> head`.
    ///
    /// A zero weight reads as absent and its removal is scheduled on the
    /// rayon pool.
    pub fn get(&self, tail: &K, head: &K) -> Option<f64> {
        let now = Instant::now();
        let weight = self
            .table
            .read()
            .tf
            .get(tail)
            .and_then(|heads| heads.get(head))
            .map(|accumulator| accumulator.value_at(now))?;

        if weight == 0.0 {
            self.schedule_collapse(tail.clone(), head.clone());
            return None;
        }
        Some(weight)
    }

    /// Removes `tail -> head`. Returns true if it existed.
    pub fn delete(&self, tail: &K, head: &K) -> bool {
        self.table.write().remove(tail, head)
    }

    /// Removes every edge leaving `tail`, keeping df in sync.
    ///
    /// Returns the number of edges removed.
    pub fn remove_tail(&self, tail: &K) -> usize {
        let mut table = self.table.write();
        let Some(heads) = table.tf.remove(tail) else {
            return 0;
        };
        for head in heads.keys() {
            table.decrement_df(head);
        }
        heads.len()
    }

    /// Removes every edge with an endpoint that fails `is_live`, keeping df
    /// in sync. A failing tail drops its whole row without checking heads.
    ///
    /// `is_live` runs under the write lock, so a writer that recreates an
    /// endpoint and then links an edge either lands before the check (and is
    /// kept) or after the removal. Returns the number of edges removed.
    pub fn retain_live<F>(&self, is_live: F) -> usize
    where
        F: Fn(&K) -> bool,
    {
        let mut table = self.table.write();
        let table = &mut *table;
        let mut orphaned = Vec::new();

        table.tf.retain(|tail, heads| {
            if !is_live(tail) {
                orphaned.extend(heads.drain().map(|(head, _)| head));
                return false;
            }
            heads.retain(|head, _| {
                let live = is_live(head);
                if !live {
                    orphaned.push(head.clone());
                }
                live
            });
            !heads.is_empty()
        });

        for head in &orphaned {
            table.decrement_df(head);
        }
        orphaned.len()
    }

    /// Removes every edge whose weight has collapsed to zero.
    ///
    /// Full scan under the write lock. Returns the number of edges removed.
    pub fn flush(&self) -> usize {
        let mut table = self.table.write();
        let table = &mut *table;
        let mut collapsed = Vec::new();

        table.tf.retain(|_, heads| {
            heads.retain(|head, accumulator| {
                if accumulator.is_zero() {
                    collapsed.push(head.clone());
                    false
                } else {
                    true
                }
            });
            !heads.is_empty()
        });

        for head in &collapsed {
            table.decrement_df(head);
        }
        collapsed.len()
    }

    /// Live, non-zero outgoing edges of `tail`.
    ///
    /// With `idf`, each weight is divided by `log2(1 + df[head])`. A head
    /// without a recorded df keeps its raw weight.
    pub fn outgoing(&self, tail: &K, idf: bool) -> Vec<(K, f64)> {
        let now = Instant::now();
        let table = self.table.read();
        let Some(heads) = table.tf.get(tail) else {
            return Vec::new();
        };

        heads
            .iter()
            .filter_map(|(head, accumulator)| {
                let weight = accumulator.value_at(now);
                if weight == 0.0 {
                    return None;
                }
                if !idf {
                    return Some((head.clone(), weight));
                }
                let df = table.df.get(head).copied().unwrap_or(0);
                Some((head.clone(), idf_adjust(weight, df)))
            })
            .collect()
    }

    /// Number of distinct tails currently linking to `head`.
    pub fn document_frequency(&self, head: &K) -> usize {
        self.table.read().df.get(head).copied().unwrap_or(0)
    }

    /// Snapshot of live, non-zero weights (`getTF`).
    pub fn tf_snapshot(&self) -> HashMap<K, HashMap<K, f64>> {
        let now = Instant::now();
        let table = self.table.read();
        table
            .tf
            .iter()
            .filter_map(|(tail, heads)| {
                let live: HashMap<K, f64> = heads
                    .iter()
                    .map(|(head, accumulator)| (head.clone(), accumulator.value_at(now)))
                    .filter(|(_, weight)| *weight != 0.0)
                    .collect();
                (!live.is_empty()).then(|| (tail.clone(), live))
            })
            .collect()
    }

    /// Snapshot of document frequencies (`getDF`).
    pub fn df_snapshot(&self) -> HashMap<K, usize> {
        self.table.read().df.clone()
    }

    /// Snapshot of every stored row as `(tail, heads)`.
    pub fn rows(&self) -> Vec<(K, Vec<K>)> {
        self.table
            .read()
            .tf
            .iter()
            .map(|(tail, heads)| (tail.clone(), heads.keys().cloned().collect()))
            .collect()
    }

    /// Number of distinct tails with at least one stored edge.
    pub fn tail_count(&self) -> usize {
        self.table.read().tf.len()
    }

    /// Number of stored edges, collapsed ones included until flushed.
    pub fn len(&self) -> usize {
        self.table.read().tf.values().map(HashMap::len).sum()
    }

    /// Returns true if no edges are stored.
    pub fn is_empty(&self) -> bool {
        self.table.read().tf.is_empty()
    }

    /// Removes `tail -> head` on the rayon pool if it is still zero by then.
    fn schedule_collapse(&self, tail: K, head: K) {
        let table = Arc::clone(&self.table);
        rayon::spawn(move || {
            let mut table = table.write();
            let still_zero = table
                .tf
                .get_mut(&tail)
                .and_then(|heads| heads.get_mut(&head))
                .map_or(false, WeightAccumulator::is_zero);
            if still_zero {
                table.remove(&tail, &head);
            }
        });
    }
}

/// Dampens `weight` by how popular its head is.
fn idf_adjust(weight: f64, df: usize) -> f64 {
    let denominator = (1.0 + df as f64).log2();
    if denominator > 0.0 {
        weight / denominator
    } else {
        weight
    }
}
