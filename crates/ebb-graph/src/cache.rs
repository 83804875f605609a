//! The decaying graph cache.
//!
//! `GraphCache` pairs a vertex store with an edge index and keeps one rule
//! between them: every edge's tail and head must be a live vertex. Writes
//! uphold the rule by creating missing endpoints on demand. Expiry breaks it
//! passively, and the periodic sweep repairs it.
//!
//! The two halves are locked independently. No lock spans both, so a vertex
//! may expire between a liveness check and an edge read; the next sweep
//! cleans that up.

use crate::edge::EdgeIndex;
use ebb_core::{
    expiration_after, shutdown_channel, CacheConfig, Shutdown, ShutdownTrigger, TtlCache,
};
use serde::Serialize;
use std::hash::Hash;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Outcome of one sweep cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Vertices dropped because their TTL ran out.
    pub vertices_expired: usize,
    /// Edges dropped because their weight decayed or cancelled to zero.
    pub edges_collapsed: usize,
    /// Edges dropped because an endpoint vertex is gone.
    pub edges_orphaned: usize,
}

/// Size counters for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub vertices: usize,
    pub tails: usize,
    pub edges: usize,
}

/// Vertex store plus edge index with TTL-based decay.
///
/// Clones share state, which is how the background sweeper gets its handle.
#[derive(Debug)]
pub struct GraphCache<K, V> {
    default_ttl: Duration,
    pub(crate) vertices: TtlCache<K, V>,
    pub(crate) edges: EdgeIndex<K>,
}

impl<K, V> Clone for GraphCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            default_ttl: self.default_ttl,
            vertices: self.vertices.clone(),
            edges: self.edges.clone(),
        }
    }
}

impl<K, V> GraphCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates an empty cache. Writes without an explicit TTL use
    /// `default_ttl`.
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            default_ttl,
            vertices: TtlCache::new(default_ttl),
            edges: EdgeIndex::new(),
        }
    }

    /// Creates an empty cache from a loaded config.
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.default_ttl())
    }

    /// The TTL applied when a write does not specify one.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Inserts or refreshes a vertex with the default TTL.
    pub fn add_vertex(&self, key: K, value: V) {
        self.add_vertex_with_ttl(key, value, self.default_ttl);
    }

    /// Inserts or refreshes a vertex, expiring `ttl` from now.
    pub fn add_vertex_with_ttl(&self, key: K, value: V, ttl: Duration) {
        self.add_vertex_with_expiration(key, value, expiration_after(ttl));
    }

    /// Inserts or refreshes a vertex with an absolute expiration.
    pub fn add_vertex_with_expiration(&self, key: K, value: V, expires_at: Instant) {
        self.vertices.put_with_expiration(key, value, expires_at);
    }

    /// Gets the live value of a vertex.
    pub fn get_vertex(&self, key: &K) -> Option<V> {
        self.vertices.get(key)
    }

    /// Removes a vertex. Its edges disappear at the next sweep.
    pub fn remove_vertex(&self, key: &K) -> bool {
        self.vertices.delete(key)
    }

    /// Gets the live weight of `tail -> head`. Zero weights read as absent.
    pub fn get_weight(&self, tail: &K, head: &K) -> Option<f64> {
        self.edges.get(tail, head)
    }

    /// Removes `tail -> head` immediately.
    pub fn remove_edge(&self, tail: &K, head: &K) -> bool {
        self.edges.delete(tail, head)
    }

    /// Current sizes of both halves, unswept entries included.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            vertices: self.vertices.len(),
            tails: self.edges.tail_count(),
            edges: self.edges.len(),
        }
    }

    /// Runs one full sweep: vertex expiry, then edge collapse, then the
    /// consistency flush, so edge cleanup sees the freshest vertex state.
    pub fn sweep(&self) -> SweepReport {
        let vertices_expired = self.vertices.flush_expired();
        let edges_collapsed = self.edges.flush();
        let edges_orphaned = self.flush();

        let report = SweepReport {
            vertices_expired,
            edges_collapsed,
            edges_orphaned,
        };
        debug!(
            "Sweep: {} vertices expired, {} edges collapsed, {} edges orphaned",
            report.vertices_expired, report.edges_collapsed, report.edges_orphaned
        );
        report
    }

    /// Drops edges whose tail or head is no longer a live vertex.
    ///
    /// A dead tail takes its whole row with it without looking at the heads.
    /// Liveness is read while the edge index is write-locked; writers never
    /// hold both locks, so the edge -> vertex order cannot deadlock.
    fn flush(&self) -> usize {
        self.edges.retain_live(|key| self.vertices.has(key))
    }

    /// Sweeps every `interval` until `shutdown` fires.
    ///
    /// Shutdown is observed between ticks; a sweep in progress always
    /// finishes.
    pub async fn watch(&self, interval: Duration, mut shutdown: Shutdown) {
        if interval.is_zero() {
            warn!("Refusing to watch graph cache with a zero interval");
            return;
        }

        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately.
        ticker.tick().await;
        info!("Graph cache sweeper started (every {:?})", interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep();
                }
                _ = shutdown.wait() => break,
            }
        }

        info!("Graph cache sweeper stopped");
    }

    /// Spawns [`GraphCache::watch`] on the current tokio runtime.
    ///
    /// The sweeper runs until the returned handle is stopped or dropped.
    pub fn spawn_watch(&self, interval: Duration) -> WatchHandle {
        let (trigger, shutdown) = shutdown_channel();
        let cache = self.clone();
        let task = tokio::spawn(async move {
            cache.watch(interval, shutdown).await;
        });
        WatchHandle { trigger, task }
    }
}

impl<K, V> GraphCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Default + Send + Sync + 'static,
{
    /// Adds a contribution to `tail -> head` with the default TTL.
    pub fn add_edge(&self, tail: K, head: K, weight: f64) {
        self.add_edge_with_ttl(tail, head, weight, self.default_ttl);
    }

    /// Adds a contribution to `tail -> head`, expiring `ttl` from now.
    pub fn add_edge_with_ttl(&self, tail: K, head: K, weight: f64, ttl: Duration) {
        self.add_edge_with_expiration(tail, head, weight, expiration_after(ttl));
    }

    /// Adds a contribution to `tail -> head` with an absolute expiration.
    ///
    /// Missing endpoints are created first with `V::default()` and the
    /// same expiration, then the edge is linked. Live endpoints keep their
    /// value and expiration.
    pub fn add_edge_with_expiration(&self, tail: K, head: K, weight: f64, expires_at: Instant) {
        self.vertices
            .put_if_absent_with_expiration(tail.clone(), V::default(), expires_at);
        self.vertices
            .put_if_absent_with_expiration(head.clone(), V::default(), expires_at);
        self.edges.add_with_expiration(tail, head, weight, expires_at);
    }
}

/// Owns a running sweeper task.
#[derive(Debug)]
pub struct WatchHandle {
    trigger: ShutdownTrigger,
    task: JoinHandle<()>,
}

impl WatchHandle {
    /// Signals the sweeper to stop and waits for it to exit.
    pub async fn stop(self) {
        self.trigger.trigger();
        if let Err(e) = self.task.await {
            warn!("Graph cache sweeper ended abnormally: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    const LONG: Duration = Duration::from_secs(60);

    fn cache() -> GraphCache<&'static str, String> {
        GraphCache::new(LONG)
    }

    #[test]
    fn test_add_and_get_vertex() {
        let cache = cache();
        cache.add_vertex("key", "value".to_string());

        assert_eq!(cache.get_vertex(&"key"), Some("value".to_string()));
        assert_eq!(cache.get_vertex(&"missing"), None);
    }

    #[test]
    fn test_vertex_ttl() {
        let cache = cache();
        cache.add_vertex_with_ttl("key", "value".to_string(), Duration::from_millis(20));
        sleep(Duration::from_millis(40));

        assert_eq!(cache.get_vertex(&"key"), None);
    }

    #[test]
    fn test_get_weight_without_edge() {
        let cache = cache();
        assert_eq!(cache.get_weight(&"tail", &"head"), None);
    }

    #[test]
    fn test_add_edge_creates_placeholder_vertices() {
        let cache = cache();
        cache.add_edge("tail", "head", 1.0);

        assert_eq!(cache.get_vertex(&"tail"), Some(String::new()));
        assert_eq!(cache.get_vertex(&"head"), Some(String::new()));
        assert_eq!(cache.get_weight(&"tail", &"head"), Some(1.0));
    }

    #[test]
    fn test_add_edge_keeps_existing_vertex_value() {
        let cache = cache();
        cache.add_vertex("tail", "kept".to_string());
        cache.add_edge("tail", "head", 1.0);

        assert_eq!(cache.get_vertex(&"tail"), Some("kept".to_string()));
    }

    #[test]
    fn test_repeated_edges_accumulate() {
        let cache = cache();
        cache.add_edge("a", "b", 1.0);
        cache.add_edge("a", "b", 1.0);

        assert_eq!(cache.get_weight(&"a", &"b"), Some(2.0));
        assert_eq!(cache.get_weight(&"a", &"b"), Some(2.0));
    }

    #[test]
    fn test_edge_ttl_decays() {
        let cache = cache();
        cache.add_edge("a", "b", 1.0);
        cache.add_edge_with_ttl("a", "b", 1.0, Duration::from_millis(20));
        assert_eq!(cache.get_weight(&"a", &"b"), Some(2.0));

        sleep(Duration::from_millis(40));
        assert_eq!(cache.get_weight(&"a", &"b"), Some(1.0));
    }

    #[test]
    fn test_sweep_removes_edges_of_deleted_vertex() {
        let cache = cache();
        cache.add_edge("a", "b", 1.0);
        cache.add_edge("b", "c", 1.0);
        cache.add_edge("c", "a", 1.0);
        cache.add_edge("c", "d", 1.0);

        assert!(cache.remove_vertex(&"a"));
        let report = cache.sweep();

        // a -> b (dead tail) and c -> a (dead head).
        assert_eq!(report.edges_orphaned, 2);
        assert_eq!(cache.get_weight(&"a", &"b"), None);
        assert_eq!(cache.get_weight(&"c", &"a"), None);
        assert_eq!(cache.get_weight(&"b", &"c"), Some(1.0));
        assert_eq!(cache.get_weight(&"c", &"d"), Some(1.0));

        let tf = cache.edges.tf_snapshot();
        assert!(!tf.contains_key("a"));
        assert!(tf.values().all(|heads| !heads.contains_key("a")));
        assert_eq!(cache.edges.document_frequency(&"b"), 0);
    }

    #[test]
    fn test_sweep_counts_each_stage() {
        let cache = cache();
        cache.add_vertex_with_ttl("gone", String::new(), Duration::ZERO);
        cache.add_edge("a", "b", 1.0);
        cache.add_edge_with_ttl("a", "c", 1.0, Duration::ZERO);

        let report = cache.sweep();
        // "gone" plus the placeholder for "c", which shares the edge's TTL.
        assert_eq!(report.vertices_expired, 2);
        assert_eq!(report.edges_collapsed, 1);
        assert_eq!(report.edges_orphaned, 0);

        let stats = cache.stats();
        assert_eq!(stats.vertices, 2);
        assert_eq!(stats.edges, 1);
        assert_eq!(stats.tails, 1);
    }

    #[test]
    fn test_sweep_drops_edges_of_expired_vertex() {
        let cache = cache();
        cache.add_vertex_with_ttl("short", String::new(), Duration::from_millis(20));
        cache.add_edge("short", "other", 1.0);
        cache.add_edge("other", "short", 1.0);

        sleep(Duration::from_millis(40));
        let report = cache.sweep();

        assert_eq!(report.vertices_expired, 1);
        assert_eq!(report.edges_orphaned, 2);
        assert!(cache.edges.is_empty());
        assert!(cache.edges.df_snapshot().is_empty());
    }

    #[test]
    fn test_sweep_is_idempotent() {
        let cache = cache();
        cache.add_edge("a", "b", 1.0);
        cache.remove_vertex(&"b");

        assert_eq!(cache.sweep().edges_orphaned, 1);
        assert_eq!(cache.sweep(), SweepReport::default());
    }

    #[test]
    fn test_explicit_expirations_are_honored() {
        let cache = cache();
        let past = Instant::now();
        let near = Instant::now() + Duration::from_millis(50);

        cache.add_vertex_with_expiration("past", "v".to_string(), past);
        assert_eq!(cache.get_vertex(&"past"), None);

        cache.add_vertex_with_expiration("near", "v".to_string(), near);
        cache.add_edge_with_expiration("near", "fresh", 2.0, near);
        assert_eq!(cache.get_vertex(&"near"), Some("v".to_string()));
        assert_eq!(cache.get_vertex(&"fresh"), Some(String::new()));
        assert_eq!(cache.get_weight(&"near", &"fresh"), Some(2.0));

        // Placeholders inherit an already-passed expiration too.
        cache.add_edge_with_expiration("a", "b", 1.0, past);
        assert_eq!(cache.get_vertex(&"a"), None);
        assert_eq!(cache.get_vertex(&"b"), None);
        assert_eq!(cache.get_weight(&"a", &"b"), None);

        sleep(Duration::from_millis(80));
        assert_eq!(cache.get_vertex(&"near"), None);
        assert_eq!(cache.get_vertex(&"fresh"), None);
        assert_eq!(cache.get_weight(&"near", &"fresh"), None);

        cache.sweep();
        assert!(cache.edges.is_empty());
        assert_eq!(cache.stats().vertices, 0);
    }

    #[test]
    fn test_concurrent_writes_reads_and_sweeps() {
        let cache: GraphCache<u32, u32> = GraphCache::new(LONG);
        let writers_done = std::sync::atomic::AtomicBool::new(false);

        std::thread::scope(|scope| {
            let sweeper = scope.spawn(|| {
                let mut sweeps = 0;
                while !writers_done.load(std::sync::atomic::Ordering::Acquire) || sweeps < 20 {
                    cache.sweep();
                    sweeps += 1;
                    std::thread::yield_now();
                }
            });

            let writers: Vec<_> = (0..4u32)
                .map(|t| {
                    let cache = &cache;
                    scope.spawn(move || {
                        for i in 0..400u32 {
                            let tail = (i * 7 + t) % 12;
                            let head = (i * 5 + t * 3) % 12;
                            let weight = if i % 3 == 0 { -1.0 } else { 1.0 };
                            let ttl = if i % 4 == 0 {
                                LONG
                            } else {
                                Duration::from_millis(u64::from(i % 5))
                            };

                            cache.add_edge_with_ttl(tail, head, weight, ttl);
                            cache.get_weight(&tail, &head);
                            if i % 17 == 0 {
                                cache.remove_vertex(&head);
                            }
                            if i % 10 == 0 {
                                cache.neighbor(&tail, 3, 3, true);
                            }
                        }
                    })
                })
                .collect();

            for writer in writers {
                writer.join().unwrap();
            }
            writers_done.store(true, std::sync::atomic::Ordering::Release);
            sweeper.join().unwrap();
        });

        // Let every short contribution and placeholder run out.
        sleep(Duration::from_millis(20));
        cache.sweep();

        let tf = cache.edges.tf_snapshot();
        let mut expected_df: std::collections::HashMap<u32, usize> =
            std::collections::HashMap::new();
        for heads in tf.values() {
            for head in heads.keys() {
                *expected_df.entry(*head).or_insert(0) += 1;
            }
        }
        assert_eq!(cache.edges.df_snapshot(), expected_df);

        for (tail, heads) in cache.edges.rows() {
            assert!(cache.vertices.has(&tail));
            for head in heads {
                assert!(cache.vertices.has(&head));
            }
        }
    }

    #[test]
    fn test_from_config() {
        let config = CacheConfig {
            default_ttl_secs: 5,
            sweep_interval_ms: 100,
        };
        let cache: GraphCache<u32, u32> = GraphCache::from_config(&config);
        assert_eq!(cache.default_ttl(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_watch_restores_invariant() {
        let cache = cache();
        cache.add_edge("a", "b", 1.0);
        cache.add_edge("b", "c", 1.0);
        cache.remove_vertex(&"c");

        let handle = cache.spawn_watch(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(cache.stats().edges, 1);
        assert_eq!(cache.get_weight(&"a", &"b"), Some(1.0));

        handle.stop().await;
    }

    #[tokio::test]
    async fn test_watch_stops_on_shutdown() {
        let cache = cache();
        let (trigger, shutdown) = shutdown_channel();
        let sweeper = cache.clone();
        let task = tokio::spawn(async move {
            sweeper.watch(Duration::from_millis(10), shutdown).await;
        });

        trigger.trigger();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("sweeper should stop")
            .unwrap();
    }
}
