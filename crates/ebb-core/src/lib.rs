//! Ebb Core - Building blocks for the decaying graph cache
//!
//! This crate holds the pieces the graph cache is assembled from but that
//! know nothing about graphs:
//!
//! - [`TtlCache`]: a concurrent key/value store with per-entry expiration,
//!   used as the vertex store
//! - [`top_k`] / [`top_k_map`]: bounded selection of the heaviest entries
//! - [`CacheConfig`]: JSON-backed tunables
//! - [`shutdown_channel`]: the lifetime signal background sweepers listen to
//!
//! # Example
//!
//! ```no_run
//! use ebb_core::TtlCache;
//! use std::time::Duration;
//!
//! let cache = TtlCache::new(Duration::from_secs(60));
//! cache.put("session", 42);
//! assert_eq!(cache.get(&"session"), Some(42));
//! ```

mod cache;
mod config;
mod error;
mod shutdown;
pub mod topk;

pub use cache::{expiration_after, TtlCache};
pub use config::{CacheConfig, DEFAULT_SWEEP_INTERVAL_MS, DEFAULT_TTL_SECS};
pub use error::ConfigError;
pub use shutdown::{shutdown_channel, Shutdown, ShutdownTrigger};
pub use topk::{top_k, top_k_map};
