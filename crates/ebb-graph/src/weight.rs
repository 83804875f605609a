//! Decaying edge weights.
//!
//! An edge's weight is not a single number but a pile of contributions,
//! each with its own expiration. Writing the same edge twice adds a second
//! contribution instead of overwriting the first, and each contribution
//! fades out on its own schedule.

use ebb_core::expiration_after;
use std::time::{Duration, Instant};

/// One immutable contribution to an edge weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contribution {
    pub value: f64,
    pub expires_at: Instant,
}

impl Contribution {
    /// Returns true once `now` has reached the expiration.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

/// Sum of non-expired contributions.
///
/// Values may be negative, so a zero weight can come from cancellation as
/// well as from expiry. Either way a zero accumulator means "no edge".
#[derive(Debug, Clone, Default)]
pub struct WeightAccumulator {
    contributions: Vec<Contribution>,
}

impl WeightAccumulator {
    /// Creates an accumulator with no contributions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `value`, expiring `ttl` from now.
    pub fn add_with_ttl(&mut self, value: f64, ttl: Duration) {
        self.add_with_expiration(value, expiration_after(ttl));
    }

    /// Adds `value` with an absolute expiration.
    pub fn add_with_expiration(&mut self, value: f64, expires_at: Instant) {
        self.contributions.push(Contribution { value, expires_at });
    }

    /// Drops expired contributions and returns the sum of the rest.
    pub fn value(&mut self) -> f64 {
        let now = Instant::now();
        self.contributions.retain(|c| !c.is_expired_at(now));
        self.contributions.iter().map(|c| c.value).sum()
    }

    /// Sum of contributions still live at `now`, without compacting.
    ///
    /// Used on read paths that only hold a shared lock.
    pub fn value_at(&self, now: Instant) -> f64 {
        self.contributions
            .iter()
            .filter(|c| !c.is_expired_at(now))
            .map(|c| c.value)
            .sum()
    }

    /// Compacting zero check.
    pub fn is_zero(&mut self) -> bool {
        self.value() == 0.0
    }

    /// Number of stored contributions, expired ones included.
    pub fn len(&self) -> usize {
        self.contributions.len()
    }

    /// Returns true if no contributions are stored.
    pub fn is_empty(&self) -> bool {
        self.contributions.is_empty()
    }
}
