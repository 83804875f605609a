//! Top-k selection over weighted collections.
//!
//! A bounded min-heap keeps the `k` heaviest entries seen so far, so
//! selection is O(n log k) and never sorts the whole input. Ties are broken
//! by whatever order the heap happens to produce; callers must not rely on
//! which of several equal-weight entries survives.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};
use std::hash::Hash;

/// Heap entry ordered by weight only.
struct Ranked<K, W> {
    key: K,
    weight: W,
}

impl<K, W: PartialOrd> PartialEq for Ranked<K, W> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<K, W: PartialOrd> Eq for Ranked<K, W> {}

impl<K, W: PartialOrd> PartialOrd for Ranked<K, W> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K, W: PartialOrd> Ord for Ranked<K, W> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Incomparable weights (NaN) rank as equal.
        self.weight
            .partial_cmp(&other.weight)
            .unwrap_or(Ordering::Equal)
    }
}

/// Returns the `k` highest-weight entries, heaviest first.
pub fn top_k<K, W, I>(items: I, k: usize) -> Vec<(K, W)>
where
    W: PartialOrd + Copy,
    I: IntoIterator<Item = (K, W)>,
{
    if k == 0 {
        return Vec::new();
    }

    let mut heap: BinaryHeap<Reverse<Ranked<K, W>>> = BinaryHeap::with_capacity(k + 1);
    for (key, weight) in items {
        let candidate = Ranked { key, weight };
        if heap.len() < k {
            heap.push(Reverse(candidate));
        } else if let Some(Reverse(lightest)) = heap.peek() {
            if candidate > *lightest {
                heap.pop();
                heap.push(Reverse(candidate));
            }
        }
    }

    // Ascending order of Reverse is descending weight.
    heap.into_sorted_vec()
        .into_iter()
        .map(|Reverse(ranked)| (ranked.key, ranked.weight))
        .collect()
}

/// Keeps the `k` highest-weight entries of a map.
///
/// A map that already has at most `k` entries is returned untouched.
pub fn top_k_map<K, W>(map: HashMap<K, W>, k: usize) -> HashMap<K, W>
where
    K: Eq + Hash,
    W: PartialOrd + Copy,
{
    if map.len() <= k {
        return map;
    }
    top_k(map, k).into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_k_orders_heaviest_first() {
        let items = vec![("a", 1.0), ("b", 5.0), ("c", 3.0), ("d", 4.0)];
        let top = top_k(items, 2);
        assert_eq!(top, vec![("b", 5.0), ("d", 4.0)]);
    }

    #[test]
    fn test_top_k_zero() {
        let items = vec![("a", 1), ("b", 2)];
        assert!(top_k(items, 0).is_empty());
    }

    #[test]
    fn test_top_k_larger_than_input() {
        let items = vec![("a", 1), ("b", 2)];
        let top = top_k(items, 10);
        assert_eq!(top, vec![("b", 2), ("a", 1)]);
    }

    #[test]
    fn test_top_k_integer_weights() {
        let items = (0..100u32).map(|i| (i, i % 17));
        let weights: Vec<u32> = top_k(items, 3).into_iter().map(|(_, w)| w).collect();
        assert_eq!(weights, vec![16, 16, 16]);
    }

    #[test]
    fn test_top_k_ties_keep_weight_multiset() {
        let items = vec![("b", 2.0), ("c", 1.0), ("d", 1.0), ("e", 1.0)];
        let mut weights: Vec<f64> = top_k(items, 3).into_iter().map(|(_, w)| w).collect();
        weights.sort_by(|a, b| b.partial_cmp(a).unwrap());
        assert_eq!(weights, vec![2.0, 1.0, 1.0]);
    }

    #[test]
    fn test_top_k_negative_weights() {
        let items = vec![("a", -3.0), ("b", -1.0), ("c", -2.0)];
        let top = top_k(items, 1);
        assert_eq!(top, vec![("b", -1.0)]);
    }

    #[test]
    fn test_top_k_map_passthrough() {
        let map: HashMap<&str, f64> = [("a", 1.0), ("b", 2.0)].into_iter().collect();
        let filtered = top_k_map(map.clone(), 2);
        assert_eq!(filtered, map);
    }

    #[test]
    fn test_top_k_map_filters() {
        let map: HashMap<&str, f64> = [("a", 1.0), ("b", 2.0), ("c", 3.0)].into_iter().collect();
        let filtered = top_k_map(map, 2);
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered.get("c"), Some(&3.0));
        assert_eq!(filtered.get("b"), Some(&2.0));
        assert!(!filtered.contains_key("a"));
    }
}
