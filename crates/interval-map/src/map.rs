// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Ordered map keyed by interval, with containment and overlap queries.

use crate::Interval;
use std::collections::BTreeMap;

/// An ordered map from [`Interval`] keys to values.
///
/// Lookups come in three flavors:
/// - *equality* ([`has_interval`](Self::has_interval), [`get`](Self::get)),
/// - *containment* ([`contains_point`](Self::contains_point),
///   [`contains_interval`](Self::contains_interval)),
/// - *overlap* ([`overlapping`](Self::overlapping)).
///
/// Containment and overlap queries scan the key range below the query's
/// upper bound; keys are ordered by `(low, high)`, so the scan stops at the
/// first key that starts past the query.
#[derive(Debug, Clone, Default)]
pub struct IntervalMap<V> {
    inner: BTreeMap<Interval, V>,
}

impl<V> IntervalMap<V> {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self {
            inner: BTreeMap::new(),
        }
    }

    /// Inserts a value under the exact interval key, replacing any
    /// previous value.
    pub fn insert(&mut self, key: Interval, value: V) -> Option<V> {
        self.inner.insert(key, value)
    }

    /// Removes the exact interval key.
    pub fn remove(&mut self, key: &Interval) -> Option<V> {
        self.inner.remove(key)
    }

    /// Borrows the value stored under the exact interval key.
    pub fn get(&self, key: &Interval) -> Option<&V> {
        self.inner.get(key)
    }

    /// Mutably borrows the value stored under the exact interval key.
    pub fn get_mut(&mut self, key: &Interval) -> Option<&mut V> {
        self.inner.get_mut(key)
    }

    /// True iff a key equal to `key` is present.
    pub fn has_interval(&self, key: Interval) -> bool {
        self.inner.contains_key(&key)
    }

    /// True iff any key strictly contains the address `point`.
    pub fn contains_point(&self, point: usize) -> bool {
        self.keys_starting_at_or_before(point)
            .any(|k| k.contains_point(point))
    }

    /// All keys that strictly contain the address `point`, in base order.
    pub fn containing_point(&self, point: usize) -> Vec<Interval> {
        self.keys_starting_at_or_before(point)
            .filter(|k| k.contains_point(point))
            .copied()
            .collect()
    }

    /// True iff some key contains the whole of `interval`.
    pub fn contains_interval(&self, interval: Interval) -> bool {
        self.keys_starting_at_or_before(interval.low)
            .any(|k| k.contains(&interval))
    }

    /// All keys that contain the whole of `interval`, in base order.
    pub fn containing_interval(&self, interval: Interval) -> Vec<Interval> {
        self.keys_starting_at_or_before(interval.low)
            .filter(|k| k.contains(&interval))
            .copied()
            .collect()
    }

    /// All keys that share at least one address with `range`, in base order.
    pub fn overlapping(&self, range: Interval) -> Vec<Interval> {
        // Keys with low >= range.high cannot overlap; everything below
        // that bound is filtered on its upper bound. The bound is a raw
        // struct literal: it is an ordering sentinel, not a real interval.
        self.inner
            .range(
                ..Interval {
                    low: range.high,
                    high: 0,
                },
            )
            .map(|(k, _)| k)
            .filter(|k| k.overlaps(&range))
            .copied()
            .collect()
    }

    /// Iterates the keys in `(low, high)` order.
    pub fn keys(&self) -> impl Iterator<Item = &Interval> {
        self.inner.keys()
    }

    /// Iterates `(key, value)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&Interval, &V)> {
        self.inner.iter()
    }

    /// Number of tracked intervals.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// True iff no interval is tracked.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.inner.clear();
    }

    /// Keys whose `low` does not exceed `bound`, candidates for containing
    /// an interval or point starting at `bound`.
    fn keys_starting_at_or_before(&self, bound: usize) -> impl Iterator<Item = &Interval> {
        self.inner
            .range(..=Interval::new(bound, usize::MAX))
            .map(|(k, _)| k)
    }
}

impl<V: Default> IntervalMap<V> {
    /// Borrows the value under `key`, inserting a default if absent.
    pub fn entry_or_default(&mut self, key: Interval) -> &mut V {
        self.inner.entry(key).or_default()
    }
}
