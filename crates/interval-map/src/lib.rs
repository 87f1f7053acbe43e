// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # interval-map
//!
//! Ordered interval containers over half-open address ranges `[low, high)`.
//!
//! # Key Components
//!
//! - [`Interval`] — a half-open range of `usize` addresses with overlap and
//!   containment predicates.
//! - [`IntervalTree`] — an ordered set of intervals.
//! - [`IntervalMap`] — an ordered map keyed by interval, with equality,
//!   point-containment, interval-containment and overlap queries.
//!
//! The containers are deliberately small: they back a region registry whose
//! working set is the number of *tracked* regions, not the number of bytes
//! covered. Queries are read-only scans bounded by the ordered key set and
//! never fail.
//!
//! # Example
//! ```
//! use interval_map::{Interval, IntervalMap};
//!
//! let mut map: IntervalMap<&str> = IntervalMap::new();
//! map.insert(Interval::new(0x1000, 0x1010), "a");
//! map.insert(Interval::new(0x1004, 0x100c), "b");
//!
//! assert!(map.has_interval(Interval::new(0x1000, 0x1010)));
//! assert!(map.contains_point(0x1008));
//! assert!(map.contains_interval(Interval::new(0x1006, 0x100a)));
//! ```

mod interval;
mod map;
mod tree;

pub use interval::Interval;
pub use map::IntervalMap;
pub use tree::IntervalTree;
