// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The region registry state machine.
//!
//! [`RegionMap`] owns the interval map of [`MemoryInfo`] records and the
//! slot table, and implements every registry transition: declaration,
//! containment declaration, reference counting with ancestor propagation,
//! destruction, the invalidation cascade, and the move/truncate algorithm.
//!
//! The map is single-threaded on purpose: the
//! [`RegionManager`](crate::RegionManager) serializes access behind the
//! manager-wide lock, and tests drive a standalone map directly. The split
//! mirrors the pool/inner split elsewhere in this workspace: semantics in
//! the inner type, locking in the wrapper.
//!
//! # Accounting
//!
//! Between any two operations these invariants hold (checked after every
//! mutating call in debug builds):
//!
//! 1. `info[i].refcount == |info[i].objects| + Σ info[c].refcount` over the
//!    children `c` of `i` — every view contributes one unit to its own
//!    interval and to every ancestor up the parent chain.
//! 2. For every `c` with `parent == Some(p)`: `p` is tracked, `c` is in
//!    `p`'s child set, and `p` contains `c`.
//! 3. A record whose refcount reaches zero is removed together with its
//!    surviving descendants.

use crate::slot::{Span, ViewId, ViewSlot};
use crate::stats::TrackerStats;
use interval_map::{Interval, IntervalMap, IntervalTree};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::trace;

/// Per-interval metadata stored in the registry.
#[derive(Debug, Clone, Default)]
pub struct MemoryInfo {
    /// Aggregated ownership: own views plus the refcounts of all children.
    pub refcount: usize,
    /// Identities of the views pointing at exactly this interval.
    pub objects: std::collections::BTreeSet<ViewId>,
    /// The enclosing interval, if this region was derived by subsection.
    pub parent: Option<Interval>,
    /// Sub-regions registered beneath this one.
    pub children: IntervalTree,
}

/// The registry: interval-keyed records plus the view slot table.
#[derive(Debug, Default)]
pub struct RegionMap {
    regions: IntervalMap<MemoryInfo>,
    slots: HashMap<ViewId, Arc<ViewSlot>>,
    stats: TrackerStats,
}

impl RegionMap {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    // ── Queries ────────────────────────────────────────────────

    /// True iff an interval equal to `key` is tracked.
    pub fn has_interval(&self, key: Interval) -> bool {
        self.regions.has_interval(key)
    }

    /// True iff any tracked interval strictly contains `point`.
    pub fn contains_point(&self, point: usize) -> bool {
        self.regions.contains_point(point)
    }

    /// True iff some tracked interval contains the whole of `interval`.
    pub fn contains_interval(&self, interval: Interval) -> bool {
        self.regions.contains_interval(interval)
    }

    /// The stored parent of `key`, or `None` when `key` is untracked or a
    /// root.
    pub fn parent_of(&self, key: Interval) -> Option<Interval> {
        self.regions.get(&key).and_then(|info| info.parent)
    }

    /// True iff `slot` is registered under its current `(addr, len)` key.
    pub fn has_object(&self, slot: &ViewSlot) -> bool {
        self.regions
            .get(&slot.interval())
            .is_some_and(|info| info.objects.contains(&slot.id()))
    }

    /// Borrows the record stored under `key`.
    pub fn info(&self, key: Interval) -> Option<&MemoryInfo> {
        self.regions.get(&key)
    }

    /// Number of tracked intervals.
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// True iff nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Snapshot of the cumulative statistics.
    pub fn stats(&self) -> TrackerStats {
        self.stats.clone()
    }

    // ── Reference counting ─────────────────────────────────────

    /// Increments the refcount of `key` and of every ancestor reached by
    /// following `parent` links.
    pub fn ref_interval(&mut self, key: Interval) {
        self.ref_units(key, 1);
    }

    /// Increments `key` and its ancestors by `units` at once.
    fn ref_units(&mut self, key: Interval, units: usize) {
        if units == 0 {
            return;
        }
        let info = self.regions.entry_or_default(key);
        info.refcount += units;

        let mut parent = info.parent;
        while let Some(p) = parent {
            let pinfo = self.regions.entry_or_default(p);
            pinfo.refcount += units;
            parent = pinfo.parent;
        }
    }

    /// Decrements the refcount of `key` and of every ancestor, then
    /// invalidates every interval whose count reached zero.
    ///
    /// The walk completes before any invalidation runs, so the parent
    /// chain is intact while the counts are adjusted.
    pub fn deref_interval(&mut self, key: Interval) {
        let mut zeroed = Vec::new();

        let mut node = Some(key);
        while let Some(n) = node {
            let info = self.regions.entry_or_default(n);
            info.refcount = info.refcount.saturating_sub(1);
            if info.refcount == 0 {
                zeroed.push(n);
            }
            node = info.parent;
        }

        for region in zeroed {
            self.invalidate(region);
        }
    }

    /// Decrements `key` and its ancestors by `units` at once, invalidating
    /// any record that reaches zero. Used by the move algorithm when a
    /// parented record is merged away from under its parent.
    fn deref_units(&mut self, key: Interval, units: usize) {
        if units == 0 {
            return;
        }
        let mut zeroed = Vec::new();

        let mut node = Some(key);
        while let Some(n) = node {
            let info = self.regions.entry_or_default(n);
            info.refcount = info.refcount.saturating_sub(units);
            if info.refcount == 0 {
                zeroed.push(n);
            }
            node = info.parent;
        }

        for region in zeroed {
            self.invalidate(region);
        }
    }

    // ── Declaration ────────────────────────────────────────────

    /// Registers `slot` under its current interval, creating the record if
    /// absent, and refs the interval chain. Idempotent by identity: a slot
    /// already registered under this key is left untouched.
    pub fn declare(&mut self, slot: &Arc<ViewSlot>) {
        let key = slot.interval();
        trace!(%key, id = %slot.id(), "declare");

        let inserted = self.regions.entry_or_default(key).objects.insert(slot.id());
        if !inserted {
            return;
        }

        self.slots.insert(slot.id(), Arc::clone(slot));
        self.ref_interval(key);
        self.stats.record_declare();
        self.stats.update_live(self.regions.len());
        self.debug_validate();
    }

    /// Establishes containment of `child` beneath `parent_key`.
    ///
    /// A child whose interval equals the parent's is left unlinked (a view
    /// cannot be its own parent), and re-declaring an existing link is a
    /// no-op. A newly created link feeds the child record's units into the
    /// parent chain; re-parenting from a different enclosing interval
    /// first gives those units back to the old chain.
    pub fn declare_child(&mut self, parent_key: Interval, child: &Arc<ViewSlot>) {
        let child_key = child.interval();
        if child_key == parent_key {
            return;
        }
        debug_assert!(
            parent_key.contains(&child_key),
            "declare_child: {parent_key} does not contain {child_key}"
        );
        trace!(parent = %parent_key, child = %child_key, "declare child");

        let (prior, child_units) = {
            let info = self.regions.entry_or_default(child_key);
            (info.parent, info.refcount)
        };
        if prior == Some(parent_key) {
            return;
        }
        if let Some(old_parent) = prior {
            if let Some(pinfo) = self.regions.get_mut(&old_parent) {
                pinfo.children.remove(&child_key);
            }
            self.deref_units(old_parent, child_units);
        }

        self.regions
            .entry_or_default(parent_key)
            .children
            .insert(child_key);
        self.regions.entry_or_default(child_key).parent = Some(parent_key);
        self.ref_units(parent_key, child_units);
        self.debug_validate();
    }

    // ── Destruction ────────────────────────────────────────────

    /// Removes `slot`'s identity from its record and derefs the interval
    /// chain. Destroying a view whose interval is no longer tracked is a
    /// silent no-op: it may have been invalidated first.
    pub fn destroy(&mut self, slot: &ViewSlot) {
        let key = slot.interval();
        trace!(%key, id = %slot.id(), "destroy");

        self.stats.record_destroy();

        if !self.regions.has_interval(key) {
            self.release_slot(slot.id());
            return;
        }

        let removed = self
            .regions
            .get_mut(&key)
            .is_some_and(|info| info.objects.remove(&slot.id()));
        self.release_slot(slot.id());

        if removed {
            self.deref_interval(key);
        }

        self.stats.update_live(self.regions.len());
        self.debug_validate();
    }

    /// Drops the slot-table entry for `id` unless the slot lock is held
    /// (a move in progress keeps its own handle; a later destroy or
    /// [`clear`](Self::clear) retires stragglers).
    pub fn release_slot(&mut self, id: ViewId) {
        let unlocked = self
            .slots
            .get(&id)
            .map(|slot| slot.span.try_lock().is_some())
            .unwrap_or(false);
        if unlocked {
            self.slots.remove(&id);
        }
    }

    // ── Invalidation ───────────────────────────────────────────

    /// Removes `key` and all transitive descendants from the registry.
    ///
    /// The parent, if any, loses the child link but is *not* deref'd:
    /// invalidation is reached either through a `deref` that already
    /// propagated the decrement, or through a move that rebuilds the
    /// counts on the destination side.
    pub fn invalidate(&mut self, key: Interval) {
        if !self.regions.has_interval(key) {
            return;
        }
        trace!(%key, "invalidate");

        let (parent, children) = {
            let info = self.regions.get(&key).expect("checked above");
            (info.parent, info.children.clone())
        };

        if let Some(p) = parent {
            if let Some(pinfo) = self.regions.get_mut(&p) {
                pinfo.children.remove(&key);
            }
        }

        for child in children.iter() {
            self.invalidate(*child);
        }

        self.regions.remove(&key);
        self.stats.record_invalidation();
        self.stats.update_live(self.regions.len());
    }

    // ── Move / reallocation ────────────────────────────────────

    /// Relocates the region of `slot` from its current interval to
    /// `[new_addr, new_addr + new_len)`, translating every descendant and
    /// invalidating those that fall outside a truncated range.
    ///
    /// Descendants are processed in breadth-first order so no node is
    /// revisited through an ancestor. Each affected view's span is
    /// rewritten under its own lock, held only for the constant-time
    /// rewrite.
    pub fn move_region(&mut self, slot: &ViewSlot, new_addr: usize, new_len: usize) {
        let from = slot.interval();
        let to = Interval::from_span(new_addr, new_len);
        trace!(%from, %to, "move");

        self.stats.record_move();

        if to == from {
            return;
        }

        // A zero-length destination is a full invalidation: nothing
        // survives, only the moving view's span is rewritten. The parent
        // chain, if any, gives back the units the subtree accounted for.
        if to.is_empty() {
            let (units, parent) = self
                .regions
                .get(&from)
                .map(|info| (info.refcount, info.parent))
                .unwrap_or((0, None));
            self.invalidate(from);
            if let Some(p) = parent {
                self.deref_units(p, units);
            }
            let mut span = slot.span.lock();
            *span = Span {
                addr: new_addr,
                len: 0,
            };
            drop(span);
            self.stats.update_live(self.regions.len());
            self.debug_validate();
            return;
        }

        let delta = new_addr.wrapping_sub(from.low) as isize;

        // Truncation: descendants reaching into the deleted tail vanish
        // before any translation. Containment guarantees a descendant
        // survives iff its chain up to a direct child lies in the
        // surviving head, so checking direct children suffices.
        if to.size() < from.size() {
            let head = Interval::new(from.low, from.low + to.size());
            let direct: Vec<Interval> = self
                .regions
                .get(&from)
                .map(|info| info.children.iter().copied().collect())
                .unwrap_or_default();
            for child in direct {
                if !head.contains(&child) {
                    let units = self
                        .regions
                        .get(&child)
                        .map(|info| info.refcount)
                        .unwrap_or(0);
                    self.invalidate(child);
                    // Invalidation never derefs; the source chain gives
                    // back the vanished subtree's units here so the counts
                    // stay balanced on the destination side.
                    self.deref_units(from, units);
                }
            }
        }

        let mut queue = VecDeque::from([from]);

        while let Some(region) = queue.pop_front() {
            // A child may have been invalidated by the truncation pass or
            // merged away by an earlier iteration.
            let Some(old_info) = self.regions.remove(&region) else {
                continue;
            };

            let moved = if region == from {
                to
            } else {
                region.translate(delta)
            };

            // Identity translation (in-place shrink): the record, its span
            // and its subtree are already where they belong.
            if moved == region {
                self.regions.insert(region, old_info);
                continue;
            }

            // Re-link the record's children to the destination key and
            // enqueue them under their old keys. A self-containing child
            // is skipped entirely, never enqueued.
            let mut translated_children = IntervalTree::new();
            let mut incoming: Vec<(Interval, usize)> = Vec::new();
            for child in old_info.children.iter().copied() {
                if child == moved {
                    continue;
                }
                let translated = child.translate(delta);
                let units = self
                    .regions
                    .get(&child)
                    .map(|info| info.refcount)
                    .unwrap_or(0);
                translated_children.insert(translated);
                incoming.push((translated, units));
                queue.push_back(child);
                if let Some(cinfo) = self.regions.get_mut(&child) {
                    cinfo.parent = Some(moved);
                }
            }

            if self.regions.has_interval(moved) {
                // Address reuse: union the moving record into the record
                // already present at the destination, then ref the
                // destination once per added object and once per newly
                // adopted child-refcount unit.
                let mut added_units = 0usize;
                {
                    let dest = self.regions.get_mut(&moved).expect("checked above");
                    for id in &old_info.objects {
                        if dest.objects.insert(*id) {
                            added_units += 1;
                        }
                    }
                    for (translated, units) in &incoming {
                        if dest.children.insert(*translated) {
                            added_units += units;
                        }
                    }
                }
                self.ref_units(moved, added_units);

                // The stale link under the old parent is retired together
                // with the units it accounted for; the destination's own
                // parent chain took them over above.
                if let Some(p) = old_info.parent {
                    if let Some(pinfo) = self.regions.get_mut(&p) {
                        pinfo.children.remove(&region);
                    }
                    self.deref_units(p, old_info.refcount);
                }
            } else {
                // Transplant the record wholesale under its new key. A
                // parent keeps the link only while it still contains the
                // destination; a region moved out of its parent's range is
                // unlinked, and the parent chain gives back the units the
                // record accounted for.
                let mut parent = old_info.parent;
                if let Some(p) = old_info.parent {
                    if p.contains(&moved) {
                        if let Some(pinfo) = self.regions.get_mut(&p) {
                            pinfo.children.remove(&region);
                            pinfo.children.insert(moved);
                        }
                    } else {
                        if let Some(pinfo) = self.regions.get_mut(&p) {
                            pinfo.children.remove(&region);
                        }
                        self.deref_units(p, old_info.refcount);
                        parent = None;
                    }
                }
                self.regions.insert(
                    moved,
                    MemoryInfo {
                        refcount: old_info.refcount,
                        objects: old_info.objects.clone(),
                        parent,
                        children: translated_children,
                    },
                );
            }

            // Rewrite every registered view of the destination record,
            // each under its own lock.
            let ids: Vec<ViewId> = self
                .regions
                .get(&moved)
                .map(|info| info.objects.iter().copied().collect())
                .unwrap_or_default();
            for id in ids {
                if let Some(view_slot) = self.slots.get(&id) {
                    let mut span = view_slot.span.lock();
                    *span = Span {
                        addr: moved.low,
                        len: moved.size(),
                    };
                }
            }
        }

        self.stats.update_live(self.regions.len());
        self.debug_validate();
    }

    // ── Maintenance ────────────────────────────────────────────

    /// Drops every record and slot. Views become dangling; their
    /// destructors degrade to silent no-ops.
    pub fn clear(&mut self) {
        self.regions.clear();
        self.slots.clear();
        self.stats = TrackerStats::default();
    }

    /// Panics unless the accounting and linkage invariants hold for every
    /// tracked record.
    pub fn assert_invariants(&self) {
        for (key, info) in self.regions.iter() {
            let child_sum: usize = info
                .children
                .iter()
                .map(|c| self.regions.get(c).map(|i| i.refcount).unwrap_or(0))
                .sum();
            assert_eq!(
                info.refcount,
                info.objects.len() + child_sum,
                "refcount accounting broken for {key}: {} != {} objects + {} child units",
                info.refcount,
                info.objects.len(),
                child_sum,
            );

            if let Some(p) = info.parent {
                let pinfo = self
                    .regions
                    .get(&p)
                    .unwrap_or_else(|| panic!("parent {p} of {key} is untracked"));
                assert!(
                    pinfo.children.contains(key),
                    "{key} is not in the child set of its parent {p}"
                );
                assert!(p.contains(key), "parent {p} does not contain {key}");
            }

            for child in info.children.iter() {
                let cinfo = self
                    .regions
                    .get(child)
                    .unwrap_or_else(|| panic!("child {child} of {key} is untracked"));
                assert_eq!(
                    cinfo.parent,
                    Some(*key),
                    "child {child} does not point back at {key}"
                );
                assert!(key.contains(child), "{key} does not contain child {child}");
            }

            for id in &info.objects {
                let slot = self
                    .slots
                    .get(id)
                    .unwrap_or_else(|| panic!("object {id} of {key} has no slot"));
                assert_eq!(
                    slot.interval(),
                    *key,
                    "slot {id} span disagrees with its record key {key}"
                );
            }
        }
    }

    fn debug_validate(&self) {
        #[cfg(debug_assertions)]
        self.assert_invariants();
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    const BASE: usize = 0x4000_0000;
    const SLAB: usize = 0x10000;

    /// One step of a random registry workload. Indices address the pool
    /// of live slots modulo its length.
    #[derive(Debug, Clone)]
    enum Op {
        Declare { len: usize },
        Subsection { parent: usize, off: usize, len: usize },
        Destroy { idx: usize },
        Move { idx: usize, grow: bool, shrink_to: usize },
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1usize..64).prop_map(|len| Op::Declare { len }),
            (any::<usize>(), 0usize..32, 1usize..32).prop_map(|(parent, off, len)| {
                Op::Subsection { parent, off, len }
            }),
            any::<usize>().prop_map(|idx| Op::Destroy { idx }),
            (any::<usize>(), any::<bool>(), 1usize..32).prop_map(|(idx, grow, shrink_to)| {
                Op::Move { idx, grow, shrink_to }
            }),
        ]
    }

    /// Drives the ops against a standalone map, checking the full
    /// invariant set after every step.
    fn run(ops: Vec<Op>) {
        fn fresh_base(next: &mut usize) -> usize {
            let base = BASE + *next * SLAB;
            *next += 1;
            base
        }

        let mut map = RegionMap::new();
        let mut live: Vec<Arc<ViewSlot>> = Vec::new();
        let mut next_slab = 0usize;

        for op in ops {
            match op {
                Op::Declare { len } => {
                    let base = fresh_base(&mut next_slab);
                    let slot = ViewSlot::new(base, len);
                    map.declare(&slot);
                    live.push(slot);
                }
                Op::Subsection { parent, off, len } => {
                    if live.is_empty() {
                        continue;
                    }
                    let parent = &live[parent % live.len()];
                    let span = parent.span();
                    if span.len == 0 || !map.has_object(parent) {
                        continue;
                    }
                    let off = off % span.len;
                    let len = len.min(span.len - off);
                    let slot = ViewSlot::new(span.addr + off, len);
                    map.declare(&slot);
                    map.declare_child(parent.interval(), &slot);
                    live.push(slot);
                }
                Op::Destroy { idx } => {
                    if live.is_empty() {
                        continue;
                    }
                    let slot = live.remove(idx % live.len());
                    map.destroy(&slot);
                    if map.has_interval(slot.interval()) {
                        assert!(
                            !map.info(slot.interval())
                                .unwrap()
                                .objects
                                .contains(&slot.id()),
                            "destroyed view still registered"
                        );
                    }
                }
                Op::Move { idx, grow, shrink_to } => {
                    if live.is_empty() {
                        continue;
                    }
                    let slot = live[idx % live.len()].clone();
                    if !map.has_object(&slot) {
                        continue;
                    }
                    let span = slot.span();
                    let new_len = if grow { span.len * 2 } else { shrink_to.min(span.len) };
                    let new_base = fresh_base(&mut next_slab);
                    map.move_region(&slot, new_base, new_len);
                    assert_eq!(
                        slot.span(),
                        Span { addr: new_base, len: new_len },
                        "moved view span not rewritten"
                    );
                }
            }
            map.assert_invariants();
        }

        // Tear everything down; the registry must drain completely.
        for slot in live.drain(..) {
            map.destroy(&slot);
            map.assert_invariants();
        }
        assert!(map.is_empty(), "registry not drained after teardown");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn invariants_hold_over_random_workloads(
            ops in proptest::collection::vec(op_strategy(), 1..40)
        ) {
            run(ops);
        }
    }
}
