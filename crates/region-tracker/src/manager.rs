// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The process-wide region manager.
//!
//! [`RegionManager`] is the serialization layer over [`RegionMap`]: every
//! public method acquires the manager-wide lock on entry and releases it on
//! return, so manager operations are linearizable and external observers
//! never see a half-applied transition (a move is atomic: pre- or
//! post-move state, nothing in between).
//!
//! # Lock discipline
//!
//! The manager lock is acquired before any view lock within a call chain;
//! view locks are never held while acquiring the manager lock. Views that
//! need both (pointer reads) snapshot their span under the view lock,
//! release it, consult the manager, and re-check the snapshot.
//!
//! # Lifetime
//!
//! The singleton initializes lazily on first use. [`reset`](RegionManager::reset)
//! drops every record and slot for deterministic teardown; outstanding
//! views degrade to dangling handles whose destructors are silent no-ops.

use crate::map::{MemoryInfo, RegionMap};
use crate::slot::{ViewId, ViewSlot};
use crate::stats::TrackerStats;
use interval_map::Interval;
use parking_lot::Mutex;
use std::sync::{Arc, OnceLock};

/// The process-wide registry of tracked memory regions.
pub struct RegionManager {
    state: Mutex<RegionMap>,
}

impl RegionManager {
    fn new() -> Self {
        Self {
            state: Mutex::new(RegionMap::new()),
        }
    }

    /// The lazily-initialized process-wide instance.
    pub fn global() -> &'static RegionManager {
        static GLOBAL: OnceLock<RegionManager> = OnceLock::new();
        GLOBAL.get_or_init(RegionManager::new)
    }

    // ── Queries ────────────────────────────────────────────────

    /// True iff an interval equal to `[addr, addr + len)` is tracked.
    pub fn has_interval(&self, addr: usize, len: usize) -> bool {
        self.state.lock().has_interval(Interval::from_span(addr, len))
    }

    /// True iff any tracked interval strictly contains `addr`.
    pub fn contains_point(&self, addr: usize) -> bool {
        self.state.lock().contains_point(addr)
    }

    /// True iff some tracked interval contains all of `[addr, addr + len)`.
    pub fn contains_interval(&self, addr: usize, len: usize) -> bool {
        self.state
            .lock()
            .contains_interval(Interval::from_span(addr, len))
    }

    /// The parent of the slot's interval, or `None` when untracked or a
    /// root.
    pub(crate) fn parent_of(&self, slot: &ViewSlot) -> Option<Interval> {
        self.state.lock().parent_of(slot.interval())
    }

    /// True iff the slot is registered under its current `(addr, len)`.
    pub(crate) fn has_object(&self, slot: &ViewSlot) -> bool {
        self.state.lock().has_object(slot)
    }

    /// Number of currently tracked intervals.
    pub fn tracked_regions(&self) -> usize {
        self.state.lock().len()
    }

    /// Snapshot of the cumulative statistics.
    pub fn stats(&self) -> TrackerStats {
        self.state.lock().stats()
    }

    /// Runs `f` over the record stored for `key`, if any. Test hook.
    pub fn with_info<R>(&self, key: Interval, f: impl FnOnce(&MemoryInfo) -> R) -> Option<R> {
        self.state.lock().info(key).map(f)
    }

    // ── Transitions ────────────────────────────────────────────

    /// Registers a view slot under its current interval.
    pub(crate) fn declare(&self, slot: &Arc<ViewSlot>) {
        self.state.lock().declare(slot);
    }

    /// Establishes containment of `child` beneath `parent_key`.
    pub(crate) fn declare_child(&self, parent_key: Interval, child: &Arc<ViewSlot>) {
        self.state.lock().declare_child(parent_key, child);
    }

    /// Deregisters a view slot and derefs its interval chain.
    pub(crate) fn destroy(&self, slot: &ViewSlot) {
        self.state.lock().destroy(slot);
    }

    /// Retires the slot-table entry of an already-deregistered view.
    pub(crate) fn release_slot(&self, id: ViewId) {
        self.state.lock().release_slot(id);
    }

    /// Removes `key` and all transitive descendants from the registry.
    pub fn invalidate(&self, key: Interval) {
        self.state.lock().invalidate(key);
    }

    /// Relocates the slot's region to `[new_addr, new_addr + new_len)`,
    /// translating descendants and truncating as needed. Atomic with
    /// respect to every other manager operation.
    pub(crate) fn move_region(&self, slot: &ViewSlot, new_addr: usize, new_len: usize) {
        self.state.lock().move_region(slot, new_addr, new_len);
    }

    // ── Maintenance ────────────────────────────────────────────

    /// Drops every record and slot for deterministic teardown.
    pub fn reset(&self) {
        self.state.lock().clear();
    }

    /// Panics unless the registry invariants hold. Test hook.
    pub fn assert_invariants(&self) {
        self.state.lock().assert_invariants();
    }
}

impl std::fmt::Debug for RegionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("RegionManager")
            .field("tracked_regions", &state.len())
            .finish()
    }
}
