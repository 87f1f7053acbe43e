// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Per-view identity and the shared pointer cell.
//!
//! A [`ViewSlot`] is the cell shared between a view handle and the
//! manager's slot table. Its mutex *is* the per-view lock: the manager
//! rewrites the span under it during a move, and the view snapshots the
//! span under it on every dereference. Because both sides hold the slot
//! through an `Arc`, a slot can never be destroyed while a move still
//! holds its lock.

use interval_map::Interval;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Opaque identity of a view, stable for the view's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ViewId(u64);

impl ViewId {
    /// Allocates the next process-unique identity.
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// A raw `(address, length)` pair, the mutable state of a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// Base address (zero for a null view).
    pub addr: usize,
    /// Length in bytes.
    pub len: usize,
}

impl Span {
    /// The half-open interval `[addr, addr + len)` this span covers.
    pub fn interval(&self) -> Interval {
        Interval::from_span(self.addr, self.len)
    }

    /// True iff the base address is null.
    pub fn is_null(&self) -> bool {
        self.addr == 0
    }
}

/// The shared cell behind a view: identity plus the locked span.
#[derive(Debug)]
pub struct ViewSlot {
    id: ViewId,
    pub(crate) span: Mutex<Span>,
}

impl ViewSlot {
    /// Creates a slot with a fresh identity over `[addr, addr + len)`.
    pub(crate) fn new(addr: usize, len: usize) -> Arc<Self> {
        Arc::new(Self {
            id: ViewId::next(),
            span: Mutex::new(Span { addr, len }),
        })
    }

    /// The view's identity.
    pub fn id(&self) -> ViewId {
        self.id
    }

    /// Snapshot of the current span, taken under the view lock.
    pub fn span(&self) -> Span {
        *self.span.lock()
    }

    /// Snapshot of the current interval, taken under the view lock.
    pub fn interval(&self) -> Interval {
        self.span().interval()
    }
}
