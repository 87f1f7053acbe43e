// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The tracked view: a validated handle over a raw byte range.
//!
//! A [`RegionView`] pairs a `(address, length)` span with a stable identity
//! and registers itself with the [`RegionManager`] for its whole lifetime.
//! Every dereference is validation-gated: the view checks that its byte
//! range is still covered by a tracked region before handing out an
//! address, so use-after-free, stale aliases after reallocation, and
//! out-of-bounds offsets surface as [`RegionError`]s instead of wild
//! reads.
//!
//! The view does not own the bytes. Whoever constructs one (see
//! [`RegionView::from_raw`]) guarantees the memory stays valid between
//! declaration and destruction or invalidation; the tracker detects stale
//! *tracked* accesses, not accesses that bypass it.

use crate::error::RegionError;
use crate::manager::RegionManager;
use crate::pod::Pod;
use crate::search::kmp_search;
use crate::slot::{Span, ViewId, ViewSlot};
use interval_map::Interval;
use std::fmt::Write as _;
use std::mem::size_of;
use std::path::Path;
use std::sync::Arc;

/// A tracked, validation-gated view over a raw byte range.
pub struct RegionView {
    slot: Arc<ViewSlot>,
}

impl RegionView {
    // ── Construction ───────────────────────────────────────────

    /// Creates a view over `len` bytes at `ptr` and declares it with the
    /// manager. A null `ptr` yields an undeclared null view.
    ///
    /// # Safety
    ///
    /// The caller guarantees that `[ptr, ptr + len)` stays readable (and
    /// writable, if the write methods are used) until the view is dropped
    /// or the range is invalidated through the manager. The tracker
    /// validates tracked state, not the memory itself.
    pub unsafe fn from_raw(ptr: *const u8, len: usize) -> Self {
        let slot = ViewSlot::new(ptr as usize, len);
        if !ptr.is_null() {
            RegionManager::global().declare(&slot);
        }
        Self { slot }
    }

    /// An undeclared null view of length zero.
    pub fn null() -> Self {
        Self {
            slot: ViewSlot::new(0, 0),
        }
    }

    /// A view that is *not* registered with the manager.
    ///
    /// Dereferences are still containment-gated: they succeed only while
    /// the byte range lies inside a region some other view has declared,
    /// and that declarer's [`from_raw`](Self::from_raw) contract covers
    /// the bytes. Useful for computed pointers into known structures;
    /// a range outside every tracked region fails with `InvalidPointer`.
    pub fn unregistered(addr: usize, len: usize) -> Self {
        Self {
            slot: ViewSlot::new(addr, len),
        }
    }

    // ── Accessors ──────────────────────────────────────────────

    /// The view's stable identity.
    pub fn id(&self) -> ViewId {
        self.slot.id()
    }

    /// Snapshot of the current base address.
    pub fn addr(&self) -> usize {
        self.slot.span().addr
    }

    /// Snapshot of the current length in bytes.
    pub fn len(&self) -> usize {
        self.slot.span().len
    }

    /// True iff the length is zero.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True iff the base address is null.
    pub fn is_null(&self) -> bool {
        self.slot.span().is_null()
    }

    /// Snapshot of the covered interval.
    pub fn interval(&self) -> Interval {
        self.slot.interval()
    }

    /// One past the last address of the view.
    pub fn end_addr(&self) -> usize {
        let span = self.slot.span();
        span.addr + span.len
    }

    /// True iff the byte range is covered by some tracked region.
    pub fn is_valid(&self) -> bool {
        let span = self.slot.span();
        RegionManager::global().contains_interval(span.addr, span.len)
    }

    /// True iff an interval equal to the view's range is tracked.
    pub fn is_declared(&self) -> bool {
        let span = self.slot.span();
        RegionManager::global().has_interval(span.addr, span.len)
    }

    pub(crate) fn slot(&self) -> &Arc<ViewSlot> {
        &self.slot
    }

    // ── Validation-gated dereference ───────────────────────────

    /// The address `offset` bytes into the view, if the view is still
    /// covered by a tracked region and the offset is in bounds.
    ///
    /// A null view returns a null pointer without raising. The span is
    /// snapshotted under the view lock, the registry is consulted with no
    /// lock held, and the snapshot is re-checked; a concurrent move
    /// restarts the read.
    pub fn ptr(&self, offset: usize) -> Result<*const u8, RegionError> {
        loop {
            let snap = self.slot.span();
            if snap.is_null() {
                return Ok(std::ptr::null());
            }

            let valid = RegionManager::global().contains_interval(snap.addr, snap.len);

            let recheck = self.slot.span();
            if recheck != snap {
                continue;
            }
            if !valid {
                return Err(RegionError::InvalidPointer {
                    addr: snap.addr,
                    len: snap.len,
                });
            }
            if offset >= snap.len {
                return Err(RegionError::OutOfBounds {
                    given: offset,
                    expected: snap.len,
                });
            }
            return Ok((snap.addr + offset) as *const u8);
        }
    }

    /// Mutable counterpart of [`ptr`](Self::ptr).
    pub fn ptr_mut(&self, offset: usize) -> Result<*mut u8, RegionError> {
        self.ptr(offset).map(|p| p as *mut u8)
    }

    /// A typed pointer `offset` bytes into the view.
    ///
    /// Fails with `NullPointer` on a null view, `InsufficientSize` when
    /// the view is smaller than `T`, and `OutOfBounds` when the `T`-sized
    /// span at `offset` crosses the end.
    pub fn cast_ptr<T: Pod>(&self, offset: usize) -> Result<*const T, RegionError> {
        let base = self.ptr(0)?;
        if base.is_null() {
            return Err(RegionError::NullPointer);
        }
        let len = self.len();
        if size_of::<T>() > len {
            return Err(RegionError::InsufficientSize {
                given: size_of::<T>(),
                expected: len,
            });
        }
        if offset.saturating_add(size_of::<T>()) > len {
            return Err(RegionError::OutOfBounds {
                given: offset + size_of::<T>(),
                expected: len,
            });
        }
        self.ptr(offset).map(|p| p as *const T)
    }

    /// Reads a `T` from `offset` bytes into the view (unaligned read).
    pub fn cast<T: Pod>(&self, offset: usize) -> Result<T, RegionError> {
        let ptr = self.cast_ptr::<T>(offset)?;
        Ok(unsafe { ptr.read_unaligned() })
    }

    // ── Bulk reads and writes ──────────────────────────────────

    /// Reads `count` values of `T` starting `offset` bytes into the view.
    pub fn read<T: Pod>(&self, offset: usize, count: usize) -> Result<Vec<T>, RegionError> {
        let byte_len = count.saturating_mul(size_of::<T>());
        let len = self.len();
        if offset.saturating_add(byte_len) > len {
            return Err(RegionError::OutOfBounds {
                given: offset + byte_len,
                expected: len,
            });
        }

        let base = self.cast_ptr::<T>(offset)?;
        let mut out = Vec::with_capacity(count);
        let mut cursor = base as *const u8;
        for _ in 0..count {
            out.push(unsafe { (cursor as *const T).read_unaligned() });
            cursor = unsafe { cursor.add(size_of::<T>()) };
        }
        Ok(out)
    }

    /// Reads `len` raw bytes starting at `offset`.
    pub fn read_bytes(&self, offset: usize, len: usize) -> Result<Vec<u8>, RegionError> {
        self.read::<u8>(offset, len)
    }

    /// Writes the values of `data` starting `offset` bytes into the view.
    pub fn write_slice<T: Pod>(&self, offset: usize, data: &[T]) -> Result<(), RegionError> {
        let byte_len = data.len().saturating_mul(size_of::<T>());
        let len = self.len();
        if self.is_null() {
            return Err(RegionError::NullPointer);
        }
        if offset.saturating_add(byte_len) > len {
            return Err(RegionError::OutOfBounds {
                given: offset + byte_len,
                expected: len,
            });
        }

        let dst = self.ptr_mut(offset)?;
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr() as *const u8, dst, byte_len);
        }
        Ok(())
    }

    /// Writes a single `T` at `offset` bytes into the view.
    pub fn write<T: Pod>(&self, offset: usize, value: &T) -> Result<(), RegionError> {
        self.write_slice(offset, std::slice::from_ref(value))
    }

    /// Writes raw bytes starting at `offset`.
    pub fn write_bytes(&self, offset: usize, data: &[u8]) -> Result<(), RegionError> {
        self.write_slice(offset, data)
    }

    /// Writes `data` at the start of the view.
    pub fn start_with<T: Pod>(&self, data: &[T]) -> Result<(), RegionError> {
        self.write_slice(0, data)
    }

    /// Writes `data` flush against the end of the view.
    pub fn end_with<T: Pod>(&self, data: &[T]) -> Result<(), RegionError> {
        let byte_len = data.len().saturating_mul(size_of::<T>());
        let len = self.len();
        if byte_len > len {
            return Err(RegionError::OutOfBounds {
                given: byte_len,
                expected: len,
            });
        }
        self.write_slice(len - byte_len, data)
    }

    // ── Derived views ──────────────────────────────────────────

    /// Creates a child view over `[offset, offset + size)` and declares
    /// the containment with the manager.
    pub fn subsection(&self, offset: usize, size: usize) -> Result<RegionView, RegionError> {
        let len = self.len();
        if offset.saturating_add(size) > len {
            return Err(RegionError::InsufficientSize {
                given: offset + size,
                expected: len,
            });
        }
        if self.is_null() {
            return Err(RegionError::NullPointer);
        }

        let base = self.ptr(offset)?;
        let child = unsafe { RegionView::from_raw(base, size) };
        RegionManager::global().declare_child(self.interval(), child.slot());
        Ok(child)
    }

    /// Splits the view into `[0, mid)` and `[mid, len)` child views.
    pub fn split_at(&self, mid: usize) -> Result<(RegionView, RegionView), RegionError> {
        let len = self.len();
        if mid >= len {
            return Err(RegionError::OutOfBounds {
                given: mid,
                expected: len,
            });
        }
        let left = self.subsection(0, mid)?;
        let right = self.subsection(mid, len - mid)?;
        Ok((left, right))
    }

    // ── Rebinding and relocation ───────────────────────────────

    /// Rebinds the view to a new span: destroys the current registration,
    /// rewrites the span, and re-declares if the pointer is non-null.
    ///
    /// # Safety
    ///
    /// Same contract as [`from_raw`](Self::from_raw) for the new span.
    pub unsafe fn set_memory(&mut self, ptr: *const u8, len: usize) {
        let manager = RegionManager::global();
        if manager.has_object(&self.slot) {
            manager.destroy(&self.slot);
        }
        {
            let mut span = self.slot.span.lock();
            *span = Span {
                addr: ptr as usize,
                len,
            };
        }
        if !ptr.is_null() {
            manager.declare(&self.slot);
        }
    }

    /// Relocates the tracked region to `[new_ptr, new_ptr + new_len)`,
    /// translating every descendant view and invalidating descendants that
    /// fall outside a truncated range.
    ///
    /// # Safety
    ///
    /// The caller guarantees the new span per the
    /// [`from_raw`](Self::from_raw) contract and that the surviving bytes
    /// were copied to the new location before the call.
    pub unsafe fn relocate(&self, new_ptr: *const u8, new_len: usize) {
        RegionManager::global().move_region(&self.slot, new_ptr as usize, new_len);
    }

    /// Invalidates the view's interval, cascading to all descendants.
    /// The memory itself is untouched.
    pub fn invalidate(&self) {
        RegionManager::global().invalidate(self.interval());
    }

    // ── Range predicates ───────────────────────────────────────

    /// True iff the smaller of `unit` and the view length divides the
    /// larger evenly.
    pub fn aligns_with(&self, unit: usize) -> bool {
        let len = self.len();
        if unit == 0 || len == 0 {
            return false;
        }
        let (smaller, bigger) = if len < unit { (len, unit) } else { (unit, len) };
        bigger % smaller == 0
    }

    /// True iff `[offset, offset + size)` lies within the view.
    pub fn validate_range(&self, offset: usize, size: usize) -> bool {
        let span = self.slot.span();
        let base = span.interval();
        let sub = Interval::from_span(span.addr.wrapping_add(offset), size);
        base.contains(&sub)
    }

    // ── Search ─────────────────────────────────────────────────

    /// Finds every occurrence of `needle` in the view's bytes. Overlapping
    /// hits are all reported, in ascending offset order.
    ///
    /// The scan holds the view lock, so a concurrent move waits for the
    /// scan to finish rather than pulling the bytes out from under it.
    pub fn search_bytes(&self, needle: &[u8]) -> Result<Vec<usize>, RegionError> {
        self.cast_ptr::<u8>(0)?;
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let span = self.slot.span.lock();
        let haystack = unsafe { std::slice::from_raw_parts(span.addr as *const u8, span.len) };
        let results = kmp_search(haystack, needle);
        drop(span);
        Ok(results)
    }

    /// Finds every occurrence of the byte representation of `value`.
    pub fn search<T: Pod>(&self, value: &T) -> Result<Vec<usize>, RegionError> {
        self.search_slice(std::slice::from_ref(value))
    }

    /// Finds every occurrence of the byte representation of `values`.
    pub fn search_slice<T: Pod>(&self, values: &[T]) -> Result<Vec<usize>, RegionError> {
        let bytes = unsafe {
            std::slice::from_raw_parts(
                values.as_ptr() as *const u8,
                values.len() * size_of::<T>(),
            )
        };
        self.search_bytes(bytes)
    }

    /// True iff the byte sequence occurs anywhere in the view.
    pub fn contains_seq(&self, needle: &[u8]) -> Result<bool, RegionError> {
        Ok(!self.search_bytes(needle)?.is_empty())
    }

    /// True iff the byte representation of `value` occurs in the view.
    pub fn contains_value<T: Pod>(&self, value: &T) -> Result<bool, RegionError> {
        Ok(!self.search(value)?.is_empty())
    }

    // ── Formatting and persistence ─────────────────────────────

    /// The view's bytes as a hex string.
    pub fn to_hex(&self, uppercase: bool) -> Result<String, RegionError> {
        self.cast_ptr::<u8>(0)?;

        let span = self.slot.span.lock();
        let bytes = unsafe { std::slice::from_raw_parts(span.addr as *const u8, span.len) };
        let mut out = String::with_capacity(bytes.len() * 2);
        for byte in bytes {
            if uppercase {
                write!(out, "{byte:02X}").expect("writing to a String cannot fail");
            } else {
                write!(out, "{byte:02x}").expect("writing to a String cannot fail");
            }
        }
        drop(span);
        Ok(out)
    }

    /// Writes the view's byte range verbatim to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), RegionError> {
        let bytes = self.read_bytes(0, self.len())?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

impl Drop for RegionView {
    fn drop(&mut self) {
        let manager = RegionManager::global();
        if manager.has_object(&self.slot) {
            manager.destroy(&self.slot);
        } else {
            // Invalidated first: silent no-op destruction, just retire the
            // slot entry.
            manager.release_slot(self.slot.id());
        }
    }
}

impl Clone for RegionView {
    /// A fresh identity over the same span, declared with the manager.
    /// Containment links are not inherited.
    fn clone(&self) -> Self {
        let snap = self.slot.span();
        let slot = ViewSlot::new(snap.addr, snap.len);
        if !snap.is_null() {
            RegionManager::global().declare(&slot);
        }
        Self { slot }
    }
}

impl std::fmt::Debug for RegionView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let span = self.slot.span();
        f.debug_struct("RegionView")
            .field("id", &self.slot.id())
            .field("addr", &format_args!("{:#x}", span.addr))
            .field("len", &span.len)
            .field("valid", &self.is_valid())
            .finish()
    }
}
