// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Transparent buffers: borrowed or owned, same surface.
//!
//! [`ByteBuffer`] either borrows an external byte range (tracked but not
//! owned) or owns a [`HeapBuffer`]. Reads, writes and subsections work the
//! same either way; operations that must resize the storage (`append`,
//! `insert`, `erase`, `split_off`, `reallocate`) require ownership and
//! fail with [`NotAllocated`](RegionError::NotAllocated) on a borrow.
//! [`consume`](ByteBuffer::consume) upgrades a borrow into owned storage
//! by copying the bytes.

use crate::heap::HeapBuffer;
use region_tracker::{RegionError, RegionView};

enum Inner {
    /// A borrowed (or null) range, tracked but not owned.
    Borrowed(RegionView),
    /// Owned storage.
    Owned(HeapBuffer),
}

/// A byte buffer that is transparent about ownership.
pub struct ByteBuffer {
    inner: Inner,
}

impl ByteBuffer {
    // ── Construction ───────────────────────────────────────────

    /// An empty null buffer. Resizing operations allocate on demand.
    pub fn new() -> Self {
        Self {
            inner: Inner::Borrowed(RegionView::null()),
        }
    }

    /// Borrows `len` bytes at `ptr` without taking ownership.
    ///
    /// # Safety
    ///
    /// Same contract as [`RegionView::from_raw`].
    pub unsafe fn from_raw(ptr: *const u8, len: usize) -> Self {
        Self {
            inner: Inner::Borrowed(RegionView::from_raw(ptr, len)),
        }
    }

    /// Wraps an existing view (e.g. a subsection) as a borrowed buffer.
    pub fn from_view(view: RegionView) -> Self {
        Self {
            inner: Inner::Borrowed(view),
        }
    }

    /// Allocates `size` zeroed bytes of owned storage.
    pub fn with_capacity(size: usize) -> Result<Self, RegionError> {
        Ok(Self {
            inner: Inner::Owned(HeapBuffer::new(size)?),
        })
    }

    /// Allocates owned storage holding a copy of `data`.
    pub fn from_bytes(data: &[u8]) -> Result<Self, RegionError> {
        Ok(Self {
            inner: Inner::Owned(HeapBuffer::from_bytes(data)?),
        })
    }

    // ── Accessors ──────────────────────────────────────────────

    /// True iff the buffer owns its storage.
    pub fn is_allocated(&self) -> bool {
        matches!(self.inner, Inner::Owned(_))
    }

    /// The tracked view over the buffer, borrowed or owned.
    pub fn view(&self) -> &RegionView {
        match &self.inner {
            Inner::Borrowed(view) => view,
            Inner::Owned(buf) => buf.view(),
        }
    }

    /// Current base address.
    pub fn addr(&self) -> usize {
        self.view().addr()
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.view().len()
    }

    /// True iff the length is zero.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True iff the buffer points nowhere.
    pub fn is_null(&self) -> bool {
        self.view().is_null()
    }

    // ── Reads, writes, derived views ───────────────────────────

    /// Reads `len` bytes starting at `offset`.
    pub fn read_bytes(&self, offset: usize, len: usize) -> Result<Vec<u8>, RegionError> {
        self.view().read_bytes(offset, len)
    }

    /// Writes `data` starting at `offset`.
    pub fn write_bytes(&mut self, offset: usize, data: &[u8]) -> Result<(), RegionError> {
        self.view().write_bytes(offset, data)
    }

    /// Creates a borrowed child buffer over `[offset, offset + size)`.
    pub fn subsection(&self, offset: usize, size: usize) -> Result<ByteBuffer, RegionError> {
        Ok(ByteBuffer::from_view(self.view().subsection(offset, size)?))
    }

    // ── Ownership transitions ──────────────────────────────────

    /// Replaces the buffer with a borrow of `len` bytes at `ptr`,
    /// releasing any owned storage first.
    ///
    /// # Safety
    ///
    /// Same contract as [`RegionView::from_raw`].
    pub unsafe fn set_memory(&mut self, ptr: *const u8, len: usize) {
        self.inner = Inner::Borrowed(RegionView::from_raw(ptr, len));
    }

    /// Replaces the buffer with fresh owned zeroed storage.
    pub fn allocate(&mut self, size: usize) -> Result<(), RegionError> {
        self.inner = Inner::Owned(HeapBuffer::new(size)?);
        Ok(())
    }

    /// Resizes owned storage, or allocates when nothing is owned yet.
    /// A borrowed non-null buffer cannot be resized.
    pub fn reallocate(&mut self, size: usize) -> Result<(), RegionError> {
        match &mut self.inner {
            Inner::Owned(buf) => return buf.reallocate(size),
            Inner::Borrowed(view) if !view.is_null() => return Err(RegionError::NotAllocated),
            Inner::Borrowed(_) => {}
        }
        self.allocate(size)
    }

    /// Copies a borrowed range into owned storage. Owned buffers are left
    /// as they are.
    pub fn consume(&mut self) -> Result<(), RegionError> {
        let bytes = match &self.inner {
            Inner::Owned(_) => return Ok(()),
            Inner::Borrowed(view) if view.is_null() => return Err(RegionError::NullPointer),
            Inner::Borrowed(view) => view.read_bytes(0, view.len())?,
        };
        self.inner = Inner::Owned(HeapBuffer::from_bytes(&bytes)?);
        Ok(())
    }

    // ── Resizing operations (owned only) ───────────────────────

    /// Appends `data`. A null buffer allocates; a borrowed one fails.
    pub fn append(&mut self, data: &[u8]) -> Result<(), RegionError> {
        match &mut self.inner {
            Inner::Owned(buf) => return buf.append(data),
            Inner::Borrowed(view) if !view.is_null() => return Err(RegionError::NotAllocated),
            Inner::Borrowed(_) => {}
        }
        self.inner = Inner::Owned(HeapBuffer::from_bytes(data)?);
        Ok(())
    }

    /// Inserts `data` at `offset`, shifting the tail up.
    pub fn insert(&mut self, offset: usize, data: &[u8]) -> Result<(), RegionError> {
        match &mut self.inner {
            Inner::Owned(buf) => return buf.insert(offset, data),
            Inner::Borrowed(view) if !view.is_null() => return Err(RegionError::NotAllocated),
            Inner::Borrowed(_) => {}
        }
        if offset != 0 {
            return Err(RegionError::OutOfBounds {
                given: offset,
                expected: 0,
            });
        }
        self.inner = Inner::Owned(HeapBuffer::from_bytes(data)?);
        Ok(())
    }

    /// Removes `[offset, offset + len)` from owned storage.
    pub fn erase(&mut self, offset: usize, len: usize) -> Result<(), RegionError> {
        match &mut self.inner {
            Inner::Owned(buf) => buf.erase(offset, len),
            Inner::Borrowed(_) => Err(RegionError::NotAllocated),
        }
    }

    /// Splits owned storage at `mid`, returning the owned tail.
    pub fn split_off(&mut self, mid: usize) -> Result<ByteBuffer, RegionError> {
        match &mut self.inner {
            Inner::Owned(buf) => Ok(ByteBuffer {
                inner: Inner::Owned(buf.split_off(mid)?),
            }),
            Inner::Borrowed(_) => Err(RegionError::NotAllocated),
        }
    }
}

impl Default for ByteBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ByteBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteBuffer")
            .field("addr", &format_args!("{:#x}", self.addr()))
            .field("len", &self.len())
            .field("allocated", &self.is_allocated())
            .finish()
    }
}
