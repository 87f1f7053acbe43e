// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Owned, tracked heap buffers.
//!
//! [`HeapBuffer`] owns a zeroed heap block and keeps a declared
//! [`RegionView`] over it for its whole lifetime. Reallocation is an
//! *observable move*: a fresh block is allocated, the surviving bytes are
//! copied, and the registry relocates the region so every subsection view
//! is translated to the new base (or invalidated, on truncation). On drop
//! the buffer invalidates its region — cascading to all children — then
//! zeroes and frees the block.

use region_tracker::{RegionError, RegionView};
use std::alloc::Layout;
use std::path::Path;
use tracing::trace;

/// An owned, zero-initialized, tracked byte buffer.
///
/// # Example
/// ```
/// use byte_views::HeapBuffer;
///
/// let mut buf = HeapBuffer::new(8).unwrap();
/// buf.write_bytes(0, &[1, 2, 3, 4]).unwrap();
///
/// let sub = buf.subsection(0, 4).unwrap();
/// assert_eq!(sub.read_bytes(0, 4).unwrap(), vec![1, 2, 3, 4]);
///
/// // Growing relocates the region; the subsection follows the move.
/// buf.reallocate(16).unwrap();
/// assert_eq!(sub.addr(), buf.addr());
/// assert_eq!(sub.read_bytes(0, 4).unwrap(), vec![1, 2, 3, 4]);
/// ```
pub struct HeapBuffer {
    view: RegionView,
}

impl HeapBuffer {
    /// Allocates a zeroed buffer of `size` bytes and declares it.
    pub fn new(size: usize) -> Result<Self, RegionError> {
        if size == 0 {
            return Err(RegionError::ZeroSize);
        }
        let ptr = allocate_zeroed(size);
        trace!(addr = ptr as usize, size, "allocate");
        let view = unsafe { RegionView::from_raw(ptr, size) };
        Ok(Self { view })
    }

    /// Allocates a buffer holding a copy of `data`.
    pub fn from_bytes(data: &[u8]) -> Result<Self, RegionError> {
        let buf = Self::new(data.len())?;
        buf.view.write_bytes(0, data)?;
        Ok(buf)
    }

    /// Reads a whole file verbatim into a fresh buffer.
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self, RegionError> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data)
    }

    // ── Accessors ──────────────────────────────────────────────

    /// The tracked view over the buffer.
    pub fn view(&self) -> &RegionView {
        &self.view
    }

    /// Current base address.
    pub fn addr(&self) -> usize {
        self.view.addr()
    }

    /// Buffer length in bytes.
    pub fn len(&self) -> usize {
        self.view.len()
    }

    /// True iff the buffer holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The buffer contents as a slice.
    pub fn as_slice(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.view.addr() as *const u8, self.view.len()) }
    }

    /// The buffer contents as a mutable slice.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { std::slice::from_raw_parts_mut(self.view.addr() as *mut u8, self.view.len()) }
    }

    // ── View pass-throughs ─────────────────────────────────────

    /// Creates a tracked child view over `[offset, offset + size)`.
    pub fn subsection(&self, offset: usize, size: usize) -> Result<RegionView, RegionError> {
        self.view.subsection(offset, size)
    }

    /// Reads `len` bytes starting at `offset`.
    pub fn read_bytes(&self, offset: usize, len: usize) -> Result<Vec<u8>, RegionError> {
        self.view.read_bytes(offset, len)
    }

    /// Writes `data` starting at `offset`.
    pub fn write_bytes(&mut self, offset: usize, data: &[u8]) -> Result<(), RegionError> {
        self.view.write_bytes(offset, data)
    }

    /// Finds every occurrence of `needle` in the buffer.
    pub fn search_bytes(&self, needle: &[u8]) -> Result<Vec<usize>, RegionError> {
        self.view.search_bytes(needle)
    }

    /// Writes the buffer verbatim to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), RegionError> {
        self.view.save(path)
    }

    // ── Resizing ───────────────────────────────────────────────

    /// Moves the buffer into a freshly allocated block of `new_size`
    /// bytes, copying the surviving prefix and zero-filling any growth.
    ///
    /// Subsection views are translated to the new base; views reaching
    /// past a truncated end are invalidated. The old block is zeroed and
    /// freed after the registry has moved.
    pub fn reallocate(&mut self, new_size: usize) -> Result<(), RegionError> {
        if new_size == 0 {
            return Err(RegionError::ZeroSize);
        }
        let old_len = self.len();
        let old_ptr = self.addr() as *mut u8;

        let new_ptr = allocate_zeroed(new_size);
        trace!(
            from = old_ptr as usize,
            to = new_ptr as usize,
            old_len,
            new_size,
            "reallocate"
        );
        unsafe {
            std::ptr::copy_nonoverlapping(old_ptr, new_ptr, old_len.min(new_size));
            self.view.relocate(new_ptr, new_size);
            std::ptr::write_bytes(old_ptr, 0, old_len);
            std::alloc::dealloc(old_ptr, layout_for(old_len));
        }
        Ok(())
    }

    /// Appends `data`, growing the buffer.
    pub fn append(&mut self, data: &[u8]) -> Result<(), RegionError> {
        let old_len = self.len();
        self.reallocate(old_len + data.len())?;
        self.view.write_bytes(old_len, data)
    }

    /// Inserts `data` at `offset`, shifting the tail up.
    pub fn insert(&mut self, offset: usize, data: &[u8]) -> Result<(), RegionError> {
        let total = self.len();
        if offset > total {
            return Err(RegionError::OutOfBounds {
                given: offset,
                expected: total,
            });
        }
        if offset == total {
            return self.append(data);
        }

        let tail = self.view.read_bytes(offset, total - offset)?;
        self.reallocate(total + data.len())?;
        self.view.write_bytes(offset, data)?;
        self.view.write_bytes(offset + data.len(), &tail)
    }

    /// Removes `[offset, offset + len)`, shifting the tail down.
    /// Erasing the whole buffer is rejected with `ZeroSize`.
    pub fn erase(&mut self, offset: usize, len: usize) -> Result<(), RegionError> {
        let total = self.len();
        if offset.saturating_add(len) > total {
            return Err(RegionError::OutOfBounds {
                given: offset + len,
                expected: total,
            });
        }

        let tail_len = total - offset - len;
        let tail = if tail_len > 0 {
            self.view.read_bytes(offset + len, tail_len)?
        } else {
            Vec::new()
        };
        self.reallocate(total - len)?;
        if !tail.is_empty() {
            self.view.write_bytes(offset, &tail)?;
        }
        Ok(())
    }

    /// Splits the buffer at `mid`: the tail moves into a new buffer and
    /// this buffer shrinks to `[0, mid)`.
    pub fn split_off(&mut self, mid: usize) -> Result<HeapBuffer, RegionError> {
        let total = self.len();
        if mid >= total {
            return Err(RegionError::OutOfBounds {
                given: mid,
                expected: total,
            });
        }
        let tail = self.view.read_bytes(mid, total - mid)?;
        let split = HeapBuffer::from_bytes(&tail)?;
        self.reallocate(mid)?;
        Ok(split)
    }
}

impl Drop for HeapBuffer {
    fn drop(&mut self) {
        let len = self.view.len();
        let ptr = self.view.addr() as *mut u8;
        if ptr.is_null() || len == 0 {
            return;
        }
        trace!(addr = ptr as usize, len, "deallocate");
        // Invalidation cascades to every subsection view before the
        // memory goes away; their next dereference fails cleanly.
        self.view.invalidate();
        unsafe {
            std::ptr::write_bytes(ptr, 0, len);
            std::alloc::dealloc(ptr, layout_for(len));
        }
    }
}

impl std::fmt::Debug for HeapBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeapBuffer")
            .field("addr", &format_args!("{:#x}", self.addr()))
            .field("len", &self.len())
            .finish()
    }
}

fn layout_for(size: usize) -> Layout {
    Layout::array::<u8>(size).expect("buffer size exceeds isize::MAX")
}

fn allocate_zeroed(size: usize) -> *mut u8 {
    let layout = layout_for(size);
    let ptr = unsafe { std::alloc::alloc_zeroed(layout) };
    if ptr.is_null() {
        std::alloc::handle_alloc_error(layout);
    }
    ptr
}
