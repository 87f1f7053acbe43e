// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Single-element typed pointers.
//!
//! A [`TypedPointer`] is a one-element view: an address plus the size of
//! `T`. Non-owning pointers are *unregistered* — dereferences succeed only
//! while the range lies inside a region some tracked view has declared, so
//! a pointer computed into freed or never-tracked memory fails with
//! `InvalidPointer` instead of reading wild. An owning pointer carries its
//! own one-element allocation; arithmetic on it is rejected with
//! [`PointerIsAllocated`](RegionError::PointerIsAllocated).

use crate::heap::HeapBuffer;
use crate::pod_bytes;
use region_tracker::{Pod, RegionError, RegionView};
use std::marker::PhantomData;
use std::mem::size_of;

/// A validated pointer to a single `T` inside tracked memory.
pub struct TypedPointer<T: Pod> {
    view: RegionView,
    storage: Option<HeapBuffer>,
    _marker: PhantomData<T>,
}

impl<T: Pod> TypedPointer<T> {
    // ── Construction ───────────────────────────────────────────

    /// A null pointer.
    pub fn null() -> Self {
        Self {
            view: RegionView::null(),
            storage: None,
            _marker: PhantomData,
        }
    }

    /// A non-owning pointer to the `T` at `addr`.
    ///
    /// No registration happens; dereferences are containment-gated
    /// against regions declared elsewhere.
    pub fn from_addr(addr: usize) -> Self {
        Self {
            view: RegionView::unregistered(addr, size_of::<T>()),
            storage: None,
            _marker: PhantomData,
        }
    }

    /// A non-owning pointer from a raw `*const T`.
    pub fn from_ptr(ptr: *const T) -> Self {
        Self::from_addr(ptr as usize)
    }

    /// A pointer into `view` at `offset` bytes, validated against the
    /// view before construction.
    pub fn from_view(view: &RegionView, offset: usize) -> Result<Self, RegionError> {
        let ptr = view.cast_ptr::<T>(offset)?;
        Ok(Self::from_addr(ptr as usize))
    }

    /// An owning pointer over a zeroed one-element allocation.
    pub fn allocate() -> Result<Self, RegionError> {
        let heap = HeapBuffer::new(size_of::<T>())?;
        let view = RegionView::unregistered(heap.addr(), size_of::<T>());
        Ok(Self {
            view,
            storage: Some(heap),
            _marker: PhantomData,
        })
    }

    /// An owning pointer holding a copy of `value`.
    pub fn from_value(value: &T) -> Result<Self, RegionError> {
        let heap = HeapBuffer::from_bytes(pod_bytes(std::slice::from_ref(value)))?;
        let view = RegionView::unregistered(heap.addr(), size_of::<T>());
        Ok(Self {
            view,
            storage: Some(heap),
            _marker: PhantomData,
        })
    }

    // ── Accessors ──────────────────────────────────────────────

    /// The pointed-to address.
    pub fn addr(&self) -> usize {
        self.view.addr()
    }

    /// True iff the pointer is null.
    pub fn is_null(&self) -> bool {
        self.view.is_null()
    }

    /// True iff the pointer owns its element.
    pub fn is_allocated(&self) -> bool {
        self.storage.is_some()
    }

    // ── Dereference ────────────────────────────────────────────

    /// Reads the pointed-to value.
    pub fn get(&self) -> Result<T, RegionError> {
        self.view.cast::<T>(0)
    }

    /// Writes the pointed-to value.
    pub fn set(&mut self, value: &T) -> Result<(), RegionError> {
        self.view.write(0, value)
    }

    /// Reads the value `count` elements away, like indexing.
    pub fn get_at(&self, count: isize) -> Result<T, RegionError> {
        self.add(count)?.get()
    }

    // ── Arithmetic ─────────────────────────────────────────────

    /// A new pointer `count` elements forward. Owning pointers do not
    /// support arithmetic.
    pub fn add(&self, count: isize) -> Result<Self, RegionError> {
        if self.is_allocated() {
            return Err(RegionError::PointerIsAllocated);
        }
        let delta = count.wrapping_mul(size_of::<T>() as isize);
        Ok(Self::from_addr(self.addr().wrapping_add_signed(delta)))
    }

    /// A new pointer `count` elements backward.
    pub fn sub(&self, count: isize) -> Result<Self, RegionError> {
        self.add(count.wrapping_neg())
    }

    /// Reinterprets the pointee as `U`, validating that a `U` fits at
    /// the current address within the tracked range.
    pub fn recast<U: Pod>(&self) -> Result<TypedPointer<U>, RegionError> {
        self.view.cast_ptr::<U>(0)?;
        Ok(TypedPointer::<U>::from_addr(self.addr()))
    }
}

impl<T: Pod> std::fmt::Debug for TypedPointer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedPointer")
            .field("addr", &format_args!("{:#x}", self.addr()))
            .field("size", &size_of::<T>())
            .field("allocated", &self.is_allocated())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_pointer() {
        let ptr = TypedPointer::<u32>::null();
        assert!(ptr.is_null());
        assert!(matches!(ptr.get(), Err(RegionError::NullPointer)));
    }

    #[test]
    fn test_pointer_into_tracked_buffer() {
        let buf = HeapBuffer::from_bytes(&[0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88]).unwrap();
        let ptr = TypedPointer::<u16>::from_view(buf.view(), 0).unwrap();

        assert_eq!(ptr.get().unwrap(), u16::from_ne_bytes([0x11, 0x22]));
        assert_eq!(ptr.get_at(1).unwrap(), u16::from_ne_bytes([0x33, 0x44]));
        assert_eq!(ptr.add(3).unwrap().get().unwrap(), u16::from_ne_bytes([0x77, 0x88]));
    }

    #[test]
    fn test_arithmetic_past_the_end_fails() {
        let buf = HeapBuffer::from_bytes(&[0u8; 8]).unwrap();
        let ptr = TypedPointer::<u32>::from_view(buf.view(), 0).unwrap();

        // One element past the end: the range is no longer contained.
        let past = ptr.add(2).unwrap();
        assert!(matches!(
            past.get(),
            Err(RegionError::InvalidPointer { .. })
        ));
    }

    #[test]
    fn test_untracked_address_fails() {
        let ptr = TypedPointer::<u32>::from_addr(0x3000_0000);
        assert!(matches!(
            ptr.get(),
            Err(RegionError::InvalidPointer { .. })
        ));
    }

    #[test]
    fn test_owning_pointer() {
        let mut ptr = TypedPointer::<u64>::allocate().unwrap();
        assert!(ptr.is_allocated());
        assert_eq!(ptr.get().unwrap(), 0);

        ptr.set(&0xDEAD_BEEF).unwrap();
        assert_eq!(ptr.get().unwrap(), 0xDEAD_BEEF);

        assert!(matches!(
            ptr.add(1),
            Err(RegionError::PointerIsAllocated)
        ));
    }

    #[test]
    fn test_from_value() {
        let ptr = TypedPointer::from_value(&42u32).unwrap();
        assert!(ptr.is_allocated());
        assert_eq!(ptr.get().unwrap(), 42);
    }

    #[test]
    fn test_recast() {
        let buf = HeapBuffer::from_bytes(&[0xAA, 0xBB, 0xCC, 0xDD]).unwrap();
        let ptr = TypedPointer::<u32>::from_view(buf.view(), 0).unwrap();

        let bytes = ptr.recast::<u8>().unwrap();
        assert_eq!(bytes.get().unwrap(), 0xAA);

        // A u64 does not fit in the 4-byte region.
        assert!(ptr.recast::<u64>().is_err());
    }

    #[test]
    fn test_write_tracks_validity() {
        let buf = HeapBuffer::from_bytes(&[0u8; 4]).unwrap();
        let mut ptr = TypedPointer::<u32>::from_view(buf.view(), 0).unwrap();

        // Untrack the region while keeping the allocation alive; the
        // pointer's next write must fail instead of going through.
        buf.view().invalidate();
        assert!(matches!(
            ptr.set(&1),
            Err(RegionError::InvalidPointer { .. })
        ));
    }
}
