// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Element-typed arrays over tracked byte ranges.
//!
//! [`TypedArray`] translates element-count operations into byte operations
//! on a [`ByteBuffer`]: indexing, element-aligned search, subsections,
//! and — on owned storage — the usual grow/shrink editing operations.
//! It introduces no registry semantics of its own.

use crate::pod_bytes;
use crate::transparent::ByteBuffer;
use region_tracker::{Pod, RegionError, RegionView};
use std::marker::PhantomData;
use std::mem::size_of;

/// A typed array view, element-addressed, over tracked bytes.
///
/// # Example
/// ```
/// use byte_views::TypedArray;
///
/// let mut arr = TypedArray::<u16>::from_slice(&[10, 20, 30]).unwrap();
/// assert_eq!(arr.get(1).unwrap(), 20);
///
/// arr.push_back(&40).unwrap();
/// assert_eq!(arr.to_vec().unwrap(), vec![10, 20, 30, 40]);
/// ```
pub struct TypedArray<T: Pod> {
    buf: ByteBuffer,
    _marker: PhantomData<T>,
}

impl<T: Pod> TypedArray<T> {
    fn wrap(buf: ByteBuffer) -> Self {
        Self {
            buf,
            _marker: PhantomData,
        }
    }

    // ── Construction ───────────────────────────────────────────

    /// Allocates a zeroed array of `count` elements.
    pub fn new(count: usize) -> Result<Self, RegionError> {
        Ok(Self::wrap(ByteBuffer::with_capacity(
            count.saturating_mul(size_of::<T>()),
        )?))
    }

    /// Borrows `count` elements at `ptr` without taking ownership.
    ///
    /// # Safety
    ///
    /// Same contract as [`RegionView::from_raw`].
    pub unsafe fn from_raw(ptr: *const T, count: usize) -> Self {
        Self::wrap(ByteBuffer::from_raw(
            ptr as *const u8,
            count * size_of::<T>(),
        ))
    }

    /// Allocates an array holding a copy of `data`.
    pub fn from_slice(data: &[T]) -> Result<Self, RegionError> {
        Ok(Self::wrap(ByteBuffer::from_bytes(pod_bytes(data))?))
    }

    /// Wraps an existing view as a borrowed array. The view's byte length
    /// must be a whole number of elements.
    pub fn from_view(view: RegionView) -> Result<Self, RegionError> {
        if view.len() % size_of::<T>() != 0 {
            return Err(RegionError::BadAlignment {
                given: view.len(),
                expected: size_of::<T>(),
            });
        }
        Ok(Self::wrap(ByteBuffer::from_view(view)))
    }

    // ── Accessors ──────────────────────────────────────────────

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.buf.len() / size_of::<T>()
    }

    /// True iff the array holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Length in bytes.
    pub fn byte_len(&self) -> usize {
        self.buf.len()
    }

    /// True iff the array owns its storage.
    pub fn is_allocated(&self) -> bool {
        self.buf.is_allocated()
    }

    /// The tracked view over the array's bytes.
    pub fn view(&self) -> &RegionView {
        self.buf.view()
    }

    // ── Element access ─────────────────────────────────────────

    /// Reads the element at `index`.
    pub fn get(&self, index: usize) -> Result<T, RegionError> {
        self.view().cast::<T>(index.saturating_mul(size_of::<T>()))
    }

    /// Writes the element at `index`.
    pub fn set(&mut self, index: usize, value: &T) -> Result<(), RegionError> {
        self.view().write(index.saturating_mul(size_of::<T>()), value)
    }

    /// The first element.
    pub fn first(&self) -> Result<T, RegionError> {
        self.get(0)
    }

    /// The last element. An empty array has none.
    pub fn last(&self) -> Result<T, RegionError> {
        let len = self.len();
        if len == 0 {
            return Err(RegionError::ZeroSize);
        }
        self.get(len - 1)
    }

    /// Copies the whole array out.
    pub fn to_vec(&self) -> Result<Vec<T>, RegionError> {
        self.view().read::<T>(0, self.len())
    }

    // ── Derived views ──────────────────────────────────────────

    /// A borrowed child array over `count` elements starting at element
    /// `offset`.
    pub fn subsection(&self, offset: usize, count: usize) -> Result<TypedArray<T>, RegionError> {
        let view = self
            .view()
            .subsection(offset * size_of::<T>(), count * size_of::<T>())?;
        Ok(Self::wrap(ByteBuffer::from_view(view)))
    }

    /// Splits into `[0, mid)` and `[mid, len)` borrowed child arrays.
    pub fn split_at(&self, mid: usize) -> Result<(TypedArray<T>, TypedArray<T>), RegionError> {
        let (left, right) = self.view().split_at(mid * size_of::<T>())?;
        Ok((
            Self::wrap(ByteBuffer::from_view(left)),
            Self::wrap(ByteBuffer::from_view(right)),
        ))
    }

    // ── Search ─────────────────────────────────────────────────

    /// Finds element-aligned occurrences of `needle`, as element indices.
    /// Byte-level hits that straddle element boundaries are dropped.
    pub fn find(&self, needle: &[T]) -> Result<Vec<usize>, RegionError> {
        let hits = self.view().search_bytes(pod_bytes(needle))?;
        Ok(hits
            .into_iter()
            .filter(|hit| hit % size_of::<T>() == 0)
            .map(|hit| hit / size_of::<T>())
            .collect())
    }

    /// Finds element-aligned occurrences of a single value.
    pub fn find_value(&self, value: &T) -> Result<Vec<usize>, RegionError> {
        self.find(std::slice::from_ref(value))
    }

    /// True iff `needle` occurs element-aligned in the array.
    pub fn contains_slice(&self, needle: &[T]) -> Result<bool, RegionError> {
        Ok(!self.find(needle)?.is_empty())
    }

    /// True iff `value` occurs element-aligned in the array.
    pub fn contains_value(&self, value: &T) -> Result<bool, RegionError> {
        Ok(!self.find_value(value)?.is_empty())
    }

    // ── Editing (owned storage only) ───────────────────────────

    /// Swaps the elements at `left` and `right`.
    pub fn swap(&mut self, left: usize, right: usize) -> Result<(), RegionError> {
        if left == right {
            return Ok(());
        }
        let a = self.get(left)?;
        let b = self.get(right)?;
        self.set(left, &b)?;
        self.set(right, &a)
    }

    /// Reverses the elements in place.
    pub fn reverse(&mut self) -> Result<(), RegionError> {
        let len = self.len();
        for i in 0..len / 2 {
            self.swap(i, len - i - 1)?;
        }
        Ok(())
    }

    /// Appends `data`, growing the storage.
    pub fn append(&mut self, data: &[T]) -> Result<(), RegionError> {
        self.buf.append(pod_bytes(data))
    }

    /// Inserts `data` before element `index`.
    pub fn insert(&mut self, index: usize, data: &[T]) -> Result<(), RegionError> {
        self.buf.insert(index * size_of::<T>(), pod_bytes(data))
    }

    /// Removes `count` elements starting at `index`.
    pub fn erase(&mut self, index: usize, count: usize) -> Result<(), RegionError> {
        self.buf.erase(index * size_of::<T>(), count * size_of::<T>())
    }

    /// Appends a single element.
    pub fn push_back(&mut self, value: &T) -> Result<(), RegionError> {
        self.append(std::slice::from_ref(value))
    }

    /// Prepends a single element.
    pub fn push_front(&mut self, value: &T) -> Result<(), RegionError> {
        self.insert(0, std::slice::from_ref(value))
    }

    /// Removes and returns the last element. `None` when empty; removing
    /// the only element of an owned array is a `ZeroSize` error, since
    /// storage cannot shrink to nothing.
    pub fn pop_back(&mut self) -> Result<Option<T>, RegionError> {
        let len = self.len();
        if len == 0 {
            return Ok(None);
        }
        let value = self.get(len - 1)?;
        self.erase(len - 1, 1)?;
        Ok(Some(value))
    }

    /// Removes and returns the first element.
    pub fn pop_front(&mut self) -> Result<Option<T>, RegionError> {
        if self.is_empty() {
            return Ok(None);
        }
        let value = self.get(0)?;
        self.erase(0, 1)?;
        Ok(Some(value))
    }

    /// Writes `data` over the start of the array.
    pub fn start_with(&mut self, data: &[T]) -> Result<(), RegionError> {
        self.view().start_with(data)
    }

    /// Writes `data` flush against the end of the array.
    pub fn end_with(&mut self, data: &[T]) -> Result<(), RegionError> {
        self.view().end_with(data)
    }
}

impl<T: Pod> std::fmt::Debug for TypedArray<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypedArray")
            .field("len", &self.len())
            .field("element_size", &size_of::<T>())
            .field("allocated", &self.is_allocated())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_zeroed() {
        let arr = TypedArray::<u32>::new(4).unwrap();
        assert_eq!(arr.len(), 4);
        assert_eq!(arr.byte_len(), 16);
        assert_eq!(arr.to_vec().unwrap(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_get_set() {
        let mut arr = TypedArray::<u16>::from_slice(&[1, 2, 3]).unwrap();
        assert_eq!(arr.get(2).unwrap(), 3);

        arr.set(2, &30).unwrap();
        assert_eq!(arr.get(2).unwrap(), 30);

        assert!(matches!(
            arr.get(3),
            Err(RegionError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_first_last() {
        let arr = TypedArray::<u8>::from_slice(&[9, 8, 7]).unwrap();
        assert_eq!(arr.first().unwrap(), 9);
        assert_eq!(arr.last().unwrap(), 7);
    }

    #[test]
    fn test_from_view_alignment() {
        let backing = [0u8; 7];
        let view = unsafe { region_tracker::RegionView::from_raw(backing.as_ptr(), 7) };
        assert!(matches!(
            TypedArray::<u32>::from_view(view),
            Err(RegionError::BadAlignment { given: 7, expected: 4 })
        ));
    }

    #[test]
    fn test_subsection_and_split() {
        let arr = TypedArray::<u16>::from_slice(&[1, 2, 3, 4]).unwrap();

        let sub = arr.subsection(1, 2).unwrap();
        assert_eq!(sub.to_vec().unwrap(), vec![2, 3]);
        assert!(!sub.is_allocated());

        let (left, right) = arr.split_at(1).unwrap();
        assert_eq!(left.to_vec().unwrap(), vec![1]);
        assert_eq!(right.to_vec().unwrap(), vec![2, 3, 4]);
    }

    #[test]
    fn test_find_is_element_aligned() {
        // Byte layout (little-endian): 00 01 02 00 01 02. The needle
        // bytes [01, 02] occur at byte offsets 1 and 4; only the aligned
        // hit at offset 4 is an element match.
        let arr = TypedArray::<u16>::from_slice(&[0x0100, 0x0002, 0x0201]).unwrap();
        let hits = arr.find_value(&0x0201).unwrap();
        assert_eq!(hits, vec![2]);
    }

    #[test]
    fn test_editing() {
        let mut arr = TypedArray::<u32>::from_slice(&[1, 4]).unwrap();
        arr.insert(1, &[2, 3]).unwrap();
        assert_eq!(arr.to_vec().unwrap(), vec![1, 2, 3, 4]);

        arr.push_back(&5).unwrap();
        arr.push_front(&0).unwrap();
        assert_eq!(arr.to_vec().unwrap(), vec![0, 1, 2, 3, 4, 5]);

        assert_eq!(arr.pop_back().unwrap(), Some(5));
        assert_eq!(arr.pop_front().unwrap(), Some(0));
        assert_eq!(arr.to_vec().unwrap(), vec![1, 2, 3, 4]);

        arr.erase(1, 2).unwrap();
        assert_eq!(arr.to_vec().unwrap(), vec![1, 4]);
    }

    #[test]
    fn test_swap_reverse() {
        let mut arr = TypedArray::<u8>::from_slice(&[1, 2, 3, 4, 5]).unwrap();
        arr.reverse().unwrap();
        assert_eq!(arr.to_vec().unwrap(), vec![5, 4, 3, 2, 1]);

        arr.swap(0, 4).unwrap();
        assert_eq!(arr.first().unwrap(), 1);
        assert_eq!(arr.last().unwrap(), 5);
    }

    #[test]
    fn test_borrowed_cannot_resize() {
        let backing: [u16; 3] = [1, 2, 3];
        let mut arr = unsafe { TypedArray::from_raw(backing.as_ptr(), 3) };
        assert!(matches!(
            arr.push_back(&4u16),
            Err(RegionError::NotAllocated)
        ));
    }

    #[test]
    fn test_start_end_with() {
        let mut arr = TypedArray::<u8>::new(4).unwrap();
        arr.start_with(&[0xAA]).unwrap();
        arr.end_with(&[0xBB]).unwrap();
        assert_eq!(arr.to_vec().unwrap(), vec![0xAA, 0, 0, 0xBB]);
    }
}
