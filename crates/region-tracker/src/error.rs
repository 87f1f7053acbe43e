// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for region tracking and view access.

/// Errors reported at the view API boundary.
///
/// Validation failures are returned to the caller, never logged or retried
/// internally. Invalidation itself is not an error: an invalidated view
/// continues to exist, and only its dereferences fail (with
/// [`InvalidPointer`](RegionError::InvalidPointer)).
#[derive(Debug, thiserror::Error)]
pub enum RegionError {
    /// A pointer was null where a non-null pointer was required.
    #[error("null pointer: the pointer was null when it shouldn't be")]
    NullPointer,

    /// The view's byte range is not covered by any tracked region — it was
    /// either never declared or was invalidated before use.
    #[error("invalid pointer: {addr:#x} with size {len} was either never valid or was invalidated before use")]
    InvalidPointer { addr: usize, len: usize },

    /// An offset or span crossed the end of the view.
    #[error("out of bounds: the given boundary is {given}, but the expected boundary is {expected}")]
    OutOfBounds { given: usize, expected: usize },

    /// The view is too small for the requested cast or subsection.
    #[error("insufficient size: the given size is {given}, but the expected size is {expected}")]
    InsufficientSize { given: usize, expected: usize },

    /// An element-sized operation whose byte span is not a multiple of the
    /// element unit.
    #[error("bad alignment: offset/size {given} did not align with the expected boundary {expected}")]
    BadAlignment { given: usize, expected: usize },

    /// A zero size where a non-zero size is required (e.g. allocation).
    #[error("zero size: size was zero when expecting a non-zero value")]
    ZeroSize,

    /// A mutation that requires ownership was attempted on a non-owning
    /// view.
    #[error("not allocated: the operation couldn't be completed because the buffer is not allocated")]
    NotAllocated,

    /// Pointer arithmetic was attempted on an owning (allocated)
    /// pointer-view.
    #[error("pointer is allocated: the arithmetic operation could not be completed because the pointer is allocated")]
    PointerIsAllocated,

    /// A file read or write failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
