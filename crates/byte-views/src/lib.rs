// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # byte-views
//!
//! Buffer façades over the [`region_tracker`] registry: allocation,
//! element-sized addressing, pointer arithmetic and trailing-array
//! layouts, all composed from tracked views. Every type here is a client
//! of the region manager — the façades translate their operations into
//! byte operations on tracked views and introduce no registry semantics
//! of their own.
//!
//! # Key Components
//!
//! - [`HeapBuffer`] — an owned, zeroed, tracked allocation whose
//!   `reallocate` is an observable move: subsection views translate to
//!   the new base or invalidate on truncation.
//! - [`ByteBuffer`] — borrowed-or-owned storage behind one surface;
//!   resizing needs ownership (`NotAllocated` otherwise), `consume`
//!   upgrades a borrow by copying.
//! - [`TypedPointer`] — a validated one-element pointer with checked
//!   arithmetic and recasting.
//! - [`TypedArray`] — element-addressed arrays with aligned search and
//!   list-style editing on owned storage.
//! - [`VariadicRecord`] — a fixed header with a trailing variable-length
//!   array, the `struct { hdr; entries[]; }` shape of binary formats.
//!
//! # Example
//! ```
//! use byte_views::HeapBuffer;
//!
//! let mut buf = HeapBuffer::from_bytes(&[0xDE, 0xAD, 0xBE, 0xEF]).unwrap();
//! let word = buf.view().cast::<u32>(0).unwrap();
//! assert_eq!(word, u32::from_ne_bytes([0xDE, 0xAD, 0xBE, 0xEF]));
//! ```

mod array;
mod heap;
mod pointer;
mod transparent;
mod variadic;

pub use array::TypedArray;
pub use heap::HeapBuffer;
pub use pointer::TypedPointer;
pub use region_tracker::{Pod, RegionError, RegionView};
pub use transparent::ByteBuffer;
pub use variadic::VariadicRecord;

/// The raw bytes of a `Pod` slice.
pub(crate) fn pod_bytes<T: Pod>(data: &[T]) -> &[u8] {
    unsafe {
        std::slice::from_raw_parts(data.as_ptr() as *const u8, std::mem::size_of_val(data))
    }
}
