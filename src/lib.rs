//! Bounds-checked 2D strided views and storable memory handles.
//!
//! This crate describes rectangular regions of homogeneous elements laid out
//! row by row, with an optional `pitch` of skipped elements between rows,
//! without copying the underlying data.
//!
//! # Core Types
//!
//! - [`StridedView`] / [`StridedViewMut`]: Transient, borrow-scoped views of
//!   `height x width` elements over a slice, an ndarray, or raw memory
//! - [`Lane`] / [`LaneMut`]: A single row or column of a view, with
//!   forward-only cursors [`LaneIter`] / [`LaneIterMut`]
//! - [`StridedMemory`]: A storable handle (shared owner + offset + shape)
//!   that resolves into a view on demand
//! - [`FlatMemory`]: The 1D counterpart produced when a region has no pitch
//! - [`MemoryManager`]: Custom backing stores whose buffer may be renewed
//!   between resolutions
//! - [`PinnedRegion`]: Scoped pin of a handle's memory, released on drop
//!
//! # Example
//!
//! ```rust
//! use strided_2d::StridedView;
//!
//! // 3 rows of 2 elements, skipping 2 elements after every row
//! let data: Vec<i32> = (0..12).collect();
//! let view = StridedView::new(&data, 0, 3, 2, 2).unwrap();
//!
//! assert_eq!(view[(1, 0)], 4);
//! let row: Vec<i32> = view.get_row(1).unwrap().iter().copied().collect();
//! assert_eq!(row, vec![4, 5]);
//!
//! let sub = view.slice(1, 1, 2, 1).unwrap();
//! assert_eq!(sub.to_vec(), vec![5, 9]);
//! ```
//!
//! # Storable Handles
//!
//! ```rust
//! use ndarray::array;
//! use strided_2d::StridedMemory;
//!
//! let memory = StridedMemory::from_array2(array![[1, 2, 3], [4, 5, 6], [7, 8, 9], [10, 11, 12]])
//!     .unwrap();
//! let region = memory.slice(1, 0, 2, 2).unwrap();
//! assert_eq!(region.to_array().unwrap(), array![[4, 5], [7, 8]]);
//! ```

mod ext;
mod iter;
mod manager;
mod memory;
pub mod overflow;
mod pin;
mod shape;
pub mod view;

// ============================================================================
// View types
// ============================================================================
pub use shape::Shape2D;
pub use view::{StridedView, StridedViewMut};

// ============================================================================
// Iteration
// ============================================================================
pub use iter::{Iter, IterMut, Lane, LaneIter, LaneIterMut, LaneMut, Rows, RowsMut};

// ============================================================================
// Storable handles
// ============================================================================
pub use manager::MemoryManager;
pub use memory::{FlatMemory, StridedMemory};
pub use pin::PinnedRegion;

// ============================================================================
// Extension traits
// ============================================================================
pub use ext::{AsStrided, AsStridedMut};

// ============================================================================
// Error types
// ============================================================================

/// Errors that can occur while building or using strided regions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StridedError {
    /// A signed height, width or pitch was negative.
    #[error("{name} must be non-negative, got {value}")]
    NegativeDimension { name: &'static str, value: i64 },

    /// An offset, row, column, depth, height or width exceeds its bound.
    #[error("{what} {index} out of range (bound {bound})")]
    OutOfRange {
        what: &'static str,
        index: usize,
        bound: usize,
    },

    /// `height * (width + pitch)` does not fit the addressable range.
    #[error("area {height} x ({width} + {pitch}) exceeds {limit} elements")]
    AreaOverflow {
        height: usize,
        width: usize,
        pitch: usize,
        limit: u64,
    },

    /// The region cannot be reinterpreted as another element type.
    #[error("cannot reinterpret {from} region as {to}")]
    TypeMismatch {
        from: &'static str,
        to: &'static str,
    },

    /// A buffer holds fewer elements than the operation needs.
    #[error("buffer too short: {required} elements required, {available} available")]
    LengthMismatch { required: usize, available: usize },

    /// A copy destination is shorter or narrower than its source.
    #[error("destination {available:?} is smaller than source {required:?}")]
    DestinationTooSmall {
        required: (usize, usize),
        available: (usize, usize),
    },

    /// The backing object has a layout this crate cannot describe.
    #[error("unsupported backing: {0}")]
    UnsupportedBacking(&'static str),

    /// Mutable resolution needs the backing to be referenced by a single handle.
    #[error("backing memory is shared with another handle")]
    SharedBacking,
}

impl StridedError {
    #[inline]
    pub(crate) fn out_of_range(what: &'static str, index: usize, bound: usize) -> Self {
        StridedError::OutOfRange { what, index, bound }
    }
}

/// Result type for strided region operations.
pub type Result<T> = std::result::Result<T, StridedError>;
