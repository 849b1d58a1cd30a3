//! Height/width/pitch bookkeeping shared by views and memory handles.

use std::fmt;

use crate::overflow;
use crate::{Result, StridedError};

/// Shape of a 2D region: `height` rows of `width` elements, with `pitch`
/// elements skipped between the end of one row and the start of the next.
///
/// A `Shape2D` always satisfies `height * (width + pitch) <= isize::MAX`;
/// every constructor checks it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Shape2D {
    height: usize,
    width: usize,
    pitch: usize,
}

impl Shape2D {
    /// The canonical empty shape.
    pub const EMPTY: Shape2D = Shape2D {
        height: 0,
        width: 0,
        pitch: 0,
    };

    /// Create a shape, validating that its area fits the native range.
    pub fn new(height: usize, width: usize, pitch: usize) -> Result<Self> {
        overflow::ensure_in_native_range(height, width, pitch)?;
        Ok(Self {
            height,
            width,
            pitch,
        })
    }

    /// Create a shape from signed dimensions, as carried by FFI or ported callers.
    ///
    /// # Errors
    /// [`StridedError::NegativeDimension`] if any argument is negative, then the
    /// same overflow checks as [`Shape2D::new`].
    pub fn from_signed(height: i64, width: i64, pitch: i64) -> Result<Self> {
        let height = non_negative("height", height)?;
        let width = non_negative("width", width)?;
        let pitch = non_negative("pitch", pitch)?;
        Self::new(height, width, pitch)
    }

    /// Contiguous shape (pitch 0).
    #[inline]
    pub fn contiguous(height: usize, width: usize) -> Result<Self> {
        Self::new(height, width, 0)
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn pitch(&self) -> usize {
        self.pitch
    }

    /// Distance in elements between the starts of two consecutive rows.
    #[inline]
    pub fn stride(&self) -> usize {
        self.width + self.pitch
    }

    /// Number of addressable elements (`height * width`).
    #[inline]
    pub fn len(&self) -> usize {
        self.height * self.width
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.height == 0 || self.width == 0
    }

    /// Rows are back to back in memory, so the region is one flat run.
    #[inline]
    pub fn is_contiguous(&self) -> bool {
        self.pitch == 0 || self.height <= 1
    }

    /// Minimum backing length past the first element.
    #[inline]
    pub fn required_len(&self) -> usize {
        // Area fits the native range, so the smaller touched extent does too.
        if self.is_empty() {
            0
        } else {
            (self.height - 1) * self.stride() + self.width
        }
    }

    /// Element offset of `(row, column)` from the first element.
    #[inline]
    pub fn offset_of(&self, row: usize, column: usize) -> usize {
        row * self.stride() + column
    }

    /// Whether `(row, column)` addresses an element of the region.
    #[inline]
    pub fn contains(&self, row: usize, column: usize) -> bool {
        row < self.height && column < self.width
    }

    pub(crate) fn check_row(&self, row: usize) -> Result<()> {
        if row >= self.height {
            return Err(StridedError::out_of_range("row", row, self.height));
        }
        Ok(())
    }

    pub(crate) fn check_column(&self, column: usize) -> Result<()> {
        if column >= self.width {
            return Err(StridedError::out_of_range("column", column, self.width));
        }
        Ok(())
    }

    /// Sub-rectangle of this shape.
    ///
    /// Returns the element offset of the sub-rectangle's first element and its
    /// shape. The row stride is preserved, so the new pitch is
    /// `pitch + (self.width - width)`.
    ///
    /// `row`/`column` must address an existing element; `height`/`width` are
    /// bounded by what remains below and to the right of it.
    pub fn slice(
        &self,
        row: usize,
        column: usize,
        height: usize,
        width: usize,
    ) -> Result<(usize, Shape2D)> {
        self.check_row(row)?;
        self.check_column(column)?;
        let rows_left = self.height - row;
        if height > rows_left {
            return Err(StridedError::out_of_range("height", height, rows_left));
        }
        let columns_left = self.width - column;
        if width > columns_left {
            return Err(StridedError::out_of_range("width", width, columns_left));
        }
        let shape = Shape2D {
            height,
            width,
            pitch: self.pitch + (self.width - width),
        };
        Ok((self.offset_of(row, column), shape))
    }
}

impl fmt::Display for Shape2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.height, self.width)
    }
}

fn non_negative(name: &'static str, value: i64) -> Result<usize> {
    if value < 0 {
        return Err(StridedError::NegativeDimension { name, value });
    }
    usize::try_from(value).map_err(|_| StridedError::AreaOverflow {
        height: usize::MAX,
        width: 0,
        pitch: 0,
        limit: overflow::NATIVE_LIMIT,
    })
}
