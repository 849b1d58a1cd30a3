//! Transient 2D strided views.
//!
//! This module provides `StridedView` and `StridedViewMut`, borrow-scoped
//! views of `height x width` elements whose rows are `width + pitch` elements
//! apart in memory.
//!
//! Key features:
//! - Zero-copy views over slices, ndarray arrays (rank 2, or one layer of a
//!   rank-3 array) and raw memory
//! - Overflow-checked shapes: `height * (width + pitch)` always fits `isize`
//! - Lazy sub-rectangles (`slice`) that keep the parent's row stride
//! - Row and column lanes, row-major element iteration and row iteration

use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::mem::{align_of, size_of};
use std::ops::{Index, IndexMut};
use std::ptr::NonNull;

use bytemuck::Pod;
use ndarray::{Array2, ArrayBase, Data, DataMut, Ix2, Ix3};

use crate::iter::{Iter, IterMut, Lane, LaneMut, Rows, RowsMut};
use crate::shape::Shape2D;
use crate::{Result, StridedError};

// ============================================================================
// Validation helpers
// ============================================================================

/// Validate that a region of `shape` fits in `len` elements starting at `offset`.
pub(crate) fn validate_bounds(len: usize, offset: usize, shape: &Shape2D) -> Result<()> {
    if offset > len {
        return Err(StridedError::out_of_range("offset", offset, len));
    }
    let required = shape.required_len();
    let available = len - offset;
    if required > available {
        return Err(StridedError::LengthMismatch {
            required,
            available,
        });
    }
    Ok(())
}

/// Shape of a rank-2 ndarray layout, as long as rows are contiguous and
/// evenly spaced.
pub(crate) fn array2_shape(dim: (usize, usize), strides: &[isize]) -> Result<Shape2D> {
    let (rows, columns) = dim;
    if rows == 0 || columns == 0 {
        return Shape2D::contiguous(rows, columns);
    }
    let column_stride = if columns > 1 { strides[1] } else { 1 };
    if column_stride != 1 {
        return Err(StridedError::UnsupportedBacking(
            "array columns are not contiguous",
        ));
    }
    let row_stride = if rows > 1 {
        strides[0]
    } else {
        columns as isize
    };
    if row_stride < columns as isize {
        return Err(StridedError::UnsupportedBacking(
            "array rows overlap or run backwards",
        ));
    }
    Shape2D::new(rows, columns, row_stride as usize - columns)
}

/// Element offset and shape of layer `depth` of a rank-3 ndarray layout.
pub(crate) fn array3_layer(
    dim: (usize, usize, usize),
    strides: &[isize],
    depth: usize,
) -> Result<(usize, Shape2D)> {
    let (depths, rows, columns) = dim;
    if depth >= depths {
        return Err(StridedError::out_of_range("depth", depth, depths));
    }
    let shape = array2_shape((rows, columns), &strides[1..])?;
    if depth == 0 || shape.is_empty() {
        return Ok((0, shape));
    }
    let layer_stride = strides[0];
    if layer_stride < shape.required_len() as isize {
        return Err(StridedError::UnsupportedBacking(
            "array layers overlap or run backwards",
        ));
    }
    Ok((depth * layer_stride as usize, shape))
}

/// Shape of a region reinterpreted from `T` to `U` elements.
fn cast_shape<T, U>(base: *const T, shape: &Shape2D) -> Result<Shape2D> {
    let mismatch = || StridedError::TypeMismatch {
        from: type_name::<T>(),
        to: type_name::<U>(),
    };
    let (from, to) = (size_of::<T>(), size_of::<U>());
    if from == 0 || to == 0 {
        return Err(mismatch());
    }
    let width_bytes = shape.width().checked_mul(from).ok_or_else(mismatch)?;
    let pitch_bytes = shape.pitch().checked_mul(from).ok_or_else(mismatch)?;
    if width_bytes % to != 0 || pitch_bytes % to != 0 {
        return Err(mismatch());
    }
    if !shape.is_empty() && (base as usize) % align_of::<U>() != 0 {
        return Err(mismatch());
    }
    Shape2D::new(shape.height(), width_bytes / to, pitch_bytes / to)
}

#[inline]
pub(crate) fn non_null<T>(ptr: *const T) -> NonNull<T> {
    NonNull::new(ptr as *mut T).unwrap_or(NonNull::dangling())
}

/// Pointer `offset` elements past `ptr`. Never dereferenced for empty regions.
#[inline]
pub(crate) fn offset_ptr<T>(ptr: NonNull<T>, offset: usize) -> NonNull<T> {
    non_null(ptr.as_ptr().wrapping_add(offset))
}

// ============================================================================
// StridedView
// ============================================================================

/// An immutable 2D strided view.
///
/// Element `(row, column)` lives `row * (width + pitch) + column` elements
/// past the first element. The view borrows its memory for `'a` and is `Copy`.
///
/// # Example
/// ```
/// use strided_2d::StridedView;
///
/// let data: Vec<i32> = (0..12).collect();
/// let view = StridedView::new(&data, 0, 3, 2, 2).unwrap();
/// assert_eq!(view.stride(), 4);
/// assert_eq!(view.to_vec(), vec![0, 1, 4, 5, 8, 9]);
/// ```
pub struct StridedView<'a, T> {
    ptr: NonNull<T>,
    shape: Shape2D,
    _marker: PhantomData<&'a [T]>,
}

unsafe impl<T: Sync> Send for StridedView<'_, T> {}
unsafe impl<T: Sync> Sync for StridedView<'_, T> {}

impl<T> Clone for StridedView<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for StridedView<'_, T> {}

impl<T> Default for StridedView<'_, T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<'a, T> StridedView<'a, T> {
    /// Create a view over `data`, starting `offset` elements in.
    ///
    /// # Errors
    /// - [`StridedError::AreaOverflow`] if `height * (width + pitch)` overflows
    /// - [`StridedError::OutOfRange`] if `offset > data.len()`
    /// - [`StridedError::LengthMismatch`] if the region runs past the end of `data`
    pub fn new(
        data: &'a [T],
        offset: usize,
        height: usize,
        width: usize,
        pitch: usize,
    ) -> Result<Self> {
        let shape = Shape2D::new(height, width, pitch)?;
        Self::with_shape(data, offset, shape)
    }

    /// Create a view over `data` with a prevalidated shape.
    pub fn with_shape(data: &'a [T], offset: usize, shape: Shape2D) -> Result<Self> {
        validate_bounds(data.len(), offset, &shape)?;
        let ptr = offset_ptr(non_null(data.as_ptr()), offset);
        Ok(unsafe { Self::from_parts(ptr, shape) })
    }

    /// Create a view of `height` contiguous rows of `width` elements.
    pub fn from_contiguous(data: &'a [T], height: usize, width: usize) -> Result<Self> {
        Self::new(data, 0, height, width, 0)
    }

    /// View a whole rank-2 ndarray.
    ///
    /// Standard-layout arrays yield a pitch of 0; row-sliced arrays carry
    /// their row stride over as pitch. Layouts whose columns are not
    /// contiguous fail with [`StridedError::UnsupportedBacking`].
    pub fn from_array2<S: Data<Elem = T>>(array: &'a ArrayBase<S, Ix2>) -> Result<Self> {
        let shape = array2_shape(array.dim(), array.strides())?;
        Ok(unsafe { Self::from_parts(non_null(array.as_ptr()), shape) })
    }

    /// View a sub-rectangle of a rank-2 ndarray.
    pub fn from_array2_region<S: Data<Elem = T>>(
        array: &'a ArrayBase<S, Ix2>,
        row: usize,
        column: usize,
        height: usize,
        width: usize,
    ) -> Result<Self> {
        Self::from_array2(array)?.slice(row, column, height, width)
    }

    /// View layer `depth` of a rank-3 ndarray.
    pub fn from_array3_layer<S: Data<Elem = T>>(
        array: &'a ArrayBase<S, Ix3>,
        depth: usize,
    ) -> Result<Self> {
        let (offset, shape) = array3_layer(array.dim(), array.strides(), depth)?;
        let ptr = offset_ptr(non_null(array.as_ptr()), offset);
        Ok(unsafe { Self::from_parts(ptr, shape) })
    }

    /// View a sub-rectangle of layer `depth` of a rank-3 ndarray.
    pub fn from_array3_region<S: Data<Elem = T>>(
        array: &'a ArrayBase<S, Ix3>,
        depth: usize,
        row: usize,
        column: usize,
        height: usize,
        width: usize,
    ) -> Result<Self> {
        Self::from_array3_layer(array, depth)?.slice(row, column, height, width)
    }

    /// Create a view from a raw pointer without checking it.
    ///
    /// Only the shape is validated (area overflow).
    ///
    /// # Safety
    /// `ptr` must be valid for reads of every element of the region for the
    /// whole of `'a`, and nothing may mutate those elements during `'a`.
    pub unsafe fn from_raw_parts(
        ptr: *const T,
        height: usize,
        width: usize,
        pitch: usize,
    ) -> Result<Self> {
        let shape = Shape2D::new(height, width, pitch)?;
        Ok(Self::from_parts(non_null(ptr), shape))
    }

    /// # Safety
    /// `ptr` must be valid for reads of every element of `shape` for `'a`.
    #[inline]
    pub(crate) unsafe fn from_parts(ptr: NonNull<T>, shape: Shape2D) -> Self {
        Self {
            ptr,
            shape,
            _marker: PhantomData,
        }
    }

    /// The canonical empty view.
    #[inline]
    pub fn empty() -> Self {
        unsafe { Self::from_parts(NonNull::dangling(), Shape2D::EMPTY) }
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.shape.height()
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.shape.width()
    }

    #[inline]
    pub fn pitch(&self) -> usize {
        self.shape.pitch()
    }

    /// Distance in elements between two consecutive row starts.
    #[inline]
    pub fn stride(&self) -> usize {
        self.shape.stride()
    }

    #[inline]
    pub fn shape(&self) -> Shape2D {
        self.shape
    }

    /// Number of elements (`height * width`).
    #[inline]
    pub fn len(&self) -> usize {
        self.shape.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.shape.is_empty()
    }

    /// Raw pointer to element `(0, 0)`.
    #[inline]
    pub fn as_ptr(&self) -> *const T {
        self.ptr.as_ptr()
    }

    /// Reference to element `(row, column)`, or `None` if out of range.
    #[inline]
    pub fn get(&self, row: usize, column: usize) -> Option<&'a T> {
        if !self.shape.contains(row, column) {
            return None;
        }
        Some(unsafe { self.get_unchecked(row, column) })
    }

    /// # Safety
    /// `row < height` and `column < width`.
    #[inline]
    pub unsafe fn get_unchecked(&self, row: usize, column: usize) -> &'a T {
        &*self.ptr.as_ptr().add(self.shape.offset_of(row, column))
    }

    /// Row `row` as a lane of `width` elements.
    pub fn get_row(&self, row: usize) -> Result<Lane<'a, T>> {
        self.shape.check_row(row)?;
        let start = offset_ptr(self.ptr, self.shape.offset_of(row, 0));
        Ok(unsafe { Lane::new(start, self.width(), 1) })
    }

    /// Column `column` as a lane of `height` elements, `stride` apart.
    pub fn get_column(&self, column: usize) -> Result<Lane<'a, T>> {
        self.shape.check_column(column)?;
        let start = offset_ptr(self.ptr, column);
        Ok(unsafe { Lane::new(start, self.height(), self.stride()) })
    }

    /// Row `row` as a contiguous slice.
    pub fn row_slice(&self, row: usize) -> Result<&'a [T]> {
        self.shape.check_row(row)?;
        Ok(unsafe { self.row_unchecked(row) })
    }

    /// # Safety
    /// `row < height`.
    #[inline]
    unsafe fn row_unchecked(&self, row: usize) -> &'a [T] {
        let start = offset_ptr(self.ptr, self.shape.offset_of(row, 0));
        std::slice::from_raw_parts(start.as_ptr(), self.width())
    }

    /// Sub-rectangle of `height x width` elements starting at `(row, column)`.
    ///
    /// The result keeps this view's row stride, so its pitch grows by the
    /// columns left out.
    pub fn slice(
        &self,
        row: usize,
        column: usize,
        height: usize,
        width: usize,
    ) -> Result<StridedView<'a, T>> {
        let (offset, shape) = self.shape.slice(row, column, height, width)?;
        Ok(unsafe { Self::from_parts(offset_ptr(self.ptr, offset), shape) })
    }

    /// The whole region as one slice, if its rows are back to back.
    pub fn try_as_slice(&self) -> Option<&'a [T]> {
        if !self.shape.is_contiguous() {
            return None;
        }
        Some(unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len()) })
    }

    /// Iterate over all elements in row-major order.
    #[inline]
    pub fn iter(&self) -> Iter<'a, T> {
        unsafe { Iter::new(self.ptr, self.shape) }
    }

    /// Iterate over rows as slices.
    #[inline]
    pub fn rows(&self) -> Rows<'a, T> {
        unsafe { Rows::new(self.ptr, self.shape) }
    }

    /// Whether both views describe the same memory with the same shape.
    ///
    /// This is identity, not element equality; see [`contents_eq`](Self::contents_eq).
    #[inline]
    pub fn same_region(&self, other: &StridedView<'_, T>) -> bool {
        self.ptr == other.ptr && self.shape == other.shape
    }

    /// Whether both views have the same height, width and elements.
    pub fn contents_eq<U>(&self, other: &StridedView<'_, U>) -> bool
    where
        T: PartialEq<U>,
    {
        self.height() == other.height()
            && self.width() == other.width()
            && self.rows().zip(other.rows()).all(|(a, b)| a == b)
    }

    /// Copy into the top-left corner of `dest`, honoring both strides.
    ///
    /// # Errors
    /// [`StridedError::DestinationTooSmall`] if `dest` is shorter or narrower.
    pub fn copy_to(&self, dest: &mut StridedViewMut<'_, T>) -> Result<()>
    where
        T: Clone,
    {
        if dest.height() < self.height() || dest.width() < self.width() {
            return Err(StridedError::DestinationTooSmall {
                required: (self.height(), self.width()),
                available: (dest.height(), dest.width()),
            });
        }
        let width = self.width();
        for (src, dst) in self.rows().zip(dest.rows_mut()) {
            dst[..width].clone_from_slice(src);
        }
        Ok(())
    }

    /// Like [`copy_to`](Self::copy_to), reporting failure as `false`.
    pub fn try_copy_to(&self, dest: &mut StridedViewMut<'_, T>) -> bool
    where
        T: Clone,
    {
        self.copy_to(dest).is_ok()
    }

    /// Copy all elements, row-major, into the front of `dest`.
    ///
    /// # Errors
    /// [`StridedError::LengthMismatch`] if `dest` holds fewer than `len()` elements.
    pub fn copy_to_slice(&self, dest: &mut [T]) -> Result<()>
    where
        T: Clone,
    {
        let required = self.len();
        if dest.len() < required {
            return Err(StridedError::LengthMismatch {
                required,
                available: dest.len(),
            });
        }
        if required == 0 {
            return Ok(());
        }
        for (src, dst) in self.rows().zip(dest.chunks_exact_mut(self.width())) {
            dst.clone_from_slice(src);
        }
        Ok(())
    }

    /// Like [`copy_to_slice`](Self::copy_to_slice), reporting failure as `false`.
    pub fn try_copy_to_slice(&self, dest: &mut [T]) -> bool
    where
        T: Clone,
    {
        self.copy_to_slice(dest).is_ok()
    }

    /// Copy all elements, row-major, into a new `Vec`.
    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        let mut out = Vec::with_capacity(self.len());
        for row in self.rows() {
            out.extend_from_slice(row);
        }
        out
    }

    /// Copy the region into a new owned array.
    pub fn to_array(&self) -> Array2<T>
    where
        T: Clone,
    {
        Array2::from_shape_fn((self.height(), self.width()), |(row, column)| unsafe {
            self.get_unchecked(row, column).clone()
        })
    }

    /// Reinterpret the region as elements of another plain-old-data type.
    ///
    /// Row width and pitch must convert to a whole number of `U` elements,
    /// and the first element must be aligned for `U`.
    ///
    /// # Errors
    /// [`StridedError::TypeMismatch`] otherwise.
    pub fn cast<U: Pod>(&self) -> Result<StridedView<'a, U>>
    where
        T: Pod,
    {
        let shape = cast_shape::<T, U>(self.as_ptr(), &self.shape)?;
        let ptr = if shape.is_empty() {
            NonNull::dangling()
        } else {
            self.ptr.cast::<U>()
        };
        Ok(unsafe { StridedView::from_parts(ptr, shape) })
    }
}

impl<T> Index<(usize, usize)> for StridedView<'_, T> {
    type Output = T;

    #[inline]
    fn index(&self, (row, column): (usize, usize)) -> &T {
        assert!(
            self.shape.contains(row, column),
            "index ({row}, {column}) out of range for shape {}",
            self.shape
        );
        unsafe { self.get_unchecked(row, column) }
    }
}

impl<'a, T> IntoIterator for StridedView<'a, T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}

impl<T: fmt::Debug> fmt::Debug for StridedView<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StridedView")
            .field("height", &self.height())
            .field("width", &self.width())
            .field("pitch", &self.pitch())
            .field("rows", &DebugRows(*self))
            .finish()
    }
}

impl<T> fmt::Display for StridedView<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StridedView<{}>{}", type_name::<T>(), self.shape)
    }
}

/// Snapshot of a view's rows for `Debug` output.
struct DebugRows<'a, T>(StridedView<'a, T>);

impl<T: fmt::Debug> fmt::Debug for DebugRows<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.rows()).finish()
    }
}

// ============================================================================
// StridedViewMut
// ============================================================================

/// A mutable 2D strided view.
///
/// Same layout as [`StridedView`], with exclusive access to the elements.
pub struct StridedViewMut<'a, T> {
    ptr: NonNull<T>,
    shape: Shape2D,
    _marker: PhantomData<&'a mut [T]>,
}

unsafe impl<T: Send> Send for StridedViewMut<'_, T> {}
unsafe impl<T: Sync> Sync for StridedViewMut<'_, T> {}

impl<T> Default for StridedViewMut<'_, T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<'a, T> StridedViewMut<'a, T> {
    /// Create a mutable view over `data`, starting `offset` elements in.
    ///
    /// Same checks as [`StridedView::new`].
    pub fn new(
        data: &'a mut [T],
        offset: usize,
        height: usize,
        width: usize,
        pitch: usize,
    ) -> Result<Self> {
        let shape = Shape2D::new(height, width, pitch)?;
        Self::with_shape(data, offset, shape)
    }

    /// Create a mutable view over `data` with a prevalidated shape.
    pub fn with_shape(data: &'a mut [T], offset: usize, shape: Shape2D) -> Result<Self> {
        validate_bounds(data.len(), offset, &shape)?;
        let ptr = offset_ptr(non_null(data.as_mut_ptr()), offset);
        Ok(unsafe { Self::from_parts(ptr, shape) })
    }

    /// Create a mutable view of `height` contiguous rows of `width` elements.
    pub fn from_contiguous(data: &'a mut [T], height: usize, width: usize) -> Result<Self> {
        Self::new(data, 0, height, width, 0)
    }

    /// Mutably view a whole rank-2 ndarray.
    pub fn from_array2<S: DataMut<Elem = T>>(array: &'a mut ArrayBase<S, Ix2>) -> Result<Self> {
        // Taking the pointer first lets copy-on-write storage settle its layout.
        let base = non_null(array.as_mut_ptr());
        let shape = array2_shape(array.dim(), array.strides())?;
        Ok(unsafe { Self::from_parts(base, shape) })
    }

    /// Mutably view a sub-rectangle of a rank-2 ndarray.
    pub fn from_array2_region<S: DataMut<Elem = T>>(
        array: &'a mut ArrayBase<S, Ix2>,
        row: usize,
        column: usize,
        height: usize,
        width: usize,
    ) -> Result<Self> {
        Self::from_array2(array)?.into_slice(row, column, height, width)
    }

    /// Mutably view layer `depth` of a rank-3 ndarray.
    pub fn from_array3_layer<S: DataMut<Elem = T>>(
        array: &'a mut ArrayBase<S, Ix3>,
        depth: usize,
    ) -> Result<Self> {
        let base = non_null(array.as_mut_ptr());
        let (offset, shape) = array3_layer(array.dim(), array.strides(), depth)?;
        Ok(unsafe { Self::from_parts(offset_ptr(base, offset), shape) })
    }

    /// Mutably view a sub-rectangle of layer `depth` of a rank-3 ndarray.
    pub fn from_array3_region<S: DataMut<Elem = T>>(
        array: &'a mut ArrayBase<S, Ix3>,
        depth: usize,
        row: usize,
        column: usize,
        height: usize,
        width: usize,
    ) -> Result<Self> {
        Self::from_array3_layer(array, depth)?.into_slice(row, column, height, width)
    }

    /// Create a mutable view from a raw pointer without checking it.
    ///
    /// # Safety
    /// `ptr` must be valid for reads and writes of every element of the
    /// region for the whole of `'a`, and no other pointer may access those
    /// elements during `'a`.
    pub unsafe fn from_raw_parts(
        ptr: *mut T,
        height: usize,
        width: usize,
        pitch: usize,
    ) -> Result<Self> {
        let shape = Shape2D::new(height, width, pitch)?;
        Ok(Self::from_parts(non_null(ptr), shape))
    }

    /// # Safety
    /// `ptr` must be valid for exclusive access to every element of `shape` for `'a`.
    #[inline]
    pub(crate) unsafe fn from_parts(ptr: NonNull<T>, shape: Shape2D) -> Self {
        Self {
            ptr,
            shape,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn empty() -> Self {
        unsafe { Self::from_parts(NonNull::dangling(), Shape2D::EMPTY) }
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.shape.height()
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.shape.width()
    }

    #[inline]
    pub fn pitch(&self) -> usize {
        self.shape.pitch()
    }

    #[inline]
    pub fn stride(&self) -> usize {
        self.shape.stride()
    }

    #[inline]
    pub fn shape(&self) -> Shape2D {
        self.shape
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.shape.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.shape.is_empty()
    }

    #[inline]
    pub fn as_ptr(&self) -> *const T {
        self.ptr.as_ptr()
    }

    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut T {
        self.ptr.as_ptr()
    }

    /// Reborrow as an immutable view.
    #[inline]
    pub fn as_view(&self) -> StridedView<'_, T> {
        unsafe { StridedView::from_parts(self.ptr, self.shape) }
    }

    /// Convert into an immutable view for the rest of `'a`.
    #[inline]
    pub fn into_view(self) -> StridedView<'a, T> {
        unsafe { StridedView::from_parts(self.ptr, self.shape) }
    }

    /// Reborrow as a shorter-lived mutable view.
    #[inline]
    pub fn reborrow(&mut self) -> StridedViewMut<'_, T> {
        unsafe { StridedViewMut::from_parts(self.ptr, self.shape) }
    }

    #[inline]
    pub fn get(&self, row: usize, column: usize) -> Option<&T> {
        if !self.shape.contains(row, column) {
            return None;
        }
        Some(unsafe { &*self.elem_ptr(row, column) })
    }

    #[inline]
    pub fn get_mut(&mut self, row: usize, column: usize) -> Option<&mut T> {
        if !self.shape.contains(row, column) {
            return None;
        }
        Some(unsafe { self.get_unchecked_mut(row, column) })
    }

    /// # Safety
    /// `row < height` and `column < width`.
    #[inline]
    pub unsafe fn get_unchecked_mut(&mut self, row: usize, column: usize) -> &mut T {
        &mut *self.elem_ptr(row, column)
    }

    #[inline]
    fn elem_ptr(&self, row: usize, column: usize) -> *mut T {
        self.ptr
            .as_ptr()
            .wrapping_add(self.shape.offset_of(row, column))
    }

    pub fn get_row(&self, row: usize) -> Result<Lane<'_, T>> {
        self.as_view().get_row(row)
    }

    pub fn get_column(&self, column: usize) -> Result<Lane<'_, T>> {
        self.as_view().get_column(column)
    }

    /// Row `row` as a mutable lane.
    pub fn get_row_mut(&mut self, row: usize) -> Result<LaneMut<'_, T>> {
        self.shape.check_row(row)?;
        let start = offset_ptr(self.ptr, self.shape.offset_of(row, 0));
        Ok(unsafe { LaneMut::new(start, self.width(), 1) })
    }

    /// Column `column` as a mutable lane.
    pub fn get_column_mut(&mut self, column: usize) -> Result<LaneMut<'_, T>> {
        self.shape.check_column(column)?;
        let start = offset_ptr(self.ptr, column);
        Ok(unsafe { LaneMut::new(start, self.height(), self.stride()) })
    }

    pub fn row_slice(&self, row: usize) -> Result<&[T]> {
        self.as_view().row_slice(row)
    }

    pub fn row_slice_mut(&mut self, row: usize) -> Result<&mut [T]> {
        self.shape.check_row(row)?;
        let start = self.elem_ptr(row, 0);
        Ok(unsafe { std::slice::from_raw_parts_mut(start, self.width()) })
    }

    /// Mutable sub-rectangle borrowing from this view.
    pub fn slice_mut(
        &mut self,
        row: usize,
        column: usize,
        height: usize,
        width: usize,
    ) -> Result<StridedViewMut<'_, T>> {
        self.reborrow().into_slice(row, column, height, width)
    }

    /// Mutable sub-rectangle for the rest of `'a`.
    pub fn into_slice(
        self,
        row: usize,
        column: usize,
        height: usize,
        width: usize,
    ) -> Result<StridedViewMut<'a, T>> {
        let (offset, shape) = self.shape.slice(row, column, height, width)?;
        Ok(unsafe { Self::from_parts(offset_ptr(self.ptr, offset), shape) })
    }

    pub fn try_as_slice(&self) -> Option<&[T]> {
        self.as_view().try_as_slice()
    }

    pub fn try_as_slice_mut(&mut self) -> Option<&mut [T]> {
        if !self.shape.is_contiguous() {
            return None;
        }
        Some(unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len()) })
    }

    #[inline]
    pub fn iter(&self) -> Iter<'_, T> {
        self.as_view().iter()
    }

    #[inline]
    pub fn iter_mut(&mut self) -> IterMut<'_, T> {
        unsafe { IterMut::new(self.ptr, self.shape) }
    }

    #[inline]
    pub fn rows(&self) -> Rows<'_, T> {
        self.as_view().rows()
    }

    #[inline]
    pub fn rows_mut(&mut self) -> RowsMut<'_, T> {
        unsafe { RowsMut::new(self.ptr, self.shape) }
    }

    /// Set every element to `value`.
    pub fn fill(&mut self, value: T)
    where
        T: Clone,
    {
        for row in self.rows_mut() {
            row.fill(value.clone());
        }
    }

    /// Reset every element to `T::default()`.
    pub fn clear(&mut self)
    where
        T: Default,
    {
        for row in self.rows_mut() {
            row.fill_with(T::default);
        }
    }

    pub fn copy_to(&self, dest: &mut StridedViewMut<'_, T>) -> Result<()>
    where
        T: Clone,
    {
        self.as_view().copy_to(dest)
    }

    pub fn try_copy_to(&self, dest: &mut StridedViewMut<'_, T>) -> bool
    where
        T: Clone,
    {
        self.as_view().try_copy_to(dest)
    }

    pub fn copy_to_slice(&self, dest: &mut [T]) -> Result<()>
    where
        T: Clone,
    {
        self.as_view().copy_to_slice(dest)
    }

    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.as_view().to_vec()
    }

    pub fn to_array(&self) -> Array2<T>
    where
        T: Clone,
    {
        self.as_view().to_array()
    }

    pub fn contents_eq<U>(&self, other: &StridedView<'_, U>) -> bool
    where
        T: PartialEq<U>,
    {
        self.as_view().contents_eq(other)
    }

    /// Mutably reinterpret the region as another plain-old-data type.
    pub fn cast_mut<U: Pod>(&mut self) -> Result<StridedViewMut<'_, U>>
    where
        T: Pod,
    {
        let shape = cast_shape::<T, U>(self.as_ptr(), &self.shape)?;
        let ptr = if shape.is_empty() {
            NonNull::dangling()
        } else {
            self.ptr.cast::<U>()
        };
        Ok(unsafe { StridedViewMut::from_parts(ptr, shape) })
    }
}

impl<T> Index<(usize, usize)> for StridedViewMut<'_, T> {
    type Output = T;

    #[inline]
    fn index(&self, (row, column): (usize, usize)) -> &T {
        assert!(
            self.shape.contains(row, column),
            "index ({row}, {column}) out of range for shape {}",
            self.shape
        );
        unsafe { &*self.elem_ptr(row, column) }
    }
}

impl<T> IndexMut<(usize, usize)> for StridedViewMut<'_, T> {
    #[inline]
    fn index_mut(&mut self, (row, column): (usize, usize)) -> &mut T {
        assert!(
            self.shape.contains(row, column),
            "index ({row}, {column}) out of range for shape {}",
            self.shape
        );
        unsafe { self.get_unchecked_mut(row, column) }
    }
}

impl<'a, T> From<StridedViewMut<'a, T>> for StridedView<'a, T> {
    fn from(view: StridedViewMut<'a, T>) -> Self {
        view.into_view()
    }
}

impl<T: fmt::Debug> fmt::Debug for StridedViewMut<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StridedViewMut")
            .field("height", &self.height())
            .field("width", &self.width())
            .field("pitch", &self.pitch())
            .field("rows", &DebugRows(self.as_view()))
            .finish()
    }
}

impl<T> fmt::Display for StridedViewMut<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StridedViewMut<{}>{}", type_name::<T>(), self.shape)
    }
}

// ============================================================================
// Rayon parallel row iteration (feature-gated)
// ============================================================================

#[cfg(feature = "parallel")]
mod parallel {
    use super::*;
    use rayon::prelude::*;

    /// Base pointer shared by the row closures of a parallel iterator.
    struct RowBase<T>(NonNull<T>);

    impl<T> Clone for RowBase<T> {
        fn clone(&self) -> Self {
            *self
        }
    }

    impl<T> Copy for RowBase<T> {}

    // Each row index maps to a disjoint row, so handing the base pointer to
    // several threads never aliases a `&mut` element.
    unsafe impl<T: Send> Send for RowBase<T> {}
    unsafe impl<T: Send> Sync for RowBase<T> {}

    impl<T> RowBase<T> {
        #[inline]
        fn row(self, offset: usize) -> *mut T {
            self.0.as_ptr().wrapping_add(offset)
        }
    }

    impl<'a, T: Sync> StridedView<'a, T> {
        /// Parallel iterator over rows as slices.
        ///
        /// # Example
        /// ```ignore
        /// use rayon::prelude::*;
        ///
        /// let sums: Vec<i64> = view.par_rows().map(|row| row.iter().sum()).collect();
        /// ```
        pub fn par_rows(&self) -> impl IndexedParallelIterator<Item = &'a [T]> + 'a {
            let view = *self;
            (0..self.height())
                .into_par_iter()
                .map(move |row| unsafe { view.row_unchecked(row) })
        }
    }

    impl<'a, T: Send> StridedViewMut<'a, T> {
        /// Parallel iterator over rows as mutable slices.
        pub fn par_rows_mut<'s>(
            &'s mut self,
        ) -> impl IndexedParallelIterator<Item = &'s mut [T]> + 's {
            let base = RowBase(self.ptr);
            let (width, stride) = (self.width(), self.stride());
            (0..self.height()).into_par_iter().map(move |row| unsafe {
                std::slice::from_raw_parts_mut(base.row(row * stride), width)
            })
        }
    }
}
