//! Storable handles to 2D strided regions.
//!
//! A [`StridedMemory`] records *where* a region lives (a shared owner, an
//! element offset and a [`Shape2D`]) instead of borrowing it, so it can be
//! stored in structs, sent across threads and resolved into a
//! [`StridedView`] whenever the elements are needed.

use std::any::{type_name, Any};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem::size_of;
use std::ptr::NonNull;
use std::sync::Arc;

use ndarray::{Array2, Array3};

use crate::manager::MemoryManager;
use crate::pin::PinnedRegion;
use crate::shape::Shape2D;
use crate::view::{non_null, offset_ptr, validate_bounds, StridedView, StridedViewMut};
use crate::{Result, StridedError};

// ============================================================================
// Backing storage
// ============================================================================

/// Owner of the elements behind a handle.
pub(crate) enum Backing<T> {
    Empty,
    Slice(Arc<[T]>),
    Array2(Arc<Array2<T>>),
    Array3(Arc<Array3<T>>),
    Manager(Arc<dyn MemoryManager<T>>),
    Raw {
        owner: Arc<dyn Any + Send + Sync>,
        base: NonNull<T>,
        len: usize,
    },
}

impl<T> Clone for Backing<T> {
    fn clone(&self) -> Self {
        match self {
            Backing::Empty => Backing::Empty,
            Backing::Slice(data) => Backing::Slice(Arc::clone(data)),
            Backing::Array2(array) => Backing::Array2(Arc::clone(array)),
            Backing::Array3(array) => Backing::Array3(Arc::clone(array)),
            Backing::Manager(manager) => Backing::Manager(Arc::clone(manager)),
            Backing::Raw { owner, base, len } => Backing::Raw {
                owner: Arc::clone(owner),
                base: *base,
                len: *len,
            },
        }
    }
}

impl<T> Backing<T> {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Backing::Empty => "empty",
            Backing::Slice(_) => "slice",
            Backing::Array2(_) => "array2",
            Backing::Array3(_) => "array3",
            Backing::Manager(_) => "manager",
            Backing::Raw { .. } => "raw",
        }
    }

    /// First element and length of the backing buffer, read fresh.
    pub(crate) fn base(&self) -> (NonNull<T>, usize) {
        match self {
            Backing::Empty => (NonNull::dangling(), 0),
            Backing::Slice(data) => (non_null(data.as_ptr()), data.len()),
            // Owned arrays are kept in standard layout.
            Backing::Array2(array) => (non_null(array.as_ptr()), array.len()),
            Backing::Array3(array) => (non_null(array.as_ptr()), array.len()),
            Backing::Manager(manager) => {
                let buffer = manager.as_slice();
                tracing::trace!("re-resolving manager buffer of {} elements", buffer.len());
                (non_null(buffer.as_ptr()), buffer.len())
            }
            Backing::Raw { base, len, .. } => (*base, *len),
        }
    }

    /// Like [`base`](Self::base), for exclusive access.
    ///
    /// Fails with [`StridedError::SharedBacking`] unless this is the only
    /// reference to the owner.
    fn base_mut(&mut self) -> Result<(NonNull<T>, usize)> {
        match self {
            Backing::Empty => Ok((NonNull::dangling(), 0)),
            Backing::Slice(data) => {
                let data = Arc::get_mut(data).ok_or(StridedError::SharedBacking)?;
                Ok((non_null(data.as_mut_ptr()), data.len()))
            }
            Backing::Array2(array) => {
                let array = Arc::get_mut(array).ok_or(StridedError::SharedBacking)?;
                Ok((non_null(array.as_mut_ptr()), array.len()))
            }
            Backing::Array3(array) => {
                let array = Arc::get_mut(array).ok_or(StridedError::SharedBacking)?;
                Ok((non_null(array.as_mut_ptr()), array.len()))
            }
            Backing::Manager(manager) => {
                let manager = Arc::get_mut(manager).ok_or(StridedError::SharedBacking)?;
                let buffer = manager.as_mut_slice();
                tracing::trace!("re-resolving manager buffer of {} elements", buffer.len());
                Ok((non_null(buffer.as_mut_ptr()), buffer.len()))
            }
            Backing::Raw { owner, base, len } => {
                Arc::get_mut(owner).ok_or(StridedError::SharedBacking)?;
                Ok((*base, *len))
            }
        }
    }

    /// Addresses identifying the owner, for equality and hashing.
    ///
    /// Raw backings are identified by both the owner and the foreign pointer.
    fn identity(&self) -> (usize, usize) {
        match self {
            Backing::Empty => (0, 0),
            Backing::Slice(data) => (Arc::as_ptr(data) as *const () as usize, 0),
            Backing::Array2(array) => (Arc::as_ptr(array) as *const () as usize, 0),
            Backing::Array3(array) => (Arc::as_ptr(array) as *const () as usize, 0),
            Backing::Manager(manager) => (Arc::as_ptr(manager) as *const () as usize, 0),
            Backing::Raw { owner, base, .. } => (
                Arc::as_ptr(owner) as *const () as usize,
                base.as_ptr() as usize,
            ),
        }
    }

    fn same_owner(&self, other: &Backing<T>) -> bool {
        self.kind() == other.kind() && self.identity() == other.identity()
    }
}

// ============================================================================
// StridedMemory
// ============================================================================

/// A storable handle to a 2D strided region.
///
/// Cloning is cheap (one `Arc` clone). Two handles compare equal when they
/// describe the same region of the same owner; element values are never
/// compared.
///
/// # Example
/// ```
/// use strided_2d::StridedMemory;
///
/// let memory = StridedMemory::new((0..12).collect::<Vec<i32>>(), 0, 3, 2, 2).unwrap();
/// let view = memory.resolve().unwrap();
/// assert_eq!(view.to_vec(), vec![0, 1, 4, 5, 8, 9]);
/// ```
pub struct StridedMemory<T> {
    backing: Backing<T>,
    offset: usize,
    shape: Shape2D,
}

unsafe impl<T: Send + Sync> Send for StridedMemory<T> {}
unsafe impl<T: Send + Sync> Sync for StridedMemory<T> {}

impl<T> Clone for StridedMemory<T> {
    fn clone(&self) -> Self {
        Self {
            backing: self.backing.clone(),
            offset: self.offset,
            shape: self.shape,
        }
    }
}

impl<T> Default for StridedMemory<T> {
    fn default() -> Self {
        Self::empty()
    }
}

fn ensure_standard_layout(standard: bool) -> Result<()> {
    if !standard {
        return Err(StridedError::UnsupportedBacking(
            "owned arrays must be in standard layout",
        ));
    }
    Ok(())
}

impl<T> StridedMemory<T> {
    /// Handle over shared 1D data, starting `offset` elements in.
    ///
    /// Same checks as [`StridedView::new`].
    pub fn new(
        data: impl Into<Arc<[T]>>,
        offset: usize,
        height: usize,
        width: usize,
        pitch: usize,
    ) -> Result<Self> {
        let shape = Shape2D::new(height, width, pitch)?;
        Self::with_shape(data, offset, shape)
    }

    /// Handle over shared 1D data with a prevalidated shape.
    pub fn with_shape(data: impl Into<Arc<[T]>>, offset: usize, shape: Shape2D) -> Result<Self> {
        let data = data.into();
        validate_bounds(data.len(), offset, &shape)?;
        Ok(Self {
            backing: Backing::Slice(data),
            offset,
            shape,
        })
    }

    /// Handle over `height` contiguous rows of `width` elements.
    pub fn from_contiguous(
        data: impl Into<Arc<[T]>>,
        height: usize,
        width: usize,
    ) -> Result<Self> {
        Self::new(data, 0, height, width, 0)
    }

    /// Handle over a whole owned rank-2 array.
    ///
    /// # Errors
    /// [`StridedError::UnsupportedBacking`] unless the array is in standard
    /// (row-major, contiguous) layout.
    pub fn from_array2(array: impl Into<Arc<Array2<T>>>) -> Result<Self> {
        let array = array.into();
        ensure_standard_layout(array.is_standard_layout())?;
        let (rows, columns) = array.dim();
        Ok(Self {
            backing: Backing::Array2(array),
            offset: 0,
            shape: Shape2D::contiguous(rows, columns)?,
        })
    }

    /// Handle over a sub-rectangle of an owned rank-2 array.
    pub fn from_array2_region(
        array: impl Into<Arc<Array2<T>>>,
        row: usize,
        column: usize,
        height: usize,
        width: usize,
    ) -> Result<Self> {
        Self::from_array2(array)?.slice(row, column, height, width)
    }

    /// Handle over layer `depth` of an owned rank-3 array.
    pub fn from_array3_layer(array: impl Into<Arc<Array3<T>>>, depth: usize) -> Result<Self> {
        let array = array.into();
        ensure_standard_layout(array.is_standard_layout())?;
        let (depths, rows, columns) = array.dim();
        if depth >= depths {
            return Err(StridedError::out_of_range("depth", depth, depths));
        }
        let shape = Shape2D::contiguous(rows, columns)?;
        Ok(Self {
            backing: Backing::Array3(array),
            offset: depth * rows * columns,
            shape,
        })
    }

    /// Handle over a sub-rectangle of layer `depth` of an owned rank-3 array.
    pub fn from_array3_region(
        array: impl Into<Arc<Array3<T>>>,
        depth: usize,
        row: usize,
        column: usize,
        height: usize,
        width: usize,
    ) -> Result<Self> {
        Self::from_array3_layer(array, depth)?.slice(row, column, height, width)
    }

    /// Handle over the buffer of a [`MemoryManager`].
    ///
    /// The region is checked against the manager's current buffer now and
    /// again on every resolution.
    pub fn from_manager<M>(
        manager: Arc<M>,
        offset: usize,
        height: usize,
        width: usize,
        pitch: usize,
    ) -> Result<Self>
    where
        M: MemoryManager<T> + 'static,
    {
        let shape = Shape2D::new(height, width, pitch)?;
        validate_bounds(manager.as_slice().len(), offset, &shape)?;
        Ok(Self {
            backing: Backing::Manager(manager),
            offset,
            shape,
        })
    }

    /// Handle over foreign memory kept alive by `owner`.
    ///
    /// # Safety
    /// `ptr` must stay valid for reads of every element of the region for as
    /// long as any clone of `owner` is alive. If the handle is resolved
    /// mutably, the memory must also be writable and only reachable through
    /// this handle while `owner` is not shared.
    pub unsafe fn from_raw_parts(
        owner: Arc<dyn Any + Send + Sync>,
        ptr: *mut T,
        height: usize,
        width: usize,
        pitch: usize,
    ) -> Result<Self> {
        let shape = Shape2D::new(height, width, pitch)?;
        Ok(Self {
            backing: Backing::Raw {
                owner,
                base: non_null(ptr),
                len: shape.required_len(),
            },
            offset: 0,
            shape,
        })
    }

    /// The canonical empty handle.
    pub fn empty() -> Self {
        Self {
            backing: Backing::Empty,
            offset: 0,
            shape: Shape2D::EMPTY,
        }
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

    /// Element offset of the first element within the backing buffer.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Byte offset of the first element within the backing buffer.
    #[inline]
    pub fn byte_offset(&self) -> usize {
        self.offset * size_of::<T>()
    }

    /// Resolve into a view.
    ///
    /// Empty regions resolve to an empty view of the same shape without
    /// touching the backing.
    ///
    /// # Errors
    /// [`StridedError::LengthMismatch`] if a manager's buffer no longer covers
    /// the region.
    pub fn resolve(&self) -> Result<StridedView<'_, T>> {
        if self.shape.is_empty() {
            return Ok(unsafe { StridedView::from_parts(NonNull::dangling(), self.shape) });
        }
        let (base, len) = self.backing.base();
        validate_bounds(len, self.offset, &self.shape)?;
        Ok(unsafe { StridedView::from_parts(offset_ptr(base, self.offset), self.shape) })
    }

    /// Resolve into a mutable view.
    ///
    /// # Errors
    /// - [`StridedError::SharedBacking`] if the owner is referenced by another
    ///   handle, flat handle or pin
    /// - [`StridedError::LengthMismatch`] as for [`resolve`](Self::resolve)
    pub fn resolve_mut(&mut self) -> Result<StridedViewMut<'_, T>> {
        if self.shape.is_empty() {
            return Ok(unsafe { StridedViewMut::from_parts(NonNull::dangling(), self.shape) });
        }
        let (base, len) = self.backing.base_mut()?;
        validate_bounds(len, self.offset, &self.shape)?;
        Ok(unsafe { StridedViewMut::from_parts(offset_ptr(base, self.offset), self.shape) })
    }

    /// Handle to a sub-rectangle, sharing the same owner.
    pub fn slice(&self, row: usize, column: usize, height: usize, width: usize) -> Result<Self> {
        let (offset, shape) = self.shape.slice(row, column, height, width)?;
        Ok(Self {
            backing: self.backing.clone(),
            offset: self.offset + offset,
            shape,
        })
    }

    /// Flat handle over the same elements, if rows are back to back.
    ///
    /// Returns `None` whenever the pitch is non-zero.
    pub fn try_get_flat(&self) -> Option<FlatMemory<T>> {
        if self.shape.pitch() != 0 {
            return None;
        }
        if let Backing::Empty = self.backing {
            return Some(FlatMemory::empty());
        }
        Some(FlatMemory {
            backing: self.backing.clone(),
            offset: self.offset,
            len: self.shape.len(),
        })
    }

    /// Pin the region for the lifetime of the returned guard.
    ///
    /// Manager backings are asked to `pin` at this handle's offset and to
    /// `unpin` when the guard drops. The guard also keeps the owner alive.
    pub fn pin(&self) -> Result<PinnedRegion<T>> {
        if self.shape.is_empty() {
            return PinnedRegion::acquire(Backing::Empty, 0, self.shape);
        }
        PinnedRegion::acquire(self.backing.clone(), self.offset, self.shape)
    }

    /// Copy into the top-left corner of the region behind `dest`.
    pub fn copy_to(&self, dest: &mut StridedMemory<T>) -> Result<()>
    where
        T: Clone,
    {
        let src = self.resolve()?;
        let mut dst = dest.resolve_mut()?;
        src.copy_to(&mut dst)
    }

    pub fn try_copy_to(&self, dest: &mut StridedMemory<T>) -> bool
    where
        T: Clone,
    {
        self.copy_to(dest).is_ok()
    }

    /// Copy the region into a new owned array.
    pub fn to_array(&self) -> Result<Array2<T>>
    where
        T: Clone,
    {
        Ok(self.resolve()?.to_array())
    }
}

impl<T> TryFrom<Array2<T>> for StridedMemory<T> {
    type Error = StridedError;

    fn try_from(array: Array2<T>) -> Result<Self> {
        Self::from_array2(array)
    }
}

impl<T> PartialEq for StridedMemory<T> {
    fn eq(&self, other: &Self) -> bool {
        self.backing.same_owner(&other.backing)
            && self.offset == other.offset
            && self.shape == other.shape
    }
}

impl<T> Eq for StridedMemory<T> {}

impl<T> Hash for StridedMemory<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.backing.kind().hash(state);
        self.backing.identity().hash(state);
        self.offset.hash(state);
        self.shape.hash(state);
    }
}

impl<T> fmt::Debug for StridedMemory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StridedMemory")
            .field("backing", &self.backing.kind())
            .field("offset", &self.offset)
            .field("shape", &self.shape)
            .finish()
    }
}

impl<T> fmt::Display for StridedMemory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StridedMemory<{}>{}", type_name::<T>(), self.shape)
    }
}

// ============================================================================
// FlatMemory
// ============================================================================

/// A storable handle to a contiguous 1D run of elements.
pub struct FlatMemory<T> {
    backing: Backing<T>,
    offset: usize,
    len: usize,
}

unsafe impl<T: Send + Sync> Send for FlatMemory<T> {}
unsafe impl<T: Send + Sync> Sync for FlatMemory<T> {}

impl<T> Clone for FlatMemory<T> {
    fn clone(&self) -> Self {
        Self {
            backing: self.backing.clone(),
            offset: self.offset,
            len: self.len,
        }
    }
}

impl<T> Default for FlatMemory<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> FlatMemory<T> {
    pub fn empty() -> Self {
        Self {
            backing: Backing::Empty,
            offset: 0,
            len: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    fn check(&self, available: usize) -> Result<()> {
        let end = self.offset + self.len;
        if end > available {
            return Err(StridedError::LengthMismatch {
                required: end,
                available,
            });
        }
        Ok(())
    }

    /// Resolve into a slice.
    pub fn resolve(&self) -> Result<&[T]> {
        if self.len == 0 {
            return Ok(&[]);
        }
        let (base, available) = self.backing.base();
        self.check(available)?;
        Ok(unsafe { std::slice::from_raw_parts(offset_ptr(base, self.offset).as_ptr(), self.len) })
    }

    /// Resolve into a mutable slice; the owner must not be shared.
    pub fn resolve_mut(&mut self) -> Result<&mut [T]> {
        if self.len == 0 {
            return Ok(&mut []);
        }
        let (base, available) = self.backing.base_mut()?;
        self.check(available)?;
        Ok(unsafe {
            std::slice::from_raw_parts_mut(offset_ptr(base, self.offset).as_ptr(), self.len)
        })
    }

    /// Reinterpret the run as a 2D region.
    ///
    /// `offset` is relative to the start of this run; the region must fit
    /// inside it.
    pub fn into_strided(
        self,
        offset: usize,
        height: usize,
        width: usize,
        pitch: usize,
    ) -> Result<StridedMemory<T>> {
        let shape = Shape2D::new(height, width, pitch)?;
        validate_bounds(self.len, offset, &shape)?;
        Ok(StridedMemory {
            backing: self.backing,
            offset: self.offset + offset,
            shape,
        })
    }
}

impl<T> From<Vec<T>> for FlatMemory<T> {
    fn from(data: Vec<T>) -> Self {
        Arc::<[T]>::from(data).into()
    }
}

impl<T> From<Arc<[T]>> for FlatMemory<T> {
    fn from(data: Arc<[T]>) -> Self {
        let len = data.len();
        Self {
            backing: Backing::Slice(data),
            offset: 0,
            len,
        }
    }
}

impl<T> PartialEq for FlatMemory<T> {
    fn eq(&self, other: &Self) -> bool {
        self.backing.same_owner(&other.backing)
            && self.offset == other.offset
            && self.len == other.len
    }
}

impl<T> Eq for FlatMemory<T> {}

impl<T> fmt::Debug for FlatMemory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlatMemory")
            .field("backing", &self.backing.kind())
            .field("offset", &self.offset)
            .field("len", &self.len)
            .finish()
    }
}

impl<T> fmt::Display for FlatMemory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FlatMemory<{}>[{}]", type_name::<T>(), self.len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array3, ShapeBuilder};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sequence(len: usize) -> Vec<i32> {
        (0..len as i32).collect()
    }

    /// Store whose visible length can shrink after a handle is built.
    struct ShrinkingStore {
        data: Vec<i32>,
        visible: AtomicUsize,
    }

    impl MemoryManager<i32> for ShrinkingStore {
        fn as_slice(&self) -> &[i32] {
            &self.data[..self.visible.load(Ordering::SeqCst)]
        }

        fn as_mut_slice(&mut self) -> &mut [i32] {
            let visible = *self.visible.get_mut();
            &mut self.data[..visible]
        }
    }

    #[test]
    fn test_round_trip_through_resolve() {
        let memory = StridedMemory::new(sequence(12), 0, 3, 2, 2).unwrap();
        let view = memory.resolve().unwrap();
        assert_eq!(view.height(), 3);
        assert_eq!(view.width(), 2);
        assert_eq!(view.pitch(), 2);
        assert_eq!(view.get_row(1).unwrap().to_vec(), vec![4, 5]);
    }

    #[test]
    fn test_array2_region() {
        let a = array![[1, 2, 3], [4, 5, 6], [7, 8, 9], [10, 11, 12]];
        let memory = StridedMemory::from_array2(a).unwrap();
        let region = memory.slice(1, 0, 2, 2).unwrap();
        assert_eq!(region.to_array().unwrap(), array![[4, 5], [7, 8]]);
        assert_eq!(region.offset(), 3);
        assert_eq!(region.pitch(), 1);

        let a = array![[1, 2, 3], [4, 5, 6]];
        let direct = StridedMemory::from_array2_region(a, 0, 1, 2, 2).unwrap();
        assert_eq!(direct.resolve().unwrap().to_vec(), vec![2, 3, 5, 6]);
    }

    #[test]
    fn test_array2_must_be_standard_layout() {
        let a = Array2::<f64>::zeros((2, 3).f());
        assert!(matches!(
            StridedMemory::from_array2(a),
            Err(StridedError::UnsupportedBacking(_))
        ));
        let b = Array2::<f64>::zeros((2, 3));
        assert!(StridedMemory::try_from(b).is_ok());
    }

    #[test]
    fn test_array3_layer() {
        let a = Array3::from_shape_fn((3, 2, 2), |(d, r, c)| (d * 100 + r * 10 + c) as i32);
        let memory = StridedMemory::from_array3_layer(a.clone(), 2).unwrap();
        assert_eq!(memory.offset(), 8);
        assert_eq!(memory.byte_offset(), 32);
        assert_eq!(memory.resolve().unwrap().to_vec(), vec![200, 201, 210, 211]);

        let region = StridedMemory::from_array3_region(a.clone(), 1, 1, 0, 1, 2).unwrap();
        assert_eq!(region.resolve().unwrap().to_vec(), vec![110, 111]);

        assert!(matches!(
            StridedMemory::from_array3_layer(a, 3),
            Err(StridedError::OutOfRange { what: "depth", .. })
        ));
    }

    #[test]
    fn test_new_validates_bounds() {
        assert!(matches!(
            StridedMemory::new(sequence(9), 0, 3, 2, 2),
            Err(StridedError::LengthMismatch { .. })
        ));
        assert!(matches!(
            StridedMemory::new(sequence(9), 10, 0, 0, 0),
            Err(StridedError::OutOfRange { what: "offset", .. })
        ));
    }

    #[test]
    fn test_empty_handle() {
        let memory = StridedMemory::<i32>::empty();
        assert!(memory.is_empty());
        assert!(memory.resolve().unwrap().is_empty());
        assert_eq!(memory, StridedMemory::default());
        let flat = memory.try_get_flat().unwrap();
        assert!(flat.is_empty());
        assert_eq!(flat.resolve().unwrap(), &[] as &[i32]);
    }

    #[test]
    fn test_empty_shape_keeps_dimensions() {
        let memory = StridedMemory::new(sequence(4), 0, 0, 3, 1).unwrap();
        let view = memory.resolve().unwrap();
        assert!(view.is_empty());
        assert_eq!(view.width(), 3);
        assert_eq!(memory.to_array().unwrap().dim(), (0, 3));
    }

    #[test]
    fn test_try_get_flat() {
        let memory = StridedMemory::new(sequence(12), 2, 2, 3, 0).unwrap();
        let flat = memory.try_get_flat().unwrap();
        assert_eq!(flat.len(), 6);
        assert_eq!(flat.resolve().unwrap(), &[2, 3, 4, 5, 6, 7]);

        let pitched = StridedMemory::new(sequence(12), 0, 3, 2, 2).unwrap();
        assert!(pitched.try_get_flat().is_none());
        let row = pitched.slice(1, 0, 1, 2).unwrap();
        assert!(row.try_get_flat().is_none());
    }

    #[test]
    fn test_array_backings_flatten() {
        let a = array![[1, 2, 3], [4, 5, 6], [7, 8, 9]];
        let memory = StridedMemory::from_array2(a).unwrap();
        let flat = memory.try_get_flat().unwrap();
        assert_eq!(flat.resolve().unwrap(), &[1, 2, 3, 4, 5, 6, 7, 8, 9]);

        let rows = memory.slice(1, 0, 2, 3).unwrap().try_get_flat().unwrap();
        assert_eq!(rows.resolve().unwrap(), &[4, 5, 6, 7, 8, 9]);

        let b = Array3::from_shape_fn((3, 2, 3), |(d, r, c)| (d * 100 + r * 10 + c) as i32);
        let layer = StridedMemory::from_array3_layer(b, 1)
            .unwrap()
            .try_get_flat()
            .unwrap();
        assert_eq!(layer.resolve().unwrap(), &[100, 101, 102, 110, 111, 112]);
    }

    #[test]
    fn test_array2_to_array_round_trip() {
        let a = Array2::from_shape_fn((4, 3), |(i, j)| (i * 10 + j) as i32);
        let memory = StridedMemory::from_array2(a.clone()).unwrap();
        assert_eq!(memory.to_array().unwrap(), a);
    }

    #[test]
    fn test_negative_width_is_rejected() {
        let err = Shape2D::from_signed(1, -1, 0)
            .and_then(|shape| StridedMemory::with_shape(sequence(4), 0, shape))
            .unwrap_err();
        assert!(matches!(
            err,
            StridedError::NegativeDimension { name: "width", .. }
        ));
    }

    #[test]
    fn test_flat_into_strided() {
        let flat = FlatMemory::from(sequence(12));
        let memory = flat.clone().into_strided(1, 2, 3, 1).unwrap();
        assert_eq!(memory.resolve().unwrap().to_vec(), vec![1, 2, 3, 5, 6, 7]);
        assert!(matches!(
            flat.into_strided(0, 4, 3, 1),
            Err(StridedError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn test_equality_is_identity() {
        let a = StridedMemory::new(sequence(12), 0, 3, 2, 2).unwrap();
        let b = StridedMemory::new(sequence(12), 0, 3, 2, 2).unwrap();
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert_eq!(a.slice(1, 0, 2, 2).unwrap(), a.slice(1, 0, 2, 2).unwrap());
        assert_ne!(a.slice(1, 0, 2, 2).unwrap(), a.slice(1, 0, 2, 1).unwrap());

        let mut set = HashSet::new();
        set.insert(a.clone());
        set.insert(a.clone());
        set.insert(b);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_resolve_mut_requires_unique_owner() {
        let mut memory = StridedMemory::new(vec![0; 12], 0, 3, 2, 2).unwrap();
        memory.resolve_mut().unwrap().fill(1);
        let alias = memory.clone();
        assert!(matches!(
            memory.resolve_mut(),
            Err(StridedError::SharedBacking)
        ));
        drop(alias);
        memory.resolve_mut().unwrap()[(2, 1)] = 7;
        assert_eq!(memory.resolve().unwrap().to_vec(), vec![1, 1, 1, 1, 1, 7]);
    }

    #[test]
    fn test_copy_to() {
        let src = StridedMemory::new(sequence(12), 0, 3, 2, 2).unwrap();
        let mut dst = StridedMemory::from_array2(Array2::<i32>::zeros((3, 3))).unwrap();
        src.copy_to(&mut dst).unwrap();
        assert_eq!(
            dst.to_array().unwrap(),
            array![[0, 1, 0], [4, 5, 0], [8, 9, 0]]
        );

        let mut small = StridedMemory::from_array2(Array2::<i32>::zeros((2, 2))).unwrap();
        assert!(!src.try_copy_to(&mut small));
    }

    #[test]
    fn test_manager_is_revalidated() {
        let store = Arc::new(ShrinkingStore {
            data: sequence(12),
            visible: AtomicUsize::new(12),
        });
        let memory = StridedMemory::from_manager(Arc::clone(&store), 0, 3, 2, 2).unwrap();
        assert_eq!(memory.resolve().unwrap().to_vec(), vec![0, 1, 4, 5, 8, 9]);

        store.visible.store(8, Ordering::SeqCst);
        assert!(matches!(
            memory.resolve(),
            Err(StridedError::LengthMismatch {
                required: 10,
                available: 8
            })
        ));
        assert!(memory.slice(0, 0, 2, 2).unwrap().resolve().is_ok());
    }

    #[test]
    fn test_manager_resolve_mut() {
        let store = Arc::new(vec![0u8; 6]);
        let mut memory = StridedMemory::from_manager(store, 0, 2, 3, 0).unwrap();
        memory.resolve_mut().unwrap().fill(4);
        assert_eq!(memory.resolve().unwrap().to_vec(), vec![4; 6]);
    }

    #[test]
    fn test_raw_parts() {
        let mut buffer = Box::new([0u16; 8]);
        let ptr = buffer.as_mut_ptr();
        let owner: Arc<dyn Any + Send + Sync> = Arc::new(buffer);
        let mut memory = unsafe { StridedMemory::from_raw_parts(owner, ptr, 2, 2, 2) }.unwrap();
        memory.resolve_mut().unwrap().fill(3);
        assert_eq!(memory.resolve().unwrap().to_vec(), vec![3, 3, 3, 3]);
    }

    #[test]
    fn test_raw_parts_equality_includes_owner() {
        let mut buffer = Box::new([0u16; 4]);
        let ptr = buffer.as_mut_ptr();
        let owner: Arc<dyn Any + Send + Sync> = Arc::new(buffer);
        let other: Arc<dyn Any + Send + Sync> = Arc::new(());
        let a = unsafe { StridedMemory::from_raw_parts(Arc::clone(&owner), ptr, 2, 2, 0) }.unwrap();
        let b = unsafe { StridedMemory::from_raw_parts(owner, ptr, 2, 2, 0) }.unwrap();
        let c = unsafe { StridedMemory::from_raw_parts(other, ptr, 2, 2, 0) }.unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);

        let mut set = HashSet::new();
        set.insert(a);
        set.insert(b);
        set.insert(c);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_display_and_debug() {
        let memory = StridedMemory::new(sequence(12), 0, 3, 2, 2).unwrap();
        assert_eq!(memory.to_string(), "StridedMemory<i32>[3, 2]");
        assert!(format!("{memory:?}").contains("slice"));
        let flat = FlatMemory::from(sequence(4));
        assert_eq!(flat.to_string(), "FlatMemory<i32>[4]");
    }

    #[test]
    fn test_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<StridedMemory<f64>>();
        assert_send_sync::<FlatMemory<f64>>();
    }
}
