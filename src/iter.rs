//! Lanes and iterators over strided regions.
//!
//! A [`Lane`] is one row or one column of a view: `len` elements spaced
//! `step` elements apart. Rows have a step of 1; columns have the view's row
//! stride. Whole-region iteration is row-major and skips the pitch between
//! rows.

use std::fmt;
use std::iter::FusedIterator;
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};
use std::ptr::NonNull;
use std::slice;

use crate::shape::Shape2D;
use crate::{Result, StridedError};

#[inline]
unsafe fn lane_ptr<T>(ptr: NonNull<T>, index: usize, step: usize) -> *mut T {
    ptr.as_ptr().add(index * step)
}

// ============================================================================
// Lane
// ============================================================================

/// An immutable row or column of a strided region.
pub struct Lane<'a, T> {
    ptr: NonNull<T>,
    len: usize,
    step: usize,
    _marker: PhantomData<&'a T>,
}

unsafe impl<T: Sync> Send for Lane<'_, T> {}
unsafe impl<T: Sync> Sync for Lane<'_, T> {}

impl<T> Clone for Lane<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Lane<'_, T> {}

impl<'a, T> Lane<'a, T> {
    /// # Safety
    /// Every `ptr + i * step` for `i < len` must be valid for reads during `'a`.
    #[inline]
    pub(crate) unsafe fn new(ptr: NonNull<T>, len: usize, step: usize) -> Self {
        Self {
            ptr,
            len,
            step,
            _marker: PhantomData,
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

    /// Distance in elements between consecutive lane elements.
    #[inline]
    pub fn step(&self) -> usize {
        self.step
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&'a T> {
        if index >= self.len {
            return None;
        }
        Some(unsafe { &*lane_ptr(self.ptr, index, self.step) })
    }

    #[inline]
    pub fn iter(&self) -> LaneIter<'a, T> {
        LaneIter {
            ptr: self.ptr,
            front: 0,
            back: self.len,
            step: self.step,
            _marker: PhantomData,
        }
    }

    /// The lane as a slice, if its elements are adjacent.
    pub fn as_slice(&self) -> Option<&'a [T]> {
        if self.step != 1 && self.len > 1 {
            return None;
        }
        Some(unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) })
    }

    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.iter().cloned().collect()
    }

    /// Copy the lane into the front of `dest`.
    ///
    /// # Errors
    /// [`StridedError::LengthMismatch`] if `dest` is shorter than the lane.
    pub fn copy_to_slice(&self, dest: &mut [T]) -> Result<()>
    where
        T: Clone,
    {
        if dest.len() < self.len {
            return Err(StridedError::LengthMismatch {
                required: self.len,
                available: dest.len(),
            });
        }
        for (dst, src) in dest.iter_mut().zip(self.iter()) {
            dst.clone_from(src);
        }
        Ok(())
    }

    pub fn try_copy_to_slice(&self, dest: &mut [T]) -> bool
    where
        T: Clone,
    {
        self.copy_to_slice(dest).is_ok()
    }
}

impl<T> Index<usize> for Lane<'_, T> {
    type Output = T;

    #[inline]
    fn index(&self, index: usize) -> &T {
        assert!(
            index < self.len,
            "lane index {index} out of range for length {}",
            self.len
        );
        unsafe { &*lane_ptr(self.ptr, index, self.step) }
    }
}

impl<'a, T> IntoIterator for Lane<'a, T> {
    type Item = &'a T;
    type IntoIter = LaneIter<'a, T>;

    fn into_iter(self) -> LaneIter<'a, T> {
        self.iter()
    }
}

impl<T: fmt::Debug> fmt::Debug for Lane<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

// ============================================================================
// LaneMut
// ============================================================================

/// A mutable row or column of a strided region.
pub struct LaneMut<'a, T> {
    ptr: NonNull<T>,
    len: usize,
    step: usize,
    _marker: PhantomData<&'a mut T>,
}

unsafe impl<T: Send> Send for LaneMut<'_, T> {}
unsafe impl<T: Sync> Sync for LaneMut<'_, T> {}

impl<'a, T> LaneMut<'a, T> {
    /// # Safety
    /// Every `ptr + i * step` for `i < len` must be valid for exclusive
    /// access during `'a`, and no two of them may coincide.
    #[inline]
    pub(crate) unsafe fn new(ptr: NonNull<T>, len: usize, step: usize) -> Self {
        Self {
            ptr,
            len,
            step,
            _marker: PhantomData,
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
    pub fn step(&self) -> usize {
        self.step
    }

    /// Reborrow as an immutable lane.
    #[inline]
    pub fn as_lane(&self) -> Lane<'_, T> {
        unsafe { Lane::new(self.ptr, self.len, self.step) }
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.as_lane().get(index)
    }

    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        if index >= self.len {
            return None;
        }
        Some(unsafe { &mut *lane_ptr(self.ptr, index, self.step) })
    }

    #[inline]
    pub fn iter(&self) -> LaneIter<'_, T> {
        self.as_lane().iter()
    }

    #[inline]
    pub fn iter_mut(&mut self) -> LaneIterMut<'_, T> {
        LaneIterMut {
            ptr: self.ptr,
            front: 0,
            back: self.len,
            step: self.step,
            _marker: PhantomData,
        }
    }

    pub fn fill(&mut self, value: T)
    where
        T: Clone,
    {
        for x in self.iter_mut() {
            *x = value.clone();
        }
    }

    pub fn clear(&mut self)
    where
        T: Default,
    {
        for x in self.iter_mut() {
            *x = T::default();
        }
    }

    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.as_lane().to_vec()
    }

    pub fn copy_to_slice(&self, dest: &mut [T]) -> Result<()>
    where
        T: Clone,
    {
        self.as_lane().copy_to_slice(dest)
    }

    pub fn try_copy_to_slice(&self, dest: &mut [T]) -> bool
    where
        T: Clone,
    {
        self.as_lane().try_copy_to_slice(dest)
    }

    /// Overwrite the front of the lane with `src`.
    ///
    /// # Errors
    /// [`StridedError::LengthMismatch`] if `src` is longer than the lane.
    pub fn copy_from_slice(&mut self, src: &[T]) -> Result<()>
    where
        T: Clone,
    {
        if src.len() > self.len {
            return Err(StridedError::LengthMismatch {
                required: src.len(),
                available: self.len,
            });
        }
        for (dst, value) in self.iter_mut().zip(src) {
            dst.clone_from(value);
        }
        Ok(())
    }

    pub fn try_copy_from_slice(&mut self, src: &[T]) -> bool
    where
        T: Clone,
    {
        self.copy_from_slice(src).is_ok()
    }
}

impl<T> Index<usize> for LaneMut<'_, T> {
    type Output = T;

    #[inline]
    fn index(&self, index: usize) -> &T {
        assert!(
            index < self.len,
            "lane index {index} out of range for length {}",
            self.len
        );
        unsafe { &*lane_ptr(self.ptr, index, self.step) }
    }
}

impl<T> IndexMut<usize> for LaneMut<'_, T> {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut T {
        assert!(
            index < self.len,
            "lane index {index} out of range for length {}",
            self.len
        );
        unsafe { &mut *lane_ptr(self.ptr, index, self.step) }
    }
}

impl<'a, T> IntoIterator for LaneMut<'a, T> {
    type Item = &'a mut T;
    type IntoIter = LaneIterMut<'a, T>;

    fn into_iter(self) -> LaneIterMut<'a, T> {
        LaneIterMut {
            ptr: self.ptr,
            front: 0,
            back: self.len,
            step: self.step,
            _marker: PhantomData,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for LaneMut<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_lane().fmt(f)
    }
}

// ============================================================================
// Lane iterators
// ============================================================================

/// Iterator over the elements of a [`Lane`].
pub struct LaneIter<'a, T> {
    ptr: NonNull<T>,
    front: usize,
    back: usize,
    step: usize,
    _marker: PhantomData<&'a T>,
}

unsafe impl<T: Sync> Send for LaneIter<'_, T> {}
unsafe impl<T: Sync> Sync for LaneIter<'_, T> {}

impl<T> Clone for LaneIter<'_, T> {
    fn clone(&self) -> Self {
        Self {
            ptr: self.ptr,
            front: self.front,
            back: self.back,
            step: self.step,
            _marker: PhantomData,
        }
    }
}

impl<'a, T> Iterator for LaneIter<'a, T> {
    type Item = &'a T;

    #[inline]
    fn next(&mut self) -> Option<&'a T> {
        if self.front == self.back {
            return None;
        }
        let item = unsafe { &*lane_ptr(self.ptr, self.front, self.step) };
        self.front += 1;
        Some(item)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.back - self.front;
        (len, Some(len))
    }
}

impl<T> DoubleEndedIterator for LaneIter<'_, T> {
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front == self.back {
            return None;
        }
        self.back -= 1;
        Some(unsafe { &*lane_ptr(self.ptr, self.back, self.step) })
    }
}

impl<T> ExactSizeIterator for LaneIter<'_, T> {}
impl<T> FusedIterator for LaneIter<'_, T> {}

/// Iterator over the elements of a [`LaneMut`].
pub struct LaneIterMut<'a, T> {
    ptr: NonNull<T>,
    front: usize,
    back: usize,
    step: usize,
    _marker: PhantomData<&'a mut T>,
}

unsafe impl<T: Send> Send for LaneIterMut<'_, T> {}
unsafe impl<T: Sync> Sync for LaneIterMut<'_, T> {}

impl<'a, T> Iterator for LaneIterMut<'a, T> {
    type Item = &'a mut T;

    #[inline]
    fn next(&mut self) -> Option<&'a mut T> {
        if self.front == self.back {
            return None;
        }
        let item = unsafe { &mut *lane_ptr(self.ptr, self.front, self.step) };
        self.front += 1;
        Some(item)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.back - self.front;
        (len, Some(len))
    }
}

impl<T> DoubleEndedIterator for LaneIterMut<'_, T> {
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front == self.back {
            return None;
        }
        self.back -= 1;
        Some(unsafe { &mut *lane_ptr(self.ptr, self.back, self.step) })
    }
}

impl<T> ExactSizeIterator for LaneIterMut<'_, T> {}
impl<T> FusedIterator for LaneIterMut<'_, T> {}

// ============================================================================
// Row iterators
// ============================================================================

/// Iterator over the rows of a region as slices.
pub struct Rows<'a, T> {
    ptr: NonNull<T>,
    front: usize,
    back: usize,
    width: usize,
    stride: usize,
    _marker: PhantomData<&'a [T]>,
}

unsafe impl<T: Sync> Send for Rows<'_, T> {}
unsafe impl<T: Sync> Sync for Rows<'_, T> {}

impl<'a, T> Rows<'a, T> {
    /// # Safety
    /// `ptr` must be valid for reads of every element of `shape` during `'a`.
    #[inline]
    pub(crate) unsafe fn new(ptr: NonNull<T>, shape: Shape2D) -> Self {
        Self {
            ptr,
            front: 0,
            back: shape.height(),
            width: shape.width(),
            stride: shape.stride(),
            _marker: PhantomData,
        }
    }

    #[inline]
    unsafe fn row(&self, row: usize) -> &'a [T] {
        let start = self.ptr.as_ptr().wrapping_add(row * self.stride);
        slice::from_raw_parts(start, self.width)
    }
}

impl<T> Clone for Rows<'_, T> {
    fn clone(&self) -> Self {
        Self {
            ptr: self.ptr,
            front: self.front,
            back: self.back,
            width: self.width,
            stride: self.stride,
            _marker: PhantomData,
        }
    }
}

impl<'a, T> Iterator for Rows<'a, T> {
    type Item = &'a [T];

    #[inline]
    fn next(&mut self) -> Option<&'a [T]> {
        if self.front == self.back {
            return None;
        }
        let row = unsafe { self.row(self.front) };
        self.front += 1;
        Some(row)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.back - self.front;
        (len, Some(len))
    }
}

impl<T> DoubleEndedIterator for Rows<'_, T> {
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front == self.back {
            return None;
        }
        self.back -= 1;
        Some(unsafe { self.row(self.back) })
    }
}

impl<T> ExactSizeIterator for Rows<'_, T> {}
impl<T> FusedIterator for Rows<'_, T> {}

/// Iterator over the rows of a region as mutable slices.
pub struct RowsMut<'a, T> {
    ptr: NonNull<T>,
    front: usize,
    back: usize,
    width: usize,
    stride: usize,
    _marker: PhantomData<&'a mut [T]>,
}

unsafe impl<T: Send> Send for RowsMut<'_, T> {}
unsafe impl<T: Sync> Sync for RowsMut<'_, T> {}

impl<'a, T> RowsMut<'a, T> {
    /// # Safety
    /// `ptr` must be valid for exclusive access to every element of `shape`
    /// during `'a`.
    #[inline]
    pub(crate) unsafe fn new(ptr: NonNull<T>, shape: Shape2D) -> Self {
        Self {
            ptr,
            front: 0,
            back: shape.height(),
            width: shape.width(),
            stride: shape.stride(),
            _marker: PhantomData,
        }
    }

    #[inline]
    unsafe fn row(&self, row: usize) -> &'a mut [T] {
        let start = self.ptr.as_ptr().wrapping_add(row * self.stride);
        slice::from_raw_parts_mut(start, self.width)
    }
}

impl<'a, T> Iterator for RowsMut<'a, T> {
    type Item = &'a mut [T];

    #[inline]
    fn next(&mut self) -> Option<&'a mut [T]> {
        if self.front == self.back {
            return None;
        }
        let row = unsafe { self.row(self.front) };
        self.front += 1;
        Some(row)
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.back - self.front;
        (len, Some(len))
    }
}

impl<T> DoubleEndedIterator for RowsMut<'_, T> {
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front == self.back {
            return None;
        }
        self.back -= 1;
        Some(unsafe { self.row(self.back) })
    }
}

impl<T> ExactSizeIterator for RowsMut<'_, T> {}
impl<T> FusedIterator for RowsMut<'_, T> {}

// ============================================================================
// Element iterators
// ============================================================================

/// Row-major iterator over every element of a region.
pub struct Iter<'a, T> {
    rows: Rows<'a, T>,
    front: slice::Iter<'a, T>,
    back: slice::Iter<'a, T>,
}

impl<'a, T> Iter<'a, T> {
    /// # Safety
    /// Same as [`Rows::new`].
    #[inline]
    pub(crate) unsafe fn new(ptr: NonNull<T>, shape: Shape2D) -> Self {
        Self {
            rows: Rows::new(ptr, shape),
            front: Default::default(),
            back: Default::default(),
        }
    }
}

impl<T> Clone for Iter<'_, T> {
    fn clone(&self) -> Self {
        Self {
            rows: self.rows.clone(),
            front: self.front.clone(),
            back: self.back.clone(),
        }
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    #[inline]
    fn next(&mut self) -> Option<&'a T> {
        loop {
            if let Some(x) = self.front.next() {
                return Some(x);
            }
            match self.rows.next() {
                Some(row) => self.front = row.iter(),
                None => return self.back.next(),
            }
        }
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.front.len() + self.back.len() + self.rows.len() * self.rows.width;
        (len, Some(len))
    }
}

impl<T> DoubleEndedIterator for Iter<'_, T> {
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(x) = self.back.next_back() {
                return Some(x);
            }
            match self.rows.next_back() {
                Some(row) => self.back = row.iter(),
                None => return self.front.next_back(),
            }
        }
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}
impl<T> FusedIterator for Iter<'_, T> {}

/// Row-major iterator over mutable references to every element of a region.
pub struct IterMut<'a, T> {
    rows: RowsMut<'a, T>,
    front: slice::IterMut<'a, T>,
    back: slice::IterMut<'a, T>,
}

impl<'a, T> IterMut<'a, T> {
    /// # Safety
    /// Same as [`RowsMut::new`].
    #[inline]
    pub(crate) unsafe fn new(ptr: NonNull<T>, shape: Shape2D) -> Self {
        Self {
            rows: RowsMut::new(ptr, shape),
            front: Default::default(),
            back: Default::default(),
        }
    }
}

impl<'a, T> Iterator for IterMut<'a, T> {
    type Item = &'a mut T;

    #[inline]
    fn next(&mut self) -> Option<&'a mut T> {
        loop {
            if let Some(x) = self.front.next() {
                return Some(x);
            }
            match self.rows.next() {
                Some(row) => self.front = row.iter_mut(),
                None => return self.back.next(),
            }
        }
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.front.len() + self.back.len() + self.rows.len() * self.rows.width;
        (len, Some(len))
    }
}

impl<T> DoubleEndedIterator for IterMut<'_, T> {
    #[inline]
    fn next_back(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(x) = self.back.next_back() {
                return Some(x);
            }
            match self.rows.next_back() {
                Some(row) => self.back = row.iter_mut(),
                None => return self.front.next_back(),
            }
        }
    }
}

impl<T> ExactSizeIterator for IterMut<'_, T> {}
impl<T> FusedIterator for IterMut<'_, T> {}
