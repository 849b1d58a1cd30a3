//! Extension traits for viewing slices as 2D regions.

use crate::view::{StridedView, StridedViewMut};
use crate::Result;

/// View a slice as a 2D region.
///
/// # Example
/// ```
/// use strided_2d::AsStrided;
///
/// let data = [1, 2, 3, 4, 5, 6];
/// let view = data.as_strided(2, 3).unwrap();
/// assert_eq!(view[(1, 0)], 4);
/// ```
pub trait AsStrided<T> {
    /// `height` contiguous rows of `width` elements from the start of the slice.
    fn as_strided(&self, height: usize, width: usize) -> Result<StridedView<'_, T>>;

    /// `height` rows of `width` elements, `pitch` apart, starting at `offset`.
    fn as_strided_pitched(
        &self,
        offset: usize,
        height: usize,
        width: usize,
        pitch: usize,
    ) -> Result<StridedView<'_, T>>;
}

/// Mutably view a slice as a 2D region.
pub trait AsStridedMut<T> {
    fn as_strided_mut(&mut self, height: usize, width: usize) -> Result<StridedViewMut<'_, T>>;

    fn as_strided_pitched_mut(
        &mut self,
        offset: usize,
        height: usize,
        width: usize,
        pitch: usize,
    ) -> Result<StridedViewMut<'_, T>>;
}

impl<T> AsStrided<T> for [T] {
    fn as_strided(&self, height: usize, width: usize) -> Result<StridedView<'_, T>> {
        StridedView::from_contiguous(self, height, width)
    }

    fn as_strided_pitched(
        &self,
        offset: usize,
        height: usize,
        width: usize,
        pitch: usize,
    ) -> Result<StridedView<'_, T>> {
        StridedView::new(self, offset, height, width, pitch)
    }
}

impl<T> AsStridedMut<T> for [T] {
    fn as_strided_mut(&mut self, height: usize, width: usize) -> Result<StridedViewMut<'_, T>> {
        StridedViewMut::from_contiguous(self, height, width)
    }

    fn as_strided_pitched_mut(
        &mut self,
        offset: usize,
        height: usize,
        width: usize,
        pitch: usize,
    ) -> Result<StridedViewMut<'_, T>> {
        StridedViewMut::new(self, offset, height, width, pitch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_strided() {
        let data: Vec<i32> = (0..12).collect();
        let view = data.as_strided(3, 4).unwrap();
        assert_eq!(view.pitch(), 0);
        assert_eq!(view[(2, 3)], 11);
        assert!(data.as_strided(4, 4).is_err());

        let pitched = data.as_strided_pitched(0, 3, 2, 2).unwrap();
        assert_eq!(pitched.to_vec(), vec![0, 1, 4, 5, 8, 9]);
    }

    #[test]
    fn test_as_strided_mut() {
        let mut data = vec![0; 6];
        data.as_strided_mut(2, 3).unwrap()[(1, 2)] = 5;
        data.as_strided_pitched_mut(1, 2, 1, 2).unwrap().fill(9);
        assert_eq!(data, vec![0, 9, 0, 0, 9, 5]);
    }
}
