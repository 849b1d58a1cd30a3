//! Overflow-checked area arithmetic for 2D regions.
//!
//! A region of `height` rows, `width` columns and `pitch` padding elements
//! per row spans `height * (width + pitch)` elements. Every constructor and
//! reshaping operation routes through these helpers so that the element
//! count of a view or handle always fits the native signed range.
//!
//! Products are computed in a `u128` intermediate, which cannot overflow for
//! any pair of `usize` operands on 16/32/64-bit targets.

use crate::{Result, StridedError};

/// Largest element count addressable on the current target (`isize::MAX`).
pub const NATIVE_LIMIT: u64 = isize::MAX as u64;

/// Native limit of a 32-bit target.
pub const LIMIT_32: u64 = i32::MAX as u64;

/// Native limit of a 64-bit target.
pub const LIMIT_64: u64 = i64::MAX as u64;

/// Compute `height * (width + pitch)` and check it against `limit`.
///
/// # Errors
/// Returns [`StridedError::AreaOverflow`] if the product exceeds `limit`.
///
/// # Example
/// ```
/// use strided_2d::overflow::{compute_area_within, LIMIT_32};
///
/// assert_eq!(compute_area_within(3, 2, 2, LIMIT_32).unwrap(), 12);
/// assert!(compute_area_within(1 << 16, 1 << 15, 0, LIMIT_32).is_err());
/// ```
pub fn compute_area_within(height: usize, width: usize, pitch: usize, limit: u64) -> Result<u64> {
    let stride = width as u128 + pitch as u128;
    let area = height as u128 * stride;
    if area > limit as u128 {
        return Err(StridedError::AreaOverflow {
            height,
            width,
            pitch,
            limit,
        });
    }
    Ok(area as u64)
}

/// Compute `height * (width + pitch)` against the native limit of this target.
#[inline]
pub fn compute_area(height: usize, width: usize, pitch: usize) -> Result<usize> {
    compute_area_within(height, width, pitch, NATIVE_LIMIT).map(|area| area as usize)
}

/// Validate that a region's area fits the native range, discarding the value.
#[inline]
pub fn ensure_in_native_range(height: usize, width: usize, pitch: usize) -> Result<()> {
    compute_area(height, width, pitch).map(|_| ())
}

/// Byte size of `height * (width + pitch)` elements of `elem_size` bytes each.
pub fn compute_byte_size(
    height: usize,
    width: usize,
    pitch: usize,
    elem_size: usize,
) -> Result<usize> {
    let area = compute_area(height, width, pitch)? as u128;
    let bytes = area * elem_size as u128;
    if bytes > NATIVE_LIMIT as u128 {
        return Err(StridedError::AreaOverflow {
            height,
            width,
            pitch,
            limit: NATIVE_LIMIT / elem_size.max(1) as u64,
        });
    }
    Ok(bytes as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_area_exact() {
        assert_eq!(compute_area(3, 2, 2).unwrap(), 12);
        assert_eq!(compute_area(4, 3, 0).unwrap(), 12);
        assert_eq!(compute_area(0, 100, 7).unwrap(), 0);
        assert_eq!(compute_area(5, 0, 0).unwrap(), 0);
    }

    #[test]
    fn test_compute_area_32bit_boundary() {
        // 46341^2 = 2_147_488_281 > i32::MAX, 46340^2 = 2_147_395_600 < i32::MAX
        assert_eq!(
            compute_area_within(46340, 46340, 0, LIMIT_32).unwrap(),
            2_147_395_600
        );
        let err = compute_area_within(46341, 46341, 0, LIMIT_32).unwrap_err();
        assert!(matches!(err, StridedError::AreaOverflow { limit, .. } if limit == LIMIT_32));
    }

    #[test]
    fn test_compute_area_exact_limit_is_accepted() {
        // i32::MAX == 7 * 306_783_378 + 1
        let height = 7usize;
        let stride = (LIMIT_32 / 7) as usize;
        let area = compute_area_within(height, stride, 0, LIMIT_32).unwrap();
        assert!(area <= LIMIT_32);
        assert!(compute_area_within(height, stride + 1, 0, LIMIT_32).is_err());
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_compute_area_64bit_boundary() {
        let half = (LIMIT_64 / 2) as usize;
        assert_eq!(
            compute_area_within(2, half, 0, LIMIT_64).unwrap(),
            LIMIT_64 - 1
        );
        assert!(compute_area_within(2, half + 1, 0, LIMIT_64).is_err());
    }

    #[test]
    fn test_pitch_counts_towards_area() {
        let pitch = LIMIT_32 as usize / 2 - 1;
        assert!(compute_area_within(2, 1, pitch, LIMIT_32).is_ok());
        assert!(compute_area_within(2, 2, pitch, LIMIT_32).is_err());
    }

    #[test]
    fn test_native_overflow() {
        assert!(compute_area(usize::MAX, 2, 0).is_err());
        assert!(ensure_in_native_range(2, usize::MAX, usize::MAX).is_err());
        assert!(ensure_in_native_range(1024, 1024, 16).is_ok());
    }

    #[test]
    fn test_compute_byte_size() {
        assert_eq!(compute_byte_size(3, 2, 2, 4).unwrap(), 48);
        assert!(compute_byte_size(2, NATIVE_LIMIT as usize / 2, 0, 8).is_err());
    }
}
