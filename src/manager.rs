//! Custom backing stores for [`StridedMemory`](crate::StridedMemory).

/// A backing store that hands out its buffer on demand.
///
/// Handles built with [`StridedMemory::from_manager`](crate::StridedMemory::from_manager)
/// never cache the pointer: every resolution calls [`as_slice`](Self::as_slice)
/// or [`as_mut_slice`](Self::as_mut_slice) again and re-checks the region
/// against the returned length.
///
/// `pin`/`unpin` bracket a [`PinnedRegion`](crate::PinnedRegion). Stores whose
/// buffer may move (or be handed to foreign code) can use them to hold it in
/// place; the defaults do nothing.
pub trait MemoryManager<T>: Send + Sync {
    /// Current contents of the store.
    fn as_slice(&self) -> &[T];

    /// Current contents of the store, mutably.
    fn as_mut_slice(&mut self) -> &mut [T];

    /// Keep the buffer in place, starting at `element_index`, until `unpin`.
    fn pin(&self, element_index: usize) {
        let _ = element_index;
    }

    /// Release a previous `pin`.
    fn unpin(&self) {}
}

impl<T: Send + Sync> MemoryManager<T> for Vec<T> {
    fn as_slice(&self) -> &[T] {
        self
    }

    fn as_mut_slice(&mut self) -> &mut [T] {
        self
    }
}

impl<T: Send + Sync> MemoryManager<T> for Box<[T]> {
    fn as_slice(&self) -> &[T] {
        self
    }

    fn as_mut_slice(&mut self) -> &mut [T] {
        self
    }
}
