//! Scoped pinning of storable handles.

use std::fmt;
use std::ptr::NonNull;

use crate::memory::Backing;
use crate::shape::Shape2D;
use crate::view::{offset_ptr, validate_bounds, StridedView};
use crate::Result;

/// Guard returned by [`StridedMemory::pin`](crate::StridedMemory::pin).
///
/// While the guard is alive the region's owner stays alive and, for
/// [`MemoryManager`](crate::MemoryManager) backings, pinned. Dropping the
/// guard releases the pin exactly once.
pub struct PinnedRegion<T> {
    backing: Backing<T>,
    ptr: NonNull<T>,
    shape: Shape2D,
}

unsafe impl<T: Send + Sync> Send for PinnedRegion<T> {}
unsafe impl<T: Send + Sync> Sync for PinnedRegion<T> {}

impl<T> PinnedRegion<T> {
    /// Pin `backing` at `offset`, then locate `shape` in the pinned buffer.
    ///
    /// The buffer is read only after the manager has been asked to pin it.
    /// If the region no longer fits, the guard drops and unpins before the
    /// error is returned.
    pub(crate) fn acquire(backing: Backing<T>, offset: usize, shape: Shape2D) -> Result<Self> {
        if let Backing::Manager(manager) = &backing {
            manager.pin(offset);
        }
        let mut region = Self {
            backing,
            ptr: NonNull::dangling(),
            shape,
        };
        let (base, len) = region.backing.base();
        validate_bounds(len, offset, &shape)?;
        region.ptr = offset_ptr(base, offset);
        tracing::debug!(
            "pinned {} region {} at element offset {}",
            region.backing.kind(),
            shape,
            offset
        );
        Ok(region)
    }

    /// Address of the first element.
    #[inline]
    pub fn as_ptr(&self) -> *const T {
        self.ptr.as_ptr()
    }

    #[inline]
    pub fn shape(&self) -> Shape2D {
        self.shape
    }

    /// View of the pinned region.
    pub fn view(&self) -> StridedView<'_, T> {
        unsafe { StridedView::from_parts(self.ptr, self.shape) }
    }
}

impl<T> Drop for PinnedRegion<T> {
    fn drop(&mut self) {
        if let Backing::Manager(manager) = &self.backing {
            manager.unpin();
        }
        tracing::debug!("released pinned {} region {}", self.backing.kind(), self.shape);
    }
}

impl<T> fmt::Debug for PinnedRegion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PinnedRegion")
            .field("backing", &self.backing.kind())
            .field("ptr", &self.ptr)
            .field("shape", &self.shape)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::{MemoryManager, StridedError, StridedMemory};

    #[derive(Default)]
    struct CountingStore {
        data: Vec<i32>,
        pins: AtomicUsize,
        unpins: AtomicUsize,
        last_index: AtomicUsize,
    }

    impl MemoryManager<i32> for CountingStore {
        fn as_slice(&self) -> &[i32] {
            &self.data
        }

        fn as_mut_slice(&mut self) -> &mut [i32] {
            &mut self.data
        }

        fn pin(&self, element_index: usize) {
            self.pins.fetch_add(1, Ordering::SeqCst);
            self.last_index.store(element_index, Ordering::SeqCst);
        }

        fn unpin(&self) {
            self.unpins.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Store that moves its elements into a stable buffer while pinned.
    struct StagingStore {
        movable: Vec<i32>,
        stable: Vec<i32>,
        pinned: AtomicBool,
        unpins: AtomicUsize,
    }

    impl StagingStore {
        fn new(movable: Vec<i32>, stable: Vec<i32>) -> Arc<Self> {
            Arc::new(Self {
                movable,
                stable,
                pinned: AtomicBool::new(false),
                unpins: AtomicUsize::new(0),
            })
        }
    }

    impl MemoryManager<i32> for StagingStore {
        fn as_slice(&self) -> &[i32] {
            if self.pinned.load(Ordering::SeqCst) {
                &self.stable
            } else {
                &self.movable
            }
        }

        fn as_mut_slice(&mut self) -> &mut [i32] {
            if *self.pinned.get_mut() {
                &mut self.stable
            } else {
                &mut self.movable
            }
        }

        fn pin(&self, _element_index: usize) {
            self.pinned.store(true, Ordering::SeqCst);
        }

        fn unpin(&self) {
            self.pinned.store(false, Ordering::SeqCst);
            self.unpins.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn store() -> Arc<CountingStore> {
        Arc::new(CountingStore {
            data: (0..12).collect(),
            ..Default::default()
        })
    }

    #[test]
    fn test_pin_brackets_manager() {
        let store = store();
        let memory = StridedMemory::from_manager(Arc::clone(&store), 0, 3, 2, 2).unwrap();
        let region = memory.slice(1, 1, 2, 1).unwrap();
        {
            let pinned = region.pin().unwrap();
            assert_eq!(store.pins.load(Ordering::SeqCst), 1);
            assert_eq!(store.last_index.load(Ordering::SeqCst), 5);
            assert_eq!(store.unpins.load(Ordering::SeqCst), 0);
            assert_eq!(pinned.view().to_vec(), vec![5, 9]);
            assert_eq!(unsafe { *pinned.as_ptr() }, 5);
        }
        assert_eq!(store.unpins.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_pin_empty_region_skips_manager() {
        let store = store();
        let memory = StridedMemory::from_manager(Arc::clone(&store), 0, 0, 2, 2).unwrap();
        let pinned = memory.pin().unwrap();
        assert!(pinned.view().is_empty());
        drop(pinned);
        assert_eq!(store.pins.load(Ordering::SeqCst), 0);
        assert_eq!(store.unpins.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_pin_keeps_owner_alive() {
        let memory = StridedMemory::new(vec![1, 2, 3, 4], 0, 2, 2, 0).unwrap();
        let pinned = memory.pin().unwrap();
        drop(memory);
        assert_eq!(pinned.view().to_vec(), vec![1, 2, 3, 4]);
        assert_eq!(pinned.shape().height(), 2);
    }

    #[test]
    fn test_pin_blocks_mutable_resolution() {
        let mut memory = StridedMemory::new(vec![0; 4], 0, 2, 2, 0).unwrap();
        let pinned = memory.pin().unwrap();
        assert!(memory.resolve_mut().is_err());
        drop(pinned);
        assert!(memory.resolve_mut().is_ok());
    }

    #[test]
    fn test_pin_reads_buffer_after_pinning() {
        let store = StagingStore::new(vec![0; 4], vec![7; 4]);
        let memory = StridedMemory::from_manager(Arc::clone(&store), 0, 2, 2, 0).unwrap();
        {
            let pinned = memory.pin().unwrap();
            assert_eq!(pinned.as_ptr(), store.stable.as_ptr());
            assert_eq!(pinned.view().to_vec(), vec![7; 4]);
        }
        assert_eq!(store.unpins.load(Ordering::SeqCst), 1);
        assert_eq!(memory.resolve().unwrap().to_vec(), vec![0; 4]);
    }

    #[test]
    fn test_pin_unpins_when_pinned_buffer_is_too_small() {
        let store = StagingStore::new(vec![0; 6], vec![7; 3]);
        let memory = StridedMemory::from_manager(Arc::clone(&store), 0, 2, 3, 0).unwrap();
        assert!(matches!(
            memory.pin(),
            Err(StridedError::LengthMismatch {
                required: 6,
                available: 3
            })
        ));
        assert_eq!(store.unpins.load(Ordering::SeqCst), 1);
        assert!(!store.pinned.load(Ordering::SeqCst));
    }

    #[test]
    fn test_pin_released_once_on_panic() {
        let store = store();
        let memory = StridedMemory::from_manager(Arc::clone(&store), 0, 3, 2, 2).unwrap();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let pinned = memory.pin().unwrap();
            assert_eq!(store.pins.load(Ordering::SeqCst), 1);
            if pinned.view().get(0, 0) == Some(&0) {
                panic!("failure while pinned");
            }
        }));
        assert!(result.is_err());
        assert_eq!(store.pins.load(Ordering::SeqCst), 1);
        assert_eq!(store.unpins.load(Ordering::SeqCst), 1);
    }
}
