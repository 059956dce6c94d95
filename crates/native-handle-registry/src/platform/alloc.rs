//! Zero-initialized native allocation for the reference slab.
//!
//! The slab must stay at a stable address for the whole life of the OS
//! process, across any number of runtime restarts, so nothing allocated here
//! is ever freed.
#![allow(unsafe_code)]

use crate::error::{RegistryError, Result};
use std::ptr::NonNull;

/// Source of zeroed, process-lifetime memory for a slab.
pub trait NativeAllocator: Send + Sync {
    /// Allocate `cells` zeroed pointer-sized cells.
    ///
    /// The returned memory must be aligned for `usize`, must never move, and
    /// must remain valid until the OS process exits.
    fn allocate_zeroed(&self, cells: usize) -> Result<NonNull<usize>>;
}

/// Allocator backed by the platform C allocator.
///
/// # Platform Behavior
/// - **Linux/macOS**: `calloc(cells, size_of::<usize>())`
/// - **Other**: `std::alloc::alloc_zeroed` with a `[usize; cells]` layout
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemAllocator;

impl NativeAllocator for SystemAllocator {
    fn allocate_zeroed(&self, cells: usize) -> Result<NonNull<usize>> {
        if cells == 0 {
            return Err(RegistryError::Allocation { cells });
        }

        #[cfg(unix)]
        let raw = {
            // SAFETY: calloc has no preconditions; it returns null or a block
            // of `cells * size_of::<usize>()` zeroed bytes aligned for any
            // fundamental type, including usize.
            unsafe { libc::calloc(cells, std::mem::size_of::<usize>()) as *mut usize }
        };

        #[cfg(not(unix))]
        let raw = {
            let layout = std::alloc::Layout::array::<usize>(cells)
                .map_err(|_| RegistryError::Allocation { cells })?;
            // SAFETY: the layout has non-zero size because `cells > 0`.
            unsafe { std::alloc::alloc_zeroed(layout) as *mut usize }
        };

        NonNull::new(raw).ok_or(RegistryError::Allocation { cells })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocation_is_zeroed_and_aligned() {
        let ptr = SystemAllocator.allocate_zeroed(16).unwrap();
        assert_eq!(ptr.as_ptr() as usize % std::mem::align_of::<usize>(), 0);
        // SAFETY: 16 cells were just allocated and nothing else references them.
        let cells = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), 16) };
        assert!(cells.iter().all(|&c| c == 0));
    }

    #[test]
    fn test_zero_cells_rejected() {
        assert!(matches!(
            SystemAllocator.allocate_zeroed(0),
            Err(RegistryError::Allocation { cells: 0 })
        ));
    }
}
