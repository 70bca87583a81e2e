//! Backing regions for slabs.
//!
//! Every slab is one contiguous region obtained from a [`BackingAllocator`].
//! The default [`SystemBacking`] forwards to the global allocator.

use core::alloc::Layout;
use core::ptr::NonNull;

use crate::{AllocError, AllocResult};

/// Source of the contiguous regions slabs are carved from.
pub trait BackingAllocator {
    /// Allocate a region with the given layout.
    fn alloc_region(&mut self, layout: Layout) -> AllocResult<NonNull<u8>>;

    /// Return a region previously produced by [`BackingAllocator::alloc_region`].
    ///
    /// # Safety
    ///
    /// `ptr` and `layout` must match an earlier `alloc_region` call on this
    /// backing, and the region must not be used afterwards.
    unsafe fn dealloc_region(&mut self, ptr: NonNull<u8>, layout: Layout);
}

/// Backing that draws slab regions from the global allocator.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBacking;

impl BackingAllocator for SystemBacking {
    fn alloc_region(&mut self, layout: Layout) -> AllocResult<NonNull<u8>> {
        if layout.size() == 0 {
            return Err(AllocError::InvalidParam);
        }
        // SAFETY: layout has a non-zero size.
        let ptr = unsafe { alloc::alloc::alloc(layout) };
        NonNull::new(ptr).ok_or(AllocError::NoMemory)
    }

    unsafe fn dealloc_region(&mut self, ptr: NonNull<u8>, layout: Layout) {
        unsafe { alloc::alloc::dealloc(ptr.as_ptr(), layout) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_backing_roundtrip() {
        let mut backing = SystemBacking;
        let layout = Layout::from_size_align(4096, 8).unwrap();
        let region = backing.alloc_region(layout).unwrap();
        assert_eq!(region.as_ptr() as usize % 8, 0);
        unsafe { backing.dealloc_region(region, layout) };
    }

    #[test]
    fn test_system_backing_rejects_zero_size() {
        let mut backing = SystemBacking;
        let layout = Layout::from_size_align(0, 8).unwrap();
        assert_eq!(backing.alloc_region(layout), Err(AllocError::InvalidParam));
    }
}
