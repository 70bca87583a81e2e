//! Thread-safe slab allocator.
//!
//! The whole [`SlabAllocator`] state sits behind one spin lock. Growth retries
//! inside a single locked call without re-entering the allocator, so the lock
//! does not need to be reentrant.

use core::ptr::NonNull;

use kspin::SpinNoIrq;

use crate::backing::{BackingAllocator, SystemBacking};
use crate::config::SlabConfig;
use crate::size_class::SizeClassTable;
use crate::slab::{SlabAllocator, SlabInfo, SlabStats};
use crate::{AllocResult, NodeAllocator};

/// Slab allocator shared between threads.
pub struct LockedSlabAllocator<B: BackingAllocator = SystemBacking> {
    inner: SpinNoIrq<SlabAllocator<B>>,
}

impl LockedSlabAllocator<SystemBacking> {
    /// Usable in a `static` as a process-wide allocator.
    pub const fn new() -> Self {
        Self {
            inner: SpinNoIrq::new(SlabAllocator::new()),
        }
    }

    pub fn with_config(table: SizeClassTable, config: SlabConfig) -> AllocResult<Self> {
        Ok(Self::from_allocator(SlabAllocator::with_config(table, config)?))
    }
}

impl Default for LockedSlabAllocator<SystemBacking> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: BackingAllocator> LockedSlabAllocator<B> {
    pub const fn from_allocator(allocator: SlabAllocator<B>) -> Self {
        Self {
            inner: SpinNoIrq::new(allocator),
        }
    }

    pub fn allocate(&self, size: usize) -> AllocResult<NonNull<u8>> {
        self.inner.lock().allocate(size)
    }

    /// # Safety
    ///
    /// Same contract as [`SlabAllocator::release`].
    pub unsafe fn release(&self, ptr: NonNull<u8>) -> AllocResult {
        unsafe { self.inner.lock().release(ptr) }
    }

    pub fn stats(&self) -> SlabStats {
        self.inner.lock().stats()
    }

    pub fn slabs(&self, size: usize) -> AllocResult<alloc::vec::Vec<SlabInfo>> {
        self.inner.lock().slabs(size)
    }

    pub fn nodes_per_slab(&self, size: usize) -> AllocResult<usize> {
        self.inner.lock().nodes_per_slab(size)
    }

    pub fn total_slabs(&self) -> usize {
        self.inner.lock().total_slabs()
    }
}

impl<B: BackingAllocator> NodeAllocator for LockedSlabAllocator<B> {
    fn allocate(&mut self, size: usize) -> AllocResult<NonNull<u8>> {
        self.inner.lock().allocate(size)
    }

    unsafe fn release(&mut self, ptr: NonNull<u8>) -> AllocResult {
        unsafe { self.inner.lock().release(ptr) }
    }
}

impl<B: BackingAllocator> NodeAllocator for &LockedSlabAllocator<B> {
    fn allocate(&mut self, size: usize) -> AllocResult<NonNull<u8>> {
        LockedSlabAllocator::allocate(*self, size)
    }

    unsafe fn release(&mut self, ptr: NonNull<u8>) -> AllocResult {
        unsafe { LockedSlabAllocator::release(*self, ptr) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AllocError;

    static SHARED: LockedSlabAllocator = LockedSlabAllocator::new();

    #[test]
    fn test_static_allocator() {
        let a = SHARED.allocate(16).unwrap();
        let b = SHARED.allocate(16).unwrap();
        assert_ne!(a, b);
        unsafe {
            SHARED.release(a).unwrap();
            SHARED.release(b).unwrap();
        }
        assert_eq!(SHARED.allocate(20), Err(AllocError::UnsupportedSize));
    }

    #[test]
    fn test_shared_reference_as_node_allocator() {
        let locked = LockedSlabAllocator::new();
        let mut handle = &locked;
        let ptr = NodeAllocator::allocate(&mut handle, 32).unwrap();
        assert_eq!(locked.total_slabs(), 1);
        unsafe { NodeAllocator::release(&mut handle, ptr).unwrap() };
        assert_eq!(locked.total_slabs(), 0);
    }
}
