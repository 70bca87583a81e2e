//! General-purpose [`NodeAllocator`] over the global allocator.
//!
//! Lets node-based containers swap the slab allocator for the system allocator
//! without code changes. Each block carries a one-word prefix holding the
//! requested size so `release` needs no size argument.

use core::alloc::Layout;
use core::mem::{align_of, size_of};
use core::ptr::NonNull;

#[cfg(feature = "log")]
use log::error;

use crate::{AllocError, AllocResult, NodeAllocator};

const PREFIX_SIZE: usize = size_of::<usize>();

/// Forwards every request to the global allocator.
#[derive(Debug, Default)]
pub struct SystemNodeAllocator {
    live: usize,
}

impl SystemNodeAllocator {
    pub const fn new() -> Self {
        Self { live: 0 }
    }

    /// Blocks allocated and not yet released.
    pub fn live(&self) -> usize {
        self.live
    }

    fn layout(size: usize) -> AllocResult<Layout> {
        let total = size.checked_add(PREFIX_SIZE).ok_or(AllocError::UnsupportedSize)?;
        Layout::from_size_align(total, align_of::<usize>()).map_err(|_| AllocError::UnsupportedSize)
    }
}

impl NodeAllocator for SystemNodeAllocator {
    fn allocate(&mut self, size: usize) -> AllocResult<NonNull<u8>> {
        if size == 0 {
            return Err(AllocError::UnsupportedSize);
        }
        let layout = Self::layout(size)?;
        // SAFETY: layout is never zero-sized.
        let base = NonNull::new(unsafe { alloc::alloc::alloc(layout) }).ok_or(AllocError::NoMemory)?;
        unsafe {
            *(base.as_ptr() as *mut usize) = size;
            self.live += 1;
            Ok(NonNull::new_unchecked(base.as_ptr().add(PREFIX_SIZE)))
        }
    }

    unsafe fn release(&mut self, ptr: NonNull<u8>) -> AllocResult {
        if self.live == 0 {
            error!("system node allocator: release of {:p} with nothing live", ptr);
            return Err(AllocError::UnknownPointer);
        }
        unsafe {
            let base = ptr.as_ptr().sub(PREFIX_SIZE);
            let size = *(base as *const usize);
            let layout = Self::layout(size)?;
            alloc::alloc::dealloc(base, layout);
        }
        self.live -= 1;
        Ok(())
    }
}
