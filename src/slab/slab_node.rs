//! Slab node implementation.
//!
//! A slab is one contiguous backing region: a [`SlabHeader`] followed by a pool
//! of equal-size tagged nodes. Free nodes form a singly linked list threaded
//! through their payloads. Slabs of one size class are linked to each other
//! through the `prev`/`next` fields of their headers.

use core::alloc::Layout;
use core::mem::{align_of, size_of};
use core::ptr::NonNull;

#[cfg(feature = "log")]
use log::warn;

use super::free_node::{FreeNode, NODE_ALIGN};
use crate::backing::BackingAllocator;
use crate::size_class::SizeClass;
use crate::{AllocError, AllocResult};

#[repr(C)]
pub(crate) struct SlabHeader {
    magic: u32,
    class_index: u32,
    node_capacity: usize,
    used_count: usize,
    free_head: usize,
    pool_bytes: usize,
    prev: usize,
    next: usize,
}

const SLAB_HEADER_MAGIC: u32 = 0x534c_4142;

const REGION_ALIGN: usize = if align_of::<SlabHeader>() > NODE_ALIGN {
    align_of::<SlabHeader>()
} else {
    NODE_ALIGN
};

#[derive(Debug, Clone, Copy)]
pub(crate) struct SlabNode {
    pub addr: usize,           // Start of the backing region
    pub size_class: SizeClass, // Size class of every node in the pool
}

impl SlabNode {
    pub const HEADER_SIZE_ALIGNED: usize = crate::align_up(size_of::<SlabHeader>(), NODE_ALIGN);

    pub const fn new(addr: usize, size_class: SizeClass) -> Self {
        Self { addr, size_class }
    }

    /// Layout of a backing region holding `pool_bytes` of nodes.
    pub fn region_layout(pool_bytes: usize) -> AllocResult<Layout> {
        let total = Self::HEADER_SIZE_ALIGNED
            .checked_add(pool_bytes)
            .ok_or(AllocError::InvalidParam)?;
        Layout::from_size_align(total, REGION_ALIGN).map_err(|_| AllocError::InvalidParam)
    }

    /// Allocate a backing region and carve it into free nodes of `size_class`.
    ///
    /// Nothing is left behind on failure.
    pub fn create(
        size_class: SizeClass,
        pool_bytes: usize,
        backing: &mut dyn BackingAllocator,
    ) -> AllocResult<Self> {
        let layout = Self::region_layout(pool_bytes)?;
        let region = backing.alloc_region(layout).map_err(|e| {
            warn!(
                "slab: backing allocation of {} bytes for size class {} failed: {:?}",
                layout.size(),
                size_class.size(),
                e
            );
            e
        })?;

        let mut slab = SlabNode::new(region.as_ptr() as usize, size_class);
        slab.init_header(pool_bytes);
        Ok(slab)
    }

    /// Return the backing region. The slab must already be unlinked.
    pub fn destroy(self, backing: &mut dyn BackingAllocator) {
        // `create` already built this layout from the same pool size.
        let layout = Self::region_layout(self.pool_bytes())
            .expect("slab region layout was valid at creation");
        // SAFETY: the region was produced by `create` with this same layout.
        unsafe { backing.dealloc_region(NonNull::new_unchecked(self.addr as *mut u8), layout) };
    }

    fn header(&self) -> &SlabHeader {
        unsafe { &*(self.addr as *const SlabHeader) }
    }

    fn header_mut(&mut self) -> &mut SlabHeader {
        unsafe { &mut *(self.addr as *mut SlabHeader) }
    }

    pub fn init_header(&mut self, pool_bytes: usize) {
        let stride = self.size_class.node_stride();
        let node_capacity = pool_bytes / stride;
        let class_index = self.size_class.index();
        let pool_start = self.pool_start();

        for i in 0..node_capacity {
            let addr = pool_start + i * stride;
            let next = if i + 1 < node_capacity {
                Some(addr + stride)
            } else {
                None
            };
            FreeNode::new(addr).init(class_index, next);
        }

        let header = self.header_mut();
        *header = SlabHeader {
            magic: SLAB_HEADER_MAGIC,
            class_index: class_index as u32,
            node_capacity,
            used_count: 0,
            free_head: if node_capacity > 0 { pool_start } else { 0 },
            pool_bytes,
            prev: 0,
            next: 0,
        };
    }

    pub fn is_valid_for_size_class(&self) -> bool {
        let header = self.header();
        header.magic == SLAB_HEADER_MAGIC
            && header.class_index as usize == self.size_class.index()
    }

    pub fn pool_start(&self) -> usize {
        self.addr + Self::HEADER_SIZE_ALIGNED
    }

    pub fn pool_bytes(&self) -> usize {
        self.header().pool_bytes
    }

    pub fn node_capacity(&self) -> usize {
        self.header().node_capacity
    }

    pub fn used_count(&self) -> usize {
        self.header().used_count
    }

    pub fn is_full(&self) -> bool {
        self.header().free_head == 0
    }

    pub fn is_empty(&self) -> bool {
        self.header().used_count == 0
    }

    /// Pop the head of the free list.
    pub fn take_free_node(&mut self) -> Option<FreeNode> {
        let header = self.header_mut();
        if header.free_head == 0 {
            return None;
        }
        let mut node = FreeNode::new(header.free_head);
        header.free_head = node.next_free().unwrap_or(0);
        header.used_count += 1;
        node.mark_live();
        Some(node)
    }

    /// Push `node` back onto the free list. The node must come from this pool.
    pub fn return_node(&mut self, mut node: FreeNode) {
        let header = self.header_mut();
        node.mark_free();
        node.set_next_free(if header.free_head == 0 {
            None
        } else {
            Some(header.free_head)
        });
        header.free_head = node.addr();
        debug_assert!(header.used_count > 0, "return_node on an empty slab");
        header.used_count -= 1;
    }

    /// Whether `addr` lies inside this slab's node pool.
    pub fn owns_address(&self, addr: usize) -> bool {
        let start = self.pool_start();
        addr >= start && addr < start + self.pool_bytes()
    }

    /// The node starting exactly at `addr`, if any.
    pub fn node_from_addr(&self, addr: usize) -> Option<FreeNode> {
        if !self.owns_address(addr) {
            return None;
        }
        let offset = addr - self.pool_start();
        let stride = self.size_class.node_stride();
        if offset % stride != 0 || offset / stride >= self.node_capacity() {
            return None;
        }
        Some(FreeNode::new(addr))
    }

    pub fn prev(&self) -> Option<usize> {
        let prev = self.header().prev;
        if prev == 0 {
            None
        } else {
            Some(prev)
        }
    }

    pub fn next(&self) -> Option<usize> {
        let next = self.header().next;
        if next == 0 {
            None
        } else {
            Some(next)
        }
    }

    pub fn set_prev(&mut self, prev: Option<usize>) {
        self.header_mut().prev = prev.unwrap_or(0);
    }

    pub fn set_next(&mut self, next: Option<usize>) {
        self.header_mut().next = next.unwrap_or(0);
    }
}
