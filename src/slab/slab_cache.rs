//! Slab cache implementation for a single size class.
//!
//! This module implements SlabCache which keeps every slab of one size class on
//! a doubly linked list, newest first. Full slabs stay on the list and are
//! skipped by the allocation search; a slab leaves the list only when its last
//! node is released.

use core::ptr::NonNull;

#[cfg(feature = "log")]
use log::{debug, error};

use super::free_node::FreeNode;
use super::slab_node::SlabNode;
use crate::backing::BackingAllocator;
use crate::size_class::SizeClass;
use crate::{AllocError, AllocResult};

struct SlabIntrusiveList {
    head: Option<usize>,
    len: usize,
}

impl SlabIntrusiveList {
    pub const fn new() -> Self {
        Self { head: None, len: 0 }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn push_front(&mut self, size_class: SizeClass, slab_base: usize) {
        let mut node = SlabNode::new(slab_base, size_class);
        node.set_prev(None);
        node.set_next(self.head);

        if let Some(head) = self.head {
            let mut head_node = SlabNode::new(head, size_class);
            head_node.set_prev(Some(slab_base));
        }

        self.head = Some(slab_base);
        self.len += 1;
    }

    pub fn remove(&mut self, size_class: SizeClass, slab_base: usize) {
        let mut node = SlabNode::new(slab_base, size_class);
        let prev = node.prev();
        let next = node.next();

        if let Some(prev_base) = prev {
            let mut prev_node = SlabNode::new(prev_base, size_class);
            prev_node.set_next(next);
        } else {
            self.head = next;
        }

        if let Some(next_base) = next {
            let mut next_node = SlabNode::new(next_base, size_class);
            next_node.set_prev(prev);
        }

        node.set_prev(None);
        node.set_next(None);
        self.len = self.len.saturating_sub(1);
    }

    pub fn iter(&self, size_class: SizeClass) -> SlabIter {
        SlabIter {
            cursor: self.head,
            size_class,
        }
    }
}

/// Walks a slab list from head to tail.
pub(crate) struct SlabIter {
    cursor: Option<usize>,
    size_class: SizeClass,
}

impl Iterator for SlabIter {
    type Item = SlabNode;

    fn next(&mut self) -> Option<SlabNode> {
        let slab = SlabNode::new(self.cursor?, self.size_class);
        self.cursor = slab.next();
        Some(slab)
    }
}

/// Slab cache for a specific size class
pub(crate) struct SlabCache {
    size_class: SizeClass,
    slabs: SlabIntrusiveList,
}

impl SlabCache {
    pub const fn new(size_class: SizeClass) -> Self {
        Self {
            size_class,
            slabs: SlabIntrusiveList::new(),
        }
    }

    pub fn slab_count(&self) -> usize {
        self.slabs.len()
    }

    pub fn iter(&self) -> SlabIter {
        self.slabs.iter(self.size_class)
    }

    /// Take a node from the first slab with spare capacity.
    /// Returns the payload address, or `None` when every slab is full.
    pub fn alloc_object(&mut self) -> Option<NonNull<u8>> {
        let mut slab = self.iter().find(|slab| !slab.is_full())?;
        let node = slab.take_free_node()?;
        NonNull::new(node.payload() as *mut u8)
    }

    /// Create a new slab and put it at the head of the list.
    pub fn grow(
        &mut self,
        pool_bytes: usize,
        backing: &mut dyn BackingAllocator,
    ) -> AllocResult<()> {
        let slab = SlabNode::create(self.size_class, pool_bytes, backing)?;
        self.slabs.push_front(self.size_class, slab.addr);
        debug!(
            "slab cache {}B: grew slab at {:#x} with {} nodes ({} slabs)",
            self.size_class.size(),
            slab.addr,
            slab.node_capacity(),
            self.slabs.len()
        );
        Ok(())
    }

    /// Return `node` to its owning slab.
    /// Returns whether the owning slab became empty and was destroyed.
    pub fn dealloc_object(
        &mut self,
        node: FreeNode,
        backing: &mut dyn BackingAllocator,
    ) -> AllocResult<bool> {
        let Some(mut slab) = self.iter().find(|slab| slab.owns_address(node.addr())) else {
            error!(
                "slab cache {}B: no slab owns node {:#x}",
                self.size_class.size(),
                node.addr()
            );
            return Err(AllocError::UnknownPointer);
        };

        if !slab.is_valid_for_size_class() {
            error!("slab cache {}B: corrupted slab header at {:#x}", self.size_class.size(), slab.addr);
            return Err(AllocError::UnknownPointer);
        }

        let Some(node) = slab.node_from_addr(node.addr()) else {
            error!(
                "slab cache {}B: {:#x} is not a node boundary in slab {:#x}",
                self.size_class.size(),
                node.addr(),
                slab.addr
            );
            return Err(AllocError::UnknownPointer);
        };

        if !node.is_live() {
            error!(
                "slab cache {}B: double release of node {:#x}",
                self.size_class.size(),
                node.addr()
            );
            return Err(AllocError::UnknownPointer);
        }

        slab.return_node(node);

        if slab.is_empty() {
            self.slabs.remove(self.size_class, slab.addr);
            debug!(
                "slab cache {}B: released empty slab at {:#x} ({} slabs left)",
                self.size_class.size(),
                slab.addr,
                self.slabs.len()
            );
            slab.destroy(backing);
            return Ok(true);
        }

        Ok(false)
    }

    /// Destroy every slab regardless of live nodes.
    /// Returns the number of nodes that were still handed out.
    pub fn release_all(&mut self, backing: &mut dyn BackingAllocator) -> usize {
        let mut live = 0;
        while let Some(slab) = self.iter().next() {
            live += slab.used_count();
            self.slabs.remove(self.size_class, slab.addr);
            slab.destroy(backing);
        }
        live
    }
}
