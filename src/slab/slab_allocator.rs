//! Size-classed slab allocator.
//!
//! This module implements the manager that owns one `SlabCache` per size
//! class, grows a class by one slab when all of its slabs are full, and gives a
//! slab's region back to the backing allocator as soon as its last node is
//! released.

use alloc::vec::Vec;
use core::ptr::NonNull;

#[cfg(feature = "log")]
use log::{debug, error, warn};

use super::free_node::FreeNode;
use super::slab_cache::SlabCache;
use crate::backing::{BackingAllocator, SystemBacking};
use crate::config::SlabConfig;
use crate::size_class::SizeClassTable;
use crate::{AllocError, AllocResult, NodeAllocator};

/// Snapshot of one slab, in allocation search order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlabInfo {
    pub pool_start: usize,
    pub pool_bytes: usize,
    pub node_capacity: usize,
    pub used_count: usize,
}

impl SlabInfo {
    /// Whether `addr` falls inside this slab's node pool.
    pub fn contains(&self, addr: usize) -> bool {
        addr >= self.pool_start && addr < self.pool_start + self.pool_bytes
    }

    pub fn is_full(&self) -> bool {
        self.used_count == self.node_capacity
    }
}

/// Per size class statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeClassStats {
    pub size: usize,
    pub slabs: usize,
    pub node_capacity: usize,
    pub used_nodes: usize,
}

/// Statistics for the slab allocator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlabStats {
    pub total_slabs: usize,
    pub max_slabs: usize,
    pub initialized: bool,
    pub size_classes: Vec<SizeClassStats>,
}

/// Slab allocator for a fixed table of node sizes.
///
/// The per-class slab lists are created lazily on the first allocation and
/// discarded again when the last slab is destroyed.
pub struct SlabAllocator<B: BackingAllocator = SystemBacking> {
    table: SizeClassTable,
    config: SlabConfig,
    caches: Vec<SlabCache>,
    total_slabs: usize,
    initialized: bool,
    backing: B,
}

impl SlabAllocator<SystemBacking> {
    /// Allocator over the `[16, 24, 32]` table with default sizing.
    pub const fn new() -> Self {
        Self {
            table: SizeClassTable::DEFAULT,
            config: SlabConfig::DEFAULT,
            caches: Vec::new(),
            total_slabs: 0,
            initialized: false,
            backing: SystemBacking,
        }
    }

    pub fn with_config(table: SizeClassTable, config: SlabConfig) -> AllocResult<Self> {
        Self::with_backing(table, config, SystemBacking)
    }
}

impl Default for SlabAllocator<SystemBacking> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: BackingAllocator> SlabAllocator<B> {
    pub fn with_backing(table: SizeClassTable, config: SlabConfig, backing: B) -> AllocResult<Self> {
        config.validate(&table)?;
        Ok(Self {
            table,
            config,
            caches: Vec::new(),
            total_slabs: 0,
            initialized: false,
            backing,
        })
    }

    fn ensure_initialized(&mut self) {
        if self.initialized {
            return;
        }
        self.caches.extend(self.table.iter().map(SlabCache::new));
        self.initialized = true;
        debug!(
            "slab allocator: initialized {} size classes, {} byte slabs",
            self.caches.len(),
            self.config.slab_bytes
        );
    }

    fn teardown(&mut self) {
        self.caches.clear();
        self.initialized = false;
        debug!("slab allocator: last slab released, back to uninitialized");
    }

    /// Allocate one node of exactly `size` bytes.
    ///
    /// Searches the class's slabs newest first; if all are full, grows one new
    /// slab and takes a node from it.
    pub fn allocate(&mut self, size: usize) -> AllocResult<NonNull<u8>> {
        self.ensure_initialized();

        let size_class = self.table.classify(size).map_err(|e| {
            warn!("slab allocator: unsupported allocation size {}", size);
            e
        })?;
        let cache = &mut self.caches[size_class.index()];

        if let Some(ptr) = cache.alloc_object() {
            return Ok(ptr);
        }

        if self.total_slabs >= self.config.max_slabs {
            warn!(
                "slab allocator: {} slabs allocated, limit reached",
                self.total_slabs
            );
            return Err(AllocError::Exhausted);
        }

        cache.grow(self.config.slab_bytes, &mut self.backing)?;
        self.total_slabs += 1;

        match cache.alloc_object() {
            Some(ptr) => Ok(ptr),
            None => panic!("Allocation from newly grown slab failed: free list corruption detected"),
        }
    }

    /// Release a node previously returned by [`SlabAllocator::allocate`].
    ///
    /// # Safety
    ///
    /// `ptr` must come from `allocate` on this allocator and must not have been
    /// released already. The node tag in front of `ptr` is read before
    /// ownership is established, so a forged pointer must at least have
    /// [`NODE_HEADER_SIZE`](crate::NODE_HEADER_SIZE) readable bytes before it.
    pub unsafe fn release(&mut self, ptr: NonNull<u8>) -> AllocResult {
        let addr = ptr.as_ptr() as usize;
        if !self.initialized {
            error!("slab allocator: release of {:#x} with no live slabs", addr);
            return Err(AllocError::UnknownPointer);
        }

        let Some(node) = FreeNode::from_payload(addr) else {
            error!("slab allocator: {:#x} is not a node payload address", addr);
            return Err(AllocError::UnknownPointer);
        };
        let Some(cache) = node
            .class_index()
            .and_then(|index| self.caches.get_mut(index))
        else {
            error!("slab allocator: {:#x} carries no valid size class tag", addr);
            return Err(AllocError::UnknownPointer);
        };

        let destroyed = cache.dealloc_object(node, &mut self.backing)?;
        if destroyed {
            self.total_slabs -= 1;
            if self.total_slabs == 0 {
                self.teardown();
            }
        }
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn total_slabs(&self) -> usize {
        self.total_slabs
    }

    pub fn config(&self) -> &SlabConfig {
        &self.config
    }

    pub fn size_classes(&self) -> &SizeClassTable {
        &self.table
    }

    /// Number of nodes one slab of the `size` class holds.
    pub fn nodes_per_slab(&self, size: usize) -> AllocResult<usize> {
        let size_class = self.table.classify(size)?;
        Ok(self.config.node_capacity(size_class))
    }

    /// Slabs of the `size` class, newest first.
    pub fn slabs(&self, size: usize) -> AllocResult<Vec<SlabInfo>> {
        let size_class = self.table.classify(size)?;
        let Some(cache) = self.caches.get(size_class.index()) else {
            return Ok(Vec::new());
        };
        Ok(cache
            .iter()
            .map(|slab| SlabInfo {
                pool_start: slab.pool_start(),
                pool_bytes: slab.pool_bytes(),
                node_capacity: slab.node_capacity(),
                used_count: slab.used_count(),
            })
            .collect())
    }

    pub fn stats(&self) -> SlabStats {
        let size_classes = self
            .table
            .iter()
            .map(|size_class| {
                let mut stats = SizeClassStats {
                    size: size_class.size(),
                    slabs: 0,
                    node_capacity: 0,
                    used_nodes: 0,
                };
                if let Some(cache) = self.caches.get(size_class.index()) {
                    stats.slabs = cache.slab_count();
                    for slab in cache.iter() {
                        stats.node_capacity += slab.node_capacity();
                        stats.used_nodes += slab.used_count();
                    }
                }
                stats
            })
            .collect();

        SlabStats {
            total_slabs: self.total_slabs,
            max_slabs: self.config.max_slabs,
            initialized: self.initialized,
            size_classes,
        }
    }
}

impl<B: BackingAllocator> Drop for SlabAllocator<B> {
    fn drop(&mut self) {
        let mut live = 0;
        for cache in self.caches.iter_mut() {
            live += cache.release_all(&mut self.backing);
        }
        if live > 0 {
            warn!("slab allocator: dropped with {} live nodes", live);
        }
    }
}

impl<B: BackingAllocator> NodeAllocator for SlabAllocator<B> {
    fn allocate(&mut self, size: usize) -> AllocResult<NonNull<u8>> {
        SlabAllocator::allocate(self, size)
    }

    unsafe fn release(&mut self, ptr: NonNull<u8>) -> AllocResult {
        unsafe { SlabAllocator::release(self, ptr) }
    }
}
