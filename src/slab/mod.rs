//! Slab allocator implementation.
//!
//! Each size class owns a doubly linked list of slabs; each slab is a single
//! backing region carved into tagged nodes kept on a per-slab free list.

pub mod free_node;
pub mod slab_allocator;
pub mod slab_cache;
pub mod slab_node;

pub use free_node::{NODE_ALIGN, NODE_HEADER_SIZE};
pub use slab_allocator::{SizeClassStats, SlabAllocator, SlabInfo, SlabStats};
