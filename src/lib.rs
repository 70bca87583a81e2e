//! Slab Node Allocator
//!
//! A small-object allocator specialized for a fixed set of node sizes, built for
//! linked lists and queues that allocate and release same-sized nodes in tight
//! loops. It features:
//! - A declarative size-class table with exact-size classification
//! - Per-class doubly linked lists of slabs, each carved into tagged free-list nodes
//! - Slab growth on exhaustion and shrink-to-zero on the last release
//! - An optional lock-wrapped allocator for sharing across threads
//!
//! ```text
//! SlabAllocator
//!   ├─→ class 0 (16B) → [slab] ⇄ [slab] ⇄ [slab]
//!   ├─→ class 1 (24B) → [slab]
//!   └─→ class 2 (32B) → (no slabs)
//!
//! slab region: | SlabHeader | tag|payload | tag|payload | ... |
//! ```

#![no_std]

extern crate alloc;

use core::fmt;
use core::ptr::NonNull;

// Logging support - conditionally import log crate
#[cfg(feature = "log")]
extern crate log;

// Stub macros when log is disabled - these become no-ops
#[cfg(not(feature = "log"))]
#[allow(unused_macros)]
macro_rules! error {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
#[allow(unused_macros)]
macro_rules! warn {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
#[allow(unused_macros)]
macro_rules! info {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
#[allow(unused_macros)]
macro_rules! debug {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
#[allow(unused_macros)]
macro_rules! trace {
    ($($arg:tt)*) => {};
}

/// The error type used for allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// Invalid configuration or size-class list.
    InvalidParam,
    /// The requested size matches no registered size class.
    UnsupportedSize,
    /// The backing allocator could not provide a slab region.
    NoMemory,
    /// Growing would exceed the configured maximum number of slabs.
    Exhausted,
    /// Released an address no live slab owns (foreign pointer or double release).
    UnknownPointer,
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            AllocError::InvalidParam => "invalid allocator parameter",
            AllocError::UnsupportedSize => "unsupported allocation size",
            AllocError::NoMemory => "out of memory",
            AllocError::Exhausted => "slab limit reached",
            AllocError::UnknownPointer => "pointer not owned by any slab",
        };
        f.write_str(msg)
    }
}

impl core::error::Error for AllocError {}

/// A [`Result`] type with [`AllocError`] as the error type.
pub type AllocResult<T = ()> = Result<T, AllocError>;

/// Allocator interface consumed by node-based containers.
///
/// Containers receive an implementation at construction time and must release
/// every address through the same implementation that produced it.
pub trait NodeAllocator {
    /// Allocate `size` bytes.
    fn allocate(&mut self, size: usize) -> AllocResult<NonNull<u8>>;

    /// Release an address obtained from [`NodeAllocator::allocate`].
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by `allocate` on this same allocator and not
    /// released since. Violations that can be detected are reported as
    /// [`AllocError::UnknownPointer`], but reading a forged pointer's tag may
    /// touch memory the caller does not own.
    unsafe fn release(&mut self, ptr: NonNull<u8>) -> AllocResult;
}

#[inline]
const fn align_up(pos: usize, align: usize) -> usize {
    (pos + align - 1) & !(align - 1)
}

/// Checks whether the address has the demanded alignment.
///
/// Equivalent to `addr % align == 0`, but the alignment must be a power of two.
#[inline]
const fn is_aligned(base_addr: usize, align: usize) -> bool {
    base_addr & (align - 1) == 0
}

pub mod backing;
pub use backing::{BackingAllocator, SystemBacking};

pub mod config;
pub use config::SlabConfig;

pub mod size_class;
pub use size_class::{SizeClass, SizeClassTable, DEFAULT_SIZE_CLASSES, MAX_SIZE_CLASSES};

pub mod slab;
pub use slab::slab_allocator::{SizeClassStats, SlabAllocator, SlabInfo, SlabStats};
pub use slab::NODE_HEADER_SIZE;

pub mod locked;
pub use locked::LockedSlabAllocator;

pub mod system;
pub use system::SystemNodeAllocator;
