//! Size classes supported by the slab allocator.
//!
//! The table is a declarative list of byte sizes. Classification is an exact
//! match: a request for 20 bytes is rejected even when a 24-byte class exists.

#[cfg(feature = "log")]
use log::warn;

use crate::slab::{NODE_ALIGN, NODE_HEADER_SIZE};
use crate::{AllocError, AllocResult};

/// Sizes registered when no explicit table is given.
pub const DEFAULT_SIZE_CLASSES: &[usize] = &[16, 24, 32];

/// Upper bound on the number of registered size classes.
pub const MAX_SIZE_CLASSES: usize = 32;

/// One registered allocation size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeClass {
    index: usize,
    size: usize,
}

impl SizeClass {
    /// Position of this class in its table.
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Payload size in bytes.
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Distance between consecutive nodes of this class inside a slab.
    pub const fn node_stride(&self) -> usize {
        NODE_HEADER_SIZE + self.size
    }
}

/// Fixed list of supported allocation sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeClassTable {
    sizes: &'static [usize],
}

impl SizeClassTable {
    /// The `[16, 24, 32]` table.
    pub const DEFAULT: Self = Self {
        sizes: DEFAULT_SIZE_CLASSES,
    };

    /// Build a table from a list of payload sizes.
    ///
    /// Sizes must be strictly ascending, at least one word long and a multiple
    /// of the node alignment, since a free node keeps its link in the payload.
    pub fn new(sizes: &'static [usize]) -> AllocResult<Self> {
        if sizes.is_empty() || sizes.len() > MAX_SIZE_CLASSES {
            warn!("size class table: invalid class count {}", sizes.len());
            return Err(AllocError::InvalidParam);
        }

        let mut prev = 0;
        for &size in sizes {
            if size < core::mem::size_of::<usize>() || !crate::is_aligned(size, NODE_ALIGN) {
                warn!("size class table: unusable size {}", size);
                return Err(AllocError::InvalidParam);
            }
            if size <= prev {
                warn!("size class table: sizes must be strictly ascending");
                return Err(AllocError::InvalidParam);
            }
            prev = size;
        }

        Ok(Self { sizes })
    }

    /// Map a requested size to its class.
    pub fn classify(&self, size: usize) -> AllocResult<SizeClass> {
        self.sizes
            .iter()
            .position(|&s| s == size)
            .map(|index| SizeClass { index, size })
            .ok_or(AllocError::UnsupportedSize)
    }

    /// Class at `index`, if registered.
    pub fn get(&self, index: usize) -> Option<SizeClass> {
        self.sizes
            .get(index)
            .map(|&size| SizeClass { index, size })
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = SizeClass> + '_ {
        self.sizes
            .iter()
            .enumerate()
            .map(|(index, &size)| SizeClass { index, size })
    }
}

impl Default for SizeClassTable {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_exact_match() {
        let table = SizeClassTable::default();
        assert_eq!(table.classify(16).unwrap().index(), 0);
        assert_eq!(table.classify(24).unwrap().index(), 1);
        assert_eq!(table.classify(32).unwrap().index(), 2);
        assert_eq!(table.classify(32).unwrap().size(), 32);
    }

    #[test]
    fn test_classify_rejects_unregistered() {
        let table = SizeClassTable::default();
        // No rounding up to the next class
        assert_eq!(table.classify(20), Err(AllocError::UnsupportedSize));
        assert_eq!(table.classify(0), Err(AllocError::UnsupportedSize));
        assert_eq!(table.classify(64), Err(AllocError::UnsupportedSize));
    }

    #[test]
    fn test_node_stride() {
        let table = SizeClassTable::default();
        let class = table.classify(24).unwrap();
        assert_eq!(class.node_stride(), 24 + NODE_HEADER_SIZE);
    }

    #[test]
    fn test_custom_table() {
        static SIZES: [usize; 4] = [8, 16, 48, 128];
        let table = SizeClassTable::new(&SIZES).unwrap();
        assert_eq!(table.len(), 4);
        assert_eq!(table.classify(48).unwrap().index(), 2);
        assert_eq!(table.get(3).map(|c| c.size()), Some(128));
        assert_eq!(table.get(4), None);
        assert_eq!(
            table.iter().map(|c| c.size()).collect::<alloc::vec::Vec<_>>(),
            SIZES.to_vec()
        );
    }

    #[test]
    fn test_invalid_tables() {
        assert_eq!(SizeClassTable::new(&[]), Err(AllocError::InvalidParam));
        // Too small to hold the free link
        assert_eq!(SizeClassTable::new(&[4]), Err(AllocError::InvalidParam));
        // Misaligned payload
        assert_eq!(SizeClassTable::new(&[16, 20]), Err(AllocError::InvalidParam));
        // Not ascending
        assert_eq!(SizeClassTable::new(&[32, 16]), Err(AllocError::InvalidParam));
        assert_eq!(SizeClassTable::new(&[16, 16]), Err(AllocError::InvalidParam));
    }
}
