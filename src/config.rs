//! Slab sizing and growth limits.

#[cfg(feature = "log")]
use log::warn;

use crate::size_class::{SizeClass, SizeClassTable};
use crate::{AllocError, AllocResult};

/// Default pool size of one slab: one 32 KiB L1 data cache.
pub const DEFAULT_SLAB_BYTES: usize = 32 * 1024;

/// Default cap on live slabs across all size classes.
pub const DEFAULT_MAX_SLABS: usize = 1024;

/// Sizing parameters shared by every size class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlabConfig {
    /// Bytes of node pool per slab (the slab header is extra).
    pub slab_bytes: usize,
    /// Maximum number of slabs alive at once, summed over all classes.
    pub max_slabs: usize,
}

impl SlabConfig {
    pub const DEFAULT: Self = Self {
        slab_bytes: DEFAULT_SLAB_BYTES,
        max_slabs: DEFAULT_MAX_SLABS,
    };

    pub const fn with_slab_bytes(mut self, slab_bytes: usize) -> Self {
        self.slab_bytes = slab_bytes;
        self
    }

    pub const fn with_max_slabs(mut self, max_slabs: usize) -> Self {
        self.max_slabs = max_slabs;
        self
    }

    /// Number of nodes one slab of `class` holds.
    pub const fn node_capacity(&self, class: SizeClass) -> usize {
        self.slab_bytes / class.node_stride()
    }

    /// Check that every class in `table` fits at least one node per slab.
    pub fn validate(&self, table: &SizeClassTable) -> AllocResult {
        if self.max_slabs == 0 {
            warn!("slab config: max_slabs must be non-zero");
            return Err(AllocError::InvalidParam);
        }
        for class in table.iter() {
            if self.node_capacity(class) == 0 {
                warn!(
                    "slab config: {} byte slabs cannot hold a {} byte node",
                    self.slab_bytes,
                    class.node_stride()
                );
                return Err(AllocError::InvalidParam);
            }
        }
        Ok(())
    }
}

impl Default for SlabConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slab::NODE_HEADER_SIZE;

    #[test]
    fn test_default_config() {
        let config = SlabConfig::default();
        assert_eq!(config.slab_bytes, 32 * 1024);
        assert_eq!(config.max_slabs, 1024);
        assert!(config.validate(&SizeClassTable::default()).is_ok());
    }

    #[test]
    fn test_node_capacity() {
        let table = SizeClassTable::default();
        let config = SlabConfig::default().with_slab_bytes(1024);
        let class16 = table.classify(16).unwrap();
        assert_eq!(config.node_capacity(class16), 1024 / (16 + NODE_HEADER_SIZE));
    }

    #[test]
    fn test_validate_rejects_tiny_slabs() {
        let table = SizeClassTable::default();
        // Fits a 16 byte node but not a 32 byte one
        let config = SlabConfig::default().with_slab_bytes(16 + NODE_HEADER_SIZE);
        assert_eq!(config.validate(&table), Err(AllocError::InvalidParam));
    }

    #[test]
    fn test_validate_rejects_zero_slabs() {
        let config = SlabConfig::default().with_max_slabs(0);
        assert_eq!(
            config.validate(&SizeClassTable::default()),
            Err(AllocError::InvalidParam)
        );
    }
}
