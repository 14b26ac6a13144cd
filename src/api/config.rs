//! Descriptor system configuration.

use std::fmt;

use crate::gpu::traits::Category;
use crate::util::bitset::SlotSet;

/// Configuration for the descriptor system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorConfig {
    /// Slots per persistent heap, indexed by [`Category::index`] (default: 256 each)
    pub persistent_heap_capacities: [u32; 4],

    /// Slots per transient resource segment (default: 1024)
    pub transient_heap_capacity: u32,

    /// Slots per transient sampler segment (default: 1024)
    pub transient_sampler_heap_capacity: u32,

    /// Shadow cache size of each binding cache (default: 256)
    pub max_cached_handles: u32,

    /// Source ranges gathered before one batched copy is issued (default: 16)
    pub max_copy_ranges: usize,

    /// Heaps per pool lane before a growth warning is emitted (default: 64)
    pub heap_soft_limit: usize,
}

impl Default for DescriptorConfig {
    fn default() -> Self {
        Self {
            persistent_heap_capacities: [256; 4],
            transient_heap_capacity: 1024,
            transient_sampler_heap_capacity: 1024,
            max_cached_handles: 256,
            max_copy_ranges: 16,
            heap_soft_limit: 64,
        }
    }
}

impl DescriptorConfig {
    /// Create a minimal config for testing or constrained environments.
    pub fn minimal() -> Self {
        Self {
            persistent_heap_capacities: [64; 4],
            transient_heap_capacity: 128,
            transient_sampler_heap_capacity: 64,
            max_cached_handles: 64,
            max_copy_ranges: 8,
            heap_soft_limit: 16,
        }
    }

    /// Create a config for scenes that bind many tables per submission.
    pub fn high_throughput() -> Self {
        Self {
            persistent_heap_capacities: [1024, 256, 256, 64],
            transient_heap_capacity: 4096,
            transient_sampler_heap_capacity: 2048,
            max_cached_handles: 256,
            max_copy_ranges: 32,
            heap_soft_limit: 256,
        }
    }

    /// Slots per persistent heap of `category`.
    pub fn persistent_capacity(&self, category: Category) -> u32 {
        self.persistent_heap_capacities[category.index()]
    }

    /// Slots per transient segment of a shader-visible category.
    pub fn transient_capacity(&self, category: Category) -> u32 {
        match category {
            Category::Sampler => self.transient_sampler_heap_capacity,
            _ => self.transient_heap_capacity,
        }
    }

    /// Builder pattern: set persistent heap capacity for every category.
    pub fn with_persistent_heap_capacity(mut self, slots: u32) -> Self {
        self.persistent_heap_capacities = [slots; 4];
        self
    }

    /// Builder pattern: set persistent heap capacity for one category.
    pub fn with_category_heap_capacity(mut self, category: Category, slots: u32) -> Self {
        self.persistent_heap_capacities[category.index()] = slots;
        self
    }

    /// Builder pattern: set both transient segment capacities.
    pub fn with_transient_heap_capacity(mut self, slots: u32) -> Self {
        self.transient_heap_capacity = slots;
        self.transient_sampler_heap_capacity = slots;
        self
    }

    /// Builder pattern: set the shadow cache size.
    pub fn with_max_cached_handles(mut self, slots: u32) -> Self {
        self.max_cached_handles = slots;
        self
    }

    /// Builder pattern: set ranges per batched copy.
    pub fn with_max_copy_ranges(mut self, ranges: usize) -> Self {
        self.max_copy_ranges = ranges;
        self
    }

    /// Builder pattern: set the pool growth warning threshold.
    pub fn with_heap_soft_limit(mut self, heaps: usize) -> Self {
        self.heap_soft_limit = heaps;
        self
    }

    /// Check that the values can work together.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.persistent_heap_capacities.contains(&0)
            || self.transient_heap_capacity == 0
            || self.transient_sampler_heap_capacity == 0
        {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.max_cached_handles as usize > SlotSet::BITS {
            return Err(ConfigError::CacheTooLarge {
                requested: self.max_cached_handles,
                supported: SlotSet::BITS as u32,
            });
        }
        let smallest_segment = self
            .transient_heap_capacity
            .min(self.transient_sampler_heap_capacity);
        if self.max_cached_handles > smallest_segment {
            return Err(ConfigError::CacheExceedsSegment {
                cache: self.max_cached_handles,
                segment: smallest_segment,
            });
        }
        if self.max_copy_ranges == 0 {
            return Err(ConfigError::NoCopyRanges);
        }
        Ok(())
    }
}

/// Reasons a [`DescriptorConfig`] is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A heap capacity is zero
    ZeroCapacity,
    /// The shadow cache is wider than the binding bitmaps
    CacheTooLarge { requested: u32, supported: u32 },
    /// A full flush of the shadow cache would not fit in one segment
    CacheExceedsSegment { cache: u32, segment: u32 },
    /// Batched copies need room for at least one range
    NoCopyRanges,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroCapacity => write!(f, "Heap capacities must be non-zero"),
            ConfigError::CacheTooLarge { requested, supported } => write!(
                f,
                "Shadow cache of {} handles exceeds the supported {}",
                requested, supported
            ),
            ConfigError::CacheExceedsSegment { cache, segment } => write!(
                f,
                "Shadow cache of {} handles does not fit in a {}-slot transient segment",
                cache, segment
            ),
            ConfigError::NoCopyRanges => write!(f, "max_copy_ranges must be at least 1"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        assert_eq!(DescriptorConfig::default().validate(), Ok(()));
        assert_eq!(DescriptorConfig::minimal().validate(), Ok(()));
        assert_eq!(DescriptorConfig::high_throughput().validate(), Ok(()));
    }

    #[test]
    fn test_cache_larger_than_segment_rejected() {
        let config = DescriptorConfig::default()
            .with_transient_heap_capacity(128)
            .with_max_cached_handles(200);
        assert_eq!(
            config.validate(),
            Err(ConfigError::CacheExceedsSegment { cache: 200, segment: 128 })
        );
    }

    #[test]
    fn test_cache_wider_than_bitmap_rejected() {
        let config = DescriptorConfig::default()
            .with_transient_heap_capacity(4096)
            .with_max_cached_handles(512);
        assert!(matches!(config.validate(), Err(ConfigError::CacheTooLarge { .. })));
    }

    #[test]
    fn test_transient_capacity_per_lane() {
        let config = DescriptorConfig::high_throughput();
        assert_eq!(config.transient_capacity(Category::Resource), 4096);
        assert_eq!(config.transient_capacity(Category::Sampler), 2048);
    }

    #[test]
    fn test_persistent_capacity_per_category() {
        let config = DescriptorConfig::default()
            .with_persistent_heap_capacity(128)
            .with_category_heap_capacity(Category::DepthStencil, 8);
        assert_eq!(config.persistent_capacity(Category::Resource), 128);
        assert_eq!(config.persistent_capacity(Category::RenderTarget), 128);
        assert_eq!(config.persistent_capacity(Category::DepthStencil), 8);

        let config = config.with_category_heap_capacity(Category::Sampler, 0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroCapacity));
    }
}
