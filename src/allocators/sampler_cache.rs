//! Sampler deduplication.
//!
//! Samplers are described by value and there are few distinct ones, so each
//! distinct description gets exactly one persistent slot.

use std::collections::HashMap;

use crate::allocators::handle::DescriptorHandle;
use crate::allocators::persistent::HandleAllocators;
use crate::fd_trace;
use crate::gpu::traits::{Category, DescriptorDevice, DeviceError, SamplerDesc};
use crate::sync::atomics::AtomicCounter;
use crate::sync::mutex::Mutex;

/// Map from sampler description to its persistent handle.
#[derive(Debug, Default)]
pub struct SamplerCache {
    samplers: Mutex<HashMap<SamplerDesc, DescriptorHandle>>,
    hits: AtomicCounter,
}

impl SamplerCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for `desc`, writing a new sampler on first request.
    pub fn get_or_create(
        &self,
        desc: &SamplerDesc,
        allocators: &HandleAllocators,
        device: &dyn DescriptorDevice,
    ) -> Result<DescriptorHandle, DeviceError> {
        let mut samplers = self.samplers.lock();
        if let Some(handle) = samplers.get(desc) {
            self.hits.increment();
            return Ok(*handle);
        }

        let handle = allocators.allocate(Category::Sampler, 1)?;
        if let Some(cpu) = handle.cpu() {
            device.create_sampler(desc, cpu);
        }
        samplers.insert(*desc, handle);
        fd_trace!("sampler {:?} created at {:?} ({} distinct)", desc.filter, handle.cpu(), samplers.len());
        Ok(handle)
    }

    /// Number of distinct samplers.
    pub fn len(&self) -> usize {
        self.samplers.lock().len()
    }

    /// Whether no sampler has been created yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Requests answered without creating a sampler.
    pub fn hits(&self) -> u64 {
        self.hits.get()
    }

    /// Forget every sampler. The slots stay allocated.
    pub fn clear(&self) {
        self.samplers.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::allocators::pool::PersistentPool;
    use crate::gpu::dummy::{DeviceCall, DummyDevice};

    #[test]
    fn test_same_desc_same_handle() {
        let device = Arc::new(DummyDevice::new());
        let pool = Arc::new(PersistentPool::new(device.clone(), [16; 4], 64));
        let allocators = HandleAllocators::new(pool);
        let cache = SamplerCache::new();

        let a = cache.get_or_create(&SamplerDesc::linear_clamp(), &allocators, &*device).unwrap();
        let b = cache.get_or_create(&SamplerDesc::point_clamp(), &allocators, &*device).unwrap();
        let c = cache.get_or_create(&SamplerDesc::linear_clamp(), &allocators, &*device).unwrap();

        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.hits(), 1);

        let created = device
            .calls()
            .iter()
            .filter(|call| matches!(call, DeviceCall::CreateSampler { .. }))
            .count();
        assert_eq!(created, 2);
        assert!(device.read_descriptor(a.cpu().unwrap()).is_some());
    }

    #[test]
    fn test_clear_forgets_samplers() {
        let device = Arc::new(DummyDevice::new());
        let pool = Arc::new(PersistentPool::new(device.clone(), [16; 4], 64));
        let allocators = HandleAllocators::new(pool);
        let cache = SamplerCache::new();

        let a = cache.get_or_create(&SamplerDesc::linear_clamp(), &allocators, &*device).unwrap();
        cache.clear();
        assert!(cache.is_empty());

        let b = cache.get_or_create(&SamplerDesc::linear_clamp(), &allocators, &*device).unwrap();
        assert_ne!(a, b);
    }
}
