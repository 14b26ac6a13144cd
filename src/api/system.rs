//! The descriptor system: owner of every pool and allocator.

use std::sync::Arc;

use crate::allocators::handle::DescriptorHandle;
use crate::allocators::persistent::HandleAllocators;
use crate::allocators::pool::{PersistentPool, TransientPool};
use crate::allocators::sampler_cache::SamplerCache;
use crate::allocators::user_heap::UserDescriptorHeap;
use crate::api::config::{ConfigError, DescriptorConfig};
use crate::api::context::ExecutionContext;
use crate::api::stats::{PersistentStats, SystemStats};
use crate::fd_trace;
use crate::gpu::fence::CompletionGate;
use crate::gpu::traits::{Category, DescriptorDevice, DeviceError, SamplerDesc};

/// The descriptor system.
///
/// This is the entry point for all descriptor operations. It is cheap to
/// clone (internally uses `Arc`) and thread-safe: persistent allocation and
/// sampler creation may happen from any thread, while each
/// [`ExecutionContext`] stays on the thread recording its command list.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use descalloc::{Category, DescriptorConfig, DescriptorSystem, DummyDevice, FenceCounter};
///
/// let device = Arc::new(DummyDevice::new());
/// let fence = Arc::new(FenceCounter::new());
/// let system = DescriptorSystem::new(device, fence, DescriptorConfig::default()).unwrap();
///
/// let texture = system.allocate(Category::Resource, 1).unwrap();
/// assert!(!texture.is_null());
///
/// system.shutdown();
/// ```
#[derive(Clone)]
pub struct DescriptorSystem {
    device: Arc<dyn DescriptorDevice>,
    gate: Arc<dyn CompletionGate>,
    config: Arc<DescriptorConfig>,
    persistent: Arc<PersistentPool>,
    transient: Arc<TransientPool>,
    allocators: Arc<HandleAllocators>,
    samplers: Arc<SamplerCache>,
}

impl DescriptorSystem {
    /// Create a system over `device`, reclaiming transient segments as
    /// `gate` reports progress.
    pub fn new(
        device: Arc<dyn DescriptorDevice>,
        gate: Arc<dyn CompletionGate>,
        config: DescriptorConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(device, gate, config))
    }

    /// Create a system with the default configuration.
    pub fn with_defaults(device: Arc<dyn DescriptorDevice>, gate: Arc<dyn CompletionGate>) -> Self {
        let config = DescriptorConfig::default();
        debug_assert_eq!(config.validate(), Ok(()));
        Self::build(device, gate, config)
    }

    fn build(device: Arc<dyn DescriptorDevice>, gate: Arc<dyn CompletionGate>, config: DescriptorConfig) -> Self {
        let persistent = Arc::new(PersistentPool::new(
            device.clone(),
            config.persistent_heap_capacities,
            config.heap_soft_limit,
        ));
        let transient = Arc::new(TransientPool::new(
            device.clone(),
            gate.clone(),
            config.transient_capacity(Category::Resource),
            config.transient_capacity(Category::Sampler),
            config.heap_soft_limit,
        ));
        fd_trace!("descriptor system created: {:?}", config);

        Self {
            device,
            gate,
            config: Arc::new(config),
            allocators: Arc::new(HandleAllocators::new(persistent.clone())),
            persistent,
            transient,
            samplers: Arc::new(SamplerCache::new()),
        }
    }

    /// The configuration the system was created with.
    pub fn config(&self) -> &DescriptorConfig {
        &self.config
    }

    /// The device every heap is created on.
    pub fn device(&self) -> &Arc<dyn DescriptorDevice> {
        &self.device
    }

    /// The gate transient reclamation is driven by.
    pub fn gate(&self) -> &Arc<dyn CompletionGate> {
        &self.gate
    }

    /// Allocate `count` consecutive persistent slots of `category`.
    ///
    /// The returned handle is host-only and stays valid until shutdown.
    pub fn allocate(&self, category: Category, count: u32) -> Result<DescriptorHandle, DeviceError> {
        self.allocators.allocate(category, count)
    }

    /// Persistent handle for a sampler. Equal descriptions share one handle.
    pub fn create_sampler(&self, desc: &SamplerDesc) -> Result<DescriptorHandle, DeviceError> {
        self.samplers.get_or_create(desc, &self.allocators, &*self.device)
    }

    /// Create binding state for one recording thread.
    pub fn create_context(&self) -> ExecutionContext {
        ExecutionContext::new(self.transient.clone(), &self.config)
    }

    /// Create a caller-owned shader-visible heap.
    pub fn create_user_heap(&self, category: Category, capacity: u32) -> Result<UserDescriptorHeap, DeviceError> {
        UserDescriptorHeap::new(self.device.clone(), category, capacity)
    }

    /// Snapshot of system statistics.
    pub fn stats(&self) -> SystemStats {
        SystemStats {
            persistent: PersistentStats {
                heaps_created: self.persistent.heaps_created(),
                heaps_owned: self.persistent.heap_count(),
                slots_allocated: self.allocators.slots_allocated(),
            },
            transient_resource: self.transient.stats(Category::Resource),
            transient_sampler: self.transient.stats(Category::Sampler),
            samplers: self.samplers.len(),
            completed_value: self.gate.completed_value(),
        }
    }

    /// Release every heap of both pools.
    ///
    /// Every handle handed out becomes invalid. Only call once the device is
    /// idle and no context is recording.
    pub fn shutdown(&self) {
        self.allocators.reset();
        self.samplers.clear();
        self.persistent.destroy_all();
        self.transient.destroy_all();
        fd_trace!("descriptor system shut down");
    }
}
