//! Heap pools.
//!
//! Pools own every heap they create. The persistent pool only ever grows;
//! the transient pool recycles segments once the completion gate says the
//! device is done with them.

use std::collections::VecDeque;
use std::sync::Arc;

use crossbeam_queue::SegQueue;

use crate::api::stats::TransientLaneStats;
use crate::gpu::fence::CompletionGate;
use crate::gpu::traits::{Category, DescriptorDevice, DeviceError, RawHeap};
use crate::sync::atomics::AtomicCounter;
use crate::sync::mutex::Mutex;
use crate::{fd_contract, fd_emit, fd_trace};

/// Owner of every host-only heap handed to persistent allocators.
pub struct PersistentPool {
    device: Arc<dyn DescriptorDevice>,
    heaps: Mutex<Vec<RawHeap>>,
    /// Indexed by `Category::index`
    heap_capacities: [u32; 4],
    soft_limit: usize,
    heaps_created: AtomicCounter,
}

impl PersistentPool {
    /// Create an empty pool. `heap_capacities` is indexed by [`Category::index`].
    pub fn new(device: Arc<dyn DescriptorDevice>, heap_capacities: [u32; 4], soft_limit: usize) -> Self {
        Self {
            device,
            heaps: Mutex::new(Vec::new()),
            heap_capacities,
            soft_limit,
            heaps_created: AtomicCounter::new(0),
        }
    }

    /// Slots in every heap of `category`.
    pub fn heap_capacity(&self, category: Category) -> u32 {
        self.heap_capacities[category.index()]
    }

    /// The device heaps are created on.
    pub fn device(&self) -> &Arc<dyn DescriptorDevice> {
        &self.device
    }

    /// Create a fresh heap and keep ownership of it.
    pub fn request_heap(&self, category: Category) -> Result<RawHeap, DeviceError> {
        let mut heaps = self.heaps.lock();

        let heap = self
            .device
            .create_heap(category, self.heap_capacity(category), false)
            .map_err(|error| {
                fd_emit!(FD201, "persistent {} heap: {}", category, error);
                error
            })?;

        heaps.push(heap.clone());
        self.heaps_created.increment();
        fd_trace!("persistent {} heap {:?} created ({} total)", category, heap.id, heaps.len());

        if heaps.len() == self.soft_limit + 1 {
            fd_emit!(FD302, "{} persistent heaps", heaps.len());
        }

        Ok(heap)
    }

    /// Number of heaps currently owned.
    pub fn heap_count(&self) -> usize {
        self.heaps.lock().len()
    }

    /// Release every heap. Only valid once no handle is in use anymore.
    pub fn destroy_all(&self) {
        let heaps = std::mem::take(&mut *self.heaps.lock());
        for heap in &heaps {
            self.device.destroy_heap(heap);
        }
        fd_trace!("persistent pool destroyed {} heaps", heaps.len());
    }

    /// Heaps created over the pool's lifetime.
    pub fn heaps_created(&self) -> u64 {
        self.heaps_created.get()
    }
}

/// Queues of one transient lane. A heap sits in at most one of
/// `available` and `retired`; heaps in neither are active in a context.
#[derive(Default)]
struct LaneQueues {
    owned: Vec<RawHeap>,
    available: VecDeque<RawHeap>,
    retired: VecDeque<(u64, RawHeap)>,
}

/// One category subtype of the transient pool.
struct Lane {
    category: Category,
    capacity: u32,
    /// Segments discarded by contexts, not yet seen under the lock
    inbox: SegQueue<(u64, RawHeap)>,
    queues: Mutex<LaneQueues>,
    heaps_created: AtomicCounter,
    heaps_reused: AtomicCounter,
    segments_discarded: AtomicCounter,
}

impl Lane {
    fn new(category: Category, capacity: u32) -> Self {
        Self {
            category,
            capacity,
            inbox: SegQueue::new(),
            queues: Mutex::new(LaneQueues::default()),
            heaps_created: AtomicCounter::new(0),
            heaps_reused: AtomicCounter::new(0),
            segments_discarded: AtomicCounter::new(0),
        }
    }
}

/// Owner of every shader-visible segment, shared by all execution contexts.
pub struct TransientPool {
    device: Arc<dyn DescriptorDevice>,
    gate: Arc<dyn CompletionGate>,
    lanes: [Lane; 2],
    soft_limit: usize,
}

impl TransientPool {
    /// Create an empty pool with the given segment capacities.
    pub fn new(
        device: Arc<dyn DescriptorDevice>,
        gate: Arc<dyn CompletionGate>,
        resource_capacity: u32,
        sampler_capacity: u32,
        soft_limit: usize,
    ) -> Self {
        Self {
            device,
            gate,
            lanes: [
                Lane::new(Category::Resource, resource_capacity),
                Lane::new(Category::Sampler, sampler_capacity),
            ],
            soft_limit,
        }
    }

    fn lane(&self, category: Category) -> &Lane {
        match category.transient_lane() {
            Some(index) => &self.lanes[index],
            None => {
                fd_contract!(false, FD103, "{} descriptors are never shader-visible", category);
                &self.lanes[0]
            }
        }
    }

    /// The device segments are created on.
    pub fn device(&self) -> &Arc<dyn DescriptorDevice> {
        &self.device
    }

    /// Slots in every segment of `category`.
    pub fn segment_capacity(&self, category: Category) -> u32 {
        self.lane(category).capacity
    }

    /// Hand out a segment: a reclaimed one when the device has finished with
    /// it, a new one otherwise. Never waits on the completion gate.
    pub fn request_or_reuse_heap(&self, category: Category) -> Result<RawHeap, DeviceError> {
        let lane = self.lane(category);
        let mut queues = lane.queues.lock();

        while let Some(entry) = lane.inbox.pop() {
            queues.retired.push_back(entry);
        }

        let mut index = 0;
        while index < queues.retired.len() {
            if self.gate.is_value_reached(queues.retired[index].0) {
                if let Some((value, heap)) = queues.retired.swap_remove_back(index) {
                    fd_trace!("{} segment {:?} reclaimed at value {}", category, heap.id, value);
                    queues.available.push_back(heap);
                }
            } else {
                index += 1;
            }
        }

        if let Some(heap) = queues.available.pop_front() {
            lane.heaps_reused.increment();
            return Ok(heap);
        }

        let heap = self
            .device
            .create_heap(category, lane.capacity, true)
            .map_err(|error| {
                fd_emit!(FD201, "transient {} segment: {}", category, error);
                error
            })?;

        queues.owned.push(heap.clone());
        lane.heaps_created.increment();
        fd_trace!("{} segment {:?} created ({} total)", category, heap.id, queues.owned.len());

        if queues.owned.len() == self.soft_limit + 1 {
            fd_emit!(
                FD301,
                "{} lane owns {} segments, {} waiting on the gate",
                category,
                queues.owned.len(),
                queues.retired.len()
            );
        }

        Ok(heap)
    }

    /// Retire segments until the device reaches `completion_value`.
    ///
    /// Callable from any number of contexts at once.
    pub fn discard<I>(&self, category: Category, completion_value: u64, heaps: I)
    where
        I: IntoIterator<Item = RawHeap>,
    {
        let lane = self.lane(category);
        for heap in heaps {
            fd_contract!(
                heap.category == lane.category,
                FD902,
                "{} segment {:?} discarded into the {} lane",
                heap.category,
                heap.id,
                lane.category
            );
            lane.segments_discarded.increment();
            lane.inbox.push((completion_value, heap));
        }
    }

    /// Release every segment of both lanes. Only valid at shutdown, once no
    /// context holds an active segment.
    pub fn destroy_all(&self) {
        for lane in &self.lanes {
            let mut queues = lane.queues.lock();
            while lane.inbox.pop().is_some() {}
            queues.available.clear();
            queues.retired.clear();
            for heap in queues.owned.drain(..) {
                self.device.destroy_heap(&heap);
            }
        }
        fd_trace!("transient pool destroyed");
    }

    /// Snapshot of one lane's statistics.
    pub fn stats(&self, category: Category) -> TransientLaneStats {
        let lane = self.lane(category);
        let queues = lane.queues.lock();
        TransientLaneStats {
            category: lane.category,
            heaps_created: lane.heaps_created.get(),
            heaps_reused: lane.heaps_reused.get(),
            segments_discarded: lane.segments_discarded.get(),
            heaps_owned: queues.owned.len(),
            available: queues.available.len(),
            retired: queues.retired.len() + lane.inbox.len(),
        }
    }
}

#[cfg(test)]
impl TransientPool {
    /// Ids currently in the available and retired queues (inbox included).
    fn queue_ids(&self, category: Category) -> (Vec<u64>, Vec<u64>) {
        let lane = self.lane(category);
        let mut queues = lane.queues.lock();
        while let Some(entry) = lane.inbox.pop() {
            queues.retired.push_back(entry);
        }
        (
            queues.available.iter().map(|h| h.id.0).collect(),
            queues.retired.iter().map(|(_, h)| h.id.0).collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::dummy::DummyDevice;
    use crate::gpu::fence::FenceCounter;

    fn transient(device: &Arc<DummyDevice>, fence: &Arc<FenceCounter>) -> TransientPool {
        TransientPool::new(device.clone(), fence.clone(), 16, 8, 64)
    }

    #[test]
    fn test_persistent_pool_appends() {
        let device = Arc::new(DummyDevice::new());
        let pool = PersistentPool::new(device.clone(), [256, 256, 32, 32], 64);

        let a = pool.request_heap(Category::Resource).unwrap();
        let b = pool.request_heap(Category::RenderTarget).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(a.capacity, 256);
        assert_eq!(b.capacity, 32);
        assert!(!a.is_shader_visible());
        assert_eq!(pool.heap_count(), 2);

        pool.destroy_all();
        assert_eq!(pool.heap_count(), 0);
        assert_eq!(device.live_heap_count(), 0);
    }

    #[test]
    fn test_not_reused_before_completion() {
        let device = Arc::new(DummyDevice::new());
        let fence = Arc::new(FenceCounter::new());
        let pool = transient(&device, &fence);

        let first = pool.request_or_reuse_heap(Category::Resource).unwrap();
        let value = fence.next_value();
        pool.discard(Category::Resource, value, vec![first.clone()]);

        let second = pool.request_or_reuse_heap(Category::Resource).unwrap();
        assert_ne!(first.id, second.id);

        fence.signal(value);
        let third = pool.request_or_reuse_heap(Category::Resource).unwrap();
        assert_eq!(third.id, first.id);

        let stats = pool.stats(Category::Resource);
        assert_eq!(stats.heaps_created, 2);
        assert_eq!(stats.heaps_reused, 1);
    }

    #[test]
    fn test_heap_in_one_queue_only() {
        let device = Arc::new(DummyDevice::new());
        let fence = Arc::new(FenceCounter::new());
        let pool = transient(&device, &fence);

        let heaps: Vec<_> = (0..4)
            .map(|_| pool.request_or_reuse_heap(Category::Sampler).unwrap())
            .collect();
        pool.discard(Category::Sampler, 1, heaps[..2].to_vec());
        pool.discard(Category::Sampler, 2, heaps[2..].to_vec());
        fence.signal(1);

        // Reclaims value 1 and hands one of them out
        let reused = pool.request_or_reuse_heap(Category::Sampler).unwrap();
        let (available, retired) = pool.queue_ids(Category::Sampler);

        assert_eq!(available.len(), 1);
        assert_eq!(retired.len(), 2);
        for id in &available {
            assert!(!retired.contains(id));
            assert_ne!(*id, reused.id.0);
        }
        assert!(!retired.contains(&reused.id.0));
    }

    #[test]
    fn test_lanes_are_independent() {
        let device = Arc::new(DummyDevice::new());
        let fence = Arc::new(FenceCounter::new());
        let pool = transient(&device, &fence);

        let sampler = pool.request_or_reuse_heap(Category::Sampler).unwrap();
        pool.discard(Category::Sampler, 0, vec![sampler]);

        // A completed sampler segment is never handed to the resource lane
        let resource = pool.request_or_reuse_heap(Category::Resource).unwrap();
        assert_eq!(resource.category, Category::Resource);
        assert_eq!(resource.capacity, 16);
        assert_eq!(pool.segment_capacity(Category::Sampler), 8);
    }

    #[test]
    fn test_creation_failure_propagates() {
        let device = Arc::new(DummyDevice::new());
        let fence = Arc::new(FenceCounter::new());
        let pool = transient(&device, &fence);

        crate::diagnostics::suppress_diagnostics(true);
        device.lose_device();
        let result = pool.request_or_reuse_heap(Category::Resource);
        crate::diagnostics::suppress_diagnostics(false);

        assert_eq!(result, Err(DeviceError::DeviceLost));
        assert_eq!(pool.stats(Category::Resource).heaps_owned, 0);
    }
}
