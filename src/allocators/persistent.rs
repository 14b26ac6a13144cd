//! Persistent handle allocation.
//!
//! A bump allocator over host-only heaps. Handles live for the lifetime of
//! the system; slots are never returned individually and a partially used
//! heap is abandoned as soon as a request does not fit in what is left.

use std::sync::Arc;

use crate::allocators::handle::DescriptorHandle;
use crate::allocators::pool::PersistentPool;
use crate::gpu::traits::{Category, DeviceError, RawHeap};
use crate::sync::atomics::AtomicCounter;
use crate::sync::mutex::Mutex;
use crate::{fd_contract, fd_trace};

/// Bump allocator for one category.
pub struct DescriptorAllocator {
    category: Category,
    pool: Arc<PersistentPool>,
    current: Option<RawHeap>,
    cursor: DescriptorHandle,
    remaining: u32,
    /// Queried from the device on first use
    stride: Option<u32>,
}

impl DescriptorAllocator {
    /// Create an allocator that has not touched the device yet.
    pub fn new(category: Category, pool: Arc<PersistentPool>) -> Self {
        Self {
            category,
            pool,
            current: None,
            cursor: DescriptorHandle::NULL,
            remaining: 0,
            stride: None,
        }
    }

    /// Category served by this allocator.
    pub fn category(&self) -> Category {
        self.category
    }

    /// Slots left in the current heap.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    fn stride(&mut self) -> u32 {
        *self
            .stride
            .get_or_insert_with(|| self.pool.device().descriptor_stride(self.category))
    }

    /// Carve `count` consecutive slots and return a host-only handle to the
    /// first one.
    pub fn allocate(&mut self, count: u32) -> Result<DescriptorHandle, DeviceError> {
        let capacity = self.pool.heap_capacity(self.category);
        fd_contract!(
            count >= 1 && count <= capacity,
            FD101,
            "{} {} slots requested, heaps hold {}",
            count,
            self.category,
            capacity
        );

        if self.current.is_none() || self.remaining < count {
            let heap = self.pool.request_heap(self.category)?;
            self.cursor = DescriptorHandle::host(heap.cpu_base);
            self.remaining = heap.capacity;
            self.current = Some(heap);
        }

        let stride = self.stride();
        let handle = self.cursor;
        self.cursor = self.cursor.offset(count, stride);
        self.remaining = self.remaining.saturating_sub(count);

        fd_trace!("{} x{} at {:?}", self.category, count, handle.cpu());
        Ok(handle)
    }

    /// Forget the current heap. The pool still owns it.
    pub fn reset(&mut self) {
        self.current = None;
        self.cursor = DescriptorHandle::NULL;
        self.remaining = 0;
    }
}

/// One persistent allocator per category, callable from any thread.
pub struct HandleAllocators {
    allocators: [Mutex<DescriptorAllocator>; 4],
    slots_allocated: AtomicCounter,
}

impl HandleAllocators {
    /// Create the allocators over a shared pool.
    pub fn new(pool: Arc<PersistentPool>) -> Self {
        Self {
            allocators: Category::ALL
                .map(|category| Mutex::new(DescriptorAllocator::new(category, pool.clone()))),
            slots_allocated: AtomicCounter::new(0),
        }
    }

    /// Allocate `count` slots of `category`.
    pub fn allocate(&self, category: Category, count: u32) -> Result<DescriptorHandle, DeviceError> {
        let handle = self.allocators[category.index()].lock().allocate(count)?;
        self.slots_allocated.add(u64::from(count));
        Ok(handle)
    }

    /// Slots handed out over the lifetime of the allocators.
    pub fn slots_allocated(&self) -> u64 {
        self.slots_allocated.get()
    }

    /// Reset every category. Teardown only.
    pub fn reset(&self) {
        for allocator in &self.allocators {
            allocator.lock().reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::dummy::{DeviceCall, DummyDevice};
    use crate::gpu::traits::DescriptorDevice;

    fn allocator(capacity: u32) -> (Arc<DummyDevice>, DescriptorAllocator) {
        let device = Arc::new(DummyDevice::new());
        let pool = Arc::new(PersistentPool::new(device.clone(), [capacity; 4], 64));
        (device, DescriptorAllocator::new(Category::Resource, pool))
    }

    fn heaps_created(device: &DummyDevice) -> usize {
        device
            .calls()
            .iter()
            .filter(|call| matches!(call, DeviceCall::CreateHeap { .. }))
            .count()
    }

    #[test]
    fn test_consecutive_allocations_are_disjoint() {
        let (device, mut alloc) = allocator(256);
        let stride = u64::from(device.descriptor_stride(Category::Resource));

        let a = alloc.allocate(3).unwrap();
        let b = alloc.allocate(5).unwrap();
        let c = alloc.allocate(1).unwrap();

        let a0 = a.cpu().unwrap().0;
        assert_eq!(b.cpu().unwrap().0, a0 + 3 * stride);
        assert_eq!(c.cpu().unwrap().0, a0 + 8 * stride);
        assert!(!a.is_shader_visible());
        assert_eq!(alloc.remaining(), 256 - 9);
        assert_eq!(heaps_created(&device), 1);
    }

    #[test]
    fn test_request_that_does_not_fit_takes_new_heap() {
        let (device, mut alloc) = allocator(256);

        let first = alloc.allocate(200).unwrap();
        let second = alloc.allocate(100).unwrap();

        assert_eq!(heaps_created(&device), 2);
        assert_eq!(alloc.remaining(), 156);
        // The 56 leftover slots of the first heap are abandoned
        assert!(second.cpu().unwrap().0 > first.cpu().unwrap().0 + 256 * 32);
    }

    #[test]
    fn test_exact_fit_stays_in_heap() {
        let (device, mut alloc) = allocator(8);
        alloc.allocate(4).unwrap();
        alloc.allocate(4).unwrap();
        assert_eq!(heaps_created(&device), 1);
        assert_eq!(alloc.remaining(), 0);
    }

    #[test]
    #[should_panic(expected = "FD101")]
    fn test_oversized_request_is_contract_violation() {
        let (_device, mut alloc) = allocator(16);
        let _ = alloc.allocate(17);
    }

    #[test]
    #[should_panic(expected = "FD101")]
    fn test_zero_request_is_contract_violation() {
        let (_device, mut alloc) = allocator(16);
        let _ = alloc.allocate(0);
    }

    #[test]
    fn test_categories_are_independent() {
        let device = Arc::new(DummyDevice::new());
        let pool = Arc::new(PersistentPool::new(device.clone(), [64; 4], 64));
        let allocators = HandleAllocators::new(pool.clone());

        let rtv = allocators.allocate(Category::RenderTarget, 2).unwrap();
        let dsv = allocators.allocate(Category::DepthStencil, 2).unwrap();
        let srv = allocators.allocate(Category::Resource, 2).unwrap();

        assert_ne!(rtv.cpu(), dsv.cpu());
        assert_ne!(rtv.cpu(), srv.cpu());
        assert_eq!(pool.heap_count(), 3);
        assert_eq!(allocators.slots_allocated(), 6);
    }

    #[test]
    fn test_heaps_roll_over_at_category_capacity() {
        let device = Arc::new(DummyDevice::new());
        let pool = Arc::new(PersistentPool::new(device.clone(), [8, 8, 4, 2], 64));
        let allocators = HandleAllocators::new(pool.clone());

        // Render targets fill a 4-slot heap, depth stencils a 2-slot one
        for _ in 0..4 {
            allocators.allocate(Category::RenderTarget, 1).unwrap();
        }
        for _ in 0..2 {
            allocators.allocate(Category::DepthStencil, 1).unwrap();
        }
        assert_eq!(pool.heap_count(), 2);

        allocators.allocate(Category::DepthStencil, 1).unwrap();
        assert_eq!(pool.heap_count(), 3);
        allocators.allocate(Category::RenderTarget, 1).unwrap();
        assert_eq!(pool.heap_count(), 4);

        let capacities: Vec<(Category, u32)> = device
            .calls()
            .iter()
            .filter_map(|call| match call {
                DeviceCall::CreateHeap { category, capacity, .. } => Some((*category, *capacity)),
                _ => None,
            })
            .collect();
        assert_eq!(
            capacities,
            vec![
                (Category::RenderTarget, 4),
                (Category::DepthStencil, 2),
                (Category::DepthStencil, 2),
                (Category::RenderTarget, 4),
            ]
        );
    }

    #[test]
    #[should_panic(expected = "FD101")]
    fn test_request_checked_against_own_category() {
        let device = Arc::new(DummyDevice::new());
        let pool = Arc::new(PersistentPool::new(device, [64, 64, 64, 4], 64));
        let mut alloc = DescriptorAllocator::new(Category::DepthStencil, pool);
        let _ = alloc.allocate(5);
    }

    #[test]
    fn test_reset_forgets_current_heap() {
        let (device, mut alloc) = allocator(64);
        alloc.allocate(1).unwrap();
        alloc.reset();
        assert_eq!(alloc.remaining(), 0);
        alloc.allocate(1).unwrap();
        assert_eq!(heaps_created(&device), 2);
    }
}
