//! Caller-owned shader-visible heap.
//!
//! For descriptors that must stay visible to the device for as long as the
//! caller likes (bindless tables, UI atlases). Slots are bumped out of one
//! fixed heap and never recycled; the heap is released when dropped.

use std::sync::Arc;

use crate::allocators::handle::DescriptorHandle;
use crate::fd_contract;
use crate::gpu::traits::{Category, DescriptorDevice, DeviceError, RawHeap};

/// A fixed-size, shader-visible heap with a bump cursor.
pub struct UserDescriptorHeap {
    device: Arc<dyn DescriptorDevice>,
    heap: RawHeap,
    next_free: u32,
}

impl UserDescriptorHeap {
    /// Create a heap of `capacity` shader-visible slots.
    pub fn new(device: Arc<dyn DescriptorDevice>, category: Category, capacity: u32) -> Result<Self, DeviceError> {
        let heap = device.create_heap(category, capacity, true)?;
        Ok(Self {
            device,
            heap,
            next_free: 0,
        })
    }

    /// The underlying heap, for `TableBinder::set_descriptor_heap`.
    pub fn heap(&self) -> &RawHeap {
        &self.heap
    }

    /// Total slots.
    pub fn capacity(&self) -> u32 {
        self.heap.capacity
    }

    /// Slots not yet allocated.
    pub fn free_slots(&self) -> u32 {
        self.heap.capacity - self.next_free
    }

    /// Whether `count` more slots fit.
    pub fn has_available_space(&self, count: u32) -> bool {
        count <= self.free_slots()
    }

    /// Take `count` consecutive slots.
    pub fn alloc(&mut self, count: u32) -> DescriptorHandle {
        fd_contract!(
            self.has_available_space(count),
            FD105,
            "{} slots requested, {} of {} free",
            count,
            self.free_slots(),
            self.heap.capacity
        );
        let handle = self.heap.handle_at(self.next_free);
        self.next_free = (self.next_free + count).min(self.heap.capacity);
        handle
    }

    /// Handle to the slot at `offset`, allocated or not.
    pub fn handle_at_offset(&self, offset: u32) -> DescriptorHandle {
        self.heap.handle_at(offset)
    }

    /// Whether `handle` points into this heap with matching host and device
    /// offsets.
    pub fn validate_handle(&self, handle: &DescriptorHandle) -> bool {
        let (Some(cpu), Some(gpu), Some(gpu_base)) = (handle.cpu(), handle.gpu(), self.heap.gpu_base) else {
            return false;
        };
        let size = u64::from(self.heap.capacity) * u64::from(self.heap.stride);
        let base = self.heap.cpu_base.0;

        if cpu.0 < base || cpu.0 >= base + size {
            return false;
        }
        gpu.0.checked_sub(gpu_base.0) == Some(cpu.0 - base)
    }
}

impl Drop for UserDescriptorHeap {
    fn drop(&mut self) {
        self.device.destroy_heap(&self.heap);
    }
}
