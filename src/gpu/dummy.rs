//! Dummy device implementation for testing
//!
//! Descriptor slots live in a host-side map and every call is recorded, so
//! tests can check both what was copied and how many device calls it took.
//! No graphics hardware is required.

use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};

use super::traits::*;
use crate::allocators::handle::{CpuAddress, GpuAddress};
use crate::sync::mutex::Mutex;

/// Distance between the host and device address spaces of a heap.
const GPU_ADDRESS_OFFSET: u64 = 0x1000_0000_0000;

/// Gap left between consecutive heaps so overruns never alias.
const HEAP_GUARD_BYTES: u64 = 0x1000;

/// A device call recorded by [`DummyDevice`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    CreateHeap {
        id: HeapId,
        category: Category,
        capacity: u32,
        shader_visible: bool,
    },
    DestroyHeap {
        id: HeapId,
    },
    CopyDescriptors {
        dest: Vec<CopyRange>,
        src: Vec<CopyRange>,
        category: Category,
    },
    CopyDescriptorsSimple {
        count: u32,
        dest: CpuAddress,
        src: CpuAddress,
        category: Category,
    },
    CreateSampler {
        dest: CpuAddress,
    },
}

#[derive(Debug, Default)]
struct DummyState {
    next_heap_id: u64,
    next_address: u64,
    live_heaps: HashSet<HeapId>,
    /// Descriptor payload per host slot address
    slots: HashMap<u64, u64>,
    calls: Vec<DeviceCall>,
    fail_next: Option<DeviceError>,
    lost: bool,
}

/// In-memory device for tests and benchmarks.
#[derive(Debug)]
pub struct DummyDevice {
    state: Mutex<DummyState>,
    record_calls: bool,
}

impl DummyDevice {
    /// Create a device that records every call.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(DummyState {
                next_address: 0x10_0000,
                ..DummyState::default()
            }),
            record_calls: true,
        }
    }

    /// Create a device that keeps no call log (for benchmarks).
    pub fn without_recording() -> Self {
        Self {
            record_calls: false,
            ..Self::new()
        }
    }

    /// Write a descriptor payload into a host slot, as view creation would.
    pub fn write_descriptor(&self, dest: CpuAddress, payload: u64) {
        self.state.lock().slots.insert(dest.0, payload);
    }

    /// Read the payload stored in a host slot.
    pub fn read_descriptor(&self, addr: CpuAddress) -> Option<u64> {
        self.state.lock().slots.get(&addr.0).copied()
    }

    /// Read the payload the device sees at a device address.
    pub fn read_visible(&self, addr: GpuAddress) -> Option<u64> {
        let host = addr.0.checked_sub(GPU_ADDRESS_OFFSET)?;
        self.state.lock().slots.get(&host).copied()
    }

    /// Make the next heap creation fail with `error`.
    pub fn fail_next_heap(&self, error: DeviceError) {
        self.state.lock().fail_next = Some(error);
    }

    /// Make every further heap creation fail with `DeviceError::DeviceLost`.
    pub fn lose_device(&self) {
        self.state.lock().lost = true;
    }

    /// Calls recorded so far.
    pub fn calls(&self) -> Vec<DeviceCall> {
        self.state.lock().calls.clone()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Batched copy calls recorded so far.
    pub fn copy_calls(&self) -> Vec<(Vec<CopyRange>, Vec<CopyRange>)> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                DeviceCall::CopyDescriptors { dest, src, .. } => Some((dest.clone(), src.clone())),
                _ => None,
            })
            .collect()
    }

    /// Number of heaps created and not yet destroyed.
    pub fn live_heap_count(&self) -> usize {
        self.state.lock().live_heaps.len()
    }

    fn record(&self, state: &mut DummyState, call: DeviceCall) {
        if self.record_calls {
            state.calls.push(call);
        }
    }

    fn expand(ranges: &[CopyRange], stride: u32) -> Vec<u64> {
        ranges
            .iter()
            .flat_map(|r| (0..u64::from(r.count)).map(move |i| r.start.0 + i * u64::from(stride)))
            .collect()
    }
}

impl Default for DummyDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl DescriptorDevice for DummyDevice {
    fn create_heap(
        &self,
        category: Category,
        capacity: u32,
        shader_visible: bool,
    ) -> Result<RawHeap, DeviceError> {
        if capacity == 0 {
            return Err(DeviceError::Backend("zero-sized descriptor heap".to_string()));
        }
        if shader_visible && !category.is_shader_visible_capable() {
            return Err(DeviceError::Backend(format!(
                "{} heaps cannot be shader-visible",
                category
            )));
        }

        let stride = self.descriptor_stride(category);
        let mut state = self.state.lock();
        if state.lost {
            return Err(DeviceError::DeviceLost);
        }
        if let Some(error) = state.fail_next.take() {
            return Err(error);
        }

        state.next_heap_id += 1;
        let id = HeapId(state.next_heap_id);
        let cpu_base = CpuAddress(state.next_address);
        state.next_address += u64::from(capacity) * u64::from(stride) + HEAP_GUARD_BYTES;
        state.live_heaps.insert(id);

        self.record(
            &mut state,
            DeviceCall::CreateHeap {
                id,
                category,
                capacity,
                shader_visible,
            },
        );

        Ok(RawHeap {
            id,
            category,
            capacity,
            stride,
            cpu_base,
            gpu_base: shader_visible.then(|| GpuAddress(cpu_base.0 + GPU_ADDRESS_OFFSET)),
        })
    }

    fn destroy_heap(&self, heap: &RawHeap) {
        let mut state = self.state.lock();
        state.live_heaps.remove(&heap.id);
        let size = u64::from(heap.capacity) * u64::from(heap.stride);
        let base = heap.cpu_base.0;
        state.slots.retain(|addr, _| *addr < base || *addr >= base + size);
        self.record(&mut state, DeviceCall::DestroyHeap { id: heap.id });
    }

    fn descriptor_stride(&self, category: Category) -> u32 {
        match category {
            Category::Resource | Category::Sampler | Category::RenderTarget => 32,
            Category::DepthStencil => 8,
        }
    }

    fn copy_descriptors(&self, dest: &[CopyRange], src: &[CopyRange], category: Category) {
        let stride = self.descriptor_stride(category);
        let dest_slots = Self::expand(dest, stride);
        let src_slots = Self::expand(src, stride);
        assert_eq!(
            dest_slots.len(),
            src_slots.len(),
            "copy_descriptors: destination and source slot counts differ"
        );

        let mut state = self.state.lock();
        for (d, s) in dest_slots.iter().zip(&src_slots) {
            match state.slots.get(s).copied() {
                Some(payload) => state.slots.insert(*d, payload),
                None => state.slots.remove(d),
            };
        }
        self.record(
            &mut state,
            DeviceCall::CopyDescriptors {
                dest: dest.to_vec(),
                src: src.to_vec(),
                category,
            },
        );
    }

    fn copy_descriptors_simple(
        &self,
        count: u32,
        dest: CpuAddress,
        src: CpuAddress,
        category: Category,
    ) {
        let stride = u64::from(self.descriptor_stride(category));
        let mut state = self.state.lock();
        for i in 0..u64::from(count) {
            match state.slots.get(&(src.0 + i * stride)).copied() {
                Some(payload) => state.slots.insert(dest.0 + i * stride, payload),
                None => state.slots.remove(&(dest.0 + i * stride)),
            };
        }
        self.record(
            &mut state,
            DeviceCall::CopyDescriptorsSimple {
                count,
                dest,
                src,
                category,
            },
        );
    }

    fn create_sampler(&self, desc: &SamplerDesc, dest: CpuAddress) {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        desc.hash(&mut hasher);
        let mut state = self.state.lock();
        state.slots.insert(dest.0, hasher.finish());
        self.record(&mut state, DeviceCall::CreateSampler { dest });
    }
}

/// A binder call recorded by [`DummyBinder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BinderCall {
    SetHeap {
        category: Category,
        heap: HeapId,
    },
    SetTable {
        consumer: Consumer,
        root_index: u32,
        base: GpuAddress,
    },
}

/// Command-list stand-in that records what was bound.
#[derive(Debug, Default)]
pub struct DummyBinder {
    pub calls: Vec<BinderCall>,
}

impl DummyBinder {
    /// Create an empty binder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Table bindings recorded so far, as `(consumer, root_index, base)`.
    pub fn tables(&self) -> Vec<(Consumer, u32, GpuAddress)> {
        self.calls
            .iter()
            .filter_map(|call| match *call {
                BinderCall::SetTable {
                    consumer,
                    root_index,
                    base,
                } => Some((consumer, root_index, base)),
                _ => None,
            })
            .collect()
    }
}

impl TableBinder for DummyBinder {
    fn set_descriptor_heap(&mut self, category: Category, heap: &RawHeap) {
        self.calls.push(BinderCall::SetHeap {
            category,
            heap: heap.id,
        });
    }

    fn set_descriptor_table(&mut self, consumer: Consumer, root_index: u32, base: GpuAddress) {
        self.calls.push(BinderCall::SetTable {
            consumer,
            root_index,
            base,
        });
    }
}
