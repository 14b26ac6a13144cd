//! Transient, per-submission allocation of shader-visible slots.
//!
//! Each execution context owns one allocator per shader-visible category.
//! Slots are bumped out of the active segment; when it runs out the segment
//! is set aside and a fresh one is pulled from the pool. Set-aside segments
//! go back to the pool at the end of the submission, tagged with the value
//! that marks the submission complete.

use std::sync::Arc;

use crate::allocators::binding_cache::BindingCache;
use crate::allocators::handle::{CpuAddress, DescriptorHandle, GpuAddress};
use crate::allocators::pool::TransientPool;
use crate::gpu::layout::BindingLayout;
use crate::gpu::traits::{Category, Consumer, DeviceError, RawHeap, TableBinder};
use crate::{fd_contract, fd_trace};

/// The segment slots are currently bumped out of.
#[derive(Debug)]
struct ActiveSegment {
    heap: RawHeap,
    gpu_base: GpuAddress,
    /// Whether the current command list has been told about this segment
    announced: bool,
}

/// Bump allocator over transient segments plus the two binding caches
/// (graphics and compute) that feed it.
pub struct TransientHeapAllocator {
    category: Category,
    pool: Arc<TransientPool>,
    segment: Option<ActiveSegment>,
    offset: u32,
    /// Used segments waiting for the end of the submission
    pending: Vec<RawHeap>,
    caches: [BindingCache; 2],
    max_copy_ranges: usize,
}

impl TransientHeapAllocator {
    /// Create an allocator with no active segment.
    pub fn new(
        category: Category,
        pool: Arc<TransientPool>,
        cache_capacity: u32,
        max_copy_ranges: usize,
    ) -> Self {
        Self {
            category,
            pool,
            segment: None,
            offset: 0,
            pending: Vec::new(),
            caches: Consumer::ALL.map(|consumer| BindingCache::new(consumer, category, cache_capacity)),
            max_copy_ranges,
        }
    }

    /// Category of every slot handed out.
    pub fn category(&self) -> Category {
        self.category
    }

    /// Binding cache feeding `consumer`.
    pub fn cache(&self, consumer: Consumer) -> &BindingCache {
        &self.caches[consumer.index()]
    }

    /// Mutable binding cache feeding `consumer`.
    pub fn cache_mut(&mut self, consumer: Consumer) -> &mut BindingCache {
        &mut self.caches[consumer.index()]
    }

    /// Lay out `consumer`'s cache for a new binding layout.
    pub fn bind_layout(&mut self, consumer: Consumer, layout: &BindingLayout) {
        self.cache_mut(consumer).bind_layout(layout);
    }

    /// Slots used in the active segment.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// The active segment, if any.
    pub fn active_heap(&self) -> Option<&RawHeap> {
        self.segment.as_ref().map(|segment| &segment.heap)
    }

    /// Segments used this submission and no longer active.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Whether `count` more slots fit in the active segment.
    pub fn has_space(&self, count: u32) -> bool {
        self.segment
            .as_ref()
            .map_or(false, |segment| segment.heap.capacity - self.offset >= count)
    }

    /// Make sure the active segment has `needed` free slots, switching to a
    /// fresh segment if not. Tables already bound from the old segment are
    /// marked stale again on both caches.
    pub fn ensure_space(&mut self, needed: u32, binder: &mut dyn TableBinder) -> Result<(), DeviceError> {
        let capacity = self.pool.segment_capacity(self.category);
        fd_contract!(
            needed <= capacity,
            FD106,
            "{} {} slots needed, segments hold {}",
            needed,
            self.category,
            capacity
        );

        if !self.has_space(needed) {
            self.retire_current();
            self.unbind_all_assigned();

            if self.segment.is_none() {
                let heap = self.pool.request_or_reuse_heap(self.category)?;
                let gpu_base = heap.gpu_base.ok_or_else(|| {
                    DeviceError::Backend(format!("{} segment {:?} is not shader-visible", self.category, heap.id))
                })?;
                fd_trace!("{} segment {:?} active", self.category, heap.id);
                self.segment = Some(ActiveSegment {
                    heap,
                    gpu_base,
                    announced: false,
                });
                self.offset = 0;
            }
        }

        if let Some(segment) = self.segment.as_mut() {
            if !segment.announced {
                binder.set_descriptor_heap(self.category, &segment.heap);
                segment.announced = true;
            }
        }
        Ok(())
    }

    /// Take `count` slots from the active segment. Room must have been made
    /// with `ensure_space`.
    pub fn allocate(&mut self, count: u32) -> DescriptorHandle {
        let Some(segment) = self.segment.as_ref() else {
            fd_contract!(false, FD902, "{} allocation without an active segment", self.category);
            return DescriptorHandle::NULL;
        };
        fd_contract!(
            segment.heap.capacity - self.offset >= count,
            FD106,
            "{} slots requested, {} left",
            count,
            segment.heap.capacity - self.offset
        );

        let handle = DescriptorHandle::shader_visible(segment.heap.cpu_base, segment.gpu_base)
            .offset(self.offset, segment.heap.stride);
        self.offset += count;
        handle
    }

    /// Copy and bind every stale table of `consumer`'s cache.
    pub fn flush_bindings(&mut self, consumer: Consumer, binder: &mut dyn TableBinder) -> Result<(), DeviceError> {
        let needed = self.cache(consumer).compute_needed_size();
        if needed == 0 {
            return Ok(());
        }

        self.ensure_space(needed, binder)?;

        // Switching segments re-stales every assigned table
        let needed = self.cache(consumer).compute_needed_size();
        let destination = self.allocate(needed);

        let pool = Arc::clone(&self.pool);
        let max_ranges = self.max_copy_ranges;
        self.cache_mut(consumer)
            .flush(destination, &**pool.device(), binder, max_ranges);
        Ok(())
    }

    /// Copy one descriptor into the active segment and return where the
    /// device can see it.
    pub fn upload_direct(&mut self, handle: DescriptorHandle, binder: &mut dyn TableBinder) -> Result<GpuAddress, DeviceError> {
        fd_contract!(handle.cpu().is_some(), FD108, "direct upload of {:?}", handle);
        let source = handle.cpu().unwrap_or(CpuAddress(0));

        self.ensure_space(1, binder)?;
        let dest = self.allocate(1);

        if let (Some(dest_cpu), Some(dest_gpu)) = (dest.cpu(), dest.gpu()) {
            self.pool
                .device()
                .copy_descriptors_simple(1, dest_cpu, source, self.category);
            return Ok(dest_gpu);
        }
        Err(DeviceError::Backend(format!("no active {} segment for a direct upload", self.category)))
    }

    /// Hand every segment used by this submission back to the pool, tagged
    /// with `completion_value`, and reset both caches.
    pub fn end_of_submission(&mut self, completion_value: u64) {
        self.retire_current();

        if !self.pending.is_empty() {
            fd_trace!(
                "{} segments retired at value {}: {}",
                self.category,
                completion_value,
                self.pending.len()
            );
            self.pool
                .discard(self.category, completion_value, self.pending.drain(..));
        }

        // An unused segment stays active but the next command list must see it
        if let Some(segment) = self.segment.as_mut() {
            segment.announced = false;
        }

        for cache in &mut self.caches {
            cache.clear();
        }
    }

    fn retire_current(&mut self) {
        if self.offset == 0 {
            return;
        }
        match self.segment.take() {
            Some(segment) => self.pending.push(segment.heap),
            None => fd_contract!(false, FD902, "offset {} without an active segment", self.offset),
        }
        self.offset = 0;
    }

    fn unbind_all_assigned(&mut self) {
        for cache in &mut self.caches {
            cache.unbind_all_assigned();
        }
    }
}
