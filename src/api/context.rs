//! Execution contexts: the renderer-facing binding entry points.

use std::sync::Arc;

use crate::allocators::handle::{DescriptorHandle, GpuAddress};
use crate::allocators::pool::TransientPool;
use crate::allocators::transient::TransientHeapAllocator;
use crate::api::config::DescriptorConfig;
use crate::gpu::layout::BindingLayout;
use crate::gpu::traits::{Category, Consumer, DeviceError, TableBinder};

/// Per-command-list binding state.
///
/// One context records one submission at a time on one thread. It owns a
/// transient allocator for resource descriptors and one for samplers, each
/// with a graphics and a compute binding cache. Contexts are `Send` but not
/// shared; create one per recording thread with
/// [`DescriptorSystem::create_context`](crate::DescriptorSystem::create_context).
///
/// # Example
///
/// ```rust,ignore
/// ctx.set_layout(Consumer::Graphics, &layout);
/// ctx.stage_handles(Consumer::Graphics, 0, 0, &[albedo, normal]);
/// ctx.stage_handle(Consumer::Graphics, 1, 0, linear_sampler);
/// ctx.flush_bindings(Consumer::Graphics, &mut cmd)?;
/// // draw ...
/// ctx.end_of_submission(fence.next_value());
/// ```
///
/// A context dropped without `end_of_submission` keeps its segments out of
/// circulation until the system shuts down.
pub struct ExecutionContext {
    resources: TransientHeapAllocator,
    samplers: TransientHeapAllocator,
}

impl ExecutionContext {
    pub(crate) fn new(pool: Arc<TransientPool>, config: &DescriptorConfig) -> Self {
        Self {
            resources: TransientHeapAllocator::new(
                Category::Resource,
                pool.clone(),
                config.max_cached_handles,
                config.max_copy_ranges,
            ),
            samplers: TransientHeapAllocator::new(
                Category::Sampler,
                pool,
                config.max_cached_handles,
                config.max_copy_ranges,
            ),
        }
    }

    /// Transient allocator serving `category`.
    ///
    /// Host-only categories have no transient allocator; they get the
    /// resource one.
    pub fn allocator(&self, category: Category) -> &TransientHeapAllocator {
        match category {
            Category::Sampler => &self.samplers,
            _ => &self.resources,
        }
    }

    /// Bind a new layout for `consumer`. Forgets everything staged for it.
    pub fn set_layout(&mut self, consumer: Consumer, layout: &BindingLayout) {
        self.resources.bind_layout(consumer, layout);
        self.samplers.bind_layout(consumer, layout);
    }

    /// Stage resource handles into a table of the current layout.
    pub fn stage_handles(&mut self, consumer: Consumer, table: usize, offset: u32, handles: &[DescriptorHandle]) {
        self.resources.cache_mut(consumer).stage(table, offset, handles);
    }

    /// Stage sampler handles into a table of the current layout.
    pub fn stage_samplers(&mut self, consumer: Consumer, table: usize, offset: u32, handles: &[DescriptorHandle]) {
        self.samplers.cache_mut(consumer).stage(table, offset, handles);
    }

    /// Stage a single handle. The table's category decides which cache it
    /// goes to.
    pub fn stage_handle(&mut self, consumer: Consumer, table: usize, offset: u32, handle: DescriptorHandle) {
        let handles = std::slice::from_ref(&handle);
        if self.samplers.cache(consumer).has_table(table) {
            self.stage_samplers(consumer, table, offset, handles);
        } else {
            self.stage_handles(consumer, table, offset, handles);
        }
    }

    /// Copy every stale table of `consumer` to the device and bind it.
    pub fn flush_bindings(&mut self, consumer: Consumer, binder: &mut dyn TableBinder) -> Result<(), DeviceError> {
        self.resources.flush_bindings(consumer, binder)?;
        self.samplers.flush_bindings(consumer, binder)
    }

    /// Copy one resource descriptor somewhere the device can see it, outside
    /// any table.
    pub fn upload_direct(&mut self, handle: DescriptorHandle, binder: &mut dyn TableBinder) -> Result<GpuAddress, DeviceError> {
        self.resources.upload_direct(handle, binder)
    }

    /// Close the submission: every segment it used is reclaimed once the
    /// device reaches `completion_value`.
    pub fn end_of_submission(&mut self, completion_value: u64) {
        self.resources.end_of_submission(completion_value);
        self.samplers.end_of_submission(completion_value);
    }
}
