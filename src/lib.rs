//! # descalloc
//!
//! Descriptor allocation for GPU renderers, with fence-gated reclamation.
//!
//! ## Features
//!
//! - Persistent bump allocation of long-lived resource handles
//! - Per-submission transient segments, recycled only once the device has
//!   signaled completion
//! - Binding caches that stage handles on the host and copy only the
//!   assigned slots of stale tables, in batched device calls
//! - Sampler deduplication and caller-owned shader-visible heaps
//! - Coded diagnostics with strict mode, optional `log` routing
//!
//! The crate never talks to a graphics API. The host renderer implements
//! [`DescriptorDevice`], [`CompletionGate`] and [`TableBinder`];
//! [`DummyDevice`] does so in memory for tests.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use descalloc::{
//!     BindingLayout, Category, Consumer, DescriptorConfig, DescriptorSystem, DummyBinder,
//!     DummyDevice, FenceCounter,
//! };
//!
//! let device = Arc::new(DummyDevice::new());
//! let fence = Arc::new(FenceCounter::new());
//! let system = DescriptorSystem::new(device, fence.clone(), DescriptorConfig::default()).unwrap();
//!
//! // Long-lived views
//! let albedo = system.allocate(Category::Resource, 1).unwrap();
//! let normal = system.allocate(Category::Resource, 1).unwrap();
//!
//! let layout = BindingLayout::builder()
//!     .constants(4)
//!     .table(Category::Resource, 8)
//!     .build();
//!
//! // One submission
//! let mut ctx = system.create_context();
//! let mut cmd = DummyBinder::new();
//! ctx.set_layout(Consumer::Graphics, &layout);
//! ctx.stage_handles(Consumer::Graphics, 1, 0, &[albedo, normal]);
//! ctx.flush_bindings(Consumer::Graphics, &mut cmd).unwrap();
//! ctx.end_of_submission(fence.next_value());
//!
//! assert_eq!(cmd.tables().len(), 1);
//! ```

pub mod api;
pub mod diagnostics;
pub mod gpu;

mod allocators;
mod sync;
mod util;

#[cfg(feature = "log")]
#[doc(hidden)]
pub use log as __log;

// Re-export public API at crate root for convenience
pub use api::config::{ConfigError, DescriptorConfig};
pub use api::context::ExecutionContext;
pub use api::stats::{PersistentStats, SystemStats, TransientLaneStats};
pub use api::system::DescriptorSystem;

// Allocators
pub use allocators::binding_cache::{BindingCache, CopyBatch};
pub use allocators::handle::{CpuAddress, DescriptorHandle, GpuAddress};
pub use allocators::persistent::{DescriptorAllocator, HandleAllocators};
pub use allocators::pool::{PersistentPool, TransientPool};
pub use allocators::sampler_cache::SamplerCache;
pub use allocators::transient::TransientHeapAllocator;
pub use allocators::user_heap::UserDescriptorHeap;

// Device interfaces
pub use gpu::{
    AddressMode, BindingLayout, BindingLayoutBuilder, Category, CompletionGate, Consumer,
    CopyRange, DescriptorDevice, DeviceError, FenceCounter, Filter, HeapId, RawHeap,
    RootParameter, SamplerDesc, TableBinder,
};
pub use gpu::{BinderCall, DeviceCall, DummyBinder, DummyDevice};

// Bit scans
pub use util::bitset::{BitSet, ParamSet, SlotSet};

// Diagnostics - Core types and predefined codes
pub use diagnostics::{Diagnostic, DiagnosticKind};
pub use diagnostics::{StrictMode, set_strict_mode, StrictModeGuard};
pub use diagnostics::{
    FD101, FD102, FD103, FD104, FD105, FD106, FD107, FD108, FD201, FD301, FD302, FD901, FD902,
};
