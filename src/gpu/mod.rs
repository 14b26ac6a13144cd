//! Device-facing interfaces.
//!
//! The crate never talks to a graphics API directly. Everything it needs from
//! the device, the command list and the hardware timeline is expressed by the
//! traits here, and implemented by the host renderer.
//!
//! ## Contents
//! - `traits`: categories, heaps, `DescriptorDevice` and `TableBinder`
//! - `fence`: `CompletionGate` and the in-process `FenceCounter`
//! - `layout`: binding layouts (root signatures)
//! - `dummy`: in-memory device for tests and benchmarks

// Always present for API stability: traits define the interface
pub mod traits;
pub use traits::{
    AddressMode, Category, Consumer, CopyRange, DescriptorDevice, DeviceError, Filter, HeapId,
    RawHeap, SamplerDesc, TableBinder,
};

pub mod fence;
pub use fence::{CompletionGate, FenceCounter};

pub mod layout;
pub use layout::{BindingLayout, BindingLayoutBuilder, RootParameter};

// Dummy device for testing (always available)
pub mod dummy;
pub use dummy::{BinderCall, DeviceCall, DummyBinder, DummyDevice};
