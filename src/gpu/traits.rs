//! Device traits and types
//!
//! This module defines the hardware interface WITHOUT pulling in any backend-specific dependencies.
//! Allocators depend on these traits, not on a graphics API.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::allocators::handle::{CpuAddress, DescriptorHandle, GpuAddress};

/// Class of descriptor. Each category has its own heaps and allocators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Shader resource, unordered access and constant buffer views
    Resource,
    /// Samplers
    Sampler,
    /// Render target views (host only)
    RenderTarget,
    /// Depth stencil views (host only)
    DepthStencil,
}

impl Category {
    /// Every category, in index order.
    pub const ALL: [Category; 4] = [
        Category::Resource,
        Category::Sampler,
        Category::RenderTarget,
        Category::DepthStencil,
    ];

    /// Dense index of this category.
    pub const fn index(self) -> usize {
        match self {
            Category::Resource => 0,
            Category::Sampler => 1,
            Category::RenderTarget => 2,
            Category::DepthStencil => 3,
        }
    }

    /// Whether heaps of this category may be made shader-visible.
    pub const fn is_shader_visible_capable(self) -> bool {
        matches!(self, Category::Resource | Category::Sampler)
    }

    /// Transient pool lane serving this category, if any.
    pub const fn transient_lane(self) -> Option<usize> {
        match self {
            Category::Resource => Some(0),
            Category::Sampler => Some(1),
            Category::RenderTarget | Category::DepthStencil => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Resource => "resource",
            Category::Sampler => "sampler",
            Category::RenderTarget => "render-target",
            Category::DepthStencil => "depth-stencil",
        };
        f.write_str(name)
    }
}

/// Pipeline kind that consumes bound descriptor tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Consumer {
    /// Graphics pipeline
    Graphics,
    /// Compute pipeline
    Compute,
}

impl Consumer {
    /// Both consumers, in index order.
    pub const ALL: [Consumer; 2] = [Consumer::Graphics, Consumer::Compute];

    /// Dense index of this consumer.
    pub const fn index(self) -> usize {
        match self {
            Consumer::Graphics => 0,
            Consumer::Compute => 1,
        }
    }
}

/// Errors reported by the device.
///
/// All of them are fatal for the operation that triggered them; nothing in
/// this crate retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// The device was removed or reset
    DeviceLost,
    /// The device could not find memory for the heap
    OutOfMemory,
    /// Backend-specific error (opaque)
    Backend(String),
}

impl DeviceError {
    /// True if the host should recreate the device.
    pub fn is_device_lost(&self) -> bool {
        matches!(self, DeviceError::DeviceLost)
    }
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::DeviceLost => write!(f, "Device lost"),
            DeviceError::OutOfMemory => write!(f, "Device out of memory for descriptor heap"),
            DeviceError::Backend(msg) => write!(f, "Backend error: {}", msg),
        }
    }
}

impl std::error::Error for DeviceError {}

/// Identity of one heap, unique per device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HeapId(pub u64);

/// A fixed-capacity block of identically sized descriptor slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawHeap {
    /// Heap identity
    pub id: HeapId,
    /// Category of every slot
    pub category: Category,
    /// Number of slots
    pub capacity: u32,
    /// Bytes between consecutive slots
    pub stride: u32,
    /// Host address of slot 0
    pub cpu_base: CpuAddress,
    /// Device address of slot 0 (shader-visible heaps only)
    pub gpu_base: Option<GpuAddress>,
}

impl RawHeap {
    /// Whether the device can address this heap.
    pub fn is_shader_visible(&self) -> bool {
        self.gpu_base.is_some()
    }

    /// Handle to the slot at `slot`, carrying every address the heap has.
    pub fn handle_at(&self, slot: u32) -> DescriptorHandle {
        let first = match self.gpu_base {
            Some(gpu) => DescriptorHandle::shader_visible(self.cpu_base, gpu),
            None => DescriptorHandle::host(self.cpu_base),
        };
        first.offset(slot, self.stride)
    }
}

/// A run of `count` consecutive slots starting at `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyRange {
    /// First slot
    pub start: CpuAddress,
    /// Slot count
    pub count: u32,
}

impl CopyRange {
    /// Create a range.
    pub const fn new(start: CpuAddress, count: u32) -> Self {
        Self { start, count }
    }

    /// Address one past the last slot.
    pub fn end(&self, stride: u32) -> CpuAddress {
        self.start + u64::from(self.count) * u64::from(stride)
    }
}

/// Texture filtering for samplers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    Point,
    Linear,
    Anisotropic,
}

/// Texture addressing for samplers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    Wrap,
    Mirror,
    Clamp,
    Border,
}

/// Sampler state written into a sampler descriptor.
///
/// Equality and hashing use the bit patterns of the float fields, so two
/// descriptions compare equal exactly when the device would see the same
/// sampler.
#[derive(Debug, Clone, Copy)]
pub struct SamplerDesc {
    pub filter: Filter,
    pub address_u: AddressMode,
    pub address_v: AddressMode,
    pub address_w: AddressMode,
    pub mip_lod_bias: f32,
    pub max_anisotropy: u32,
    pub border_color: [f32; 4],
    pub min_lod: f32,
    pub max_lod: f32,
}

impl SamplerDesc {
    /// Trilinear filtering, clamped addressing.
    pub fn linear_clamp() -> Self {
        Self {
            filter: Filter::Linear,
            address_u: AddressMode::Clamp,
            address_v: AddressMode::Clamp,
            address_w: AddressMode::Clamp,
            ..Self::default()
        }
    }

    /// Point filtering, clamped addressing.
    pub fn point_clamp() -> Self {
        Self {
            filter: Filter::Point,
            address_u: AddressMode::Clamp,
            address_v: AddressMode::Clamp,
            address_w: AddressMode::Clamp,
            ..Self::default()
        }
    }

    /// Anisotropic filtering, wrapped addressing.
    pub fn anisotropic_wrap(max_anisotropy: u32) -> Self {
        Self {
            filter: Filter::Anisotropic,
            max_anisotropy,
            ..Self::default()
        }
    }

    fn key(&self) -> (Filter, [AddressMode; 3], u32, u32, [u32; 4], u32, u32) {
        (
            self.filter,
            [self.address_u, self.address_v, self.address_w],
            self.mip_lod_bias.to_bits(),
            self.max_anisotropy,
            self.border_color.map(f32::to_bits),
            self.min_lod.to_bits(),
            self.max_lod.to_bits(),
        )
    }
}

impl Default for SamplerDesc {
    fn default() -> Self {
        Self {
            filter: Filter::Linear,
            address_u: AddressMode::Wrap,
            address_v: AddressMode::Wrap,
            address_w: AddressMode::Wrap,
            mip_lod_bias: 0.0,
            max_anisotropy: 16,
            border_color: [1.0; 4],
            min_lod: 0.0,
            max_lod: f32::MAX,
        }
    }
}

impl PartialEq for SamplerDesc {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for SamplerDesc {}

impl Hash for SamplerDesc {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

/// The hardware interface consumed by every allocator.
///
/// Implementations must be callable from several threads at once; heap
/// creation is serialized by the pools, copies are not.
pub trait DescriptorDevice: Send + Sync {
    /// Create a heap of `capacity` slots.
    fn create_heap(
        &self,
        category: Category,
        capacity: u32,
        shader_visible: bool,
    ) -> Result<RawHeap, DeviceError>;

    /// Release a heap created by `create_heap`.
    fn destroy_heap(&self, heap: &RawHeap);

    /// Bytes between consecutive slots of a category.
    fn descriptor_stride(&self, category: Category) -> u32;

    /// Batched copy. Both range lists cover the same total slot count.
    fn copy_descriptors(&self, dest: &[CopyRange], src: &[CopyRange], category: Category);

    /// Copy `count` consecutive slots.
    fn copy_descriptors_simple(
        &self,
        count: u32,
        dest: CpuAddress,
        src: CpuAddress,
        category: Category,
    );

    /// Write a sampler into a host-visible sampler slot.
    fn create_sampler(&self, desc: &SamplerDesc, dest: CpuAddress);
}

/// Command-recording side of binding: where tables and heaps get bound.
pub trait TableBinder {
    /// Make `heap` the active shader-visible heap for its category.
    fn set_descriptor_heap(&mut self, category: Category, heap: &RawHeap);

    /// Point root parameter `root_index` of `consumer` at `base`.
    fn set_descriptor_table(&mut self, consumer: Consumer, root_index: u32, base: GpuAddress);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_category_lanes() {
        assert_eq!(Category::Resource.transient_lane(), Some(0));
        assert_eq!(Category::Sampler.transient_lane(), Some(1));
        assert_eq!(Category::RenderTarget.transient_lane(), None);
        assert!(!Category::DepthStencil.is_shader_visible_capable());
    }

    #[test]
    fn test_raw_heap_handles() {
        let heap = RawHeap {
            id: HeapId(1),
            category: Category::Resource,
            capacity: 8,
            stride: 32,
            cpu_base: CpuAddress(0x1000),
            gpu_base: Some(GpuAddress(0x8000)),
        };
        let handle = heap.handle_at(2);
        assert_eq!(handle.cpu(), Some(CpuAddress(0x1040)));
        assert_eq!(handle.gpu(), Some(GpuAddress(0x8040)));
    }

    #[test]
    fn test_sampler_desc_dedup_key() {
        let mut set = HashSet::new();
        set.insert(SamplerDesc::linear_clamp());
        set.insert(SamplerDesc::linear_clamp());
        set.insert(SamplerDesc::point_clamp());
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_device_error_display() {
        assert!(DeviceError::DeviceLost.is_device_lost());
        assert!(!DeviceError::OutOfMemory.is_device_lost());
        assert_eq!(
            DeviceError::Backend("removed".to_string()).to_string(),
            "Backend error: removed"
        );
    }
}
