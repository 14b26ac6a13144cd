//! Descriptor handles.
//!
//! A handle names one slot of a descriptor heap by its host address and,
//! for shader-visible heaps, its device address. Offsetting a handle moves
//! every address it carries and never invents a missing one.

use std::fmt;
use std::ops::{Add, AddAssign};

/// Host-visible address of a descriptor slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CpuAddress(pub u64);

/// Device-visible address of a descriptor slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GpuAddress(pub u64);

impl Add<u64> for CpuAddress {
    type Output = Self;

    fn add(self, bytes: u64) -> Self {
        Self(self.0 + bytes)
    }
}

impl Add<u64> for GpuAddress {
    type Output = Self;

    fn add(self, bytes: u64) -> Self {
        Self(self.0 + bytes)
    }
}

impl fmt::Display for CpuAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cpu:{:#x}", self.0)
    }
}

impl fmt::Display for GpuAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gpu:{:#x}", self.0)
    }
}

/// Opaque reference to one descriptor slot.
///
/// Persistent allocations are host-only; transient and user heaps hand out
/// shader-visible handles that carry both addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorHandle {
    cpu: Option<CpuAddress>,
    gpu: Option<GpuAddress>,
}

impl DescriptorHandle {
    /// The null handle: no address at all.
    pub const NULL: Self = Self { cpu: None, gpu: None };

    /// A handle usable by the host only.
    pub const fn host(cpu: CpuAddress) -> Self {
        Self { cpu: Some(cpu), gpu: None }
    }

    /// A handle usable by both host and device.
    pub const fn shader_visible(cpu: CpuAddress, gpu: GpuAddress) -> Self {
        Self { cpu: Some(cpu), gpu: Some(gpu) }
    }

    /// Host address, if present.
    pub fn cpu(&self) -> Option<CpuAddress> {
        self.cpu
    }

    /// Device address, if present.
    pub fn gpu(&self) -> Option<GpuAddress> {
        self.gpu
    }

    /// True for the null handle.
    pub fn is_null(&self) -> bool {
        self.cpu.is_none() && self.gpu.is_none()
    }

    /// True if the device can address this slot.
    pub fn is_shader_visible(&self) -> bool {
        self.gpu.is_some()
    }

    /// Handle `slots` slots further along a heap with the given stride.
    pub fn offset(self, slots: u32, stride: u32) -> Self {
        self + u64::from(slots) * u64::from(stride)
    }
}

impl Default for DescriptorHandle {
    fn default() -> Self {
        Self::NULL
    }
}

impl Add<u64> for DescriptorHandle {
    type Output = Self;

    fn add(mut self, bytes: u64) -> Self {
        self += bytes;
        self
    }
}

impl AddAssign<u64> for DescriptorHandle {
    fn add_assign(&mut self, bytes: u64) {
        self.cpu = self.cpu.map(|a| a + bytes);
        self.gpu = self.gpu.map(|a| a + bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_preserves_presence() {
        let host = DescriptorHandle::host(CpuAddress(0x1000)).offset(3, 32);
        assert_eq!(host.cpu(), Some(CpuAddress(0x1060)));
        assert_eq!(host.gpu(), None);

        let visible = DescriptorHandle::shader_visible(CpuAddress(0x1000), GpuAddress(0x9000)) + 64;
        assert_eq!(visible.cpu(), Some(CpuAddress(0x1040)));
        assert_eq!(visible.gpu(), Some(GpuAddress(0x9040)));
    }

    #[test]
    fn test_null_stays_null() {
        let mut handle = DescriptorHandle::NULL;
        handle += 128;
        assert!(handle.is_null());
        assert!(!handle.is_shader_visible());
        assert_eq!(DescriptorHandle::default(), DescriptorHandle::NULL);
    }
}
