//! Strict mode escalation.
//!
//! Strict mode is process-global, so every test here takes `SERIAL` first.

use descalloc::{
    Category, DescriptorConfig, DescriptorSystem, DeviceError, DummyBinder, DummyDevice,
    FenceCounter, StrictMode, StrictModeGuard,
};
use std::sync::{Arc, Mutex, MutexGuard};

static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn setup(config: DescriptorConfig) -> (Arc<DummyDevice>, DescriptorSystem) {
    let device = Arc::new(DummyDevice::new());
    let fence = Arc::new(FenceCounter::new());
    let system = DescriptorSystem::new(device.clone(), fence, config).unwrap();
    (device, system)
}

#[test]
#[should_panic(expected = "FD301")]
fn test_pool_growth_warning_is_fatal() {
    let _serial = serial();
    let _strict = StrictModeGuard::panic_on_warning();
    let (_device, system) = setup(DescriptorConfig::minimal().with_heap_soft_limit(1));
    let handle = system.allocate(Category::Resource, 1).unwrap();

    // Two contexts hold a segment each and never end their submission
    let mut first = system.create_context();
    let mut second = system.create_context();
    first.upload_direct(handle, &mut DummyBinder::new()).unwrap();
    second.upload_direct(handle, &mut DummyBinder::new()).unwrap();
}

#[test]
fn test_warnings_pass_when_only_errors_are_fatal() {
    let _serial = serial();
    let _strict = StrictModeGuard::new(StrictMode::PanicOnError);
    let (_device, system) = setup(DescriptorConfig::minimal().with_heap_soft_limit(1));
    let handle = system.allocate(Category::Resource, 1).unwrap();

    let mut first = system.create_context();
    let mut second = system.create_context();
    first.upload_direct(handle, &mut DummyBinder::new()).unwrap();
    second.upload_direct(handle, &mut DummyBinder::new()).unwrap();

    assert_eq!(system.stats().transient_resource.heaps_owned, 2);
}

#[test]
#[should_panic(expected = "FD201")]
fn test_device_error_is_fatal() {
    let _serial = serial();
    let _strict = StrictModeGuard::new(StrictMode::PanicOnError);
    let (device, system) = setup(DescriptorConfig::minimal());

    device.fail_next_heap(DeviceError::OutOfMemory);
    let _ = system.allocate(Category::RenderTarget, 1);
}

#[test]
fn test_guard_restores_previous_mode() {
    let _serial = serial();
    let before = descalloc::diagnostics::strict_mode();
    {
        let _strict = StrictModeGuard::panic_on_warning();
        assert_eq!(descalloc::diagnostics::strict_mode(), StrictMode::PanicOnWarning);
    }
    assert_eq!(descalloc::diagnostics::strict_mode(), before);
}
