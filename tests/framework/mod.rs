#![allow(dead_code)]

use anyhow::Result;

use deimos::backend::null::NullBackend;
use deimos::extensions;
use deimos::prelude::*;

/// Initialize logging once per test binary. Set `RUST_LOG` to see the output.
pub fn init_logger() {
    let _ = pretty_env_logger::try_init();
}

/// Every extension the engine enables on its device.
pub const ENGINE_EXTENSIONS: [&str; 5] = [
    extensions::SWAPCHAIN,
    extensions::SHADER_CLOCK,
    extensions::DEFERRED_HOST_OPERATIONS,
    extensions::ACCELERATION_STRUCTURE,
    extensions::RAY_TRACING_PIPELINE,
];

pub fn all_queue_flags() -> vk::QueueFlags {
    vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER
}

pub fn geometry_shader_features() -> vk::PhysicalDeviceFeatures {
    vk::PhysicalDeviceFeatures {
        geometry_shader: vk::TRUE,
        ..Default::default()
    }
}

/// A synthetic adapter that meets the default requirements: family 0 has graphics, compute, transfer and present with
/// four queues, family 1 is a single transfer-only queue.
pub fn capable_adapter(name: &str) -> Adapter {
    let adapter = Adapter::new(AdapterProperties {
        name: name.to_owned(),
        device_type: vk::PhysicalDeviceType::DISCRETE_GPU,
        device_local_memory: 8 * 1024 * 1024 * 1024,
        ..Default::default()
    })
    .with_features(geometry_shader_features())
    .with_queue_family(QueueFamily::new(0, all_queue_flags(), 4).with_present(true))
    .with_queue_family(QueueFamily::new(1, vk::QueueFlags::TRANSFER, 1));
    ENGINE_EXTENSIONS
        .iter()
        .fold(adapter, |adapter, ext| adapter.with_extension(*ext))
}

/// An adapter that lacks the ray tracing extension and the geometry shader feature.
pub fn weak_adapter(name: &str) -> Adapter {
    Adapter::named(name)
        .with_extension(extensions::SWAPCHAIN)
        .with_queue_family(QueueFamily::new(0, all_queue_flags(), 1).with_present(true))
}

pub fn window_size() -> vk::Extent2D {
    vk::Extent2D {
        width: 800,
        height: 600,
    }
}

pub fn null_backend(adapters: Vec<Adapter>) -> NullBackend {
    NullBackend::new(adapters, window_size())
}

pub fn test_settings() -> AppSettings {
    AppBuilder::new()
        .name("deimos test framework")
        .version((0, 0, 1))
        .validation(false)
        .build()
}

/// Minimal valid SPIR-V for the null driver. The null driver only rejects empty code.
pub fn fake_spirv() -> Vec<u32> {
    vec![0x0723_0203, 0x0001_0000, 0, 1, 0]
}

/// A device on [`capable_adapter()`] with every engine extension enabled and the graphics role assigned.
pub fn make_device() -> Result<Device> {
    make_device_on(&null_backend(vec![]), &capable_adapter("Test GPU"))
}

pub fn make_device_on(backend: &NullBackend, adapter: &Adapter) -> Result<Device> {
    let layout = adapter.queue_families();
    let mut selector = QueueFamilySelector::new(layout);
    let graphics = *layout.find_family_for_role(QueueRole::Graphics).unwrap();
    selector.assign_shared(QueueRole::Graphics, &graphics, 1.0)?;
    let present = *layout.find_family_for_role(QueueRole::Present).unwrap();
    selector.assign_shared(QueueRole::Present, &present, 1.0)?;
    let mut extensions = DeviceExtensionManager::new();
    extensions.add_extension(SwapchainExtension)?;
    Device::new(backend, adapter, &selector, extensions, &vk::PhysicalDeviceFeatures::default())
}
