use anyhow::Result;

use deimos::extensions;
use deimos::prelude::*;
use deimos::util::pnext::chain_structure_types;

mod framework;

fn ray_tracing_manager() -> Result<DeviceExtensionManager> {
    let mut manager = DeviceExtensionManager::new();
    manager.add_extension(SwapchainExtension)?;
    manager.add_extension(ShaderClockExtension::new(false, false))?;
    manager.add_extension(DeferredHostOperationsExtension)?;
    manager.add_extension(AccelerationStructureExtension::new(true, false, false, false, false))?;
    manager.add_extension(RayTracingPipelineExtension::new(true, false, false, false, false))?;
    Ok(manager)
}

#[test]
pub fn duplicate_registration_fails() -> Result<()> {
    let mut manager = DeviceExtensionManager::new();
    manager.add_extension(SwapchainExtension)?;
    let err = manager.add_extension(SwapchainExtension).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<Error>(),
        Some(Error::DuplicateExtension(name)) if name == extensions::SWAPCHAIN
    ));
    // Same name through a different type is still a duplicate.
    let err = manager
        .add_extension(NamedExtension::new(extensions::SWAPCHAIN))
        .unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::DuplicateExtension(_))));
    assert_eq!(manager.len(), 1);
    Ok(())
}

#[test]
pub fn prerequisites_must_come_first() -> Result<()> {
    let mut manager = DeviceExtensionManager::new();
    let err = manager
        .add_extension(RayTracingPipelineExtension::new(true, false, false, false, false))
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<Error>(),
        Some(Error::UnmetExtensionDependency { extension, requires })
            if extension == extensions::RAY_TRACING_PIPELINE && requires == extensions::ACCELERATION_STRUCTURE
    ));

    let err = manager
        .add_extension(AccelerationStructureExtension::default())
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<Error>(),
        Some(Error::UnmetExtensionDependency { .. })
    ));
    assert!(manager.is_empty());
    assert!(manager.feature_chain().is_null());
    Ok(())
}

#[test]
pub fn names_follow_registration_order() -> Result<()> {
    let manager = ray_tracing_manager()?;
    let mut names = vec![String::from("VK_existing_name")];
    manager.populate_extension_names(&mut names);
    assert_eq!(names[0], "VK_existing_name");
    assert_eq!(&names[1..], &framework::ENGINE_EXTENSIONS.map(String::from));
    Ok(())
}

#[test]
pub fn feature_chain_is_newest_first() -> Result<()> {
    let manager = ray_tracing_manager()?;
    let types = unsafe { chain_structure_types(manager.feature_chain()) };
    assert_eq!(
        types,
        vec![
            vk::StructureType::PHYSICAL_DEVICE_RAY_TRACING_PIPELINE_FEATURES_KHR,
            vk::StructureType::PHYSICAL_DEVICE_ACCELERATION_STRUCTURE_FEATURES_KHR,
            vk::StructureType::PHYSICAL_DEVICE_SHADER_CLOCK_FEATURES_KHR,
        ]
    );
    Ok(())
}

#[test]
pub fn feature_chain_survives_moves() -> Result<()> {
    let manager = ray_tracing_manager()?;
    let moved = Box::new(manager);
    let types = unsafe { chain_structure_types(moved.feature_chain()) };
    assert_eq!(types.len(), 3);
    assert_eq!(
        moved
            .get::<RayTracingPipelineExtension>()
            .unwrap()
            .features()
            .ray_tracing_pipeline,
        vk::TRUE
    );
    Ok(())
}

#[test]
pub fn typed_lookup_on_device() -> Result<()> {
    let backend = framework::null_backend(vec![]);
    let adapter = framework::capable_adapter("Test GPU");
    let layout = adapter.queue_families();
    let mut selector = QueueFamilySelector::new(layout);
    selector.assign_shared(QueueRole::Graphics, layout.family(0).unwrap(), 1.0)?;
    let device = Device::new(
        &backend,
        &adapter,
        &selector,
        ray_tracing_manager()?,
        &vk::PhysicalDeviceFeatures::default(),
    )?;

    let clock = ShaderClockExtension::get(&device)?;
    assert_eq!(clock.features().shader_device_clock, vk::FALSE);
    assert!(device.extension::<AccelerationStructureExtension>().is_ok());
    assert_eq!(device.extensions().len(), 5);
    Ok(())
}

#[test]
pub fn lookup_of_missing_extension_fails() -> Result<()> {
    let device = framework::make_device()?;
    let err = RayTracingPipelineExtension::get(&device).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<Error>(),
        Some(Error::ExtensionNotEnabled(name)) if name == "RayTracingPipelineExtension"
    ));
    Ok(())
}

#[test]
pub fn unsupported_extension_is_rejected_before_device_creation() -> Result<()> {
    let adapter = Adapter::named("No ray tracing")
        .with_extension(extensions::SWAPCHAIN)
        .with_queue_family(QueueFamily::new(0, vk::QueueFlags::GRAPHICS, 1).with_present(true));
    let log = DriverLog::default();
    let backend = framework::null_backend(vec![]).with_log(log.clone());
    let selector = QueueFamilySelector::new(adapter.queue_families());
    let err = Device::new(
        &backend,
        &adapter,
        &selector,
        ray_tracing_manager()?,
        &vk::PhysicalDeviceFeatures::default(),
    )
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<Error>(),
        Some(Error::UnsupportedExtension(name)) if name == extensions::SHADER_CLOCK
    ));
    assert!(log.lock().unwrap().is_empty());
    Ok(())
}
