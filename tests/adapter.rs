use anyhow::Result;

use deimos::prelude::*;

mod framework;

#[test]
pub fn first_matching_adapter_wins() -> Result<()> {
    framework::init_logger();
    let mut better = framework::capable_adapter("Later and better");
    better = better.with_queue_family(QueueFamily::new(2, vk::QueueFlags::COMPUTE, 8));
    let adapters = vec![
        framework::weak_adapter("Weak"),
        framework::capable_adapter("First capable"),
        better,
    ];
    let chosen = choose_adapter(&adapters, &GPURequirements::default())?;
    assert_eq!(chosen.properties().name, "First capable");
    Ok(())
}

#[test]
pub fn no_suitable_adapter() -> Result<()> {
    let adapters = vec![framework::weak_adapter("A"), framework::weak_adapter("B")];
    let err = choose_adapter(&adapters, &GPURequirements::default()).unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::NoSuitableAdapter)));

    let err = choose_adapter(&Vec::<Adapter>::new(), &GPURequirements::default()).unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::NoSuitableAdapter)));
    Ok(())
}

#[test]
pub fn each_hard_requirement_is_checked() -> Result<()> {
    let requirements = GPURequirements::default();
    assert!(framework::capable_adapter("ok").unmet_requirement(&requirements).is_none());

    let no_geometry = framework::capable_adapter("no geometry").with_features(vk::PhysicalDeviceFeatures::default());
    assert!(no_geometry.unmet_requirement(&requirements).is_some());

    let no_ray_tracing = Adapter::named("no ray tracing")
        .with_features(framework::geometry_shader_features())
        .with_queue_family(QueueFamily::new(0, framework::all_queue_flags(), 1));
    assert!(no_ray_tracing.unmet_requirement(&requirements).is_some());

    let no_graphics = Adapter::named("compute only")
        .with_features(framework::geometry_shader_features())
        .with_extension(deimos::extensions::RAY_TRACING_PIPELINE)
        .with_queue_family(QueueFamily::new(0, vk::QueueFlags::COMPUTE, 1));
    assert!(no_graphics.unmet_requirement(&requirements).is_some());
    Ok(())
}

#[test]
pub fn soft_requirements_filter_adapters() -> Result<()> {
    let integrated = Adapter::new(AdapterProperties {
        name: String::from("Integrated"),
        device_type: vk::PhysicalDeviceType::INTEGRATED_GPU,
        device_local_memory: 512 * 1024 * 1024,
        ..Default::default()
    })
    .with_features(framework::geometry_shader_features())
    .with_extension(deimos::extensions::RAY_TRACING_PIPELINE)
    .with_queue_family(QueueFamily::new(0, framework::all_queue_flags(), 1));
    let adapters = vec![integrated, framework::capable_adapter("Discrete")];

    let chosen = choose_adapter(&adapters, &GPURequirements::default())?;
    assert_eq!(chosen.properties().name, "Integrated");

    let dedicated = GPURequirements {
        dedicated: true,
        ..Default::default()
    };
    assert_eq!(choose_adapter(&adapters, &dedicated)?.properties().name, "Discrete");

    let memory = GPURequirements {
        min_device_local_memory: 1024 * 1024 * 1024,
        ..Default::default()
    };
    assert_eq!(choose_adapter(&adapters, &memory)?.properties().name, "Discrete");
    Ok(())
}

#[test]
pub fn listing_adapters_is_repeatable() -> Result<()> {
    let backend = framework::null_backend(vec![framework::weak_adapter("A"), framework::capable_adapter("B")]);
    let first = backend.list_adapters()?;
    let second = backend.list_adapters()?;
    let names = |adapters: &[Adapter]| {
        adapters
            .iter()
            .map(|adapter| adapter.properties().name.clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(names(&first), vec!["A", "B"]);
    assert_eq!(names(&first), names(&second));
    Ok(())
}

#[test]
pub fn queue_family_indices_follow_insertion_order() {
    let adapter = Adapter::named("indices")
        .with_queue_family(QueueFamily::new(7, vk::QueueFlags::GRAPHICS, 1))
        .with_queue_family(QueueFamily::new(7, vk::QueueFlags::TRANSFER, 1));
    let indices = adapter
        .queue_families()
        .families()
        .iter()
        .map(|family| family.index)
        .collect::<Vec<_>>();
    assert_eq!(indices, vec![0, 1]);
}
