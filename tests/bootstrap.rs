use anyhow::Result;

use deimos::prelude::*;

mod framework;

#[test]
pub fn bootstrap_reaches_pipeline_stage() -> Result<()> {
    framework::init_logger();
    let backend = framework::null_backend(vec![
        framework::weak_adapter("Weak"),
        framework::capable_adapter("Capable"),
    ]);
    let engine = Engine::bootstrap(&framework::test_settings(), backend)?;
    assert_eq!(engine.stage(), BootstrapStage::PipelineReady);

    let device = engine.device();
    assert_eq!(device.adapter().properties().name, "Capable");
    assert!(device.swapchain(engine.swapchain()).is_ok());
    assert!(device.command_buffer(engine.graphics_command_buffer()).is_ok());
    assert_eq!(device.image(engine.depth_image())?.format(), vk::Format::D32_SFLOAT);
    assert_eq!(engine.depth_format(), vk::Format::D32_SFLOAT);
    assert_eq!(device.render_pass(engine.render_pass())?.attachments().len(), 2);
    assert!(engine.pipeline().is_none());
    assert!(matches!(engine.pipeline_slot(), PipelineSlot::Pending(_)));
    Ok(())
}

#[test]
pub fn bootstrap_assigns_every_role() -> Result<()> {
    let backend = framework::null_backend(vec![framework::capable_adapter("Capable")]);
    let engine = Engine::bootstrap(&framework::test_settings(), backend)?;
    let device = engine.device();
    let selection = |role| device.queue_selection(role).unwrap();

    let graphics = selection(QueueRole::Graphics);
    let compute = selection(QueueRole::Compute);
    let transfer = selection(QueueRole::Transfer);
    let present = selection(QueueRole::Present);
    assert_eq!((graphics.family_index, graphics.queue_index), (0, 0));
    assert_eq!((compute.family_index, compute.queue_index), (0, 1));
    assert_eq!((transfer.family_index, transfer.queue_index), (1, 0));
    assert_eq!(present, graphics);
    assert_eq!(device.one_time_queue(), Some(transfer));
    Ok(())
}

#[test]
pub fn bootstrap_honours_surface_preferences() -> Result<()> {
    let backend = framework::null_backend(vec![framework::capable_adapter("Capable")]);
    let settings = AppBuilder::new()
        .surface_format(vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        })
        .present_mode(vk::PresentModeKHR::MAILBOX)
        .depth_formats(vec![vk::Format::D24_UNORM_S8_UINT])
        .build();
    let engine = Engine::bootstrap(&settings, backend)?;
    let swapchain = engine.device().swapchain(engine.swapchain())?;
    assert_eq!(swapchain.format().format, vk::Format::R8G8B8A8_SRGB);
    assert_eq!(swapchain.present_mode(), vk::PresentModeKHR::MAILBOX);
    assert_eq!(engine.depth_format(), vk::Format::D24_UNORM_S8_UINT);
    Ok(())
}

#[test]
pub fn bootstrap_without_suitable_adapter_fails() -> Result<()> {
    let log = DriverLog::default();
    let backend = framework::null_backend(vec![framework::weak_adapter("Weak")]).with_log(log.clone());
    let err = Engine::bootstrap(&framework::test_settings(), backend).unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::NoSuitableAdapter)));
    assert!(log.lock().unwrap().is_empty());
    Ok(())
}

#[test]
pub fn bootstrap_without_present_support_fails() -> Result<()> {
    let adapter = framework::ENGINE_EXTENSIONS.iter().fold(
        Adapter::named("Headless")
            .with_features(framework::geometry_shader_features())
            .with_queue_family(QueueFamily::new(0, framework::all_queue_flags(), 4)),
        |adapter, ext| adapter.with_extension(*ext),
    );
    let backend = framework::null_backend(vec![adapter]);
    let err = Engine::bootstrap(&framework::test_settings(), backend).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<Error>(),
        Some(Error::NoCapableQueueFamily(QueueRole::Present))
    ));
    Ok(())
}

#[test]
pub fn queue_sharing_can_be_disabled() -> Result<()> {
    let single_queue = framework::ENGINE_EXTENSIONS.iter().fold(
        Adapter::named("Single queue")
            .with_features(framework::geometry_shader_features())
            .with_queue_family(QueueFamily::new(0, framework::all_queue_flags(), 1).with_present(true)),
        |adapter, ext| adapter.with_extension(*ext),
    );

    // With sharing, every role ends up on the only queue.
    let backend = framework::null_backend(vec![single_queue.clone()]);
    let engine = Engine::bootstrap(&framework::test_settings(), backend)?;
    let graphics = engine.device().queue_selection(QueueRole::Graphics).unwrap();
    assert_eq!(engine.device().queue_selection(QueueRole::Compute), Some(graphics));
    drop(engine);

    let settings = AppBuilder::new()
        .gpu(GPURequirements {
            allow_queue_sharing: false,
            ..Default::default()
        })
        .build();
    let err = Engine::bootstrap(&settings, framework::null_backend(vec![single_queue])).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<Error>(),
        Some(Error::QueueCapacityExceeded { .. })
    ));
    Ok(())
}

#[test]
pub fn failed_bootstrap_releases_everything() -> Result<()> {
    let log = DriverLog::default();
    let backend = framework::null_backend(vec![framework::capable_adapter("Capable")]).with_log(log.clone());
    // Shaders the driver rejects make the last stage fail after all other objects exist.
    let settings = AppBuilder::new().shaders(vec![], vec![]).build();
    let err = Engine::bootstrap(&settings, backend).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<Error>(),
        Some(Error::NativeDriver(vk::Result::ERROR_INVALID_SHADER_NV))
    ));

    let events = log.lock().unwrap();
    let created = events
        .iter()
        .filter(|event| matches!(event, DriverEvent::Created(..)))
        .count();
    let destroyed = events.len() - created;
    assert!(created > 0);
    assert_eq!(created, destroyed);
    Ok(())
}

#[test]
pub fn bootstrap_with_shaders_builds_the_pipeline() -> Result<()> {
    let backend = framework::null_backend(vec![framework::capable_adapter("Capable")]);
    let settings = AppBuilder::new()
        .shaders(framework::fake_spirv(), framework::fake_spirv())
        .build();
    let engine = Engine::bootstrap(&settings, backend)?;
    let pipeline = engine.pipeline().unwrap();
    assert_eq!(engine.device().pipeline(pipeline)?.render_pass(), engine.render_pass());
    Ok(())
}

#[test]
pub fn pipeline_can_be_finished_later() -> Result<()> {
    let backend = framework::null_backend(vec![framework::capable_adapter("Capable")]);
    let mut engine = Engine::bootstrap(&framework::test_settings(), backend)?;

    let err = engine.finish_pipeline(vec![], framework::fake_spirv()).unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::NativeDriver(_))));
    assert!(engine.pipeline().is_none());

    let pipeline = engine.finish_pipeline(framework::fake_spirv(), framework::fake_spirv())?;
    assert_eq!(engine.pipeline(), Some(pipeline));
    let err = engine
        .finish_pipeline(framework::fake_spirv(), framework::fake_spirv())
        .unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::BuilderFinalized(_))));
    Ok(())
}

#[test]
pub fn run_moves_to_running_once() -> Result<()> {
    let backend = framework::null_backend(vec![framework::capable_adapter("Capable")]);
    let mut engine = Engine::bootstrap(&framework::test_settings(), backend)?;
    let mut frames = 0;
    engine.run(|engine| {
        assert_eq!(engine.stage(), BootstrapStage::Running);
        frames += 1;
        frames < 5
    })?;
    assert_eq!(frames, 5);

    let err = engine.run(|_| false).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<Error>(),
        Some(Error::InvalidStageTransition {
            from: "Running",
            to: "Running"
        })
    ));
    Ok(())
}

#[test]
pub fn stage_tracker_rejects_backward_moves() -> Result<()> {
    let mut tracker = StageTracker::new();
    assert_eq!(tracker.stage(), BootstrapStage::Uninitialized);
    tracker.advance(BootstrapStage::DeviceReady)?;
    let err = tracker.advance(BootstrapStage::QueuesSelected).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<Error>(),
        Some(Error::InvalidStageTransition { .. })
    ));
    assert_eq!(tracker.stage(), BootstrapStage::DeviceReady);
    Ok(())
}

#[test]
pub fn vulkan_backend_requires_a_window() -> Result<()> {
    // Checked before the Vulkan loader is touched, so this runs without a driver.
    let err = VulkanBackend::new(&framework::test_settings(), None).unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::NoWindow)));
    Ok(())
}
