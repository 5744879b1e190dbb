use anyhow::Result;

use deimos::prelude::*;

mod framework;

fn color_attachment() -> vk::AttachmentDescription {
    RenderPassBuilder::create_attachment(
        vk::Format::B8G8R8A8_SRGB,
        vk::AttachmentLoadOp::CLEAR,
        vk::AttachmentStoreOp::STORE,
        vk::ImageLayout::UNDEFINED,
        vk::ImageLayout::PRESENT_SRC_KHR,
    )
}

fn simple_render_pass() -> Result<RenderPassBuilder> {
    let mut builder = RenderPassBuilder::new();
    builder.add_attachment(color_attachment())?.add_subpass(
        vk::PipelineBindPoint::GRAPHICS,
        &[AttachmentReference::new(
            AttachmentKind::Color,
            0,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        )],
        vk::SubpassDescriptionFlags::empty(),
    )?;
    Ok(builder)
}

fn is_incomplete(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<Error>(), Some(Error::IncompleteBuilder(_)))
}

#[test]
pub fn render_pass_without_attachments_is_incomplete() -> Result<()> {
    let mut device = framework::make_device()?;
    let mut builder = RenderPassBuilder::new();
    assert_eq!(builder.state(), BuilderState::Empty);
    assert!(is_incomplete(&device.create_render_pass(&mut builder).unwrap_err()));

    builder.add_attachment(color_attachment())?;
    assert_eq!(builder.state(), BuilderState::Accumulating);
    // Still no subpass.
    assert!(is_incomplete(&device.create_render_pass(&mut builder).unwrap_err()));
    assert_eq!(device.resource_count(), 0);
    Ok(())
}

#[test]
pub fn render_passes_get_distinct_ids() -> Result<()> {
    let mut device = framework::make_device()?;
    let first = device.create_render_pass(&mut simple_render_pass()?)?;
    let second = device.create_render_pass(&mut simple_render_pass()?)?;
    assert_ne!(first, second);
    assert_eq!(first.kind(), ResourceKind::RenderPass);
    assert_eq!(device.render_pass(first)?.subpass_count(), 1);
    assert_eq!(device.render_pass(second)?.attachments().len(), 1);
    Ok(())
}

#[test]
pub fn builders_are_single_use() -> Result<()> {
    let mut device = framework::make_device()?;
    let mut builder = simple_render_pass()?;
    device.create_render_pass(&mut builder)?;
    assert_eq!(builder.state(), BuilderState::Built);

    let err = device.create_render_pass(&mut builder).unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::BuilderFinalized(_))));
    let err = builder.add_attachment(color_attachment()).unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::BuilderFinalized(_))));
    assert_eq!(device.resource_count(), 1);
    Ok(())
}

#[test]
pub fn second_depth_reference_is_rejected() -> Result<()> {
    let mut builder = RenderPassBuilder::new();
    let depth = AttachmentReference::new(
        AttachmentKind::DepthStencil,
        0,
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    );
    let err = builder
        .add_subpass(vk::PipelineBindPoint::GRAPHICS, &[depth, depth], vk::SubpassDescriptionFlags::empty())
        .unwrap_err();
    assert!(is_incomplete(&err));
    Ok(())
}

fn pipeline_builder(render_pass: ResourceID) -> Result<PipelineBuilder> {
    let mut builder = PipelineBuilder::new("test");
    builder
        .add_vertex_binding(Vertex::binding())?
        .add_dynamic_state(vk::DynamicState::VIEWPORT)?
        .add_dynamic_state(vk::DynamicState::SCISSOR)?
        .add_color_blend_attachment(PipelineBuilder::opaque_blend_attachment())?
        .attach_shader(vk::ShaderStageFlags::VERTEX, framework::fake_spirv())?
        .attach_shader(vk::ShaderStageFlags::FRAGMENT, framework::fake_spirv())?
        .set_render_pass(render_pass, 0)?;
    Ok(builder)
}

#[test]
pub fn pipeline_requires_mandatory_parts() -> Result<()> {
    let mut device = framework::make_device()?;
    let render_pass = device.create_render_pass(&mut simple_render_pass()?)?;

    let mut no_pass = PipelineBuilder::new("no pass");
    no_pass.attach_shader(vk::ShaderStageFlags::VERTEX, framework::fake_spirv())?;
    assert!(is_incomplete(&device.create_pipeline(&mut no_pass).unwrap_err()));

    let mut no_vertex = PipelineBuilder::new("no vertex");
    no_vertex
        .set_render_pass(render_pass, 0)?
        .attach_shader(vk::ShaderStageFlags::FRAGMENT, framework::fake_spirv())?;
    assert!(is_incomplete(&device.create_pipeline(&mut no_vertex).unwrap_err()));

    let mut no_viewport = PipelineBuilder::new("no viewport");
    no_viewport
        .set_render_pass(render_pass, 0)?
        .attach_shader(vk::ShaderStageFlags::VERTEX, framework::fake_spirv())?;
    assert!(is_incomplete(&device.create_pipeline(&mut no_viewport).unwrap_err()));
    Ok(())
}

#[test]
pub fn pipeline_builds_and_releases_shader_modules() -> Result<()> {
    let log = DriverLog::default();
    let backend = framework::null_backend(vec![]).with_log(log.clone());
    let mut device = framework::make_device_on(&backend, &framework::capable_adapter("Test GPU"))?;
    let render_pass = device.create_render_pass(&mut simple_render_pass()?)?;
    let mut builder = pipeline_builder(render_pass)?;
    let pipeline = device.create_pipeline(&mut builder)?;
    assert_eq!(device.pipeline(pipeline)?.name(), "test");
    assert_eq!(device.pipeline(pipeline)?.render_pass(), render_pass);

    let events = log.lock().unwrap().clone();
    let count = |event: fn(&DriverEvent) -> bool| events.iter().filter(|e| event(e)).count();
    let created = count(|e| matches!(e, DriverEvent::Created(vk::ObjectType::SHADER_MODULE, _)));
    let destroyed = count(|e| matches!(e, DriverEvent::Destroyed(vk::ObjectType::SHADER_MODULE, _)));
    assert_eq!(created, 2);
    assert_eq!(destroyed, 2);
    Ok(())
}

#[test]
pub fn pipeline_rejects_overlapping_vertex_locations() -> Result<()> {
    let mut device = framework::make_device()?;
    let render_pass = device.create_render_pass(&mut simple_render_pass()?)?;

    let mut instance = VertexBinding::new(1, vk::VertexInputRate::INSTANCE, 16);
    instance.push_attribute(vk::Format::R32G32B32A32_SFLOAT)?;
    let mut builder = pipeline_builder(render_pass)?;
    builder.add_vertex_binding(instance)?;
    assert!(is_incomplete(&device.create_pipeline(&mut builder).unwrap_err()));
    assert_eq!(builder.state(), BuilderState::Accumulating);

    let mut instance = VertexBinding::new(1, vk::VertexInputRate::INSTANCE, 16).starting_at(4);
    assert_eq!(instance.push_attribute(vk::Format::R32G32B32A32_SFLOAT)?, 4);
    let mut builder = pipeline_builder(render_pass)?;
    builder.add_vertex_binding(instance)?;
    let pipeline = device.create_pipeline(&mut builder)?;
    assert!(device.contains(pipeline));
    Ok(())
}

#[test]
pub fn pipeline_on_destroyed_render_pass_fails() -> Result<()> {
    let mut device = framework::make_device()?;
    let render_pass = device.create_render_pass(&mut simple_render_pass()?)?;
    let mut builder = pipeline_builder(render_pass)?;
    device.destroy(render_pass)?;
    let err = device.create_pipeline(&mut builder).unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::InvalidHandle(_))));
    // The failed attempt does not consume the builder.
    assert_eq!(builder.state(), BuilderState::Accumulating);
    Ok(())
}

#[test]
pub fn swapchain_requires_surface_and_extent() -> Result<()> {
    let mut device = framework::make_device()?;
    let mut builder = SwapchainBuilder::new();
    builder.extent(framework::window_size())?;
    assert!(is_incomplete(&device.create_swapchain(&mut builder).unwrap_err()));

    let backend = framework::null_backend(vec![]);
    let surface = backend.surface(device.adapter())?;
    let mut builder = SwapchainBuilder::new();
    builder.surface(surface)?;
    assert!(is_incomplete(&device.create_swapchain(&mut builder).unwrap_err()));
    Ok(())
}

#[test]
pub fn swapchain_falls_back_to_srgb_format() -> Result<()> {
    let mut device = framework::make_device()?;
    let backend = framework::null_backend(vec![]);
    let mut builder = SwapchainBuilder::new();
    builder
        .surface(backend.surface(device.adapter())?)?
        .extent(framework::window_size())?
        .preferred_format(vk::SurfaceFormatKHR {
            format: vk::Format::R16G16B16A16_SFLOAT,
            color_space: vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
        })?
        .present_mode(vk::PresentModeKHR::IMMEDIATE)?;
    let id = device.create_swapchain(&mut builder)?;
    let swapchain = device.swapchain(id)?;
    assert_eq!(swapchain.format().format, vk::Format::B8G8R8A8_SRGB);
    assert_eq!(swapchain.present_mode(), vk::PresentModeKHR::FIFO);
    assert_eq!(swapchain.extent(), framework::window_size());
    // One more than the minimum, clamped to the maximum of three.
    assert_eq!(swapchain.image_count(), 3);
    Ok(())
}

#[test]
pub fn swapchain_needs_the_extension() -> Result<()> {
    let backend = framework::null_backend(vec![]);
    let adapter = framework::capable_adapter("Test GPU");
    let selector = QueueFamilySelector::new(adapter.queue_families());
    let mut device = Device::new(
        &backend,
        &adapter,
        &selector,
        DeviceExtensionManager::new(),
        &vk::PhysicalDeviceFeatures::default(),
    )?;
    let mut builder = SwapchainBuilder::new();
    builder
        .surface(backend.surface(&adapter)?)?
        .extent(framework::window_size())?;
    let err = device.create_swapchain(&mut builder).unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::ExtensionNotEnabled(_))));
    Ok(())
}

#[test]
pub fn surface_format_choice() -> Result<()> {
    let rgba = vk::SurfaceFormatKHR {
        format: vk::Format::R8G8B8A8_SRGB,
        color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
    };
    let unorm = vk::SurfaceFormatKHR {
        format: vk::Format::B8G8R8A8_UNORM,
        color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
    };
    assert_eq!(deimos::wsi::swapchain::choose_surface_format(Some(rgba), &[unorm, rgba])?, rgba);
    assert_eq!(deimos::wsi::swapchain::choose_surface_format(None, &[unorm])?, unorm);
    let err = deimos::wsi::swapchain::choose_surface_format(None, &[]).unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::NoSurfaceFormat)));
    Ok(())
}
