//! Engine bootstrap.
//!
//! [`Engine::bootstrap()`] walks a fixed sequence of stages. Each stage consumes the output of the previous one:
//!
//! | Stage                | Produces                                                             |
//! |----------------------|----------------------------------------------------------------------|
//! | `ContextReady`       | The backend, with its instance and surface.                         |
//! | `AdapterChosen`      | The first adapter meeting the [`GPURequirements`].                   |
//! | `QueuesSelected`     | A queue slot for every [`QueueRole`].                                |
//! | `DeviceReady`        | The [`Device`], with its extensions and feature chain.              |
//! | `SwapchainReady`     | The swapchain and one color view per image.                         |
//! | `RenderTargetsReady` | The graphics command buffer, the depth buffer and the render pass.  |
//! | `PipelineReady`      | The main pipeline, or its fully configured builder if no shaders.   |
//! | `Running`            | Entered by [`Engine::run()`].                                        |
//!
//! Any error aborts the bootstrap. Whatever was created up to that point is destroyed by the device's `Drop`
//! implementation, and the backend is dropped after the device.
//!
//! # Example
//! ```
//! # use deimos::prelude::*;
//! # use deimos::backend::null::NullBackend;
//! # fn main() -> anyhow::Result<()> {
//! # let adapter = Adapter::named("Null GPU")
//! #     .with_features(vk::PhysicalDeviceFeatures { geometry_shader: vk::TRUE, ..Default::default() })
//! #     .with_extension(deimos::extensions::SWAPCHAIN)
//! #     .with_extension(deimos::extensions::SHADER_CLOCK)
//! #     .with_extension(deimos::extensions::DEFERRED_HOST_OPERATIONS)
//! #     .with_extension(deimos::extensions::ACCELERATION_STRUCTURE)
//! #     .with_extension(deimos::extensions::RAY_TRACING_PIPELINE)
//! #     .with_queue_family(QueueFamily::new(0, vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER, 4).with_present(true));
//! let backend = NullBackend::new(vec![adapter], vk::Extent2D { width: 800, height: 600 });
//! let settings = AppBuilder::new().name("Bootstrap example").build();
//! let mut engine = Engine::bootstrap(&settings, backend)?;
//! // No shaders were supplied, so the main pipeline still waits for them.
//! assert_eq!(engine.stage(), BootstrapStage::PipelineReady);
//! assert!(engine.pipeline().is_none());
//! let mut frames = 0;
//! engine.run(|_| {
//!     frames += 1;
//!     frames < 3
//! })?;
//! # Ok(())
//! # }
//! ```

use std::fmt::Formatter;

use anyhow::Result;
use ash::vk;

use crate::backend::Backend;
use crate::core::adapter::{choose_adapter, Adapter};
use crate::core::app_info::{AppSettings, GPURequirements};
use crate::core::device::Device;
use crate::core::extension::DeviceExtensionManager;
use crate::core::queue::{QueueFamily, QueueFamilySelector, QueueRole, QueueSelection};
use crate::extensions::{
    AccelerationStructureExtension, DeferredHostOperationsExtension, NamedExtension, RayTracingPipelineExtension,
    ShaderClockExtension, SwapchainExtension,
};
use crate::pass::{AttachmentKind, AttachmentReference, RenderPassBuilder};
use crate::pipeline::builder::PipelineBuilder;
use crate::resource::table::ResourceID;
use crate::resource::{ImageCreateInfo, MemoryType};
use crate::wsi::swapchain::SwapchainBuilder;
use crate::{Error, Vertex};

/// Stages of the engine bootstrap, in the order they are reached.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BootstrapStage {
    #[default]
    Uninitialized,
    ContextReady,
    AdapterChosen,
    QueuesSelected,
    DeviceReady,
    SwapchainReady,
    RenderTargetsReady,
    /// The main pipeline exists, or is fully configured and only waits for shader code.
    PipelineReady,
    Running,
}

impl BootstrapStage {
    pub fn name(&self) -> &'static str {
        match self {
            BootstrapStage::Uninitialized => "Uninitialized",
            BootstrapStage::ContextReady => "ContextReady",
            BootstrapStage::AdapterChosen => "AdapterChosen",
            BootstrapStage::QueuesSelected => "QueuesSelected",
            BootstrapStage::DeviceReady => "DeviceReady",
            BootstrapStage::SwapchainReady => "SwapchainReady",
            BootstrapStage::RenderTargetsReady => "RenderTargetsReady",
            BootstrapStage::PipelineReady => "PipelineReady",
            BootstrapStage::Running => "Running",
        }
    }
}

impl std::fmt::Display for BootstrapStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Keeps track of the current bootstrap stage. Stages only move forward.
#[derive(Debug, Default, Clone)]
pub struct StageTracker {
    stage: BootstrapStage,
}

impl StageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> BootstrapStage {
        self.stage
    }

    /// Move to a later stage.
    /// # Errors
    /// * Fails with [`Error::InvalidStageTransition`] if `next` is not after the current stage.
    pub fn advance(&mut self, next: BootstrapStage) -> Result<()> {
        if next <= self.stage {
            return Err(Error::InvalidStageTransition {
                from: self.stage.name(),
                to: next.name(),
            }
            .into());
        }
        info!("[Engine Init] {} -> {}", self.stage, next);
        self.stage = next;
        Ok(())
    }
}

/// The main graphics pipeline.
#[derive(Debug)]
pub enum PipelineSlot {
    /// Everything is configured except the shader stages.
    Pending(Box<PipelineBuilder>),
    Built(ResourceID),
}

/// A bootstrapped rendering context.
#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct Engine<B: Backend> {
    // Dropped before the backend, which owns the instance and surface.
    device: Device,
    tracker: StageTracker,
    swapchain: ResourceID,
    graphics_cmd: ResourceID,
    depth_image: ResourceID,
    depth_view: vk::ImageView,
    depth_format: vk::Format,
    render_pass: ResourceID,
    pipeline: PipelineSlot,
    #[derivative(Debug = "ignore")]
    backend: B,
}

impl<B: Backend> Engine<B> {
    /// Run the full bootstrap sequence on `backend`.
    /// # Errors
    /// Any failure aborts the bootstrap. The most common ones are
    /// * [`Error::NoSuitableAdapter`] if no adapter meets the GPU requirements.
    /// * [`Error::NoCapableQueueFamily`] if the chosen adapter cannot serve one of the queue roles.
    /// * [`Error::UnsupportedExtension`] if the adapter lacks one of the engine's device extensions.
    /// * [`Error::NoSupportedFormat`] if none of the depth formats can be used as depth attachment.
    /// * [`Error::NativeDriver`] for anything the driver refuses.
    pub fn bootstrap(settings: &AppSettings, backend: B) -> Result<Self> {
        let mut tracker = StageTracker::new();
        info!(
            "[Engine Init] Bootstrapping {} v{}.{}.{}",
            settings.name, settings.version.0, settings.version.1, settings.version.2
        );
        tracker.advance(BootstrapStage::ContextReady)?;

        let adapters = backend.list_adapters()?;
        let adapter = choose_adapter(&adapters, &settings.gpu_requirements)?;
        tracker.advance(BootstrapStage::AdapterChosen)?;

        let selector = select_queues(&adapter, &settings.gpu_requirements)?;
        tracker.advance(BootstrapStage::QueuesSelected)?;

        let extensions = engine_extensions(&settings.gpu_requirements)?;
        let features = device_features(&adapter, &settings.gpu_requirements);
        let mut device = Device::new(&backend, &adapter, &selector, extensions, &features)?;
        let mut names = vec![];
        device.extensions().populate_extension_names(&mut names);
        info!("[Vulkan Context] Enabled device extensions: {}", names.join(", "));
        tracker.advance(BootstrapStage::DeviceReady)?;

        let graphics = required_selection(&selector, QueueRole::Graphics)?;
        let transfer = required_selection(&selector, QueueRole::Transfer)?;
        let present = required_selection(&selector, QueueRole::Present)?;

        let mut swapchain_builder = SwapchainBuilder::new();
        swapchain_builder
            .surface(backend.surface(&adapter)?)?
            .extent(backend.drawable_size())?
            .queue_families(&[graphics.family_index, present.family_index])?;
        if let Some(format) = settings.surface_settings.surface_format {
            swapchain_builder.preferred_format(format)?;
        }
        if let Some(mode) = settings.surface_settings.present_mode {
            swapchain_builder.present_mode(mode)?;
        }
        let swapchain = device.create_swapchain(&mut swapchain_builder)?;
        let (color_format, extent) = {
            let swapchain = device.swapchain(swapchain)?;
            info!(
                "[Swapchain] Created swapchain with {} images, format {:?}, color space {:?}, extent {}x{}",
                swapchain.image_count(),
                swapchain.format().format,
                swapchain.format().color_space,
                swapchain.extent().width,
                swapchain.extent().height
            );
            (swapchain.format().format, swapchain.extent())
        };
        tracker.advance(BootstrapStage::SwapchainReady)?;

        device.configure_one_time_queue(transfer)?;
        let graphics_cmd = device.create_command_buffer(graphics, vk::CommandBufferLevel::PRIMARY)?;
        let depth_format = device.find_supported_format(
            &settings.depth_formats,
            vk::ImageTiling::OPTIMAL,
            vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
        )?;
        debug!("[Engine Init] Using depth format {depth_format:?}");
        let depth_image = device.create_image(
            ImageCreateInfo::new_2d(
                depth_format,
                extent.width,
                extent.height,
                vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            ),
            MemoryType::GpuOnly,
        )?;
        let depth_view = device.create_image_view(depth_image, depth_format, vk::ImageAspectFlags::DEPTH)?;
        let render_pass = create_main_render_pass(&mut device, color_format, depth_format)?;
        tracker.advance(BootstrapStage::RenderTargetsReady)?;

        let mut builder = main_pipeline_builder(render_pass, extent)?;
        let pipeline = match &settings.shaders {
            Some(shaders) => {
                builder
                    .attach_shader(vk::ShaderStageFlags::VERTEX, shaders.vertex.clone())?
                    .attach_shader(vk::ShaderStageFlags::FRAGMENT, shaders.fragment.clone())?;
                PipelineSlot::Built(device.create_pipeline(&mut builder)?)
            }
            None => {
                warn!("[Engine Init] No shaders supplied, the main pipeline is left unbuilt");
                PipelineSlot::Pending(Box::new(builder))
            }
        };
        tracker.advance(BootstrapStage::PipelineReady)?;

        Ok(Self {
            device,
            tracker,
            swapchain,
            graphics_cmd,
            depth_image,
            depth_view,
            depth_format,
            render_pass,
            pipeline,
            backend,
        })
    }

    /// Supply the shader stages of the main pipeline and build it.
    /// # Errors
    /// * Fails with [`Error::BuilderFinalized`] if the pipeline was already built.
    /// * Fails with [`Error::NativeDriver`] if the driver rejects the shader code or the pipeline.
    pub fn finish_pipeline(&mut self, vertex: Vec<u32>, fragment: Vec<u32>) -> Result<ResourceID> {
        let id = match &mut self.pipeline {
            PipelineSlot::Built(_) => return Err(Error::BuilderFinalized("main pipeline").into()),
            PipelineSlot::Pending(builder) => {
                builder
                    .attach_shader(vk::ShaderStageFlags::VERTEX, vertex)?
                    .attach_shader(vk::ShaderStageFlags::FRAGMENT, fragment)?;
                self.device.create_pipeline(builder)?
            }
        };
        self.pipeline = PipelineSlot::Built(id);
        Ok(id)
    }

    /// Enter the [`BootstrapStage::Running`] stage and call `frame` until it returns `false`. Waits for the device
    /// to be idle before returning.
    /// # Errors
    /// * Fails with [`Error::InvalidStageTransition`] if the engine is already running or has run before.
    pub fn run(&mut self, mut frame: impl FnMut(&Engine<B>) -> bool) -> Result<()> {
        self.tracker.advance(BootstrapStage::Running)?;
        while frame(&*self) {}
        self.device.wait_idle()
    }

    pub fn stage(&self) -> BootstrapStage {
        self.tracker.stage()
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut Device {
        &mut self.device
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn swapchain(&self) -> ResourceID {
        self.swapchain
    }

    /// Primary command buffer allocated on the graphics queue family.
    pub fn graphics_command_buffer(&self) -> ResourceID {
        self.graphics_cmd
    }

    pub fn depth_image(&self) -> ResourceID {
        self.depth_image
    }

    /// Get unsafe access to the depth attachment view.
    /// # Safety
    /// The view is owned by the depth image. It must not be destroyed manually.
    pub unsafe fn depth_view(&self) -> vk::ImageView {
        self.depth_view
    }

    pub fn depth_format(&self) -> vk::Format {
        self.depth_format
    }

    pub fn render_pass(&self) -> ResourceID {
        self.render_pass
    }

    /// The main pipeline, or `None` while it still waits for shaders.
    pub fn pipeline(&self) -> Option<ResourceID> {
        match &self.pipeline {
            PipelineSlot::Built(id) => Some(*id),
            PipelineSlot::Pending(_) => None,
        }
    }

    pub fn pipeline_slot(&self) -> &PipelineSlot {
        &self.pipeline
    }
}

fn required_selection(selector: &QueueFamilySelector, role: QueueRole) -> Result<QueueSelection> {
    selector
        .selection(role)
        .ok_or_else(|| Error::NoCapableQueueFamily(role).into())
}

/// Assign a queue to every role. Graphics and present share the first queue of their family. Compute and transfer get
/// their own queue, and fall back to sharing when the family is full and the requirements allow it.
fn select_queues(adapter: &Adapter, requirements: &GPURequirements) -> Result<QueueFamilySelector> {
    let layout = adapter.queue_families();
    let mut selector = QueueFamilySelector::new(layout);
    for role in QueueRole::ALL {
        let family = *layout
            .find_family_for_role(role)
            .ok_or(Error::NoCapableQueueFamily(role))?;
        let selection = match role {
            QueueRole::Graphics | QueueRole::Present => {
                selector.assign_shared(role, &family, requirements.queue_priority)?
            }
            QueueRole::Compute | QueueRole::Transfer => assign_own_queue(&mut selector, role, &family, requirements)?,
        };
        info!(
            "[Queue Selection] {} queue: family {}, queue {}",
            role, selection.family_index, selection.queue_index
        );
    }
    Ok(selector)
}

fn assign_own_queue(
    selector: &mut QueueFamilySelector,
    role: QueueRole,
    family: &QueueFamily,
    requirements: &GPURequirements,
) -> Result<QueueSelection> {
    match selector.assign(role, family, requirements.queue_priority) {
        Err(err)
            if requirements.allow_queue_sharing
                && matches!(err.downcast_ref::<Error>(), Some(Error::QueueCapacityExceeded { .. })) =>
        {
            warn!(
                "[Queue Selection] Queue family {} has no free queue for the {} role, sharing its first queue",
                family.index, role
            );
            selector.assign_shared(role, family, requirements.queue_priority)
        }
        result => result,
    }
}

/// The extensions every engine device is created with, followed by any additional ones the requirements name.
fn engine_extensions(requirements: &GPURequirements) -> Result<DeviceExtensionManager> {
    let mut extensions = DeviceExtensionManager::new();
    extensions.add_extension(SwapchainExtension)?;
    extensions.add_extension(ShaderClockExtension::new(false, false))?;
    extensions.add_extension(DeferredHostOperationsExtension)?;
    extensions.add_extension(AccelerationStructureExtension::new(true, false, false, false, false))?;
    extensions.add_extension(RayTracingPipelineExtension::new(true, false, false, false, false))?;
    for name in &requirements.device_extensions {
        if !extensions.contains(name) {
            extensions.add_extension(NamedExtension::new(name.clone()))?;
        }
    }
    Ok(extensions)
}

/// Required features plus the optional ones the engine uses when the adapter has them.
fn device_features(adapter: &Adapter, requirements: &GPURequirements) -> vk::PhysicalDeviceFeatures {
    let available = adapter.features();
    vk::PhysicalDeviceFeatures {
        fill_mode_non_solid: available.fill_mode_non_solid,
        sampler_anisotropy: available.sampler_anisotropy,
        shader_int64: available.shader_int64,
        ..requirements.features
    }
}

/// One subpass writing the swapchain image as attachment 0 and the depth buffer as attachment 1.
fn create_main_render_pass(device: &mut Device, color_format: vk::Format, depth_format: vk::Format) -> Result<ResourceID> {
    let mut builder = RenderPassBuilder::new();
    builder
        .add_attachment(RenderPassBuilder::create_attachment(
            color_format,
            vk::AttachmentLoadOp::CLEAR,
            vk::AttachmentStoreOp::STORE,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::PRESENT_SRC_KHR,
        ))?
        .add_attachment(RenderPassBuilder::create_attachment(
            depth_format,
            vk::AttachmentLoadOp::CLEAR,
            vk::AttachmentStoreOp::DONT_CARE,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        ))?
        .add_subpass(
            vk::PipelineBindPoint::GRAPHICS,
            &[
                AttachmentReference::new(AttachmentKind::Color, 0, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL),
                AttachmentReference::new(
                    AttachmentKind::DepthStencil,
                    1,
                    vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
                ),
            ],
            vk::SubpassDescriptionFlags::empty(),
        )?
        .add_dependency(vk::SubpassDependency {
            src_subpass: vk::SUBPASS_EXTERNAL,
            dst_subpass: 0,
            src_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            dst_stage_mask: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            src_access_mask: vk::AccessFlags::empty(),
            dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_READ | vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            dependency_flags: vk::DependencyFlags::empty(),
        })?;
    device.create_render_pass(&mut builder)
}

/// Opaque triangle list with back face culling and depth testing, drawing into subpass 0 of `render_pass`.
fn main_pipeline_builder(render_pass: ResourceID, extent: vk::Extent2D) -> Result<PipelineBuilder> {
    let mut builder = PipelineBuilder::new("main");
    builder
        .add_vertex_binding(Vertex::binding())?
        .set_input_assembly_state(vk::PrimitiveTopology::TRIANGLE_LIST, false)?
        .set_viewport_state(
            vec![vk::Viewport {
                x: 0.0,
                y: 0.0,
                width: extent.width as f32,
                height: extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            }],
            vec![vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent,
            }],
        )?
        .set_rasterization_state(vk::PolygonMode::FILL, vk::CullModeFlags::BACK, vk::FrontFace::COUNTER_CLOCKWISE)?
        .set_multisample_state(vk::SampleCountFlags::TYPE_1, false, 1.0)?
        .set_depth_stencil_state(true, true, vk::CompareOp::LESS)?
        .add_color_blend_attachment(PipelineBuilder::opaque_blend_attachment())?
        .set_render_pass(render_pass, 0)?;
    Ok(builder)
}
