//! A backend without hardware.
//!
//! The null backend reports a fixed list of synthetic adapters and a fixed surface. Its driver hands out unique fake
//! handles and, optionally, records every create and destroy call in a [`DriverLog`].
//!
//! # Example
//! ```
//! # use deimos::prelude::*;
//! # use deimos::backend::null::NullBackend;
//! let adapter = Adapter::named("Null GPU").with_queue_family(QueueFamily::new(0, vk::QueueFlags::GRAPHICS, 1).with_present(true));
//! let backend = NullBackend::new(vec![adapter], vk::Extent2D { width: 640, height: 480 });
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use ash::vk;
use ash::vk::Handle;

use crate::backend::{Backend, Driver};
use crate::core::adapter::Adapter;
use crate::core::extension::DeviceExtensionManager;
use crate::core::queue::QueueFamilyRequest;
use crate::resource::MemoryType;
use crate::wsi::surface::SurfaceDetails;
use crate::wsi::swapchain::SwapchainCreateParams;
use crate::Error;

/// A single driver call observed by the null driver.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DriverEvent {
    Created(vk::ObjectType, u64),
    Destroyed(vk::ObjectType, u64),
}

/// Shared record of driver calls, in call order.
pub type DriverLog = Arc<Mutex<Vec<DriverEvent>>>;

/// Backend over synthetic adapters.
#[derive(Debug)]
pub struct NullBackend {
    adapters: Vec<Adapter>,
    surface: SurfaceDetails,
    size: vk::Extent2D,
    log: Option<DriverLog>,
}

impl NullBackend {
    /// Create a backend over the given adapters with a window of the given size. The default surface allows two to
    /// three images of exactly that size, offers `B8G8R8A8_SRGB` and `R8G8B8A8_SRGB` and presents with `FIFO` or
    /// `MAILBOX`.
    pub fn new(adapters: Vec<Adapter>, size: vk::Extent2D) -> Self {
        let srgb = |format| vk::SurfaceFormatKHR {
            format,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        Self {
            adapters,
            surface: SurfaceDetails {
                handle: vk::SurfaceKHR::null(),
                capabilities: vk::SurfaceCapabilitiesKHR {
                    min_image_count: 2,
                    max_image_count: 3,
                    current_extent: size,
                    min_image_extent: size,
                    max_image_extent: size,
                    max_image_array_layers: 1,
                    supported_transforms: vk::SurfaceTransformFlagsKHR::IDENTITY,
                    current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
                    supported_composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
                    supported_usage_flags: vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST,
                },
                formats: vec![srgb(vk::Format::B8G8R8A8_SRGB), srgb(vk::Format::R8G8B8A8_SRGB)],
                present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
            },
            size,
            log: None,
        }
    }

    /// Replace the reported surface.
    pub fn with_surface(mut self, surface: SurfaceDetails) -> Self {
        self.surface = surface;
        self
    }

    /// Record driver calls of every device created from this backend into `log`.
    pub fn with_log(mut self, log: DriverLog) -> Self {
        self.log = Some(log);
        self
    }
}

impl Backend for NullBackend {
    fn list_adapters(&self) -> Result<Vec<Adapter>> {
        Ok(self.adapters.clone())
    }

    fn surface(&self, _adapter: &Adapter) -> Result<SurfaceDetails> {
        Ok(self.surface.clone())
    }

    fn drawable_size(&self) -> vk::Extent2D {
        self.size
    }

    fn create_driver(
        &self,
        adapter: &Adapter,
        queues: &[QueueFamilyRequest],
        extensions: &DeviceExtensionManager,
        _features: &vk::PhysicalDeviceFeatures,
    ) -> Result<Box<dyn Driver>> {
        info!(
            "[Null Backend] Creating device on {} with {} queue famil(ies) and {} extension(s)",
            adapter.properties().name,
            queues.len(),
            extensions.len()
        );
        Ok(Box::new(NullDriver::new(self.log.clone())))
    }
}

/// Driver that mints unique fake handles.
#[derive(Debug, Default)]
pub struct NullDriver {
    next_handle: AtomicU64,
    log: Option<DriverLog>,
}

impl NullDriver {
    pub fn new(log: Option<DriverLog>) -> Self {
        Self {
            next_handle: AtomicU64::new(1),
            log,
        }
    }

    fn record(&self, event: DriverEvent) {
        if let Some(log) = &self.log {
            // A poisoned log only happens if a test already panicked.
            if let Ok(mut events) = log.lock() {
                events.push(event);
            }
        }
    }

    fn mint<T: Handle>(&self) -> T {
        let raw = self.next_handle.fetch_add(1, Ordering::Relaxed);
        self.record(DriverEvent::Created(T::TYPE, raw));
        T::from_raw(raw)
    }

    fn release<T: Handle>(&self, handle: T) {
        self.record(DriverEvent::Destroyed(T::TYPE, handle.as_raw()));
    }
}

impl Driver for NullDriver {
    fn create_render_pass(&self, _info: &vk::RenderPassCreateInfo) -> Result<vk::RenderPass> {
        Ok(self.mint())
    }

    fn destroy_render_pass(&self, handle: vk::RenderPass) {
        self.release(handle)
    }

    fn create_shader_module(&self, code: &[u32]) -> Result<vk::ShaderModule> {
        if code.is_empty() {
            return Err(Error::NativeDriver(vk::Result::ERROR_INVALID_SHADER_NV).into());
        }
        Ok(self.mint())
    }

    fn destroy_shader_module(&self, handle: vk::ShaderModule) {
        self.release(handle)
    }

    fn create_pipeline_layout(&self, _info: &vk::PipelineLayoutCreateInfo) -> Result<vk::PipelineLayout> {
        Ok(self.mint())
    }

    fn destroy_pipeline_layout(&self, handle: vk::PipelineLayout) {
        self.release(handle)
    }

    fn create_graphics_pipeline(&self, _info: &vk::GraphicsPipelineCreateInfo) -> Result<vk::Pipeline> {
        Ok(self.mint())
    }

    fn destroy_pipeline(&self, handle: vk::Pipeline) {
        self.release(handle)
    }

    fn create_image(&self, _info: &vk::ImageCreateInfo, _memory: MemoryType, _name: &str) -> Result<vk::Image> {
        Ok(self.mint())
    }

    fn destroy_image(&self, handle: vk::Image) {
        self.release(handle)
    }

    fn create_image_view(&self, _info: &vk::ImageViewCreateInfo) -> Result<vk::ImageView> {
        Ok(self.mint())
    }

    fn destroy_image_view(&self, handle: vk::ImageView) {
        self.release(handle)
    }

    fn create_command_pool(&self, _family_index: u32, _flags: vk::CommandPoolCreateFlags) -> Result<vk::CommandPool> {
        Ok(self.mint())
    }

    fn destroy_command_pool(&self, handle: vk::CommandPool) {
        self.release(handle)
    }

    fn allocate_command_buffer(&self, _pool: vk::CommandPool, _level: vk::CommandBufferLevel) -> Result<vk::CommandBuffer> {
        Ok(self.mint())
    }

    fn free_command_buffer(&self, _pool: vk::CommandPool, handle: vk::CommandBuffer) {
        self.release(handle)
    }

    fn create_swapchain(&self, params: &SwapchainCreateParams) -> Result<(vk::SwapchainKHR, Vec<vk::Image>)> {
        let swapchain = self.mint();
        // Swapchain images belong to the swapchain, so they are not recorded.
        let images = (0..params.min_image_count)
            .map(|_| vk::Image::from_raw(self.next_handle.fetch_add(1, Ordering::Relaxed)))
            .collect();
        Ok((swapchain, images))
    }

    fn destroy_swapchain(&self, handle: vk::SwapchainKHR) {
        self.release(handle)
    }

    fn format_properties(&self, _format: vk::Format) -> vk::FormatProperties {
        let all = vk::FormatFeatureFlags::COLOR_ATTACHMENT
            | vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT
            | vk::FormatFeatureFlags::SAMPLED_IMAGE
            | vk::FormatFeatureFlags::TRANSFER_SRC
            | vk::FormatFeatureFlags::TRANSFER_DST;
        vk::FormatProperties {
            linear_tiling_features: all,
            optimal_tiling_features: all,
            buffer_features: vk::FormatFeatureFlags::empty(),
        }
    }

    fn get_device_queue(&self, family_index: u32, queue_index: u32) -> vk::Queue {
        // Deterministic so that aliased selections yield the same queue.
        vk::Queue::from_raw(((family_index as u64 + 1) << 32) | queue_index as u64)
    }

    fn wait_idle(&self) -> Result<()> {
        Ok(())
    }
}
