//! The driver boundary.
//!
//! Everything above this module works with [`Adapter`]s, [`ResourceID`](crate::ResourceID)s and builders. Everything
//! below it talks to the native API. The boundary is split in two traits:
//! * [`Backend`] is the instance level. It enumerates adapters, reports surface support and creates device drivers.
//! * [`Driver`] is the device level. It creates and destroys native objects.
//!
//! [`vulkan::VulkanBackend`] implements both on top of `ash`. [`null::NullBackend`] mints unique fake handles without
//! touching any hardware, which allows exercising the whole bootstrap sequence on machines without a GPU.

use anyhow::Result;
use ash::vk;

use crate::core::adapter::Adapter;
use crate::core::extension::DeviceExtensionManager;
use crate::core::queue::QueueFamilyRequest;
use crate::resource::MemoryType;
use crate::wsi::surface::SurfaceDetails;
use crate::wsi::swapchain::SwapchainCreateParams;
use crate::Error;

pub mod null;
pub mod vulkan;

/// Instance level driver interface.
pub trait Backend {
    /// Enumerate all adapters, in driver order. Safe to call repeatedly.
    fn list_adapters(&self) -> Result<Vec<Adapter>>;

    /// Surface capabilities, formats and present modes as seen by an adapter.
    fn surface(&self, adapter: &Adapter) -> Result<SurfaceDetails>;

    /// Current size of the drawable area of the window.
    fn drawable_size(&self) -> vk::Extent2D;

    /// Create the native device. The caller has already validated the extensions against the adapter.
    fn create_driver(
        &self,
        adapter: &Adapter,
        queues: &[QueueFamilyRequest],
        extensions: &DeviceExtensionManager,
        features: &vk::PhysicalDeviceFeatures,
    ) -> Result<Box<dyn Driver>>;
}

/// Device level driver interface. Destroy calls are infallible since they run during teardown.
pub trait Driver {
    fn create_render_pass(&self, info: &vk::RenderPassCreateInfo) -> Result<vk::RenderPass>;
    fn destroy_render_pass(&self, handle: vk::RenderPass);

    fn create_shader_module(&self, code: &[u32]) -> Result<vk::ShaderModule>;
    fn destroy_shader_module(&self, handle: vk::ShaderModule);

    fn create_pipeline_layout(&self, info: &vk::PipelineLayoutCreateInfo) -> Result<vk::PipelineLayout>;
    fn destroy_pipeline_layout(&self, handle: vk::PipelineLayout);

    fn create_graphics_pipeline(&self, info: &vk::GraphicsPipelineCreateInfo) -> Result<vk::Pipeline>;
    fn destroy_pipeline(&self, handle: vk::Pipeline);

    /// Create an image and bind freshly allocated memory to it.
    fn create_image(&self, info: &vk::ImageCreateInfo, memory: MemoryType, name: &str) -> Result<vk::Image>;
    /// Destroy an image created with [`Driver::create_image()`] and release its memory.
    fn destroy_image(&self, handle: vk::Image);

    fn create_image_view(&self, info: &vk::ImageViewCreateInfo) -> Result<vk::ImageView>;
    fn destroy_image_view(&self, handle: vk::ImageView);

    fn create_command_pool(&self, family_index: u32, flags: vk::CommandPoolCreateFlags) -> Result<vk::CommandPool>;
    fn destroy_command_pool(&self, handle: vk::CommandPool);

    fn allocate_command_buffer(&self, pool: vk::CommandPool, level: vk::CommandBufferLevel) -> Result<vk::CommandBuffer>;
    fn free_command_buffer(&self, pool: vk::CommandPool, handle: vk::CommandBuffer);

    /// Create a swapchain and return it together with its images.
    fn create_swapchain(&self, params: &SwapchainCreateParams) -> Result<(vk::SwapchainKHR, Vec<vk::Image>)>;
    fn destroy_swapchain(&self, handle: vk::SwapchainKHR);

    fn format_properties(&self, format: vk::Format) -> vk::FormatProperties;

    fn get_device_queue(&self, family_index: u32, queue_index: u32) -> vk::Queue;

    fn wait_idle(&self) -> Result<()>;
}

/// Check that the adapter supports every registered extension.
/// # Errors
/// * Fails with [`Error::UnsupportedExtension`] naming the first unsupported extension.
pub fn validate_extensions(adapter: &Adapter, extensions: &DeviceExtensionManager) -> Result<()> {
    match extensions.iter().find(|ext| !adapter.supports_extension(ext.name())) {
        None => Ok(()),
        Some(ext) => Err(Error::UnsupportedExtension(ext.name().to_owned()).into()),
    }
}
