//! Exposes the resource handle table and the resources it stores.
//!
//! Every object created on a [`Device`](crate::Device) is registered in its [`ResourceTable`](table::ResourceTable) and
//! handed out as a [`ResourceID`](table::ResourceID). Look resources up through the device, and destroy them with
//! [`Device::destroy()`](crate::Device::destroy). Anything still alive when the device drops is destroyed in reverse
//! creation order.

use ash::vk;

pub mod image;
pub mod table;

pub use image::{Image, ImageCreateInfo, MemoryType};

/// A [`VkRenderPass`](vk::RenderPass) created from a [`RenderPassBuilder`](crate::RenderPassBuilder).
#[derive(Debug)]
pub struct RenderPass {
    pub(crate) handle: vk::RenderPass,
    pub(crate) attachments: Vec<vk::AttachmentDescription>,
    pub(crate) subpass_count: u32,
}

impl RenderPass {
    /// Get unsafe access to the underlying `VkRenderPass`.
    /// # Safety
    /// The handle is valid as long as the resource is not destroyed. Do not destroy it manually.
    pub unsafe fn handle(&self) -> vk::RenderPass {
        self.handle
    }

    pub fn attachments(&self) -> &[vk::AttachmentDescription] {
        self.attachments.as_slice()
    }

    pub fn subpass_count(&self) -> u32 {
        self.subpass_count
    }
}

/// A graphics pipeline together with its layout.
#[derive(Debug)]
pub struct Pipeline {
    pub(crate) handle: vk::Pipeline,
    pub(crate) layout: vk::PipelineLayout,
    pub(crate) name: String,
    pub(crate) render_pass: table::ResourceID,
    pub(crate) subpass: u32,
}

impl Pipeline {
    /// Get unsafe access to the underlying `VkPipeline`.
    /// # Safety
    /// The handle is valid as long as the resource is not destroyed. Do not destroy it manually.
    pub unsafe fn handle(&self) -> vk::Pipeline {
        self.handle
    }

    /// # Safety
    /// See [`Pipeline::handle()`].
    pub unsafe fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The render pass this pipeline was built against.
    pub fn render_pass(&self) -> table::ResourceID {
        self.render_pass
    }

    pub fn subpass(&self) -> u32 {
        self.subpass
    }
}

/// A command buffer allocated from one of the device's per-family pools.
#[derive(Debug)]
pub struct CommandBuffer {
    pub(crate) handle: vk::CommandBuffer,
    pub(crate) pool: vk::CommandPool,
    pub(crate) family_index: u32,
    pub(crate) level: vk::CommandBufferLevel,
}

impl CommandBuffer {
    /// Get unsafe access to the underlying `VkCommandBuffer`.
    /// # Safety
    /// The handle is valid as long as the resource is not destroyed. Do not free it manually.
    pub unsafe fn handle(&self) -> vk::CommandBuffer {
        self.handle
    }

    /// Queue family this command buffer can be submitted to.
    pub fn family_index(&self) -> u32 {
        self.family_index
    }

    pub fn level(&self) -> vk::CommandBufferLevel {
        self.level
    }
}
