//! The logical device and every resource created on it.
//!
//! A [`Device`] owns the chosen [`Adapter`], the queue assignment, the enabled extensions, the resource table and the
//! command pools. All resources are handed out as [`ResourceID`]s. When the device is dropped, every resource that is
//! still alive is destroyed in reverse creation order, followed by the command pools and the native device itself.

use std::collections::HashMap;

use anyhow::Result;
use ash::vk;

use crate::backend::{validate_extensions, Backend, Driver};
use crate::core::adapter::Adapter;
use crate::core::extension::{DeviceExtension, DeviceExtensionManager};
use crate::core::queue::{QueueFamilySelector, QueueRole, QueueSelection};
use crate::extensions::SwapchainExtension;
use crate::pass::RenderPassBuilder;
use crate::pipeline::builder::PipelineBuilder;
use crate::resource::image::base_subresource_range;
use crate::resource::table::{Resource, ResourceID, ResourceTable, ResourceType};
use crate::resource::{CommandBuffer, Image, ImageCreateInfo, MemoryType, Pipeline, RenderPass};
use crate::wsi::swapchain::{Swapchain, SwapchainBuilder};
use crate::Error;

/// Wrapper around a `VkDevice` and the resources created on it.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Device {
    #[derivative(Debug = "ignore")]
    driver: Box<dyn Driver>,
    adapter: Adapter,
    queues: HashMap<QueueRole, QueueSelection>,
    extensions: DeviceExtensionManager,
    table: ResourceTable,
    /// Lazily created command pool per queue family.
    pools: HashMap<u32, vk::CommandPool>,
    /// Transient pool for one-time submits, with the queue it submits to.
    one_time: Option<(QueueSelection, vk::CommandPool)>,
}

impl Device {
    /// Create the device on `adapter` with the queues allocated by `selector`, the registered `extensions` and the
    /// given core features.
    /// # Errors
    /// * Fails with [`Error::UnsupportedExtension`] if the adapter lacks a registered extension.
    /// * Fails with [`Error::NativeDriver`] if the driver refuses to create the device.
    pub fn new<B: Backend + ?Sized>(
        backend: &B,
        adapter: &Adapter,
        selector: &QueueFamilySelector,
        extensions: DeviceExtensionManager,
        features: &vk::PhysicalDeviceFeatures,
    ) -> Result<Self> {
        validate_extensions(adapter, &extensions)?;
        let requests = selector.queue_requests();
        let driver = backend.create_driver(adapter, &requests, &extensions, features)?;
        Ok(Self::from_driver(driver, adapter.clone(), selector, extensions))
    }

    /// Wrap an already created driver.
    pub fn from_driver(
        driver: Box<dyn Driver>,
        adapter: Adapter,
        selector: &QueueFamilySelector,
        extensions: DeviceExtensionManager,
    ) -> Self {
        Self {
            driver,
            adapter,
            queues: selector.selections().collect(),
            extensions,
            table: ResourceTable::new(),
            pools: HashMap::new(),
            one_time: None,
        }
    }

    /// The adapter this device was created on.
    pub fn adapter(&self) -> &Adapter {
        &self.adapter
    }

    /// Access the driver directly.
    /// # Safety
    /// Objects destroyed through the driver may still be referenced by the resource table.
    pub unsafe fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }

    /// The queue slot assigned to a role.
    pub fn queue_selection(&self, role: QueueRole) -> Option<QueueSelection> {
        self.queues.get(&role).copied()
    }

    /// Native queue for a role. Roles that share a slot return the same queue.
    /// # Errors
    /// * Fails with [`Error::NoCapableQueueFamily`] if no queue was assigned to the role.
    pub fn queue(&self, role: QueueRole) -> Result<vk::Queue> {
        let selection = self
            .queue_selection(role)
            .ok_or(Error::NoCapableQueueFamily(role))?;
        Ok(self
            .driver
            .get_device_queue(selection.family_index, selection.queue_index))
    }

    /// The extensions this device was created with.
    pub fn extensions(&self) -> &DeviceExtensionManager {
        &self.extensions
    }

    /// Typed lookup of an enabled extension.
    /// # Errors
    /// * Fails with [`Error::ExtensionNotEnabled`] if the device was created without it.
    pub fn extension<E: DeviceExtension + 'static>(&self) -> Result<&E> {
        self.extensions.get::<E>().ok_or_else(|| {
            let name = std::any::type_name::<E>().rsplit("::").next().unwrap_or_default();
            Error::ExtensionNotEnabled(name.to_owned()).into()
        })
    }

    /// Look up a resource of any kind.
    /// # Errors
    /// * Fails with [`Error::InvalidHandle`] if the ID is unknown, stale, of another kind or from another device.
    pub fn get<T: ResourceType>(&self, id: ResourceID) -> Result<&T> {
        self.table.get(id)
    }

    pub fn image(&self, id: ResourceID) -> Result<&Image> {
        self.get(id)
    }

    pub fn swapchain(&self, id: ResourceID) -> Result<&Swapchain> {
        self.get(id)
    }

    pub fn render_pass(&self, id: ResourceID) -> Result<&RenderPass> {
        self.get(id)
    }

    pub fn pipeline(&self, id: ResourceID) -> Result<&Pipeline> {
        self.get(id)
    }

    pub fn command_buffer(&self, id: ResourceID) -> Result<&CommandBuffer> {
        self.get(id)
    }

    /// True if the ID refers to a live resource on this device.
    pub fn contains(&self, id: ResourceID) -> bool {
        self.table.contains(id)
    }

    /// Number of live resources.
    pub fn resource_count(&self) -> usize {
        self.table.len()
    }

    /// Destroy a resource. Destroying the same ID twice fails.
    /// # Errors
    /// * Fails with [`Error::InvalidHandle`] if the ID does not refer to a live resource on this device.
    pub fn destroy(&mut self, id: ResourceID) -> Result<()> {
        let resource = self.table.destroy(id)?;
        self.destroy_resource(resource);
        Ok(())
    }

    fn destroy_resource(&self, resource: Resource) {
        #[cfg(feature = "log-objects")]
        trace!("Destroying {:?} resource", resource.kind());
        match resource {
            Resource::Image(image) => {
                for view in image.views {
                    self.driver.destroy_image_view(view);
                }
                self.driver.destroy_image(image.handle);
            }
            Resource::Swapchain(swapchain) => {
                // Views first, they reference the swapchain images.
                for view in swapchain.views {
                    self.driver.destroy_image_view(view);
                }
                self.driver.destroy_swapchain(swapchain.handle);
            }
            Resource::RenderPass(pass) => self.driver.destroy_render_pass(pass.handle),
            Resource::Pipeline(pipeline) => {
                self.driver.destroy_pipeline(pipeline.handle);
                self.driver.destroy_pipeline_layout(pipeline.layout);
            }
            Resource::CommandBuffer(cmd) => self.driver.free_command_buffer(cmd.pool, cmd.handle),
        }
    }

    /// Create an image backed by memory of the given type.
    pub fn create_image(&mut self, info: ImageCreateInfo, memory: MemoryType) -> Result<ResourceID> {
        let handle = self.driver.create_image(&info.to_vk(), memory, "image")?;
        #[cfg(feature = "log-objects")]
        trace!("Created new VkImage {handle:?}");
        Ok(self.table.create(Image {
            handle,
            info,
            memory,
            views: vec![],
        }))
    }

    /// Create a view covering the first mip level and layer of an image. The view is owned by the image and
    /// destroyed with it.
    pub fn create_image_view(&mut self, image: ResourceID, format: vk::Format, aspect: vk::ImageAspectFlags) -> Result<vk::ImageView> {
        let handle = self.image(image)?.handle;
        let info = vk::ImageViewCreateInfo::builder()
            .image(handle)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping::default())
            .subresource_range(base_subresource_range(aspect))
            .build();
        let view = self.driver.create_image_view(&info)?;
        self.table.get_mut::<Image>(image)?.views.push(view);
        Ok(view)
    }

    /// Return the first candidate format that supports `features` with the given tiling.
    /// # Errors
    /// * Fails with [`Error::NoSupportedFormat`] if none does.
    pub fn find_supported_format(
        &self,
        candidates: &[vk::Format],
        tiling: vk::ImageTiling,
        features: vk::FormatFeatureFlags,
    ) -> Result<vk::Format> {
        candidates
            .iter()
            .copied()
            .find(|format| {
                let properties = self.driver.format_properties(*format);
                match tiling {
                    vk::ImageTiling::LINEAR => properties.linear_tiling_features.contains(features),
                    vk::ImageTiling::OPTIMAL => properties.optimal_tiling_features.contains(features),
                    _ => false,
                }
            })
            .ok_or_else(|| Error::NoSupportedFormat.into())
    }

    /// Create a render pass from a builder. The builder is finalized on success.
    /// # Errors
    /// * Fails with [`Error::IncompleteBuilder`] if the builder lacks attachments or subpasses, or references an
    ///   attachment that does not exist.
    /// * Fails with [`Error::BuilderFinalized`] if the builder was already used.
    pub fn create_render_pass(&mut self, builder: &mut RenderPassBuilder) -> Result<ResourceID> {
        builder.validate()?;
        let handle = builder.with_create_info(|info| self.driver.create_render_pass(info))?;
        builder.finish();
        #[cfg(feature = "log-objects")]
        trace!("Created new VkRenderPass {handle:?}");
        Ok(self.table.create(RenderPass {
            handle,
            attachments: builder.attachments().to_vec(),
            subpass_count: builder.subpass_count(),
        }))
    }

    /// Create a graphics pipeline from a builder. The builder is finalized on success.
    /// # Errors
    /// * Fails with [`Error::IncompleteBuilder`] if the render pass, the vertex stage or the viewport state is missing.
    /// * Fails with [`Error::InvalidHandle`] if the render pass ID is not a live render pass on this device.
    /// * Fails with [`Error::BuilderFinalized`] if the builder was already used.
    pub fn create_pipeline(&mut self, builder: &mut PipelineBuilder) -> Result<ResourceID> {
        let (render_pass_id, subpass) = builder.validate()?;
        let render_pass = self.render_pass(render_pass_id)?.handle;
        let pipeline = builder.build_native(self.driver.as_ref(), render_pass)?;
        builder.finish();
        info!("Created pipeline {}", builder.name());
        Ok(self.table.create(Pipeline {
            handle: pipeline.0,
            layout: pipeline.1,
            name: builder.name().to_owned(),
            render_pass: render_pass_id,
            subpass,
        }))
    }

    /// Create a swapchain from a builder, with one color view per image. The builder is finalized on success.
    /// # Errors
    /// * Fails with [`Error::ExtensionNotEnabled`] if the device was created without [`SwapchainExtension`].
    /// * Fails with [`Error::IncompleteBuilder`] if the surface details or the extent are missing.
    /// * Fails with [`Error::BuilderFinalized`] if the builder was already used.
    pub fn create_swapchain(&mut self, builder: &mut SwapchainBuilder) -> Result<ResourceID> {
        SwapchainExtension::get(self)?;
        let params = builder.resolve()?;
        let (handle, images) = self.driver.create_swapchain(&params)?;
        let mut views = Vec::with_capacity(images.len());
        for image in &images {
            let info = vk::ImageViewCreateInfo::builder()
                .image(*image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(params.format.format)
                .components(vk::ComponentMapping::default())
                .subresource_range(base_subresource_range(vk::ImageAspectFlags::COLOR))
                .build();
            match self.driver.create_image_view(&info) {
                Ok(view) => views.push(view),
                Err(err) => {
                    for view in views {
                        self.driver.destroy_image_view(view);
                    }
                    self.driver.destroy_swapchain(handle);
                    return Err(err);
                }
            }
        }
        builder.finish();
        Ok(self.table.create(Swapchain {
            handle,
            images,
            views,
            format: params.format,
            present_mode: params.present_mode,
            extent: params.extent,
        }))
    }

    fn pool_for(&mut self, family_index: u32) -> Result<vk::CommandPool> {
        if let Some(pool) = self.pools.get(&family_index) {
            return Ok(*pool);
        }
        let pool = self
            .driver
            .create_command_pool(family_index, vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)?;
        debug!("Created command pool for queue family {family_index}");
        self.pools.insert(family_index, pool);
        Ok(pool)
    }

    /// Allocate a command buffer for the family of `selection`, from that family's pool.
    pub fn create_command_buffer(&mut self, selection: QueueSelection, level: vk::CommandBufferLevel) -> Result<ResourceID> {
        let pool = self.pool_for(selection.family_index)?;
        let handle = self.driver.allocate_command_buffer(pool, level)?;
        Ok(self.table.create(CommandBuffer {
            handle,
            pool,
            family_index: selection.family_index,
            level,
        }))
    }

    /// Set the queue used for one-time submits, such as uploads, and create its transient pool. Calling this again
    /// replaces the previous pool.
    pub fn configure_one_time_queue(&mut self, selection: QueueSelection) -> Result<()> {
        let pool = self
            .driver
            .create_command_pool(selection.family_index, vk::CommandPoolCreateFlags::TRANSIENT)?;
        if let Some((_, old)) = self.one_time.replace((selection, pool)) {
            self.driver.destroy_command_pool(old);
        }
        debug!(
            "One-time submits go to queue {} of family {}",
            selection.queue_index, selection.family_index
        );
        Ok(())
    }

    /// The queue configured for one-time submits.
    pub fn one_time_queue(&self) -> Option<QueueSelection> {
        self.one_time.map(|(selection, _)| selection)
    }

    /// Wait until the device is idle.
    pub fn wait_idle(&self) -> Result<()> {
        self.driver.wait_idle()
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        if let Err(err) = self.driver.wait_idle() {
            error!("Failed to wait for device idle during teardown: {err}");
        }
        for resource in self.table.drain_reverse() {
            self.destroy_resource(resource);
        }
        if let Some((_, pool)) = self.one_time.take() {
            self.driver.destroy_command_pool(pool);
        }
        for (_, pool) in self.pools.drain() {
            self.driver.destroy_command_pool(pool);
        }
    }
}
