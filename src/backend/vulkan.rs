//! The real driver, built on `ash`, `ash-window` and `gpu-allocator`.

use std::collections::{HashMap, HashSet};
use std::ffi::c_void;
use std::sync::Mutex;

use anyhow::Result;
use ash::vk;
use gpu_allocator::vulkan as vk_alloc;
use gpu_allocator::vulkan::AllocationScheme;

use crate::backend::{Backend, Driver};
use crate::core::adapter::{Adapter, AdapterProperties};
use crate::core::debug::DebugMessenger;
use crate::core::extension::DeviceExtensionManager;
use crate::core::instance::Instance;
use crate::core::queue::{QueueFamily, QueueFamilyLayout, QueueFamilyRequest};
use crate::extensions::SWAPCHAIN;
use crate::resource::MemoryType;
use crate::util::string::{to_c_strings, unwrap_to_raw_strings, wrap_c_array};
use crate::wsi::surface::{Surface, SurfaceDetails};
use crate::wsi::swapchain::SwapchainCreateParams;
use crate::{AppSettings, Error, Window};

/// Instance level state: the loaded library, the debug messenger and the window surface.
#[derive(Debug)]
pub struct VulkanBackend {
    // Field order is drop order: the surface and messenger must go before the instance.
    surface: Surface,
    /// Only held so validation output is forwarded until the backend is dropped.
    #[allow(dead_code)]
    debug_messenger: Option<DebugMessenger>,
    instance: Instance,
    size: vk::Extent2D,
}

impl VulkanBackend {
    /// Load Vulkan, create the instance with the surface extensions the window needs, and create the surface.
    /// # Errors
    /// * Fails with [`Error::NoWindow`] if no window is given. Headless contexts are not supported.
    /// * Fails with [`Error::LoadFailed`] if the Vulkan loader was not found.
    pub fn new(settings: &AppSettings, window: Option<&dyn Window>) -> Result<Self> {
        let window = window.ok_or(Error::NoWindow)?;
        let instance = Instance::new(settings, Some(window))?;
        info!("[Vulkan Context] API Version: 1.3");
        info!(
            "[Vulkan Context] Validation layers: {}",
            if settings.enable_validation { "enabled" } else { "disabled" }
        );
        let debug_messenger = if settings.enable_validation {
            Some(DebugMessenger::new(&instance)?)
        } else {
            None
        };
        let surface = Surface::new(&instance, window)?;
        Ok(Self {
            surface,
            debug_messenger,
            instance,
            size: window.extent(),
        })
    }

    /// Get access to the loaded instance.
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    fn scan(&self, physical_device: vk::PhysicalDevice) -> Result<Adapter> {
        let instance = &self.instance;
        let (properties, memory, features, extensions, families) = unsafe {
            (
                instance.get_physical_device_properties(physical_device),
                instance.get_physical_device_memory_properties(physical_device),
                instance.get_physical_device_features(physical_device),
                instance.enumerate_device_extension_properties(physical_device)?,
                instance.get_physical_device_queue_family_properties(physical_device),
            )
        };
        let device_local_memory = memory.memory_heaps[..memory.memory_heap_count as usize]
            .iter()
            .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
            .map(|heap| heap.size)
            .sum();
        let extensions = extensions
            .iter()
            .map(|ext| wrap_c_array(&ext.extension_name))
            .collect::<HashSet<_>>();
        let families = families
            .iter()
            .enumerate()
            .map(|(index, family)| {
                let present = self.surface.supports_present(physical_device, index as u32)?;
                Ok(QueueFamily::from_vk(index as u32, family, present))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Adapter::from_native(
            physical_device,
            AdapterProperties {
                name: wrap_c_array(&properties.device_name),
                vendor_id: properties.vendor_id,
                device_id: properties.device_id,
                device_type: properties.device_type,
                api_version: properties.api_version,
                driver_version: properties.driver_version,
                device_local_memory,
            },
            features,
            extensions,
            QueueFamilyLayout::new(families),
        ))
    }
}

impl Backend for VulkanBackend {
    fn list_adapters(&self) -> Result<Vec<Adapter>> {
        let devices = unsafe { self.instance.enumerate_physical_devices()? };
        devices.into_iter().map(|device| self.scan(device)).collect()
    }

    fn surface(&self, adapter: &Adapter) -> Result<SurfaceDetails> {
        self.surface.query_details(unsafe { adapter.handle() })
    }

    fn drawable_size(&self) -> vk::Extent2D {
        self.size
    }

    fn create_driver(
        &self,
        adapter: &Adapter,
        queues: &[QueueFamilyRequest],
        extensions: &DeviceExtensionManager,
        features: &vk::PhysicalDeviceFeatures,
    ) -> Result<Box<dyn Driver>> {
        Ok(Box::new(VulkanDriver::new(&self.instance, adapter, queues, extensions, features)?))
    }
}

/// Device level state: the logical device, its extension loaders and the memory allocator.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct VulkanDriver {
    #[derivative(Debug = "ignore")]
    device: ash::Device,
    #[derivative(Debug = "ignore")]
    swapchain: Option<ash::extensions::khr::Swapchain>,
    #[derivative(Debug = "ignore")]
    instance: ash::Instance,
    physical_device: vk::PhysicalDevice,
    /// Taken out in `Drop` so it is destroyed before the device.
    #[derivative(Debug = "ignore")]
    allocator: Mutex<Option<vk_alloc::Allocator>>,
    #[derivative(Debug = "ignore")]
    allocations: Mutex<HashMap<vk::Image, vk_alloc::Allocation>>,
}

impl VulkanDriver {
    fn new(
        instance: &Instance,
        adapter: &Adapter,
        queues: &[QueueFamilyRequest],
        extensions: &DeviceExtensionManager,
        features: &vk::PhysicalDeviceFeatures,
    ) -> Result<Self> {
        let physical_device = unsafe { adapter.handle() };
        let queue_create_infos = queues
            .iter()
            .map(|request| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(request.family_index)
                    .queue_priorities(request.priorities.as_slice())
                    .build()
            })
            .collect::<Vec<_>>();

        let mut names = vec![];
        extensions.populate_extension_names(&mut names);
        let extension_names = to_c_strings(&names)?;
        let extension_names_raw = unwrap_to_raw_strings(extension_names.as_slice());

        let mut info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(queue_create_infos.as_slice())
            .enabled_extension_names(extension_names_raw.as_slice())
            .enabled_features(features)
            .build();
        info.p_next = extensions.feature_chain() as *const c_void;

        let device = unsafe { instance.create_device(physical_device, &info, None)? };
        #[cfg(feature = "log-objects")]
        trace!("Created new VkDevice {:?}", device.handle());

        let swapchain = if extensions.contains(SWAPCHAIN) {
            Some(ash::extensions::khr::Swapchain::new(instance, &device))
        } else {
            None
        };

        let allocator = vk_alloc::Allocator::new(&vk_alloc::AllocatorCreateDesc {
            instance: (**instance).clone(),
            device: device.clone(),
            physical_device,
            debug_settings: Default::default(),
            buffer_device_address: false,
        });
        let allocator = match allocator {
            Ok(allocator) => allocator,
            Err(err) => {
                unsafe { device.destroy_device(None) };
                return Err(err.into());
            }
        };

        Ok(Self {
            device,
            swapchain,
            instance: (**instance).clone(),
            physical_device,
            allocator: Mutex::new(Some(allocator)),
            allocations: Mutex::new(HashMap::new()),
        })
    }

    fn swapchain_loader(&self) -> Result<&ash::extensions::khr::Swapchain> {
        self.swapchain
            .as_ref()
            .ok_or_else(|| Error::ExtensionNotEnabled(String::from(SWAPCHAIN)).into())
    }

    fn allocate_image_memory(&self, image: vk::Image, memory: MemoryType, name: &str) -> Result<()> {
        let requirements = unsafe { self.device.get_image_memory_requirements(image) };
        let mut allocator = self.allocator.lock().map_err(|_| Error::PoisonError)?;
        let allocator = allocator.as_mut().ok_or(Error::PoisonError)?;
        let allocation = allocator.allocate(&vk_alloc::AllocationCreateDesc {
            name,
            requirements,
            location: gpu_allocator::MemoryLocation::from(memory),
            linear: false,
            allocation_scheme: AllocationScheme::GpuAllocatorManaged,
        })?;
        // SAFETY: The allocation was made for this image's requirements.
        let bound = unsafe { self.device.bind_image_memory(image, allocation.memory(), allocation.offset()) };
        if let Err(err) = bound {
            allocator.free(allocation)?;
            return Err(Error::from(err).into());
        }
        self.allocations
            .lock()
            .map_err(|_| Error::PoisonError)?
            .insert(image, allocation);
        Ok(())
    }
}

impl Driver for VulkanDriver {
    fn create_render_pass(&self, info: &vk::RenderPassCreateInfo) -> Result<vk::RenderPass> {
        Ok(unsafe { self.device.create_render_pass(info, None) }.map_err(Error::from)?)
    }

    fn destroy_render_pass(&self, handle: vk::RenderPass) {
        unsafe { self.device.destroy_render_pass(handle, None) }
    }

    fn create_shader_module(&self, code: &[u32]) -> Result<vk::ShaderModule> {
        let info = vk::ShaderModuleCreateInfo::builder().code(code).build();
        Ok(unsafe { self.device.create_shader_module(&info, None) }.map_err(Error::from)?)
    }

    fn destroy_shader_module(&self, handle: vk::ShaderModule) {
        unsafe { self.device.destroy_shader_module(handle, None) }
    }

    fn create_pipeline_layout(&self, info: &vk::PipelineLayoutCreateInfo) -> Result<vk::PipelineLayout> {
        Ok(unsafe { self.device.create_pipeline_layout(info, None) }.map_err(Error::from)?)
    }

    fn destroy_pipeline_layout(&self, handle: vk::PipelineLayout) {
        unsafe { self.device.destroy_pipeline_layout(handle, None) }
    }

    fn create_graphics_pipeline(&self, info: &vk::GraphicsPipelineCreateInfo) -> Result<vk::Pipeline> {
        let pipelines = unsafe {
            self.device
                .create_graphics_pipelines(vk::PipelineCache::null(), std::slice::from_ref(info), None)
        }
        .map_err(Error::from)?;
        pipelines
            .into_iter()
            .next()
            .ok_or_else(|| Error::NativeDriver(vk::Result::ERROR_UNKNOWN).into())
    }

    fn destroy_pipeline(&self, handle: vk::Pipeline) {
        unsafe { self.device.destroy_pipeline(handle, None) }
    }

    fn create_image(&self, info: &vk::ImageCreateInfo, memory: MemoryType, name: &str) -> Result<vk::Image> {
        let image = unsafe { self.device.create_image(info, None) }.map_err(Error::from)?;
        if let Err(err) = self.allocate_image_memory(image, memory, name) {
            unsafe { self.device.destroy_image(image, None) };
            return Err(err);
        }
        Ok(image)
    }

    fn destroy_image(&self, handle: vk::Image) {
        unsafe { self.device.destroy_image(handle, None) };
        let allocation = self
            .allocations
            .lock()
            .ok()
            .and_then(|mut allocations| allocations.remove(&handle));
        if let (Some(allocation), Ok(mut allocator)) = (allocation, self.allocator.lock()) {
            if let Some(allocator) = allocator.as_mut() {
                if let Err(err) = allocator.free(allocation) {
                    error!("Failed to free image memory: {err}");
                }
            }
        }
    }

    fn create_image_view(&self, info: &vk::ImageViewCreateInfo) -> Result<vk::ImageView> {
        Ok(unsafe { self.device.create_image_view(info, None) }.map_err(Error::from)?)
    }

    fn destroy_image_view(&self, handle: vk::ImageView) {
        unsafe { self.device.destroy_image_view(handle, None) }
    }

    fn create_command_pool(&self, family_index: u32, flags: vk::CommandPoolCreateFlags) -> Result<vk::CommandPool> {
        let info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(family_index)
            .flags(flags)
            .build();
        Ok(unsafe { self.device.create_command_pool(&info, None) }.map_err(Error::from)?)
    }

    fn destroy_command_pool(&self, handle: vk::CommandPool) {
        unsafe { self.device.destroy_command_pool(handle, None) }
    }

    fn allocate_command_buffer(&self, pool: vk::CommandPool, level: vk::CommandBufferLevel) -> Result<vk::CommandBuffer> {
        let info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(pool)
            .level(level)
            .command_buffer_count(1)
            .build();
        let buffers = unsafe { self.device.allocate_command_buffers(&info) }.map_err(Error::from)?;
        buffers
            .into_iter()
            .next()
            .ok_or_else(|| Error::NativeDriver(vk::Result::ERROR_UNKNOWN).into())
    }

    fn free_command_buffer(&self, pool: vk::CommandPool, handle: vk::CommandBuffer) {
        unsafe { self.device.free_command_buffers(pool, std::slice::from_ref(&handle)) }
    }

    fn create_swapchain(&self, params: &SwapchainCreateParams) -> Result<(vk::SwapchainKHR, Vec<vk::Image>)> {
        let loader = self.swapchain_loader()?;
        let info = vk::SwapchainCreateInfoKHR::builder()
            .surface(params.surface)
            .min_image_count(params.min_image_count)
            .image_format(params.format.format)
            .image_color_space(params.format.color_space)
            .image_extent(params.extent)
            .image_array_layers(1)
            .image_usage(params.usage)
            .image_sharing_mode(params.sharing_mode())
            .queue_family_indices(params.queue_families.as_slice())
            .pre_transform(params.pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(params.present_mode)
            .clipped(true)
            .build();
        let swapchain = unsafe { loader.create_swapchain(&info, None) }.map_err(Error::from)?;
        match unsafe { loader.get_swapchain_images(swapchain) } {
            Ok(images) => Ok((swapchain, images)),
            Err(err) => {
                unsafe { loader.destroy_swapchain(swapchain, None) };
                Err(Error::from(err).into())
            }
        }
    }

    fn destroy_swapchain(&self, handle: vk::SwapchainKHR) {
        if let Some(loader) = &self.swapchain {
            unsafe { loader.destroy_swapchain(handle, None) }
        }
    }

    fn format_properties(&self, format: vk::Format) -> vk::FormatProperties {
        unsafe {
            self.instance
                .get_physical_device_format_properties(self.physical_device, format)
        }
    }

    fn get_device_queue(&self, family_index: u32, queue_index: u32) -> vk::Queue {
        unsafe { self.device.get_device_queue(family_index, queue_index) }
    }

    fn wait_idle(&self) -> Result<()> {
        Ok(unsafe { self.device.device_wait_idle() }.map_err(Error::from)?)
    }
}

impl Drop for VulkanDriver {
    fn drop(&mut self) {
        if let Ok(mut allocations) = self.allocations.lock() {
            allocations.clear();
        }
        if let Ok(mut allocator) = self.allocator.lock() {
            allocator.take();
        }
        #[cfg(feature = "log-objects")]
        trace!("Destroying VkDevice {:?}", self.device.handle());
        unsafe {
            self.device.destroy_device(None);
        }
    }
}
