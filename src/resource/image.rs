//! Images owned by the resource table.
//!
//! Images are usually backed by a memory allocation made through the driver. Swapchain images are owned by the
//! presentation engine and are stored inside their [`Swapchain`](crate::wsi::swapchain::Swapchain) instead.

use ash::vk;

/// The memory type of an allocation indicates where it should live.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum MemoryType {
    /// Store the allocation in GPU only accessible memory - typically this is the faster GPU resource and this should be
    /// where most of the allocations live.
    GpuOnly,
    /// Memory useful for uploading data to the GPU and potentially for constant buffers.
    CpuToGpu,
    /// Memory useful for CPU readback of data.
    GpuToCpu,
}

impl From<MemoryType> for gpu_allocator::MemoryLocation {
    fn from(value: MemoryType) -> Self {
        match value {
            MemoryType::GpuOnly => gpu_allocator::MemoryLocation::GpuOnly,
            MemoryType::CpuToGpu => gpu_allocator::MemoryLocation::CpuToGpu,
            MemoryType::GpuToCpu => gpu_allocator::MemoryLocation::GpuToCpu,
        }
    }
}

/// Parameters for [`Device::create_image()`](crate::Device::create_image).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ImageCreateInfo {
    pub image_type: vk::ImageType,
    pub format: vk::Format,
    pub extent: vk::Extent3D,
    pub usage: vk::ImageUsageFlags,
    pub flags: vk::ImageCreateFlags,
    pub mip_levels: u32,
    pub layers: u32,
    pub samples: vk::SampleCountFlags,
}

impl ImageCreateInfo {
    /// A single-sampled 2D image with one mip level and one layer.
    pub fn new_2d(format: vk::Format, width: u32, height: u32, usage: vk::ImageUsageFlags) -> Self {
        Self {
            image_type: vk::ImageType::TYPE_2D,
            format,
            extent: vk::Extent3D {
                width,
                height,
                depth: 1,
            },
            usage,
            flags: vk::ImageCreateFlags::empty(),
            mip_levels: 1,
            layers: 1,
            samples: vk::SampleCountFlags::TYPE_1,
        }
    }

    pub(crate) fn to_vk(&self) -> vk::ImageCreateInfo {
        vk::ImageCreateInfo::builder()
            .image_type(self.image_type)
            .format(self.format)
            .extent(self.extent)
            .mip_levels(self.mip_levels)
            .array_layers(self.layers)
            .samples(self.samples)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(self.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .flags(self.flags)
            .build()
    }
}

/// Abstraction over a [`VkImage`](vk::Image) with its metadata and views.
#[derive(Debug)]
pub struct Image {
    pub(crate) handle: vk::Image,
    pub(crate) info: ImageCreateInfo,
    pub(crate) memory: MemoryType,
    /// Views created on this image. They are destroyed together with it.
    pub(crate) views: Vec<vk::ImageView>,
}

impl Image {
    /// Get unsafe access to the underlying `VkImage`.
    /// # Safety
    /// The handle is valid as long as the resource is not destroyed. Do not destroy it manually.
    pub unsafe fn handle(&self) -> vk::Image {
        self.handle
    }

    pub fn format(&self) -> vk::Format {
        self.info.format
    }

    pub fn extent(&self) -> vk::Extent3D {
        self.info.extent
    }

    pub fn usage(&self) -> vk::ImageUsageFlags {
        self.info.usage
    }

    pub fn memory_type(&self) -> MemoryType {
        self.memory
    }

    /// Image views created through [`Device::create_image_view()`](crate::Device::create_image_view).
    pub fn views(&self) -> &[vk::ImageView] {
        self.views.as_slice()
    }
}

/// Full subresource range of the first mip level and layer for an aspect.
pub(crate) fn base_subresource_range(aspect: vk::ImageAspectFlags) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: aspect,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}
