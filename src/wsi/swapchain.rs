//! The swapchain and the builder that configures it.
//!
//! A swapchain is created in two steps. First a [`SwapchainBuilder`] collects the surface details and the preferences,
//! then [`Device::create_swapchain()`](crate::Device::create_swapchain) resolves the preferences against what the
//! surface actually supports and registers the result in the device's resource table.
//!
//! # Example
//! ```
//! # use deimos::prelude::*;
//! # fn make(device: &mut Device, details: SurfaceDetails) -> anyhow::Result<ResourceID> {
//! let mut builder = SwapchainBuilder::new();
//! builder
//!     .surface(details)?
//!     .extent(vk::Extent2D { width: 1280, height: 720 })?
//!     .present_mode(vk::PresentModeKHR::MAILBOX)?;
//! device.create_swapchain(&mut builder)
//! # }
//! ```

use anyhow::Result;
use ash::vk;

use crate::util::builder::BuilderState;
use crate::wsi::surface::SurfaceDetails;
use crate::Error;

/// A swapchain is an abstraction of a presentation system. It handles buffering, VSync, and acquiring images
/// to render and present frames to.
#[derive(Debug)]
pub struct Swapchain {
    pub(crate) handle: vk::SwapchainKHR,
    /// Images owned by the presentation engine.
    pub(crate) images: Vec<vk::Image>,
    /// One color view per image, owned by the swapchain.
    pub(crate) views: Vec<vk::ImageView>,
    pub(crate) format: vk::SurfaceFormatKHR,
    pub(crate) present_mode: vk::PresentModeKHR,
    pub(crate) extent: vk::Extent2D,
}

impl Swapchain {
    /// Unsafe access to the underlying vulkan handle.
    /// # Safety
    /// The handle is valid as long as the resource is not destroyed. Do not destroy it manually.
    pub unsafe fn handle(&self) -> vk::SwapchainKHR {
        self.handle
    }

    /// Swapchain image format.
    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    /// Present mode. The only mode that is required to always be supported is `FIFO`.
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    /// Size of the swapchain images. This is effectively the window render area.
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// # Safety
    /// See [`Swapchain::handle()`].
    pub unsafe fn images(&self) -> &[vk::Image] {
        self.images.as_slice()
    }

    /// # Safety
    /// See [`Swapchain::handle()`].
    pub unsafe fn views(&self) -> &[vk::ImageView] {
        self.views.as_slice()
    }
}

/// Fully resolved swapchain parameters, handed to the [`Driver`](crate::backend::Driver).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapchainCreateParams {
    pub surface: vk::SurfaceKHR,
    pub min_image_count: u32,
    pub format: vk::SurfaceFormatKHR,
    pub extent: vk::Extent2D,
    pub usage: vk::ImageUsageFlags,
    pub present_mode: vk::PresentModeKHR,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
    /// Distinct queue families that access the images. More than one means concurrent sharing.
    pub queue_families: Vec<u32>,
}

impl SwapchainCreateParams {
    pub(crate) fn sharing_mode(&self) -> vk::SharingMode {
        if self.queue_families.len() > 1 {
            vk::SharingMode::CONCURRENT
        } else {
            vk::SharingMode::EXCLUSIVE
        }
    }
}

/// Single-use accumulator for swapchain parameters.
#[derive(Debug)]
pub struct SwapchainBuilder {
    state: BuilderState,
    surface: Option<SurfaceDetails>,
    extent: Option<vk::Extent2D>,
    format: Option<vk::SurfaceFormatKHR>,
    present_mode: Option<vk::PresentModeKHR>,
    usage: vk::ImageUsageFlags,
    queue_families: Vec<u32>,
}

impl Default for SwapchainBuilder {
    fn default() -> Self {
        Self::new()
    }
}

const WHAT: &str = "swapchain";

impl SwapchainBuilder {
    pub fn new() -> Self {
        Self {
            state: BuilderState::Empty,
            surface: None,
            extent: None,
            format: None,
            present_mode: None,
            usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            queue_families: vec![],
        }
    }

    pub fn state(&self) -> BuilderState {
        self.state
    }

    /// Surface capabilities, formats and present modes to resolve against. Mandatory.
    pub fn surface(&mut self, details: SurfaceDetails) -> Result<&mut Self> {
        self.state.touch(WHAT)?;
        self.surface = Some(details);
        Ok(self)
    }

    /// Requested image size. Mandatory. Ignored if the surface dictates its own extent.
    pub fn extent(&mut self, extent: vk::Extent2D) -> Result<&mut Self> {
        self.state.touch(WHAT)?;
        self.extent = Some(extent);
        Ok(self)
    }

    /// Preferred surface format. Falls back to `{B8G8R8A8_SRGB, SRGB_NONLINEAR}`, then to the first format the surface
    /// reports.
    pub fn preferred_format(&mut self, format: vk::SurfaceFormatKHR) -> Result<&mut Self> {
        self.state.touch(WHAT)?;
        self.format = Some(format);
        Ok(self)
    }

    /// Preferred present mode. Falls back to `FIFO`.
    pub fn present_mode(&mut self, mode: vk::PresentModeKHR) -> Result<&mut Self> {
        self.state.touch(WHAT)?;
        self.present_mode = Some(mode);
        Ok(self)
    }

    /// Image usage. Defaults to `COLOR_ATTACHMENT`.
    pub fn image_usage(&mut self, usage: vk::ImageUsageFlags) -> Result<&mut Self> {
        self.state.touch(WHAT)?;
        self.usage = usage;
        Ok(self)
    }

    /// Queue families that will access the swapchain images. Duplicates are ignored.
    pub fn queue_families(&mut self, families: &[u32]) -> Result<&mut Self> {
        self.state.touch(WHAT)?;
        for family in families {
            if !self.queue_families.contains(family) {
                self.queue_families.push(*family);
            }
        }
        Ok(self)
    }

    /// Validate the builder and resolve all preferences against the surface.
    pub(crate) fn resolve(&self) -> Result<SwapchainCreateParams> {
        self.state.ensure_open(WHAT)?;
        let surface = self
            .surface
            .as_ref()
            .ok_or(Error::IncompleteBuilder("swapchain requires surface details"))?;
        let extent = self
            .extent
            .ok_or(Error::IncompleteBuilder("swapchain requires an extent"))?;
        let caps = &surface.capabilities;
        let min_image_count = if caps.max_image_count != 0 {
            (caps.min_image_count + 1).min(caps.max_image_count)
        } else {
            caps.min_image_count + 1
        };
        Ok(SwapchainCreateParams {
            surface: surface.handle,
            min_image_count,
            format: choose_surface_format(self.format, &surface.formats)?,
            extent: choose_swapchain_extent(extent, caps),
            usage: self.usage,
            present_mode: choose_present_mode(self.present_mode, &surface.present_modes),
            pre_transform: caps.current_transform,
            queue_families: self.queue_families.clone(),
        })
    }

    pub(crate) fn finish(&mut self) {
        self.state.finish();
    }
}

/// Pick the preferred format if the surface supports it, otherwise `{B8G8R8A8_SRGB, SRGB_NONLINEAR}`, otherwise the
/// first available format.
/// # Errors
/// * Fails with [`Error::NoSurfaceFormat`] if the surface reports no formats at all.
pub fn choose_surface_format(
    preferred: Option<vk::SurfaceFormatKHR>,
    available: &[vk::SurfaceFormatKHR],
) -> Result<vk::SurfaceFormatKHR> {
    const FALLBACK_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
        format: vk::Format::B8G8R8A8_SRGB,
        color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
    };

    if let Some(preferred_format) = preferred {
        if available.contains(&preferred_format) {
            return Ok(preferred_format);
        }
    }
    if available.contains(&FALLBACK_FORMAT) {
        return Ok(FALLBACK_FORMAT);
    }

    available
        .first()
        .copied()
        .ok_or_else(|| anyhow::Error::from(Error::NoSurfaceFormat))
}

/// Pick the preferred present mode if supported, otherwise `FIFO`.
pub fn choose_present_mode(preferred: Option<vk::PresentModeKHR>, available: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if let Some(mode) = preferred {
        if available.contains(&mode) {
            return mode;
        }
    }
    // VSync, guaranteed to be supported
    vk::PresentModeKHR::FIFO
}

fn choose_swapchain_extent(requested: vk::Extent2D, caps: &vk::SurfaceCapabilitiesKHR) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        return caps.current_extent;
    }

    vk::Extent2D {
        width: requested
            .width
            .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
        height: requested
            .height
            .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
    }
}
