//! Wrappers around a `VkSurfaceKHR`

use std::ops::Deref;

use anyhow::Result;
use ash::vk;

use crate::core::instance::Instance;
use crate::Window;

/// Everything a swapchain needs to know about a surface, as seen by one adapter.
#[derive(Debug, Clone, Default)]
pub struct SurfaceDetails {
    /// Handle to the [`VkSurfaceKHR`](vk::SurfaceKHR). Null when produced by the null backend.
    pub handle: vk::SurfaceKHR,
    /// [`VkSurfaceCapabilitiesKHR`](vk::SurfaceCapabilitiesKHR) structure storing information about surface capabilities.
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// List of [`VkSurfaceFormatKHR`](vk::SurfaceFormatKHR) with all formats this surface supports.
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// List of [`VkPresentModeKHR`](vk::PresentModeKHR) with all present modes this surface supports.
    pub present_modes: Vec<vk::PresentModeKHR>,
}

/// Owning wrapper of a [`VkSurfaceKHR`](vk::SurfaceKHR) created from a window.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Surface {
    handle: vk::SurfaceKHR,
    /// Vulkan extension functions for surface handling.
    #[derivative(Debug = "ignore")]
    functions: ash::extensions::khr::Surface,
}

impl Surface {
    /// Create a new surface.
    pub fn new(instance: &Instance, window: &dyn Window) -> Result<Self> {
        let functions = ash::extensions::khr::Surface::new(unsafe { instance.loader() }, instance);
        let handle = unsafe {
            ash_window::create_surface(
                instance.loader(),
                instance,
                window.raw_display_handle(),
                window.raw_window_handle(),
                None,
            )?
        };
        #[cfg(feature = "log-objects")]
        trace!("Created new VkSurfaceKHR {handle:?}");
        Ok(Surface {
            handle,
            functions,
        })
    }

    /// Query support for features, capabilities and formats for this surface.
    /// Because surface support varies per physical device, this function requires one to be selected.
    pub fn query_details(&self, physical_device: vk::PhysicalDevice) -> Result<SurfaceDetails> {
        unsafe {
            Ok(SurfaceDetails {
                handle: self.handle,
                capabilities: self.get_physical_device_surface_capabilities(physical_device, self.handle)?,
                formats: self.get_physical_device_surface_formats(physical_device, self.handle)?,
                present_modes: self.get_physical_device_surface_present_modes(physical_device, self.handle)?,
            })
        }
    }

    /// Whether a queue family of the physical device can present to this surface.
    pub fn supports_present(&self, physical_device: vk::PhysicalDevice, family: u32) -> Result<bool> {
        Ok(unsafe { self.get_physical_device_surface_support(physical_device, family, self.handle)? })
    }

    /// Get unsafe access to the underlying `VkSurfaceKHR` object.
    /// # Safety
    /// Any vulkan calls that mutate the surface may put the system in an undefined state.
    pub unsafe fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }
}

impl Deref for Surface {
    type Target = ash::extensions::khr::Surface;

    /// Get access to the `VK_KHR_surface` extension functions.
    fn deref(&self) -> &Self::Target {
        &self.functions
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        #[cfg(feature = "log-objects")]
        trace!("Destroying VkSurfaceKHR {:?}", self.handle);
        unsafe {
            self.functions.destroy_surface(self.handle, None);
        }
    }
}
