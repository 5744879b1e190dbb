//! Exposes all structs needed to store initialization parameters.

use ash::vk;

use crate::extensions;

/// Minimum requirements for the GPU. This will be used to determine what physical device is selected, and enable
/// optional Vulkan features and extensions.
/// # Example
/// ```
/// # use deimos::prelude::*;
/// let mut requirements = GPURequirements {
///     dedicated: true,
///     min_device_local_memory: 1024 * 1024 * 1024,
///     ..Default::default()
/// };
/// // Require an additional Vulkan feature.
/// requirements.features.sampler_anisotropy = vk::TRUE;
/// ```
#[derive(Debug, Clone)]
pub struct GPURequirements {
    /// Vulkan 1.0 features the adapter must support. Defaults to `geometry_shader`.
    /// See also: [`VkPhysicalDeviceFeatures`](https://registry.khronos.org/vulkan/specs/1.3-extensions/man/html/VkPhysicalDeviceFeatures.html)
    pub features: vk::PhysicalDeviceFeatures,
    /// Device extensions the adapter must support. Defaults to `VK_KHR_ray_tracing_pipeline`.
    pub device_extensions: Vec<String>,
    /// Whether a dedicated GPU is required. Setting this to true will discard integrated GPUs.
    pub dedicated: bool,
    /// Minimum amount of device local memory, in bytes.
    pub min_device_local_memory: u64,
    /// Allow compute and transfer to share a queue family (and possibly a queue) with other roles when no dedicated
    /// family has room left. If false, bootstrap fails instead.
    pub allow_queue_sharing: bool,
    /// Priority given to every requested queue.
    pub queue_priority: f32,
}

impl Default for GPURequirements {
    fn default() -> Self {
        Self {
            features: vk::PhysicalDeviceFeatures {
                geometry_shader: vk::TRUE,
                ..Default::default()
            },
            device_extensions: vec![String::from(extensions::RAY_TRACING_PIPELINE)],
            dedicated: false,
            min_device_local_memory: 0,
            allow_queue_sharing: true,
            queue_priority: 1.0,
        }
    }
}

/// Preferences for the swapchain created on the window surface.
#[derive(Debug, Default, Clone)]
pub struct SurfaceSettings {
    /// Optionally a preferred surface format. If set to None, or if it is not supported, a fallback surface format will
    /// be chosen. This format is `{B8G8R8A8_SRGB, SRGB_NONLINEAR}` if it is available. Otherwise, the first reported
    /// format is used.
    pub surface_format: Option<vk::SurfaceFormatKHR>,
    /// Optionally a preferred present mode. If set to None or unsupported, this will fall back to
    /// [`VK_PRESENT_MODE_FIFO_KHR`](https://registry.khronos.org/vulkan/specs/1.3-extensions/man/html/VkPresentModeKHR.html),
    /// as this is guaranteed to always be supported.
    pub present_mode: Option<vk::PresentModeKHR>,
}

/// SPIR-V code for the main pipeline's vertex and fragment stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSources {
    pub vertex: Vec<u32>,
    pub fragment: Vec<u32>,
}

/// Application settings used to bootstrap the engine.
#[derive(Debug, Clone)]
pub struct AppSettings {
    /// Application name. Possibly displayed in debugging tools, task manager, etc.
    pub name: String,
    /// Application version.
    pub version: (u32, u32, u32),
    /// Enable Vulkan validation layers for additional debug output. For developing this should almost always be on.
    pub enable_validation: bool,
    /// Minimum requirements the selected physical device should have.
    pub gpu_requirements: GPURequirements,
    /// Swapchain preferences.
    pub surface_settings: SurfaceSettings,
    /// Depth formats to try, in order of preference.
    pub depth_formats: Vec<vk::Format>,
    /// Shaders for the main pipeline. If `None`, the pipeline is left unbuilt until shaders are supplied through
    /// [`Engine::finish_pipeline()`](crate::Engine::finish_pipeline).
    pub shaders: Option<ShaderSources>,
}

/// The app builder is a convenience struct to easily create [`AppSettings`].
///
/// For information about each of the fields, see [`AppSettings`]
/// # Example
/// ```
/// # use deimos::prelude::*;
/// let info = AppBuilder::new()
///     .name("My deimos application")
///     .present_mode(vk::PresentModeKHR::FIFO)
///     .validation(true)
///     .build();
/// ```
#[derive(Debug)]
pub struct AppBuilder {
    inner: AppSettings,
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AppBuilder {
    /// Create a new app builder with default settings.
    pub fn new() -> Self {
        AppBuilder {
            inner: AppSettings {
                name: String::from(""),
                version: (0, 0, 0),
                enable_validation: false,
                gpu_requirements: GPURequirements::default(),
                surface_settings: SurfaceSettings::default(),
                depth_formats: vec![
                    vk::Format::D32_SFLOAT,
                    vk::Format::D32_SFLOAT_S8_UINT,
                    vk::Format::D24_UNORM_S8_UINT,
                ],
                shaders: None,
            },
        }
    }

    /// Sets the application name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.inner.name = name.into();
        self
    }

    /// Sets the application version.
    pub fn version(mut self, ver: impl Into<(u32, u32, u32)>) -> Self {
        self.inner.version = ver.into();
        self
    }

    /// Enable the Vulkan validation layers.
    pub fn validation(mut self, val: bool) -> Self {
        self.inner.enable_validation = val;
        self
    }

    /// The gpu requirements that the physical device must satisfy.
    pub fn gpu(mut self, gpu: GPURequirements) -> Self {
        self.inner.gpu_requirements = gpu;
        self
    }

    /// Preferred surface format for the swapchain.
    pub fn surface_format(mut self, format: vk::SurfaceFormatKHR) -> Self {
        self.inner.surface_settings.surface_format = Some(format);
        self
    }

    /// Preferred present mode for the swapchain.
    pub fn present_mode(mut self, mode: vk::PresentModeKHR) -> Self {
        self.inner.surface_settings.present_mode = Some(mode);
        self
    }

    /// Depth format candidates, most preferred first.
    pub fn depth_formats(mut self, formats: impl Into<Vec<vk::Format>>) -> Self {
        self.inner.depth_formats = formats.into();
        self
    }

    /// SPIR-V code for the vertex and fragment stage of the main pipeline.
    pub fn shaders(mut self, vertex: Vec<u32>, fragment: Vec<u32>) -> Self {
        self.inner.shaders = Some(ShaderSources {
            vertex,
            fragment,
        });
        self
    }

    /// Build the resulting application settings.
    pub fn build(self) -> AppSettings {
        self.inner
    }
}
