//! Concrete device extensions used by the engine.
//!
//! Extensions with a feature block own that block, so it stays alive as long as the extension is registered.

use ash::vk;

use crate::core::extension::DeviceExtension;
use crate::util::pnext::as_base_out;

pub const SWAPCHAIN: &str = "VK_KHR_swapchain";
pub const SHADER_CLOCK: &str = "VK_KHR_shader_clock";
pub const DEFERRED_HOST_OPERATIONS: &str = "VK_KHR_deferred_host_operations";
pub const ACCELERATION_STRUCTURE: &str = "VK_KHR_acceleration_structure";
pub const RAY_TRACING_PIPELINE: &str = "VK_KHR_ray_tracing_pipeline";

/// `VK_KHR_swapchain`. Required to create a [`Swapchain`](crate::wsi::swapchain::Swapchain).
#[derive(Debug, Default, Copy, Clone)]
pub struct SwapchainExtension;

impl DeviceExtension for SwapchainExtension {
    fn name(&self) -> &str {
        SWAPCHAIN
    }
}

/// `VK_KHR_shader_clock`.
#[derive(Debug, Default)]
pub struct ShaderClockExtension {
    features: vk::PhysicalDeviceShaderClockFeaturesKHR,
}

impl ShaderClockExtension {
    pub fn new(subgroup_clock: bool, device_clock: bool) -> Self {
        Self {
            features: vk::PhysicalDeviceShaderClockFeaturesKHR::builder()
                .shader_subgroup_clock(subgroup_clock)
                .shader_device_clock(device_clock)
                .build(),
        }
    }

    pub fn features(&self) -> &vk::PhysicalDeviceShaderClockFeaturesKHR {
        &self.features
    }
}

impl DeviceExtension for ShaderClockExtension {
    fn name(&self) -> &str {
        SHADER_CLOCK
    }

    fn feature_block(&mut self) -> Option<&mut vk::BaseOutStructure> {
        Some(as_base_out(&mut self.features))
    }
}

/// `VK_KHR_deferred_host_operations`.
#[derive(Debug, Default, Copy, Clone)]
pub struct DeferredHostOperationsExtension;

impl DeviceExtension for DeferredHostOperationsExtension {
    fn name(&self) -> &str {
        DEFERRED_HOST_OPERATIONS
    }
}

/// `VK_KHR_acceleration_structure`. Requires [`DeferredHostOperationsExtension`].
#[derive(Debug, Default)]
pub struct AccelerationStructureExtension {
    features: vk::PhysicalDeviceAccelerationStructureFeaturesKHR,
}

impl AccelerationStructureExtension {
    pub fn new(
        acceleration_structure: bool,
        capture_replay: bool,
        indirect_build: bool,
        host_commands: bool,
        descriptor_binding_update_after_bind: bool,
    ) -> Self {
        Self {
            features: vk::PhysicalDeviceAccelerationStructureFeaturesKHR::builder()
                .acceleration_structure(acceleration_structure)
                .acceleration_structure_capture_replay(capture_replay)
                .acceleration_structure_indirect_build(indirect_build)
                .acceleration_structure_host_commands(host_commands)
                .descriptor_binding_acceleration_structure_update_after_bind(descriptor_binding_update_after_bind)
                .build(),
        }
    }

    pub fn features(&self) -> &vk::PhysicalDeviceAccelerationStructureFeaturesKHR {
        &self.features
    }
}

impl DeviceExtension for AccelerationStructureExtension {
    fn name(&self) -> &str {
        ACCELERATION_STRUCTURE
    }

    fn requires(&self) -> &'static [&'static str] {
        &[DEFERRED_HOST_OPERATIONS]
    }

    fn feature_block(&mut self) -> Option<&mut vk::BaseOutStructure> {
        Some(as_base_out(&mut self.features))
    }
}

/// `VK_KHR_ray_tracing_pipeline`. Requires [`AccelerationStructureExtension`].
#[derive(Debug, Default)]
pub struct RayTracingPipelineExtension {
    features: vk::PhysicalDeviceRayTracingPipelineFeaturesKHR,
}

impl RayTracingPipelineExtension {
    pub fn new(
        ray_tracing_pipeline: bool,
        shader_group_handle_capture_replay: bool,
        shader_group_handle_capture_replay_mixed: bool,
        trace_rays_indirect: bool,
        ray_traversal_primitive_culling: bool,
    ) -> Self {
        Self {
            features: vk::PhysicalDeviceRayTracingPipelineFeaturesKHR::builder()
                .ray_tracing_pipeline(ray_tracing_pipeline)
                .ray_tracing_pipeline_shader_group_handle_capture_replay(shader_group_handle_capture_replay)
                .ray_tracing_pipeline_shader_group_handle_capture_replay_mixed(shader_group_handle_capture_replay_mixed)
                .ray_tracing_pipeline_trace_rays_indirect(trace_rays_indirect)
                .ray_traversal_primitive_culling(ray_traversal_primitive_culling)
                .build(),
        }
    }

    pub fn features(&self) -> &vk::PhysicalDeviceRayTracingPipelineFeaturesKHR {
        &self.features
    }
}

impl DeviceExtension for RayTracingPipelineExtension {
    fn name(&self) -> &str {
        RAY_TRACING_PIPELINE
    }

    fn requires(&self) -> &'static [&'static str] {
        &[ACCELERATION_STRUCTURE]
    }

    fn feature_block(&mut self) -> Option<&mut vk::BaseOutStructure> {
        Some(as_base_out(&mut self.features))
    }
}

/// Any extension that needs neither a feature block nor prerequisites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedExtension {
    name: String,
}

impl NamedExtension {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
        }
    }
}

impl DeviceExtension for NamedExtension {
    fn name(&self) -> &str {
        &self.name
    }
}
