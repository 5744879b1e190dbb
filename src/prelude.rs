pub use ash::vk;

pub use crate::backend::{Backend, Driver};
pub use crate::backend::null::{DriverEvent, DriverLog, NullBackend, NullDriver};
pub use crate::backend::vulkan::VulkanBackend;
pub use crate::bootstrap::{BootstrapStage, Engine, PipelineSlot, StageTracker};

pub use crate::core::adapter::{choose_adapter, Adapter, AdapterProperties};
pub use crate::core::app_info::*;
pub use crate::core::debug::DebugMessenger;
pub use crate::core::device::Device;
pub use crate::core::error::Error;
pub use crate::core::extension::{DeviceExtension, DeviceExtensionManager};
pub use crate::core::instance::Instance;
pub use crate::core::queue::*;

pub use crate::extensions::{
    AccelerationStructureExtension, DeferredHostOperationsExtension, NamedExtension, RayTracingPipelineExtension,
    ShaderClockExtension, SwapchainExtension,
};

pub use crate::pass::{AttachmentKind, AttachmentReference, RenderPassBuilder};
pub use crate::pipeline::builder::PipelineBuilder;
pub use crate::pipeline::VertexBinding;

pub use crate::resource::table::{ResourceID, ResourceKind, ResourceTable};
pub use crate::resource::{CommandBuffer, Image, ImageCreateInfo, MemoryType, Pipeline, RenderPass};

#[cfg(feature = "scene")]
pub use crate::scene::{Mesh, Scene, SceneImporter};
pub use crate::util::builder::BuilderState;
pub use crate::vertex::Vertex;

pub use crate::wsi::surface::{Surface, SurfaceDetails};
pub use crate::wsi::swapchain::{Swapchain, SwapchainBuilder};
pub use crate::wsi::window::{Window, WindowSize};
