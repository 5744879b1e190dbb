//! Exposes the deimos error type

use std::ffi::NulError;
use std::sync::PoisonError;

use ash;
use gpu_allocator::AllocationError;
use thiserror::Error;

use crate::core::queue::QueueRole;
use crate::resource::table::ResourceID;

/// Error type that deimos can return. Most functions return an [`anyhow::Result`], use
/// `err.downcast_ref::<Error>()` to inspect the cause.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to load the Vulkan library.
    #[error("Failed to load Vulkan.")]
    LoadFailed(ash::LoadingError),
    /// Could not convert rust string to C-String because it has null bytes
    #[error("Invalid C string")]
    InvalidString(NulError),
    /// Error reported directly by the graphics driver, such as out of memory or device lost.
    #[error("Native driver error: `{0}`")]
    NativeDriver(ash::vk::Result),
    /// Vulkan allocation error.
    #[error("Vulkan allocation error: `{0}`")]
    Allocation(AllocationError),
    /// No window context specified where one was expected.
    #[error("Expected a window context.")]
    NoWindow,
    /// No adapter satisfied all hard requirements.
    #[error("No physical device found matching requirements.")]
    NoSuitableAdapter,
    /// A queue family was selected for a role it has no capability for.
    #[error("Queue family {family} cannot serve the {role} role.")]
    IncompatibleRole { role: QueueRole, family: u32 },
    /// A queue family index that does not exist on the adapter the selector was created for.
    #[error("Queue family {0} does not exist on this adapter.")]
    UnknownQueueFamily(u32),
    /// All queues of a family are already handed out.
    #[error("Queue family {family} only exposes {capacity} queue(s), all of them are allocated.")]
    QueueCapacityExceeded { family: u32, capacity: u32 },
    /// The adapter has no queue family that can serve a role.
    #[error("No queue family found for the {0} role.")]
    NoCapableQueueFamily(QueueRole),
    /// The same device extension was registered twice.
    #[error("Device extension `{0}` is already registered.")]
    DuplicateExtension(String),
    /// A device extension was registered before one of its prerequisites.
    #[error("Device extension `{extension}` requires `{requires}`, which was not registered before it.")]
    UnmetExtensionDependency { extension: String, requires: String },
    /// The device was not created with the requested extension.
    #[error("Device extension `{0}` is not enabled on this device.")]
    ExtensionNotEnabled(String),
    /// A registered device extension is not supported by the adapter.
    #[error("Device extension `{0}` is not supported by the selected adapter.")]
    UnsupportedExtension(String),
    /// Unknown, destroyed, foreign or mistyped resource handle.
    #[error("Invalid resource handle {0}.")]
    InvalidHandle(ResourceID),
    /// A builder is missing a mandatory part.
    #[error("Incomplete builder: {0}")]
    IncompleteBuilder(&'static str),
    /// A builder was used again after it produced its resource.
    #[error("{0} builder was already used to build a resource.")]
    BuilderFinalized(&'static str),
    /// No supported surface formats found.
    #[error("No supported surface formats found.")]
    NoSurfaceFormat,
    /// None of the candidate formats supports the requested features.
    #[error("None of the candidate formats is supported.")]
    NoSupportedFormat,
    /// Bootstrap stages may only move forward.
    #[error("Invalid bootstrap transition from {from} to {to}.")]
    InvalidStageTransition { from: &'static str, to: &'static str },
    /// Failed to parse a scene file.
    #[cfg(feature = "scene")]
    #[error("Scene import failed: `{0}`")]
    SceneImport(tobj::LoadError),
    /// Poisoned mutex
    #[error("Poisoned mutex")]
    PoisonError,
}

impl From<ash::LoadingError> for Error {
    fn from(value: ash::LoadingError) -> Self {
        Error::LoadFailed(value)
    }
}

impl From<NulError> for Error {
    fn from(value: NulError) -> Self {
        Error::InvalidString(value)
    }
}

impl From<ash::vk::Result> for Error {
    fn from(value: ash::vk::Result) -> Self {
        Error::NativeDriver(value)
    }
}

impl From<AllocationError> for Error {
    fn from(value: AllocationError) -> Self {
        Error::Allocation(value)
    }
}

impl From<(Vec<ash::vk::Pipeline>, ash::vk::Result)> for Error {
    fn from((_, result): (Vec<ash::vk::Pipeline>, ash::vk::Result)) -> Self {
        Error::NativeDriver(result)
    }
}

#[cfg(feature = "scene")]
impl From<tobj::LoadError> for Error {
    fn from(value: tobj::LoadError) -> Self {
        Error::SceneImport(value)
    }
}

impl<T> From<PoisonError<T>> for Error {
    fn from(_: PoisonError<T>) -> Self {
        Error::PoisonError
    }
}
