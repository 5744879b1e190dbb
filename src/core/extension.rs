//! Registration of optional device extensions and their feature blocks.
//!
//! Every extension the device should enable is registered on a [`DeviceExtensionManager`] before device creation.
//! The manager enforces that an extension is only registered once and only after its prerequisites, and links the
//! feature blocks of all extensions into a single `pNext` chain for `VkDeviceCreateInfo`. The chain is ordered newest
//! first: the head is the block of the most recently registered extension.
//!
//! After device creation the manager is owned by the [`Device`], and extensions can be looked up with
//! [`Device::extension()`](Device::extension) or [`DeviceExtension::get()`].
//!
//! # Example
//! ```
//! # use deimos::prelude::*;
//! # fn main() -> anyhow::Result<()> {
//! let mut manager = DeviceExtensionManager::new();
//! manager.add_extension(DeferredHostOperationsExtension)?;
//! manager.add_extension(AccelerationStructureExtension::new(true, false, false, false, false))?;
//! assert!(manager.get::<AccelerationStructureExtension>().is_some());
//! # Ok(())
//! # }
//! ```

use std::any::Any;
use std::ffi::c_void;
use std::fmt::Formatter;

use anyhow::Result;
use ash::vk;

use crate::util::pnext::as_void_ptr;
use crate::{Device, Error};

/// Upcast to [`Any`] for typed lookup of extensions. Implemented for every `'static` type.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A device extension that can be registered on a [`DeviceExtensionManager`].
pub trait DeviceExtension: AsAny {
    /// Vulkan name of the extension, for example `VK_KHR_swapchain`.
    fn name(&self) -> &str;

    /// Names of extensions that must be registered before this one.
    fn requires(&self) -> &'static [&'static str] {
        &[]
    }

    /// Feature block to link into the device creation `pNext` chain, if the extension has one.
    fn feature_block(&mut self) -> Option<&mut vk::BaseOutStructure> {
        None
    }

    /// Look up this extension on a live device.
    /// # Errors
    /// * Fails with [`Error::ExtensionNotEnabled`] if the device was created without it.
    fn get(device: &Device) -> Result<&Self>
    where
        Self: Sized + 'static, {
        device.extension::<Self>()
    }
}

/// Owns the registered extensions and the feature chain that links their blocks.
pub struct DeviceExtensionManager {
    extensions: Vec<Box<dyn DeviceExtension>>,
    head: *mut c_void,
}

impl std::fmt::Debug for DeviceExtensionManager {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.extensions.iter().map(|ext| ext.name()))
            .finish()
    }
}

impl Default for DeviceExtensionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceExtensionManager {
    pub fn new() -> Self {
        Self {
            extensions: vec![],
            head: std::ptr::null_mut(),
        }
    }

    /// True if an extension with this name was registered.
    pub fn contains(&self, name: &str) -> bool {
        self.extensions.iter().any(|ext| ext.name() == name)
    }

    /// Register an extension.
    /// # Errors
    /// * Fails with [`Error::DuplicateExtension`] if an extension with the same name is already registered.
    /// * Fails with [`Error::UnmetExtensionDependency`] if a prerequisite was not registered before.
    pub fn add_extension<E: DeviceExtension + 'static>(&mut self, extension: E) -> Result<()> {
        self.add_boxed(Box::new(extension))
    }

    /// Register an already boxed extension. See [`DeviceExtensionManager::add_extension()`].
    pub fn add_boxed(&mut self, mut extension: Box<dyn DeviceExtension>) -> Result<()> {
        if self.contains(extension.name()) {
            return Err(Error::DuplicateExtension(extension.name().to_owned()).into());
        }
        if let Some(missing) = extension
            .requires()
            .iter()
            .find(|required| !self.contains(required))
        {
            return Err(Error::UnmetExtensionDependency {
                extension: extension.name().to_owned(),
                requires: (*missing).to_owned(),
            }
            .into());
        }
        // The block lives on the heap, so its address stays valid while the box is moved around.
        if let Some(block) = extension.feature_block() {
            block.p_next = self.head as *mut vk::BaseOutStructure;
            self.head = as_void_ptr(block);
        }
        debug!("Registered device extension {}", extension.name());
        self.extensions.push(extension);
        Ok(())
    }

    /// Append the names of all registered extensions, in registration order.
    pub fn populate_extension_names(&self, names: &mut Vec<String>) {
        names.extend(self.extensions.iter().map(|ext| ext.name().to_owned()));
    }

    /// Head of the feature chain, or null if no extension has a feature block. Place this in `VkDeviceCreateInfo::pNext`.
    pub fn feature_chain(&self) -> *mut c_void {
        self.head
    }

    /// Typed lookup of a registered extension.
    pub fn get<E: DeviceExtension + 'static>(&self) -> Option<&E> {
        self.extensions
            .iter()
            .find_map(|ext| ext.as_ref().as_any().downcast_ref::<E>())
    }

    /// Mutable typed lookup of a registered extension.
    pub fn get_mut<E: DeviceExtension + 'static>(&mut self) -> Option<&mut E> {
        self.extensions
            .iter_mut()
            .find_map(|ext| ext.as_mut().as_any_mut().downcast_mut::<E>())
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn DeviceExtension> {
        self.extensions.iter().map(|ext| ext.as_ref())
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}
