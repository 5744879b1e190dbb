//! GPU capability scanner. An [`Adapter`] is an immutable snapshot of a physical device: its properties, supported
//! features and extensions, and its queue family layout.
//!
//! Adapters are listed by a [`Backend`](crate::backend::Backend). [`choose_adapter()`] then picks the first one that
//! satisfies the [`GPURequirements`]. Selection is first-match, not best-match, so the result only depends on the
//! enumeration order.

use std::collections::HashSet;
use std::mem::size_of;

use anyhow::Result;
use ash::vk;
use static_assertions::const_assert_eq;

use crate::core::queue::{QueueFamily, QueueFamilyLayout};
use crate::{Error, GPURequirements};

/// Identity and limits of an adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterProperties {
    /// Human readable device name.
    pub name: String,
    pub vendor_id: u32,
    pub device_id: u32,
    pub device_type: vk::PhysicalDeviceType,
    pub api_version: u32,
    pub driver_version: u32,
    /// Sum of all `DEVICE_LOCAL` memory heaps, in bytes.
    pub device_local_memory: u64,
}

impl Default for AdapterProperties {
    fn default() -> Self {
        Self {
            name: String::new(),
            vendor_id: 0,
            device_id: 0,
            device_type: vk::PhysicalDeviceType::OTHER,
            api_version: vk::make_api_version(0, 1, 3, 0),
            driver_version: 0,
            device_local_memory: 0,
        }
    }
}

/// A physical GPU as enumerated by the driver.
#[derive(Debug, Clone)]
pub struct Adapter {
    /// Null for synthetic adapters.
    handle: vk::PhysicalDevice,
    properties: AdapterProperties,
    features: vk::PhysicalDeviceFeatures,
    extensions: HashSet<String>,
    queue_families: QueueFamilyLayout,
}

impl Adapter {
    /// Create an adapter with the given properties, no features, no extensions and no queue families.
    /// Mostly useful to describe synthetic adapters for the [`NullBackend`](crate::backend::null::NullBackend).
    pub fn new(properties: AdapterProperties) -> Self {
        Self {
            handle: vk::PhysicalDevice::null(),
            properties,
            features: vk::PhysicalDeviceFeatures::default(),
            extensions: HashSet::new(),
            queue_families: QueueFamilyLayout::default(),
        }
    }

    /// Create a named adapter with default properties.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(AdapterProperties {
            name: name.into(),
            ..Default::default()
        })
    }

    pub(crate) fn from_native(
        handle: vk::PhysicalDevice,
        properties: AdapterProperties,
        features: vk::PhysicalDeviceFeatures,
        extensions: HashSet<String>,
        queue_families: QueueFamilyLayout,
    ) -> Self {
        Self {
            handle,
            properties,
            features,
            extensions,
            queue_families,
        }
    }

    /// Set the supported features.
    pub fn with_features(mut self, features: vk::PhysicalDeviceFeatures) -> Self {
        self.features = features;
        self
    }

    /// Add a supported extension.
    pub fn with_extension(mut self, name: impl Into<String>) -> Self {
        self.extensions.insert(name.into());
        self
    }

    /// Append a queue family. Its index is set to its position in the layout.
    pub fn with_queue_family(mut self, family: QueueFamily) -> Self {
        let mut families = self.queue_families.families().to_vec();
        families.push(QueueFamily {
            index: families.len() as u32,
            ..family
        });
        self.queue_families = QueueFamilyLayout::new(families);
        self
    }

    /// Get unsafe access to the physical device handle. Null for synthetic adapters.
    /// # Safety
    /// The handle is only valid while the instance that enumerated it is alive.
    pub unsafe fn handle(&self) -> vk::PhysicalDevice {
        self.handle
    }

    pub fn properties(&self) -> &AdapterProperties {
        &self.properties
    }

    pub fn features(&self) -> &vk::PhysicalDeviceFeatures {
        &self.features
    }

    pub fn supported_extensions(&self) -> &HashSet<String> {
        &self.extensions
    }

    pub fn supports_extension(&self, name: &str) -> bool {
        self.extensions.contains(name)
    }

    pub fn queue_families(&self) -> &QueueFamilyLayout {
        &self.queue_families
    }

    /// Reason this adapter fails the requirements, or `None` if it satisfies all of them.
    pub fn unmet_requirement(&self, requirements: &GPURequirements) -> Option<String> {
        if !features_satisfied(&requirements.features, &self.features) {
            return Some(String::from("missing required device features"));
        }
        if let Some(ext) = requirements
            .device_extensions
            .iter()
            .find(|ext| !self.supports_extension(ext))
        {
            return Some(format!("missing extension {ext}"));
        }
        if !self.queue_families.is_queue_flag_supported(vk::QueueFlags::GRAPHICS) {
            return Some(String::from("no graphics queue family"));
        }
        if requirements.dedicated && self.properties.device_type != vk::PhysicalDeviceType::DISCRETE_GPU {
            return Some(String::from("not a dedicated GPU"));
        }
        if requirements.min_device_local_memory > self.properties.device_local_memory {
            return Some(format!(
                "only {} bytes of device local memory",
                self.properties.device_local_memory
            ));
        }
        None
    }
}

/// Pick the first adapter, in enumeration order, that satisfies every requirement.
/// # Errors
/// * Fails with [`Error::NoSuitableAdapter`] if no adapter qualifies.
pub fn choose_adapter<'a>(adapters: impl IntoIterator<Item = &'a Adapter>, requirements: &GPURequirements) -> Result<Adapter> {
    info!("[GPU Selection] Searching valid GPU");
    adapters
        .into_iter()
        .find(|adapter| {
            info!("[GPU Selection] Checking GPU: {}", adapter.properties.name);
            match adapter.unmet_requirement(requirements) {
                None => true,
                Some(reason) => {
                    debug!("[GPU Selection] Rejected {}: {}", adapter.properties.name, reason);
                    false
                }
            }
        })
        .map(|adapter| {
            info!("[GPU Selection] Selected GPU: {}", adapter.properties.name);
            adapter.clone()
        })
        .ok_or_else(|| anyhow::Error::from(Error::NoSuitableAdapter))
}

// `VkPhysicalDeviceFeatures` is a plain list of `VkBool32`.
const_assert_eq!(size_of::<vk::PhysicalDeviceFeatures>() % size_of::<vk::Bool32>(), 0);

fn feature_bits(features: &vk::PhysicalDeviceFeatures) -> &[vk::Bool32] {
    let len = size_of::<vk::PhysicalDeviceFeatures>() / size_of::<vk::Bool32>();
    // SAFETY: The struct is repr(C) and consists only of VkBool32 fields, checked above.
    unsafe { std::slice::from_raw_parts(features as *const vk::PhysicalDeviceFeatures as *const vk::Bool32, len) }
}

/// True if every feature enabled in `required` is also enabled in `available`.
pub fn features_satisfied(required: &vk::PhysicalDeviceFeatures, available: &vk::PhysicalDeviceFeatures) -> bool {
    feature_bits(required)
        .iter()
        .zip(feature_bits(available))
        .all(|(required, available)| *required == vk::FALSE || *available != vk::FALSE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_subset() {
        let required = vk::PhysicalDeviceFeatures {
            geometry_shader: vk::TRUE,
            ..Default::default()
        };
        let available = vk::PhysicalDeviceFeatures {
            geometry_shader: vk::TRUE,
            sampler_anisotropy: vk::TRUE,
            ..Default::default()
        };
        assert!(features_satisfied(&required, &available));
        assert!(!features_satisfied(&available, &required));
        assert!(features_satisfied(&Default::default(), &Default::default()));
    }
}
