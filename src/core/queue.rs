//! Queue family layouts and the selector that hands out queue slots to engine roles.
//!
//! Vulkan has no notion of a 'graphics queue' or 'present queue'. The engine asks for queues by [`QueueRole`], and the
//! [`QueueFamilySelector`] maps each role onto a concrete `(family, queue index)` pair. Several roles may end up on the same
//! physical queue, in which case submissions to them must be synchronized externally.
//!
//! # Example
//! ```
//! # use deimos::prelude::*;
//! # use anyhow::Result;
//! # fn example() -> Result<()> {
//! let layout = QueueFamilyLayout::new(vec![
//!     QueueFamily::new(0, vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER, 4).with_present(true),
//!     QueueFamily::new(1, vk::QueueFlags::TRANSFER, 1),
//! ]);
//! let mut selector = QueueFamilySelector::new(&layout);
//! let graphics = layout.find_family_for_role(QueueRole::Graphics).unwrap();
//! let graphics_queue = selector.assign_shared(QueueRole::Graphics, graphics, 1.0)?;
//! let transfer = layout.find_family_for_role(QueueRole::Transfer).unwrap();
//! let transfer_queue = selector.assign(QueueRole::Transfer, transfer, 1.0)?;
//! assert_ne!(graphics_queue.family_index, transfer_queue.family_index);
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::fmt::Formatter;

use anyhow::Result;
use ash::vk;

use crate::Error;

/// Functional role a queue plays in the engine.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum QueueRole {
    Graphics,
    Compute,
    Transfer,
    /// Presentation to a surface. This is not a queue flag, support is queried per surface.
    Present,
}

impl QueueRole {
    /// All roles, in the order the bootstrap assigns them.
    pub const ALL: [QueueRole; 4] = [QueueRole::Graphics, QueueRole::Compute, QueueRole::Transfer, QueueRole::Present];

    /// The capability bit a family must expose to serve this role. `None` for [`QueueRole::Present`].
    pub fn required_flags(&self) -> Option<vk::QueueFlags> {
        match self {
            QueueRole::Graphics => Some(vk::QueueFlags::GRAPHICS),
            QueueRole::Compute => Some(vk::QueueFlags::COMPUTE),
            QueueRole::Transfer => Some(vk::QueueFlags::TRANSFER),
            QueueRole::Present => None,
        }
    }

    /// Flags a dedicated family for this role should not have.
    fn avoided_flags(&self) -> vk::QueueFlags {
        match self {
            QueueRole::Compute => vk::QueueFlags::GRAPHICS,
            // In later nvidia drivers, video and optical flow queues are exposed with high family indices.
            QueueRole::Transfer => {
                vk::QueueFlags::COMPUTE
                    | vk::QueueFlags::GRAPHICS
                    | vk::QueueFlags::OPTICAL_FLOW_NV
                    | vk::QueueFlags::VIDEO_DECODE_KHR
                    | vk::QueueFlags::VIDEO_ENCODE_KHR
            }
            QueueRole::Graphics | QueueRole::Present => vk::QueueFlags::empty(),
        }
    }
}

impl std::fmt::Display for QueueRole {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            QueueRole::Graphics => "graphics",
            QueueRole::Compute => "compute",
            QueueRole::Transfer => "transfer",
            QueueRole::Present => "present",
        };
        f.write_str(name)
    }
}

/// A group of queues on an adapter sharing the same capabilities.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct QueueFamily {
    /// Index of this family on the adapter.
    pub index: u32,
    /// Capability bitmask.
    pub flags: vk::QueueFlags,
    /// Maximum number of queues that can be created from this family.
    pub queue_count: u32,
    /// Number of meaningful bits in timestamps written on queues of this family. Zero means no timestamp support.
    pub timestamp_valid_bits: u32,
    /// Whether queues of this family can present to the target surface. Queried against the surface,
    /// never derived from `flags`.
    pub supports_present: bool,
}

impl QueueFamily {
    /// Create a family without present support and without timestamps.
    pub fn new(index: u32, flags: vk::QueueFlags, queue_count: u32) -> Self {
        Self {
            index,
            flags,
            queue_count,
            timestamp_valid_bits: 0,
            supports_present: false,
        }
    }

    /// Set present support.
    pub fn with_present(mut self, supported: bool) -> Self {
        self.supports_present = supported;
        self
    }

    /// Set the number of valid timestamp bits.
    pub fn with_timestamp_bits(mut self, bits: u32) -> Self {
        self.timestamp_valid_bits = bits;
        self
    }

    pub(crate) fn from_vk(index: u32, properties: &vk::QueueFamilyProperties, supports_present: bool) -> Self {
        Self {
            index,
            flags: properties.queue_flags,
            queue_count: properties.queue_count,
            timestamp_valid_bits: properties.timestamp_valid_bits,
            supports_present,
        }
    }

    /// Whether this family can serve the given role. Graphics and compute families always support transfer
    /// operations, whether or not they report the transfer bit.
    pub fn can_serve(&self, role: QueueRole) -> bool {
        match role {
            QueueRole::Transfer => self
                .flags
                .intersects(vk::QueueFlags::TRANSFER | vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
            QueueRole::Present => self.supports_present,
            _ => role.required_flags().map_or(false, |flags| self.flags.contains(flags)),
        }
    }
}

/// Ordered list of queue families on an adapter. Queried, never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueFamilyLayout {
    families: Vec<QueueFamily>,
}

impl QueueFamilyLayout {
    pub fn new(families: Vec<QueueFamily>) -> Self {
        Self {
            families,
        }
    }

    /// All families in adapter order.
    pub fn families(&self) -> &[QueueFamily] {
        self.families.as_slice()
    }

    /// Look up a family by its index.
    pub fn family(&self, index: u32) -> Option<&QueueFamily> {
        self.families.iter().find(|family| family.index == index)
    }

    /// True if any family exposes all of the given flags.
    pub fn is_queue_flag_supported(&self, flags: vk::QueueFlags) -> bool {
        self.families.iter().any(|family| family.flags.contains(flags))
    }

    /// First family exposing all of the given flags.
    pub fn find_family(&self, flags: vk::QueueFlags) -> Option<&QueueFamily> {
        self.families.iter().find(|family| family.flags.contains(flags))
    }

    /// First family that can present. Families that also support graphics win, so that
    /// presentation usually lands on the graphics queue.
    pub fn find_present_family(&self) -> Option<&QueueFamily> {
        self.families
            .iter()
            .find(|family| family.supports_present && family.flags.contains(vk::QueueFlags::GRAPHICS))
            .or_else(|| self.families.iter().find(|family| family.supports_present))
    }

    /// Pick a family for a role.
    ///
    /// * Graphics: the first graphics family.
    /// * Compute and transfer: a family that does not also expose the heavier capabilities (graphics for compute,
    ///   graphics and compute for transfer), falling back to the first capable family.
    /// * Present: see [`QueueFamilyLayout::find_present_family()`].
    pub fn find_family_for_role(&self, role: QueueRole) -> Option<&QueueFamily> {
        match role {
            QueueRole::Present => self.find_present_family(),
            QueueRole::Graphics => self.find_family(vk::QueueFlags::GRAPHICS),
            QueueRole::Compute | QueueRole::Transfer => self.find_family_prefer_dedicated(role),
        }
    }

    fn find_family_prefer_dedicated(&self, role: QueueRole) -> Option<&QueueFamily> {
        let avoid = role.avoided_flags();
        self.families
            .iter()
            .filter(|family| family.can_serve(role))
            .fold(None, |best: Option<&QueueFamily>, family| {
                // Contains none of the flags to avoid, this is an optimal match.
                // To check that no avoided flag is present, contains() does not work, we need intersects()
                match best {
                    Some(best) if !best.flags.intersects(avoid) => Some(best),
                    Some(_) if family.flags.intersects(avoid) => best,
                    _ => Some(family),
                }
            })
    }
}

/// Result of a queue allocation: the concrete queue a role should submit to.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct QueueSelection {
    /// Queue family index.
    pub family_index: u32,
    /// Index of the queue inside its family.
    pub queue_index: u32,
    /// Priority requested when the queue was allocated.
    pub priority: f32,
}

/// Queues to create in a single family, ready to be turned into a `VkDeviceQueueCreateInfo`.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueFamilyRequest {
    pub family_index: u32,
    /// One priority per queue, in queue index order.
    pub priorities: Vec<f32>,
}

/// Hands out queue slots to engine roles without ever exceeding a family's queue count.
#[derive(Debug, Clone)]
pub struct QueueFamilySelector {
    layout: QueueFamilyLayout,
    /// Priorities of allocated queues, per family index.
    allocated: HashMap<u32, Vec<f32>>,
    role_families: HashMap<QueueRole, u32>,
    role_queues: HashMap<QueueRole, QueueSelection>,
}

impl QueueFamilySelector {
    pub fn new(layout: &QueueFamilyLayout) -> Self {
        Self {
            layout: layout.clone(),
            allocated: HashMap::new(),
            role_families: HashMap::new(),
            role_queues: HashMap::new(),
        }
    }

    /// The layout this selector allocates from.
    pub fn layout(&self) -> &QueueFamilyLayout {
        &self.layout
    }

    fn resolve(&self, family: &QueueFamily) -> Result<QueueFamily> {
        // Only trust the layout's copy, the caller may pass a family from another adapter.
        self.layout
            .family(family.index)
            .copied()
            .ok_or_else(|| anyhow::Error::from(Error::UnknownQueueFamily(family.index)))
    }

    /// Record that `role` should be served by `family`.
    /// # Errors
    /// * Fails with [`Error::IncompatibleRole`] if the family lacks the capability the role needs. For
    ///   [`QueueRole::Present`] this checks surface support instead of the capability bitmask.
    /// * Fails with [`Error::UnknownQueueFamily`] if the family index does not exist on this adapter.
    pub fn select_queue_family(&mut self, family: &QueueFamily, role: QueueRole) -> Result<()> {
        let family = self.resolve(family)?;
        if !family.can_serve(role) {
            return Err(Error::IncompatibleRole {
                role,
                family: family.index,
            }
            .into());
        }
        if let Some(previous) = self.role_families.insert(role, family.index) {
            if previous != family.index {
                // The old slot stays allocated, but no longer belongs to this role.
                self.role_queues.remove(&role);
            }
        }
        Ok(())
    }

    /// Allocate a new queue in `family`.
    /// # Errors
    /// * Fails with [`Error::QueueCapacityExceeded`] if every queue of the family is already allocated.
    /// * Fails with [`Error::UnknownQueueFamily`] if the family index does not exist on this adapter.
    pub fn add_queue(&mut self, family: &QueueFamily, priority: f32) -> Result<QueueSelection> {
        let family = self.resolve(family)?;
        let queues = self.allocated.entry(family.index).or_default();
        if queues.len() as u32 >= family.queue_count {
            return Err(Error::QueueCapacityExceeded {
                family: family.index,
                capacity: family.queue_count,
            }
            .into());
        }
        queues.push(priority);
        let selection = QueueSelection {
            family_index: family.index,
            queue_index: queues.len() as u32 - 1,
            priority,
        };
        debug!(
            "Allocated queue {} of family {} with priority {}",
            selection.queue_index, selection.family_index, priority
        );
        Ok(selection)
    }

    /// Return the first queue already allocated in `family`, or allocate one. Calling this twice with the same
    /// family yields the same selection.
    pub fn get_or_add_queue(&mut self, family: &QueueFamily, priority: f32) -> Result<QueueSelection> {
        let family = self.resolve(family)?;
        match self.allocated.get(&family.index).and_then(|queues| queues.first()) {
            Some(&priority) => Ok(QueueSelection {
                family_index: family.index,
                queue_index: 0,
                priority,
            }),
            None => self.add_queue(&family, priority),
        }
    }

    /// Select `family` for `role` and give the role its own queue in it. If the role already holds a queue in this
    /// family, that queue is returned instead of allocating another one.
    /// # Errors
    /// * [`Error::IncompatibleRole`] if the family cannot serve the role.
    /// * [`Error::QueueCapacityExceeded`] if the family has no free queue left.
    pub fn assign(&mut self, role: QueueRole, family: &QueueFamily, priority: f32) -> Result<QueueSelection> {
        self.select_queue_family(family, role)?;
        if let Some(existing) = self.role_queues.get(&role) {
            if existing.family_index == family.index {
                return Ok(*existing);
            }
        }
        let selection = self.add_queue(family, priority)?;
        self.role_queues.insert(role, selection);
        Ok(selection)
    }

    /// Select `family` for `role` and share the first queue of that family with any other role using it.
    pub fn assign_shared(&mut self, role: QueueRole, family: &QueueFamily, priority: f32) -> Result<QueueSelection> {
        self.select_queue_family(family, role)?;
        let selection = self.get_or_add_queue(family, priority)?;
        self.role_queues.insert(role, selection);
        Ok(selection)
    }

    /// The queue assigned to a role, if any.
    pub fn selection(&self, role: QueueRole) -> Option<QueueSelection> {
        self.role_queues.get(&role).copied()
    }

    /// All role assignments.
    pub fn selections(&self) -> impl Iterator<Item = (QueueRole, QueueSelection)> + '_ {
        self.role_queues.iter().map(|(role, selection)| (*role, *selection))
    }

    /// The family selected for a role, if any.
    pub fn selected_family(&self, role: QueueRole) -> Option<u32> {
        self.role_families.get(&role).copied()
    }

    /// Number of queues allocated in a family.
    pub fn allocated_count(&self, family_index: u32) -> u32 {
        self.allocated.get(&family_index).map_or(0, |queues| queues.len() as u32)
    }

    /// Queues to create at device creation, sorted by family index.
    pub fn queue_requests(&self) -> Vec<QueueFamilyRequest> {
        let mut requests = self
            .allocated
            .iter()
            .filter(|(_, priorities)| !priorities.is_empty())
            .map(|(family_index, priorities)| QueueFamilyRequest {
                family_index: *family_index,
                priorities: priorities.clone(),
            })
            .collect::<Vec<_>>();
        requests.sort_by_key(|request| request.family_index);
        requests
    }
}
