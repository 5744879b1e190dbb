//! Generational arena that owns every GPU object created on a device.
//!
//! Engine code never holds raw Vulkan handles. Instead it gets a [`ResourceID`], which is only valid for the table that
//! issued it. Each slot carries a generation counter that is bumped on destroy, so a stale ID pointing at a reused slot
//! is detected instead of silently aliasing the new resource.

use std::fmt::Formatter;
use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::Result;

use crate::resource::{CommandBuffer, Image, Pipeline, RenderPass};
use crate::wsi::swapchain::Swapchain;
use crate::Error;

/// Category of a resource.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Image,
    Swapchain,
    RenderPass,
    Pipeline,
    CommandBuffer,
}

/// Opaque handle to a resource owned by a [`Device`](crate::Device).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ResourceID {
    table: u32,
    kind: ResourceKind,
    index: u32,
    generation: u32,
}

impl ResourceID {
    /// The category of the resource this ID refers to.
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }
}

impl std::fmt::Display for ResourceID {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}#{}v{}@{}", self.kind, self.index, self.generation, self.table)
    }
}

/// Any resource stored in the table.
#[derive(Debug)]
pub enum Resource {
    Image(Image),
    Swapchain(Swapchain),
    RenderPass(RenderPass),
    Pipeline(Pipeline),
    CommandBuffer(CommandBuffer),
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Image(_) => ResourceKind::Image,
            Resource::Swapchain(_) => ResourceKind::Swapchain,
            Resource::RenderPass(_) => ResourceKind::RenderPass,
            Resource::Pipeline(_) => ResourceKind::Pipeline,
            Resource::CommandBuffer(_) => ResourceKind::CommandBuffer,
        }
    }
}

/// Implemented by every payload type that can live in a [`ResourceTable`].
pub trait ResourceType: Sized {
    const KIND: ResourceKind;

    fn into_resource(self) -> Resource;
    fn from_resource(resource: &Resource) -> Option<&Self>;
    fn from_resource_mut(resource: &mut Resource) -> Option<&mut Self>;
}

macro_rules! impl_resource_type {
    ($ty:ident) => {
        impl ResourceType for $ty {
            const KIND: ResourceKind = ResourceKind::$ty;

            fn into_resource(self) -> Resource {
                Resource::$ty(self)
            }

            fn from_resource(resource: &Resource) -> Option<&Self> {
                match resource {
                    Resource::$ty(value) => Some(value),
                    _ => None,
                }
            }

            fn from_resource_mut(resource: &mut Resource) -> Option<&mut Self> {
                match resource {
                    Resource::$ty(value) => Some(value),
                    _ => None,
                }
            }
        }
    };
}

impl_resource_type!(Image);
impl_resource_type!(Swapchain);
impl_resource_type!(RenderPass);
impl_resource_type!(Pipeline);
impl_resource_type!(CommandBuffer);

#[derive(Debug)]
struct Entry {
    resource: Resource,
    /// Creation order, used to destroy in reverse on shutdown.
    sequence: u64,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    entry: Option<Entry>,
}

static NEXT_TABLE_ID: AtomicU32 = AtomicU32::new(1);

/// Arena of resources addressed by [`ResourceID`]. Not thread safe, wrap the owner in a lock if resources must be
/// created from several threads.
#[derive(Debug)]
pub struct ResourceTable {
    id: u32,
    slots: Vec<Slot>,
    free: Vec<u32>,
    next_sequence: u64,
    live: usize,
}

impl Default for ResourceTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceTable {
    /// Create an empty table with a process-unique identity.
    pub fn new() -> Self {
        Self {
            id: NEXT_TABLE_ID.fetch_add(1, Ordering::Relaxed),
            slots: vec![],
            free: vec![],
            next_sequence: 0,
            live: 0,
        }
    }

    /// Store a resource and return its handle.
    pub fn create<T: ResourceType>(&mut self, value: T) -> ResourceID {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot::default());
                self.slots.len() as u32 - 1
            }
        };
        let slot = &mut self.slots[index as usize];
        slot.entry = Some(Entry {
            resource: value.into_resource(),
            sequence: self.next_sequence,
        });
        self.next_sequence += 1;
        self.live += 1;
        ResourceID {
            table: self.id,
            kind: T::KIND,
            index,
            generation: slot.generation,
        }
    }

    fn entry(&self, id: ResourceID) -> Result<&Entry> {
        if id.table != self.id {
            return Err(Error::InvalidHandle(id).into());
        }
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.entry.as_ref())
            .ok_or_else(|| Error::InvalidHandle(id).into())
    }

    fn entry_mut(&mut self, id: ResourceID) -> Result<&mut Entry> {
        if id.table != self.id {
            return Err(Error::InvalidHandle(id).into());
        }
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.entry.as_mut())
            .ok_or_else(|| Error::InvalidHandle(id).into())
    }

    /// Look up a resource.
    /// # Errors
    /// * [`Error::InvalidHandle`] if the ID is unknown, destroyed, of another kind or from another table.
    pub fn get<T: ResourceType>(&self, id: ResourceID) -> Result<&T> {
        let entry = self.entry(id)?;
        T::from_resource(&entry.resource).ok_or_else(|| Error::InvalidHandle(id).into())
    }

    /// Mutable variant of [`ResourceTable::get()`].
    pub fn get_mut<T: ResourceType>(&mut self, id: ResourceID) -> Result<&mut T> {
        let entry = self.entry_mut(id)?;
        T::from_resource_mut(&mut entry.resource).ok_or_else(|| Error::InvalidHandle(id).into())
    }

    /// True if the ID refers to a live resource in this table.
    pub fn contains(&self, id: ResourceID) -> bool {
        self.entry(id).map_or(false, |entry| entry.resource.kind() == id.kind)
    }

    /// Remove a resource and hand back ownership of it. The slot is invalidated, so destroying the same ID again fails.
    /// # Errors
    /// * [`Error::InvalidHandle`] under the same conditions as [`ResourceTable::get()`], including a second destroy.
    pub fn destroy(&mut self, id: ResourceID) -> Result<Resource> {
        let kind_matches = self.entry(id)?.resource.kind() == id.kind;
        if !kind_matches {
            return Err(Error::InvalidHandle(id).into());
        }
        let slot = &mut self.slots[id.index as usize];
        let entry = slot.entry.take().ok_or(Error::InvalidHandle(id))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        Ok(entry.resource)
    }

    /// Number of live resources.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Remove every live resource, newest first.
    pub fn drain_reverse(&mut self) -> Vec<Resource> {
        let mut entries = self
            .slots
            .iter_mut()
            .filter_map(|slot| {
                let entry = slot.entry.take()?;
                slot.generation = slot.generation.wrapping_add(1);
                Some(entry)
            })
            .collect::<Vec<_>>();
        entries.sort_by(|a, b| b.sequence.cmp(&a.sequence));
        self.free = (0..self.slots.len() as u32).rev().collect();
        self.live = 0;
        entries.into_iter().map(|entry| entry.resource).collect()
    }
}
