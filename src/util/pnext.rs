//! Utilities for dealing with generic pNext chains

use std::ffi::c_void;

use ash::vk;

/// View a device feature block through its common header, so it can be linked into a pNext chain.
pub(crate) fn as_base_out<T: vk::ExtendsDeviceCreateInfo>(block: &mut T) -> &mut vk::BaseOutStructure {
    // SAFETY: Every struct that extends VkDeviceCreateInfo starts with sType followed by pNext.
    unsafe { &mut *(block as *mut T as *mut vk::BaseOutStructure) }
}

/// Raw pointer to a chain element, as stored in a `p_next` field.
pub(crate) fn as_void_ptr(block: &mut vk::BaseOutStructure) -> *mut c_void {
    block as *mut vk::BaseOutStructure as *mut c_void
}

/// Walk a pNext chain starting at `head` and collect the structure types, in chain order.
/// # Safety
/// `head` must be null or point to a valid chain of Vulkan structures.
pub unsafe fn chain_structure_types(head: *const c_void) -> Vec<vk::StructureType> {
    let mut types = vec![];
    let mut current = head as *const vk::BaseOutStructure;
    while !current.is_null() {
        types.push((*current).s_type);
        current = (*current).p_next as *const vk::BaseOutStructure;
    }
    types
}
