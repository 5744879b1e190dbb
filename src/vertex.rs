//! Vertex layout shared by the scene importer and the main pipeline.

use std::mem::{offset_of, size_of};

use ash::vk;
use static_assertions::const_assert_eq;

use crate::pipeline::VertexBinding;

/// A single vertex as uploaded to the GPU.
#[repr(C)]
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coord: [f32; 2],
    /// Index into the scene material list.
    pub material_index: u32,
}

const_assert_eq!(size_of::<Vertex>(), 36);

impl Vertex {
    /// Binding 0, per-vertex rate, with `position`, `normal`, `tex_coord` and `material_index` at locations 0 to 3.
    pub fn binding() -> VertexBinding {
        let mut binding = VertexBinding::new(0, vk::VertexInputRate::VERTEX, size_of::<Vertex>() as u32);
        binding.add_attrib_description(vk::Format::R32G32B32_SFLOAT, offset_of!(Vertex, position) as u32);
        binding.add_attrib_description(vk::Format::R32G32B32_SFLOAT, offset_of!(Vertex, normal) as u32);
        binding.add_attrib_description(vk::Format::R32G32_SFLOAT, offset_of!(Vertex, tex_coord) as u32);
        binding.add_attrib_description(vk::Format::R32_UINT, offset_of!(Vertex, material_index) as u32);
        binding
    }
}
