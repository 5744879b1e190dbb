//! Graphics pipeline construction.
//!
//! Pipelines are described with a [`PipelineBuilder`](builder::PipelineBuilder) and created through
//! [`Device::create_pipeline()`](crate::Device::create_pipeline). Shader code is always supplied as SPIR-V words, this
//! crate does not compile shaders.
//!
//! # Example
//! ```
//! # use deimos::prelude::*;
//! # fn build(device: &mut Device, pass: ResourceID, vertex: Vec<u32>, fragment: Vec<u32>) -> anyhow::Result<ResourceID> {
//! let mut binding = VertexBinding::new(0, vk::VertexInputRate::VERTEX, 20);
//! // Equivalent of `layout (location = 0) in vec3 position;`
//! binding.add_attrib_description(vk::Format::R32G32B32_SFLOAT, 0);
//! // Equivalent of `layout (location = 1) in vec2 uv;`
//! binding.add_attrib_description(vk::Format::R32G32_SFLOAT, 12);
//!
//! let mut builder = PipelineBuilder::new("sample");
//! builder
//!     .add_vertex_binding(binding)?
//!     // Avoid recreating the pipeline every time the window is resized.
//!     .add_dynamic_state(vk::DynamicState::VIEWPORT)?
//!     .add_dynamic_state(vk::DynamicState::SCISSOR)?
//!     .add_color_blend_attachment(PipelineBuilder::opaque_blend_attachment())?
//!     .attach_shader(vk::ShaderStageFlags::VERTEX, vertex)?
//!     .attach_shader(vk::ShaderStageFlags::FRAGMENT, fragment)?
//!     .set_render_pass(pass, 0)?;
//! device.create_pipeline(&mut builder)
//! # }
//! ```

use anyhow::Result;
use ash::vk;

use crate::util::byte_size::ByteSize;
use crate::Error;

pub mod builder;

/// A vertex buffer binding together with its attribute layout. Attribute locations are assigned in the order the
/// attributes are added, starting at zero or at the location given to [`VertexBinding::starting_at()`].
#[derive(Debug, Clone)]
pub struct VertexBinding {
    binding: u32,
    rate: vk::VertexInputRate,
    stride: u32,
    first_location: u32,
    attributes: Vec<vk::VertexInputAttributeDescription>,
}

impl VertexBinding {
    pub fn new(binding: u32, rate: vk::VertexInputRate, stride: u32) -> Self {
        Self {
            binding,
            rate,
            stride,
            first_location: 0,
            attributes: vec![],
        }
    }

    /// Assign locations starting at `location`. Use this when a pipeline has more than one binding, the
    /// locations of all bindings share one namespace.
    pub fn starting_at(mut self, location: u32) -> Self {
        self.first_location = location;
        self
    }

    /// Add an attribute at an explicit offset and return its location.
    pub fn add_attrib_description(&mut self, format: vk::Format, offset: u32) -> u32 {
        let location = self.first_location + self.attributes.len() as u32;
        self.attributes.push(vk::VertexInputAttributeDescription {
            location,
            binding: self.binding,
            format,
            offset,
        });
        location
    }

    /// Add an attribute directly after the previous one and return its location.
    /// # Errors
    /// * Fails with [`Error::NoSupportedFormat`] if the size of the previous attribute's format is not known.
    pub fn push_attribute(&mut self, format: vk::Format) -> Result<u32> {
        let offset = match self.attributes.last() {
            None => 0,
            Some(last) => last.offset + last.format.byte_size().ok_or(Error::NoSupportedFormat)? as u32,
        };
        Ok(self.add_attrib_description(format, offset))
    }

    pub fn binding(&self) -> u32 {
        self.binding
    }

    pub fn stride(&self) -> u32 {
        self.stride
    }

    pub fn attributes(&self) -> &[vk::VertexInputAttributeDescription] {
        self.attributes.as_slice()
    }

    pub(crate) fn description(&self) -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: self.binding,
            stride: self.stride,
            input_rate: self.rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locations_follow_insertion_order() {
        let mut binding = VertexBinding::new(1, vk::VertexInputRate::VERTEX, 20);
        assert_eq!(binding.push_attribute(vk::Format::R32G32B32_SFLOAT).unwrap(), 0);
        assert_eq!(binding.push_attribute(vk::Format::R32G32_SFLOAT).unwrap(), 1);
        let offsets = binding
            .attributes()
            .iter()
            .map(|attr| (attr.location, attr.binding, attr.offset))
            .collect::<Vec<_>>();
        assert_eq!(offsets, vec![(0, 1, 0), (1, 1, 12)]);
    }

    #[test]
    fn locations_continue_after_offset() {
        let mut binding = VertexBinding::new(1, vk::VertexInputRate::INSTANCE, 16).starting_at(4);
        assert_eq!(binding.push_attribute(vk::Format::R32G32B32A32_SFLOAT).unwrap(), 4);
        assert_eq!(binding.attributes()[0].location, 4);
    }
}
