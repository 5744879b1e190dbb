use std::mem::size_of;

use ash::vk;

/// Size in bytes of a single element of a format, for the formats that can appear in vertex input.
pub trait ByteSize {
    fn byte_size(&self) -> Option<usize>;
}

impl ByteSize for vk::Format {
    fn byte_size(&self) -> Option<usize> {
        let size = match *self {
            vk::Format::R32_SFLOAT | vk::Format::R32_UINT | vk::Format::R32_SINT => size_of::<f32>(),
            vk::Format::R32G32_SFLOAT | vk::Format::R32G32_UINT | vk::Format::R32G32_SINT => 2 * size_of::<f32>(),
            vk::Format::R32G32B32_SFLOAT | vk::Format::R32G32B32_UINT | vk::Format::R32G32B32_SINT => 3 * size_of::<f32>(),
            vk::Format::R32G32B32A32_SFLOAT | vk::Format::R32G32B32A32_UINT | vk::Format::R32G32B32A32_SINT => {
                4 * size_of::<f32>()
            }
            vk::Format::R8_UNORM | vk::Format::R8_UINT => 1,
            vk::Format::R8G8_UNORM | vk::Format::R8G8_UINT => 2,
            vk::Format::R8G8B8_UNORM | vk::Format::R8G8B8_UINT => 3,
            vk::Format::R8G8B8A8_UNORM | vk::Format::R8G8B8A8_UINT => 4,
            _ => return None,
        };
        Some(size)
    }
}
