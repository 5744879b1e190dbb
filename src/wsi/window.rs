//! Utilities for generic window handling

use ash::vk;
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};

/// Trait for windows that exposes the content width and height of a window.
pub trait WindowSize {
    /// Get the width of the window
    fn width(&self) -> u32;
    /// Get the height of the window
    fn height(&self) -> u32;

    /// Drawable area as a Vulkan extent.
    fn extent(&self) -> vk::Extent2D {
        vk::Extent2D {
            width: self.width(),
            height: self.height(),
        }
    }
}

#[cfg(feature = "winit")]
impl WindowSize for winit::window::Window {
    fn width(&self) -> u32 {
        self.inner_size().width
    }

    fn height(&self) -> u32 {
        self.inner_size().height
    }
}

/// Generic "window" trait that is applied to all raw_window_handle providers and those who implement window size
pub trait Window: WindowSize + HasRawDisplayHandle + HasRawWindowHandle {}
impl<T: WindowSize + HasRawDisplayHandle + HasRawWindowHandle> Window for T {}
