//! The wsi module provides utilities for interacting with the window: the surface, the swapchain and the [`Window`](window::Window)
//! trait that abstracts over windowing libraries.

pub mod surface;
pub mod swapchain;
pub mod window;
