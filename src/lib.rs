//! Vulkan device bootstrap
//!
//! Deimos takes a window and a set of requirements and produces a ready to use rendering context: it picks a GPU,
//! distributes the adapter's queues over the engine's roles, negotiates device extensions and their feature chain, and
//! creates the swapchain, depth buffer, render pass and main pipeline. Every GPU object it creates is handed out as an
//! opaque [`ResourceID`](crate::ResourceID) and destroyed in reverse creation order when the [`Device`](crate::Device)
//! is dropped.
//!
//! To get started, import the prelude
//! ```
//! use deimos::prelude::*;
//! ```
//!
//! # Example
//!
//! For illustrative purposes, we will use winit here. Any windowing library can be supported by implementing
//! [`WindowSize`](crate::WindowSize) and the `raw-window-handle` traits.
//! ```no_run
//! use winit::window::WindowBuilder;
//! use winit::event_loop::EventLoopBuilder;
//! let event_loop = EventLoopBuilder::new().build();
//! let window = WindowBuilder::new()
//!     .with_title("Deimos test app")
//!     .build(&event_loop)
//!     .unwrap();
//! ```
//! First, define an [`AppSettings`](crate::AppSettings) structure that outlines requirements and information about the
//! application. Deimos uses it to pick a suitable GPU and to configure the swapchain.
//! ```
//! use deimos::prelude::*;
//!
//! let settings = AppBuilder::new()
//!     .version((1, 0, 0))
//!     .name("Deimos demo app")
//!     .validation(true)
//!     .surface_format(vk::SurfaceFormatKHR {
//!         format: vk::Format::R8G8B8A8_SRGB,
//!         color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
//!     })
//!     .gpu(GPURequirements {
//!         dedicated: true,
//!         min_device_local_memory: 1024 * 1024 * 1024, // 1 GiB
//!         ..Default::default()
//!     })
//!     .build();
//! ```
//! Then create the Vulkan backend for the window and bootstrap the engine.
//! ```no_run
//! # use deimos::prelude::*;
//! # fn run(settings: &AppSettings, window: &winit::window::Window) -> anyhow::Result<()> {
//! let backend = VulkanBackend::new(settings, Some(window))?;
//! let engine = Engine::bootstrap(settings, backend)?;
//! info_about(&engine);
//! # Ok(())
//! # }
//! # fn info_about<B: Backend>(_: &Engine<B>) {}
//! ```
//! The [`backend::null::NullBackend`] runs the same sequence on synthetic adapters, without a GPU.
//!
//! For further details, check out the following modules
//! - [`bootstrap`] for the stage sequence.
//! - [`core::queue`] for queue selection.
//! - [`core::extension`] for device extensions and the feature chain.
//! - [`resource`] for the resource handle table.
//! - [`pass`], [`pipeline`] and [`wsi::swapchain`] for the builders.

#[macro_use]
extern crate derivative;
#[macro_use]
extern crate log;

pub mod prelude;
pub use crate::prelude::*;

pub mod backend;
pub mod bootstrap;
pub mod core;
pub mod extensions;
pub mod pass;
pub mod pipeline;
pub mod resource;
#[cfg(feature = "scene")]
pub mod scene;
pub mod util;
pub mod vertex;
pub mod wsi;
