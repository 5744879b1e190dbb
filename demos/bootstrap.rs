#[macro_use]
extern crate log;

use anyhow::Result;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop, EventLoopBuilder};
use winit::platform::run_return::EventLoopExtRunReturn;
use winit::window::WindowBuilder;

use deimos::prelude::*;

/// Handle all pending window events. Returns false once the window was closed.
fn pump_events(event_loop: &mut EventLoop<()>) -> bool {
    let mut open = true;
    event_loop.run_return(|event, _, control_flow| {
        *control_flow = ControlFlow::Poll;
        match event {
            Event::WindowEvent {
                event: WindowEvent::CloseRequested,
                ..
            } => {
                open = false;
                *control_flow = ControlFlow::Exit;
            }
            Event::MainEventsCleared => *control_flow = ControlFlow::Exit,
            _ => {}
        }
    });
    open
}

fn run() -> Result<()> {
    let mut event_loop = EventLoopBuilder::new().build();
    let window = WindowBuilder::new()
        .with_title("Deimos bootstrap")
        .with_inner_size(winit::dpi::PhysicalSize::new(1280, 720))
        .build(&event_loop)?;

    let settings = AppBuilder::new()
        .name("Deimos bootstrap")
        .version((0, 1, 0))
        .validation(cfg!(debug_assertions))
        .surface_format(vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        })
        .present_mode(vk::PresentModeKHR::MAILBOX)
        .build();

    let backend = VulkanBackend::new(&settings, Some(&window))?;
    let mut engine = Engine::bootstrap(&settings, backend)?;
    info!(
        "Running on {} with {} live resources",
        engine.device().adapter().properties().name,
        engine.device().resource_count()
    );
    engine.run(|_| pump_events(&mut event_loop))
}

fn main() -> Result<()> {
    pretty_env_logger::init();
    match run() {
        Ok(()) => Ok(()),
        Err(err) => {
            error!("Engine failed: {err:?}");
            if cfg!(debug_assertions) {
                Err(err)
            } else {
                Ok(())
            }
        }
    }
}
