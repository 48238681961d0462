//! Window management using winit

use crate::backend::wgpu_backend::WgpuBackend;
use crate::input::InputState;
use crate::renderer::{Renderer, RendererError};
use crate::RendererConfig;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use winit::{
    dpi::PhysicalSize,
    event::{Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget},
    window::{Window as WinitWindow, WindowBuilder},
};

#[derive(Error, Debug)]
pub enum WindowError {
    #[error("Failed to create event loop: {0}")]
    EventLoop(#[from] winit::error::EventLoopError),
    #[error("Failed to create window: {0}")]
    Os(#[from] winit::error::OsError),
    #[error(transparent)]
    Renderer(#[from] RendererError),
}

/// Wrapper around winit window with additional state
pub struct Window {
    window: Arc<WinitWindow>,
    width: u32,
    height: u32,
    resized: bool,
    close_requested: bool,
}

impl Window {
    /// Create a new window with the given title and dimensions
    pub fn new(event_loop: &EventLoop<()>, title: &str, width: u32, height: u32) -> Result<Self, WindowError> {
        let window = Arc::new(
            WindowBuilder::new()
                .with_title(title)
                .with_inner_size(PhysicalSize::new(width, height))
                .build(event_loop)?,
        );

        Ok(Self {
            window,
            width,
            height,
            resized: false,
            close_requested: false,
        })
    }

    /// Get arc reference to window
    pub fn window_arc(&self) -> Arc<WinitWindow> {
        Arc::clone(&self.window)
    }

    /// Get current window dimensions
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Returns the resize flag and clears it
    pub fn take_resized(&mut self) -> bool {
        std::mem::take(&mut self.resized)
    }

    /// Check if close was requested
    pub fn should_close(&self) -> bool {
        self.close_requested
    }

    /// Handle window events
    pub fn handle_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::Resized(size) => {
                self.width = size.width;
                self.height = size.height;
                self.resized = true;
            }
            WindowEvent::CloseRequested => {
                self.close_requested = true;
            }
            _ => {}
        }
    }

    /// Request a redraw
    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }
}

/// Open the window, build the renderer and run until Escape or close.
///
/// Initialization failures are returned; a frame failure is logged and ends
/// the loop.
pub fn run(config: RendererConfig) -> Result<(), WindowError> {
    let event_loop = EventLoop::new()?;
    let mut window = Window::new(&event_loop, &config.title, config.width, config.height)?;

    let backend = WgpuBackend::new(window.window_arc(), config.vsync).map_err(RendererError::from)?;
    let mut renderer = Some(Renderer::new(backend, &config)?);
    let mut input = InputState::new();
    let mut last_frame = Instant::now();

    event_loop.run(move |event, elwt: &EventLoopWindowTarget<()>| {
        elwt.set_control_flow(ControlFlow::Poll);

        match event {
            Event::WindowEvent { event, .. } => {
                input.handle_window_event(&event);
                window.handle_event(&event);

                if window.should_close() {
                    elwt.exit();
                }
                if window.take_resized() {
                    if let Some(renderer) = renderer.as_mut() {
                        let (width, height) = window.dimensions();
                        renderer.resize(width, height);
                    }
                }
            }
            Event::AboutToWait => {
                let Some(active) = renderer.as_mut() else {
                    return;
                };
                let now = Instant::now();
                let dt_ms = now.duration_since(last_frame).as_secs_f32() * 1000.0;
                last_frame = now;

                let changes = active.update(&input, dt_ms);
                input.end_frame();
                if changes.quit {
                    elwt.exit();
                    return;
                }

                if let Err(e) = active.render_frame() {
                    log::error!("Frame failed: {}", e);
                    elwt.exit();
                    return;
                }
                window.request_redraw();
            }
            Event::LoopExiting => {
                if let Some(renderer) = renderer.take() {
                    renderer.shutdown();
                }
            }
            _ => {}
        }
    })?;

    Ok(())
}
