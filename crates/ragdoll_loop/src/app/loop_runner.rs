use std::sync::Arc;
use std::time::Instant;

use pixels::Error as PixelsError;
use thiserror::Error;
use tracing::{info, warn};
use winit::dpi::LogicalSize;
use winit::error::{EventLoopError, OsError};
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::WindowBuilder;

use crate::config::{AppConfig, ConfigError};

use super::engine::SimulationEngine;
use super::frame_loop::{FrameLoop, LoopError, LoopState};
use super::input::{ControlKey, KeyState};
use super::metrics::MetricsHandle;
use super::rendering::{Renderer, Viewport};
use super::sequence::SequenceError;
use super::session::{ConfigUpdate, SessionConfig};

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to create event loop: {0}")]
    CreateEventLoop(#[source] EventLoopError),
    #[error("failed to create application window: {0}")]
    CreateWindow(#[source] OsError),
    #[error("failed to initialize renderer: {0}")]
    CreateRenderer(#[source] PixelsError),
    #[error(transparent)]
    Loop(#[from] LoopError),
    #[error("failed to load startup sequence: {0}")]
    Sequence(#[from] SequenceError),
    #[error("event loop failed: {0}")]
    EventLoopRun(#[source] EventLoopError),
}

pub fn run_app<E>(config: AppConfig, engine: E) -> Result<(), AppError>
where
    E: SimulationEngine + 'static,
{
    run_app_with_metrics(config, engine, MetricsHandle::default())
}

/// Opens a window and drives a [`FrameLoop`] from its redraw events until
/// the window closes or Escape is pressed.
pub fn run_app_with_metrics<E>(
    config: AppConfig,
    engine: E,
    metrics_handle: MetricsHandle,
) -> Result<(), AppError>
where
    E: SimulationEngine + 'static,
{
    config.validate()?;

    let event_loop = EventLoop::new().map_err(AppError::CreateEventLoop)?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(config.window.title.clone())
            .with_inner_size(LogicalSize::new(
                config.window.width as f64,
                config.window.height as f64,
            ))
            .build(&event_loop)
            .map_err(AppError::CreateWindow)?,
    );
    let mut renderer = Renderer::new(Arc::clone(&window)).map_err(AppError::CreateRenderer)?;

    let session_config = SessionConfig {
        viewport: renderer.viewport(),
        ..config.session_config()
    };
    let mut frame_loop = FrameLoop::with_metrics(
        engine,
        config.loop_config(),
        session_config,
        metrics_handle,
    )?;
    if let Some(sequence) = config.sequence.as_deref() {
        let actions = frame_loop.session_mut().load_sequence(sequence)?;
        info!(actions, "startup_sequence_queued");
    }

    let tick_period = frame_loop.config().tick_period();
    let title = config.window.title.clone();
    let mut keyboard = KeyboardCollector::default();
    let mut presented_frames = 0u64;

    frame_loop.start(Instant::now())?;

    event_loop
        .run(move |event, window_target| match event {
            Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
                WindowEvent::CloseRequested => {
                    info!(reason = "window_close", "shutdown_requested");
                    window_target.exit();
                }
                WindowEvent::Resized(new_size) => {
                    if let Err(error) = renderer.resize(new_size.width, new_size.height) {
                        warn!(error = %error, "renderer_resize_failed");
                        window_target.exit();
                        return;
                    }
                    if new_size.width > 0 && new_size.height > 0 {
                        frame_loop
                            .session_mut()
                            .queue_update(ConfigUpdate::Resize(Viewport {
                                width: new_size.width,
                                height: new_size.height,
                            }));
                    }
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    if let Some(command) = keyboard.handle_keyboard_input(&event) {
                        match command {
                            KeyCommand::Live(key, is_down) => {
                                frame_loop.session_mut().set_live_key(key, is_down);
                            }
                            KeyCommand::Reset => {
                                frame_loop.session_mut().queue_update(ConfigUpdate::Reset);
                            }
                            KeyCommand::TogglePause => {
                                if let Err(error) = frame_loop.toggle_pause(Instant::now()) {
                                    warn!(error = %error, "pause_toggle_rejected");
                                }
                                let paused = frame_loop.state() == LoopState::Paused;
                                if paused {
                                    window.set_title(&format!("{title} (paused)"));
                                } else {
                                    window.set_title(&title);
                                }
                            }
                            KeyCommand::Quit => {
                                info!(reason = "escape_key", "shutdown_requested");
                                window_target.exit();
                            }
                        }
                    }
                }
                WindowEvent::RedrawRequested => {
                    let report = frame_loop.advance(Instant::now(), &mut renderer);
                    if report.ticks_run > 0 && renderer.frames_submitted() != presented_frames {
                        presented_frames = renderer.frames_submitted();
                        if let Err(error) = renderer.present() {
                            warn!(error = %error, "renderer_draw_failed");
                            window_target.exit();
                        }
                    }
                }
                _ => {}
            },
            Event::AboutToWait => {
                window.request_redraw();
                window_target
                    .set_control_flow(ControlFlow::WaitUntil(Instant::now() + tick_period));
            }
            Event::LoopExiting => {
                frame_loop.stop();
                info!(ticks_run = frame_loop.ticks_run(), "shutdown");
            }
            _ => {}
        })
        .map_err(AppError::EventLoopRun)
}

/// One keyboard-driven intent for the frame loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyCommand {
    Live(ControlKey, bool),
    Reset,
    TogglePause,
    Quit,
}

/// Tracks held keys so that Q/W/O/P report only real transitions and the
/// command keys fire once per press.
#[derive(Debug, Default)]
struct KeyboardCollector {
    live_keys: KeyState,
    reset_is_down: bool,
    pause_is_down: bool,
    quit_requested: bool,
}

impl KeyboardCollector {
    fn handle_keyboard_input(&mut self, key_event: &KeyEvent) -> Option<KeyCommand> {
        let is_pressed = key_event.state == ElementState::Pressed;
        self.handle_physical_key(key_event.physical_key, is_pressed)
    }

    fn handle_physical_key(&mut self, key: PhysicalKey, is_pressed: bool) -> Option<KeyCommand> {
        let PhysicalKey::Code(code) = key else {
            return None;
        };
        if let Some(control_key) = control_key_for(code) {
            if self.live_keys.is_down(control_key) == is_pressed {
                return None;
            }
            self.live_keys.set(control_key, is_pressed);
            return Some(KeyCommand::Live(control_key, is_pressed));
        }
        match code {
            KeyCode::KeyR => {
                edge(&mut self.reset_is_down, is_pressed).then_some(KeyCommand::Reset)
            }
            KeyCode::Space => {
                edge(&mut self.pause_is_down, is_pressed).then_some(KeyCommand::TogglePause)
            }
            KeyCode::Escape if is_pressed && !self.quit_requested => {
                self.quit_requested = true;
                Some(KeyCommand::Quit)
            }
            _ => None,
        }
    }
}

/// Records the key state and reports whether this event is a fresh press.
fn edge(is_down: &mut bool, is_pressed: bool) -> bool {
    let pressed_edge = is_pressed && !*is_down;
    *is_down = is_pressed;
    pressed_edge
}

fn control_key_for(code: KeyCode) -> Option<ControlKey> {
    match code {
        KeyCode::KeyQ => Some(ControlKey::Q),
        KeyCode::KeyW => Some(ControlKey::W),
        KeyCode::KeyO => Some(ControlKey::O),
        KeyCode::KeyP => Some(ControlKey::P),
        _ => None,
    }
}
