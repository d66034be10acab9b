// Crowd march demo host
// Window mode: tap (touch or left click) places the crowd, later taps send it
// to the point under the screen center. K kills everyone, F1 toggles debug
// drawing, Esc quits. Headless mode scripts the same gestures for a fixed
// number of frames.

use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use glam::Vec3;
use log::{error, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use winit::{
    event::{Event as WinitEvent, WindowEvent},
    event_loop::EventLoop,
    keyboard::KeyCode,
    window::Window,
};

use crowd_march::engine::input::InputState;
use crowd_march::gesture::GesturePhase;
use crowd_march::{CrowdSession, SessionStatus, Settings};

/// Headless frame step.
const HEADLESS_DT: f32 = 1.0 / 30.0;
/// Frames between scripted retarget taps.
const RETARGET_EVERY: u32 = 150;

// ============================================================================
// ARGUMENTS
// ============================================================================

/// Crowd march demo: tap to place a crowd, tap again to send it somewhere.
#[derive(Parser, Debug, PartialEq)]
#[command(name = "crowd_march", version)]
struct Args {
    /// Settings file (TOML); built-in defaults otherwise
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run this many frames without a window, with scripted taps
    #[arg(long, value_name = "FRAMES")]
    headless: Option<u32>,

    /// Seed for the headless tap script
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

fn status_line(status: &SessionStatus) -> String {
    let phase = match status.phase {
        GesturePhase::AwaitingPlacement => "tap to place",
        GesturePhase::AwaitingRetarget => "tap to retarget",
    };
    let c = status.census;
    format!(
        "Crowd March - {phase} | walking {} idle {} dead {} | pending {}",
        c.walking, c.idle, c.dead, status.pending_retargets
    )
}

// ============================================================================
// HEADLESS
// ============================================================================

fn run_headless(settings: &Settings, frames: u32, seed: u64) {
    let mut session = CrowdSession::new(settings);
    let mut rng = StdRng::seed_from_u64(seed);
    let anchor = settings.placement.anchor;
    let kill_frame = frames.saturating_sub(frames / 5).max(1);

    for frame in 0..frames {
        if frame == 0 {
            session.on_tap();
        } else if frame % RETARGET_EVERY == 0 && frame < kill_frame {
            let aim = anchor + Vec3::new(rng.gen_range(-3.0..3.0), 0.0, rng.gen_range(-3.0..3.0));
            session.camera_mut().look_at(aim);
            if let Some(outcome) = session.on_tap() {
                info!("frame {frame}: {outcome:?}");
            }
        }
        if frame == kill_frame {
            info!("frame {frame}: killed {}", session.kill_all());
        }

        session.update(HEADLESS_DT);
        session.post_render();

        if frame % 30 == 0 {
            log::debug!("frame {frame}: {}", status_line(&session.status()));
        }
    }
    info!("after {frames} frames: {}", status_line(&session.status()));
}

// ============================================================================
// WINDOW
// ============================================================================

fn run_window(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let event_loop = EventLoop::new()?;
    let mut session = CrowdSession::new(settings);

    let window_attributes = Window::default_attributes()
        .with_title(status_line(&session.status()))
        .with_inner_size(winit::dpi::LogicalSize::new(1280, 720));
    let window = std::sync::Arc::new(event_loop.create_window(window_attributes)?);

    let size = window.inner_size();
    session.camera_mut().set_viewport(size.width, size.height);
    let mut input = InputState::new();
    let mut last_update = Instant::now();
    let mut last_title = Instant::now();

    event_loop.run(move |event, control_flow| match event {
        WinitEvent::WindowEvent { ref event, window_id } if window_id == window.id() => {
            input.process_event(event);
            match event {
                WindowEvent::CloseRequested => control_flow.exit(),
                WindowEvent::Resized(size) => {
                    session.camera_mut().set_viewport(size.width, size.height)
                }
                WindowEvent::RedrawRequested => {
                    let now = Instant::now();
                    let dt = (now - last_update).as_secs_f32().min(0.1);
                    last_update = now;

                    if input.key_pressed(KeyCode::Escape) {
                        control_flow.exit();
                    }
                    if input.key_pressed(KeyCode::KeyK) {
                        session.kill_all();
                    }
                    if input.key_pressed(KeyCode::F1) {
                        session.toggle_debug();
                    }
                    for _ in input.take_taps() {
                        session.on_tap();
                    }
                    session.camera_mut().update(&input, dt);
                    session.update(dt);
                    session.post_render();
                    input.end_frame();

                    if (now - last_title).as_secs_f32() >= 0.5 {
                        window.set_title(&status_line(&session.status()));
                        last_title = now;
                    }
                }
                _ => {}
            }
        }
        WinitEvent::AboutToWait => {
            window.request_redraw();
        }
        _ => {}
    })?;
    Ok(())
}

// ============================================================================
// MAIN
// ============================================================================

fn main() {
    env_logger::init();

    let args = Args::parse();

    let settings = match &args.config {
        Some(path) => match Settings::from_file(path) {
            Ok(settings) => settings,
            Err(err) => {
                error!("{err}");
                std::process::exit(1);
            }
        },
        None => Settings::default(),
    };

    match args.headless {
        Some(frames) => run_headless(&settings, frames, args.seed),
        None => {
            if let Err(err) = run_window(&settings) {
                error!("{err}");
                std::process::exit(1);
            }
        }
    }
}
