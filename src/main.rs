//! Asteroid Grid headless runner
//!
//! Usage: `asteroid-grid [--config settings.json] [--seconds 10]`
//!
//! Flies the ship in a slow circle through the field at a fixed timestep and
//! logs field statistics once per simulated second. Restarts after a game over.

use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use glam::Vec2;

use asteroid_grid::sim::{Session, SessionPhase, TickInput};
use asteroid_grid::{PhysicsError, Settings};

/// Radius of the demo flight path
const ORBIT_RADIUS: f32 = 20.0;
/// Radians per second along the flight path
const ORBIT_RATE: f32 = 0.2;

#[derive(Parser, Debug)]
#[command(name = "asteroid-grid", about = "Run the asteroid field headless and log statistics")]
struct Args {
    /// JSON settings file; missing keys keep their defaults
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Simulated seconds to run
    #[arg(long, short, default_value_t = 10.0)]
    seconds: f32,
}

fn main() -> Result<(), PhysicsError> {
    env_logger::init();

    let args = Args::parse();
    let settings = match &args.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    let seconds = args.seconds;

    let dt = settings.frame_dt();
    let frames = (seconds / dt).ceil() as u64;
    let ticks_per_report = (1.0 / dt).round().max(1.0) as u64;

    let started = Instant::now();
    let mut session = Session::new(&settings)?;
    log::info!(
        "Session ready in {:?}: {} bodies, {} frames of {:.4}s",
        started.elapsed(),
        session.world().registered(),
        frames,
        dt
    );

    let mut input = TickInput::default();
    let mut busy = std::time::Duration::ZERO;
    for frame in 0..frames {
        let angle = frame as f32 * dt * ORBIT_RATE;
        let position = Vec2::new(angle.cos(), angle.sin()) * ORBIT_RADIUS;
        // Face along the direction of travel
        input.pose = Some((position, angle));
        input.restart = session.phase() == SessionPhase::GameOver;

        let tick_start = Instant::now();
        let report = session.tick(&input, dt);
        busy += tick_start.elapsed();

        if report.respawn.deferred > 0 {
            log::debug!("Frame {frame}: {} respawns deferred", report.respawn.deferred);
        }
        if (frame + 1) % ticks_per_report == 0 {
            log::info!(
                "t={:.1}s score={} hazards={} pending={} avg_tick={:?}",
                session.world().time(),
                session.score(),
                session.active_hazards(),
                session.world().pending_respawns(),
                busy / ticks_per_report as u32
            );
            busy = std::time::Duration::ZERO;
        }
    }

    log::info!(
        "Finished after {:?} with score {}",
        started.elapsed(),
        session.score()
    );
    Ok(())
}
