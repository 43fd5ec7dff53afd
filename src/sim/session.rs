//! Game session: field, ship and world driven together
//!
//! Owns the score and the game-over latch. Hit observers only flip shared
//! atomics; the session reads them after each frame.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use glam::Vec2;

use super::body::CollisionResponse;
use super::field::Field;
use super::ship::Ship;
use super::world::{StepReport, World};
use crate::error::PhysicsError;
use crate::settings::Settings;

/// Current game phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Playing,
    /// The actor was hit; the world is frozen until restart
    GameOver,
}

/// Input commands for a single tick
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// New actor position and heading from the controller
    pub pose: Option<(Vec2, f32)>,
    /// Start over from the initial layout
    pub restart: bool,
}

#[derive(Debug)]
pub struct Session {
    world: World,
    field: Field,
    ship: Ship,
    phase: SessionPhase,
    score: Arc<AtomicU64>,
    actor_hit: Arc<AtomicBool>,
    max_dt: f32,
}

impl Session {
    /// Build and initialize everything; fails on bad settings
    pub fn new(settings: &Settings) -> Result<Self, PhysicsError> {
        settings.validate()?;
        let mut world = World::new(settings.physics.clone(), settings.body_count())?;
        let field = Field::spawn(&settings.field, &mut world)?;

        let score = Arc::new(AtomicU64::new(0));
        let actor_hit = Arc::new(AtomicBool::new(false));
        let flag = actor_hit.clone();
        let ship = Ship::spawn(
            &settings.ship,
            &mut world,
            Vec2::ZERO,
            CollisionResponse::notify(move || flag.store(true, Ordering::Relaxed)),
            || {
                let score = score.clone();
                CollisionResponse::notify(move || {
                    score.fetch_add(1, Ordering::Relaxed);
                })
            },
        )?;
        world.initialize()?;

        Ok(Self {
            world,
            field,
            ship,
            phase: SessionPhase::Playing,
            score,
            actor_hit,
            max_dt: settings.frame_dt(),
        })
    }

    /// Advance one frame
    ///
    /// `dt` is clamped to the configured frame length so no body can skip a
    /// whole cell.
    pub fn tick(&mut self, input: &TickInput, dt: f32) -> StepReport {
        // A restart frame only resets, so the first simulated frame sees the initial layout
        if input.restart {
            self.restart();
            return StepReport::default();
        }
        if self.phase == SessionPhase::GameOver {
            return StepReport::default();
        }
        let dt = dt.min(self.max_dt);

        if let Some((position, heading)) = input.pose {
            self.ship.set_pose(position, heading);
        }
        self.field.drift(&mut self.world, dt);
        self.ship.update(&mut self.world, dt);
        let report = self.world.advance(dt);

        if self.actor_hit.swap(false, Ordering::Relaxed) {
            self.phase = SessionPhase::GameOver;
            self.ship.kill();
            self.world.set_simulating(false);
            log::info!(
                "Game over at {:.2}s with score {}",
                self.world.time(),
                self.score()
            );
        }
        report
    }

    /// Reset world, field, ship and score to the initial layout
    pub fn restart(&mut self) {
        self.world.restart();
        self.field.restart(&mut self.world);
        self.ship.restart(&mut self.world);
        self.score.store(0, Ordering::Relaxed);
        self.actor_hit.store(false, Ordering::Relaxed);
        self.phase = SessionPhase::Playing;
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn score(&self) -> u64 {
        self.score.load(Ordering::Relaxed)
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn field(&self) -> &Field {
        &self.field
    }

    pub fn ship(&self) -> &Ship {
        &self.ship
    }

    /// Hazards currently in play
    pub fn active_hazards(&self) -> usize {
        self.field
            .hazards()
            .iter()
            .filter(|&&id| self.world.body(id).is_active())
            .count()
    }
}
