//! Hazard field: lattice placement and constant-velocity drift
//!
//! Hazards start on a square lattice centred on the origin, each with a
//! fixed velocity for the whole game. Velocities come from the settings
//! table when one is given, otherwise they are generated from the seed.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::body::BodyId;
use super::world::World;
use crate::error::PhysicsError;
use crate::rotate;
use crate::settings::FieldSettings;

#[derive(Debug, Clone)]
pub struct Field {
    hazards: Vec<BodyId>,
    start_positions: Vec<Vec2>,
    velocities: Vec<Vec2>,
}

impl Field {
    /// Register every lattice hazard with the world
    pub fn spawn(settings: &FieldSettings, world: &mut World) -> Result<Self, PhysicsError> {
        settings.validate()?;
        let start_positions = lattice_positions(settings.lattice_size, settings.spacing);
        let velocities = match &settings.velocities {
            Some(table) => table.clone(),
            None => generate_velocities(settings),
        };

        let hazards = start_positions
            .iter()
            .map(|&pos| world.register_hazard(pos))
            .collect::<Result<Vec<_>, _>>()?;

        log::debug!(
            "Spawned {} hazards on a {}x{} lattice",
            hazards.len(),
            settings.lattice_size,
            settings.lattice_size
        );
        Ok(Self {
            hazards,
            start_positions,
            velocities,
        })
    }

    pub fn hazards(&self) -> &[BodyId] {
        &self.hazards
    }

    pub fn velocity(&self, index: usize) -> Vec2 {
        self.velocities[index]
    }

    /// Move every hazard along its velocity unless the world is frozen
    ///
    /// Destroyed hazards keep drifting, invisibly, until they respawn.
    pub fn drift(&self, world: &mut World, dt: f32) {
        if !world.is_simulating() {
            return;
        }
        for (&id, &velocity) in self.hazards.iter().zip(&self.velocities) {
            world.translate(id, velocity * dt);
        }
    }

    /// Put every hazard back on its lattice point, active
    pub fn restart(&self, world: &mut World) {
        for (&id, &pos) in self.hazards.iter().zip(&self.start_positions) {
            world.set_position(id, pos);
            world.set_active(id, true);
        }
    }
}

/// Lattice points, row by row from the bottom left
///
/// Points sit half a spacing off the integer lattice, so the origin is never
/// a hazard position.
pub fn lattice_positions(side: usize, spacing: f32) -> Vec<Vec2> {
    let half = (side / 2) as f32;
    let mut positions = Vec::with_capacity(side * side);
    for y in 0..side {
        for x in 0..side {
            let cell = Vec2::new(x as f32 - half, y as f32 - half);
            positions.push(cell * spacing + Vec2::splat(spacing / 2.0));
        }
    }
    positions
}

/// Seeded velocities: a random per-axis speed vector turned by a random angle
pub fn generate_velocities(settings: &FieldSettings) -> Vec<Vec2> {
    let mut rng = Pcg32::seed_from_u64(settings.seed);
    (0..settings.hazard_count())
        .map(|_| {
            let angle = (rng.random_range(0..360) as f32).to_radians();
            let speed = Vec2::new(
                rng.random_range(settings.min_speed..=settings.max_speed),
                rng.random_range(settings.min_speed..=settings.max_speed),
            );
            rotate(speed, angle)
        })
        .collect()
}
