//! Engine settings
//!
//! Every tunable lives here with defaults matching `crate::consts`. Settings
//! can be overridden from a JSON file; missing keys keep their defaults.

use std::path::Path;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::ConfigError;

/// Grid geometry, collision radii and respawn tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsSettings {
    /// Cells per grid side (even, at least 2)
    pub grid_size: usize,
    /// Width and height of a cell before overlap
    pub cell_size: f32,
    /// Margin by which adjacent cells overlap
    pub cell_overlap: f32,
    /// Collision radius of hazards and the actor
    pub hazard_radius: f32,
    /// Collision radius of projectiles
    pub projectile_radius: f32,
    /// Seconds before a destroyed hazard may respawn
    pub respawn_delay: f32,
    /// Hazards examined for respawn per frame
    pub respawn_batch: usize,
    /// Minimum per-axis distance between a respawn cell and the actor
    pub respawn_safe_distance: f32,
    /// Landing offset from the respawn cell's minimum corner
    pub respawn_offset: Vec2,
    /// Random jitter added along x on respawn
    pub respawn_jitter: f32,
    /// Seed for respawn cursor and jitter
    pub seed: u64,
}

impl Default for PhysicsSettings {
    fn default() -> Self {
        Self {
            grid_size: CELL_GRID_SIZE,
            cell_size: CELL_SIZE,
            cell_overlap: CELL_OVERLAP,
            hazard_radius: HAZARD_RADIUS,
            projectile_radius: PROJECTILE_RADIUS,
            respawn_delay: RESPAWN_DELAY,
            respawn_batch: RESPAWN_BATCH,
            respawn_safe_distance: RESPAWN_SAFE_DISTANCE,
            respawn_offset: RESPAWN_OFFSET,
            respawn_jitter: RESPAWN_JITTER,
            seed: 0x5eed,
        }
    }
}

impl PhysicsSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid_size < 2 || self.grid_size % 2 != 0 {
            return Err(invalid("grid_size", "must be even and at least 2"));
        }
        if !(self.cell_size > 0.0) {
            return Err(invalid("cell_size", "must be positive"));
        }
        if !(self.cell_overlap >= 0.0 && self.cell_overlap < self.cell_size) {
            return Err(invalid("cell_overlap", "must be in [0, cell_size)"));
        }
        if !(self.hazard_radius > 0.0) {
            return Err(invalid("hazard_radius", "must be positive"));
        }
        if !(self.projectile_radius > 0.0) {
            return Err(invalid("projectile_radius", "must be positive"));
        }
        if !(self.respawn_delay >= 0.0) {
            return Err(invalid("respawn_delay", "must not be negative"));
        }
        if self.respawn_batch == 0 {
            return Err(invalid("respawn_batch", "must be at least 1"));
        }
        if !(self.respawn_safe_distance >= 0.0) {
            return Err(invalid("respawn_safe_distance", "must not be negative"));
        }
        if !(self.respawn_jitter >= 0.0) {
            return Err(invalid("respawn_jitter", "must not be negative"));
        }
        // Respawned hazards land at cell min + offset + jitter, which must stay in that cell
        let span = self.cell_size + self.cell_overlap;
        let far = self.respawn_offset + Vec2::new(self.respawn_jitter, 0.0);
        if !(self.respawn_offset.x >= 0.0 && self.respawn_offset.y >= 0.0) {
            return Err(invalid("respawn_offset", "must not be negative"));
        }
        if !(far.x <= span && far.y <= span) {
            return Err(invalid(
                "respawn_offset",
                "offset plus jitter must land inside the cell",
            ));
        }
        Ok(())
    }

    /// Total number of cells
    pub fn cell_count(&self) -> usize {
        self.grid_size * self.grid_size
    }
}

/// Layout and drift of the hazard field
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldSettings {
    /// Hazards per lattice side
    pub lattice_size: usize,
    /// Distance between neighbouring hazards at startup
    pub spacing: f32,
    /// Per-axis speed range for generated velocities
    pub min_speed: f32,
    pub max_speed: f32,
    /// Seed for generated velocities
    pub seed: u64,
    /// Explicit per-hazard velocities (generated from `seed` when absent)
    pub velocities: Option<Vec<Vec2>>,
}

impl Default for FieldSettings {
    fn default() -> Self {
        Self {
            lattice_size: FIELD_LATTICE_SIZE,
            spacing: FIELD_SPACING,
            min_speed: HAZARD_MIN_SPEED,
            max_speed: HAZARD_MAX_SPEED,
            seed: 0xa57e,
            velocities: None,
        }
    }
}

impl FieldSettings {
    pub fn hazard_count(&self) -> usize {
        self.lattice_size * self.lattice_size
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lattice_size == 0 {
            return Err(invalid("lattice_size", "must be at least 1"));
        }
        if !(self.spacing > 0.0) {
            return Err(invalid("spacing", "must be positive"));
        }
        if !(self.min_speed >= 0.0 && self.min_speed <= self.max_speed) {
            return Err(invalid("min_speed", "must be in [0, max_speed]"));
        }
        if let Some(table) = &self.velocities
            && table.len() != self.hazard_count()
        {
            return Err(ConfigError::VelocityTableMismatch {
                expected: self.hazard_count(),
                actual: table.len(),
            });
        }
        Ok(())
    }
}

/// Actor firing cadence and projectile ballistics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShipSettings {
    /// Seconds between shots
    pub fire_interval: f32,
    /// Seconds a projectile lives before its slot is recycled
    pub projectile_lifetime: f32,
    /// Projectile speed along its heading
    pub projectile_speed: f32,
}

impl Default for ShipSettings {
    fn default() -> Self {
        Self {
            fire_interval: FIRE_INTERVAL,
            projectile_lifetime: PROJECTILE_LIFETIME,
            projectile_speed: PROJECTILE_SPEED,
        }
    }
}

impl ShipSettings {
    /// Ring size needed so no live projectile is recycled early
    pub fn projectile_count(&self) -> usize {
        (self.projectile_lifetime / self.fire_interval).ceil().max(1.0) as usize
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.fire_interval > 0.0) {
            return Err(invalid("fire_interval", "must be positive"));
        }
        if !(self.projectile_lifetime > 0.0) {
            return Err(invalid("projectile_lifetime", "must be positive"));
        }
        if !(self.projectile_speed >= 0.0) {
            return Err(invalid("projectile_speed", "must not be negative"));
        }
        Ok(())
    }
}

/// Complete engine settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub physics: PhysicsSettings,
    pub field: FieldSettings,
    pub ship: ShipSettings,
    /// Longest frame the simulation will be stepped with
    pub max_frame_dt: Option<f32>,
}

impl Settings {
    /// Parse settings from a JSON document
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a JSON file on disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let settings = Self::from_json_str(&json)?;
        log::info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Check every section plus the cross-section locality constraint
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.physics.validate()?;
        self.field.validate()?;
        self.ship.validate()?;

        // Fan-out only looks one ring out, so nothing may cross a whole cell per frame
        let dt = self.frame_dt();
        if !(dt > 0.0) {
            return Err(invalid("max_frame_dt", "must be positive"));
        }
        let fastest = (self.field.max_speed * std::f32::consts::SQRT_2).max(self.ship.projectile_speed);
        if fastest * dt >= self.physics.cell_size {
            return Err(invalid(
                "max_frame_dt",
                "fastest body would cross a whole cell in one frame",
            ));
        }
        Ok(())
    }

    pub fn frame_dt(&self) -> f32 {
        self.max_frame_dt.unwrap_or(SIM_DT)
    }

    /// Every body the world must register: hazards, projectiles and the actor
    pub fn body_count(&self) -> usize {
        self.field.hazard_count() + self.ship.projectile_count() + 1
    }
}

fn invalid(field: &'static str, reason: &'static str) -> ConfigError {
    ConfigError::Invalid { field, reason }
}
