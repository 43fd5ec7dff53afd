//! Asteroid Grid - broad-phase collision engine for huge asteroid fields
//!
//! Core modules:
//! - `sim`: Cell grid, collision pass, respawn scheduling and the frame driver
//! - `settings`: Data-driven tuning, loadable from JSON
//! - `error`: Startup error taxonomy (configuration and capacity)

pub mod error;
pub mod settings;
pub mod sim;

pub use error::{ConfigError, PhysicsError};
pub use settings::{FieldSettings, PhysicsSettings, Settings, ShipSettings};

use glam::Vec2;

/// Engine configuration constants (defaults for the settings structs)
pub mod consts {
    use glam::Vec2;

    /// Fixed simulation timestep used by the native runner
    pub const SIM_DT: f32 = 1.0 / 60.0;

    /// Cells per grid side (must be even so the grid centres on the origin)
    pub const CELL_GRID_SIZE: usize = 64;
    /// Width and height of a single cell before overlap is added
    pub const CELL_SIZE: f32 = 9.0;
    /// How far each cell reaches into its lower neighbours
    pub const CELL_OVERLAP: f32 = 1.0;

    /// Collision radii (the actor shares the hazard radius)
    pub const HAZARD_RADIUS: f32 = 0.4;
    pub const PROJECTILE_RADIUS: f32 = 0.15;

    /// Seconds a destroyed hazard stays down before it may respawn
    pub const RESPAWN_DELAY: f32 = 1.0;
    /// Hazards examined for respawn per frame
    pub const RESPAWN_BATCH: usize = 5120;
    /// Respawn cells closer than this to the actor (on both axes) are rejected
    pub const RESPAWN_SAFE_DISTANCE: f32 = 10.0;
    /// Offset from a cell's minimum corner where respawned hazards land
    pub const RESPAWN_OFFSET: Vec2 = Vec2::new(1.0, 3.0);
    /// Random jitter added along x on respawn
    pub const RESPAWN_JITTER: f32 = 5.0;

    /// Hazard lattice side (total hazards = side²)
    pub const FIELD_LATTICE_SIZE: usize = 160;
    /// Distance between neighbouring hazards at startup
    pub const FIELD_SPACING: f32 = 3.0;
    /// Per-axis hazard speed range
    pub const HAZARD_MIN_SPEED: f32 = 0.1;
    pub const HAZARD_MAX_SPEED: f32 = 2.0;

    /// Ship fires one recycled projectile per interval
    pub const FIRE_INTERVAL: f32 = 0.5;
    pub const PROJECTILE_LIFETIME: f32 = 3.0;
    pub const PROJECTILE_SPEED: f32 = 8.0;
}

/// Unit vector for a heading in radians, where 0 points along +y
#[inline]
pub fn heading_to_direction(theta: f32) -> Vec2 {
    Vec2::new(-theta.sin(), theta.cos())
}

/// Rotate a vector counter-clockwise by `theta` radians
#[inline]
pub fn rotate(v: Vec2, theta: f32) -> Vec2 {
    Vec2::from_angle(theta).rotate(v)
}
