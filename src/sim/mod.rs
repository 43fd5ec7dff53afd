//! Broad-phase simulation
//!
//! Bodies live in an overlapping cell grid whose membership is refreshed
//! incrementally every frame. Collision runs per cell, in parallel; hits are
//! applied afterwards on the calling thread, and destroyed hazards come back
//! through a batched respawn sweep.

pub mod body;
pub mod collision;
pub mod field;
pub mod grid;
pub mod respawn;
pub mod session;
pub mod ship;
pub mod world;

pub use body::{Body, BodyId, BodyKind, CollisionResponse, Position, TransformHandle};
pub use collision::{ContactRules, circles_overlap, collide_cell, collision_pass};
pub use field::Field;
pub use grid::{CellId, CellPosition, CellShape, Grid, GridSnapshot};
pub use respawn::{RespawnScheduler, RespawnStats};
pub use session::{Session, SessionPhase, TickInput};
pub use ship::Ship;
pub use world::{BodyView, Rect, StepReport, World};
