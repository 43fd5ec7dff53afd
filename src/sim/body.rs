//! Circular bodies tracked by the physics world
//!
//! Hazards own their position outright. The actor and its projectiles are
//! moved by outside systems, so their position is a live view onto a shared
//! transform that the grid and collision pass read every frame.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use glam::Vec2;

/// Handle to a registered body (index into the world registry)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(pub u32);

impl BodyId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Body kinds, which decide radii and which pairs may collide
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyKind {
    /// Drifting obstacle, respawned after destruction
    Hazard,
    /// Recycled shot fired by the actor
    Projectile,
    /// The single controlled body
    Actor,
}

impl BodyKind {
    /// Whether a hit takes the body out of play until something reactivates it
    #[inline]
    pub fn consumed_on_hit(self) -> bool {
        !matches!(self, BodyKind::Actor)
    }
}

/// Shared, lock-free 2D transform written by an external mover
///
/// Both coordinates are packed into one atomic word so readers never observe
/// a torn position.
#[derive(Clone, Default)]
pub struct TransformHandle(Arc<AtomicU64>);

impl TransformHandle {
    pub fn new(pos: Vec2) -> Self {
        Self(Arc::new(AtomicU64::new(pack(pos))))
    }

    #[inline]
    pub fn get(&self) -> Vec2 {
        unpack(self.0.load(Ordering::Acquire))
    }

    #[inline]
    pub fn set(&self, pos: Vec2) {
        self.0.store(pack(pos), Ordering::Release);
    }

    pub fn translate(&self, delta: Vec2) {
        self.set(self.get() + delta);
    }
}

impl fmt::Debug for TransformHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TransformHandle").field(&self.get()).finish()
    }
}

#[inline]
fn pack(pos: Vec2) -> u64 {
    (pos.x.to_bits() as u64) | ((pos.y.to_bits() as u64) << 32)
}

#[inline]
fn unpack(bits: u64) -> Vec2 {
    Vec2::new(f32::from_bits(bits as u32), f32::from_bits((bits >> 32) as u32))
}

/// Where a body's position lives
#[derive(Debug, Clone)]
pub enum Position {
    /// Stored on the body itself
    Owned(Vec2),
    /// Read through a transform owned elsewhere
    External(TransformHandle),
}

/// A positioned circle with a kind tag and an active flag
#[derive(Debug, Clone)]
pub struct Body {
    kind: BodyKind,
    position: Position,
    /// Inactive bodies are neither tested nor test others
    active: bool,
}

impl Body {
    pub fn hazard(pos: Vec2) -> Self {
        Self {
            kind: BodyKind::Hazard,
            position: Position::Owned(pos),
            active: true,
        }
    }

    pub fn projectile(transform: TransformHandle) -> Self {
        Self {
            kind: BodyKind::Projectile,
            position: Position::External(transform),
            active: true,
        }
    }

    pub fn actor(transform: TransformHandle) -> Self {
        Self {
            kind: BodyKind::Actor,
            position: Position::External(transform),
            active: true,
        }
    }

    #[inline]
    pub fn kind(&self) -> BodyKind {
        self.kind
    }

    #[inline]
    pub fn position(&self) -> Vec2 {
        match &self.position {
            Position::Owned(pos) => *pos,
            Position::External(transform) => transform.get(),
        }
    }

    pub fn set_position(&mut self, pos: Vec2) {
        match &mut self.position {
            Position::Owned(owned) => *owned = pos,
            Position::External(transform) => transform.set(pos),
        }
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }
}

/// What happens to a body when the collision pass reports a hit on it
pub enum CollisionResponse {
    /// Deactivate and hand the body to the respawn scheduler
    Respawn,
    /// Tell the body's external owner
    Notify(Box<dyn FnMut() + Send>),
}

impl CollisionResponse {
    pub fn notify(observer: impl FnMut() + Send + 'static) -> Self {
        CollisionResponse::Notify(Box::new(observer))
    }
}

impl fmt::Debug for CollisionResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollisionResponse::Respawn => f.write_str("Respawn"),
            CollisionResponse::Notify(_) => f.write_str("Notify(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_round_trips_negative_and_fractional() {
        let handle = TransformHandle::new(Vec2::new(-12.25, 3.5e-3));
        assert_eq!(handle.get(), Vec2::new(-12.25, 3.5e-3));

        handle.translate(Vec2::new(0.25, -1.0));
        assert_eq!(handle.get(), Vec2::new(-12.0, 3.5e-3 - 1.0));
    }

    #[test]
    fn test_external_position_is_live() {
        let handle = TransformHandle::new(Vec2::ZERO);
        let body = Body::actor(handle.clone());

        handle.set(Vec2::new(4.0, 2.0));
        assert_eq!(body.position(), Vec2::new(4.0, 2.0));
    }

    #[test]
    fn test_set_position_writes_through_transform() {
        let handle = TransformHandle::new(Vec2::ZERO);
        let mut body = Body::projectile(handle.clone());

        body.set_position(Vec2::new(1.0, 1.0));
        assert_eq!(handle.get(), Vec2::new(1.0, 1.0));
    }

    #[test]
    fn test_owned_position() {
        let mut body = Body::hazard(Vec2::new(1.0, 2.0));
        body.set_position(Vec2::new(3.0, 4.0));
        assert_eq!(body.position(), Vec2::new(3.0, 4.0));
        assert_eq!(body.kind(), BodyKind::Hazard);
        assert!(body.is_active());
    }

    #[test]
    fn test_only_actor_survives_hits() {
        assert!(BodyKind::Hazard.consumed_on_hit());
        assert!(BodyKind::Projectile.consumed_on_hit());
        assert!(!BodyKind::Actor.consumed_on_hit());
    }
}
