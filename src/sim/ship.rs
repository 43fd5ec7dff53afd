//! The actor and its recycled projectiles
//!
//! Projectiles live in a fixed ring sized so a slot is only reused after its
//! previous shot has expired. Firing recycles the oldest slot: deactivate,
//! move to the actor, copy the actor's cell membership, aim, reactivate.

use glam::Vec2;

use super::body::{Body, BodyId, CollisionResponse, TransformHandle};
use super::world::World;
use crate::error::PhysicsError;
use crate::heading_to_direction;
use crate::settings::ShipSettings;

#[derive(Debug, Clone)]
struct Projectile {
    body: BodyId,
    transform: TransformHandle,
    heading: f32,
}

#[derive(Debug)]
pub struct Ship {
    settings: ShipSettings,
    body: BodyId,
    transform: TransformHandle,
    /// Radians, 0 along +y
    heading: f32,
    start_position: Vec2,
    start_heading: f32,
    projectiles: Vec<Projectile>,
    /// Ring slot fired next
    next_slot: usize,
    /// Seconds until the next shot
    fire_countdown: f32,
    alive: bool,
}

impl Ship {
    /// Register the actor and its projectile ring with the world
    ///
    /// Projectiles start parked on the actor, inactive. `on_projectile_hit`
    /// is called once per slot to build that slot's hit response.
    pub fn spawn(
        settings: &ShipSettings,
        world: &mut World,
        position: Vec2,
        on_hit: CollisionResponse,
        mut on_projectile_hit: impl FnMut() -> CollisionResponse,
    ) -> Result<Self, PhysicsError> {
        settings.validate()?;
        let transform = TransformHandle::new(position);
        let body = world.register(Body::actor(transform.clone()), on_hit)?;

        let mut projectiles = Vec::with_capacity(settings.projectile_count());
        for _ in 0..settings.projectile_count() {
            let transform = TransformHandle::new(position);
            let mut shot = Body::projectile(transform.clone());
            shot.set_active(false);
            let body = world.register(shot, on_projectile_hit())?;
            projectiles.push(Projectile {
                body,
                transform,
                heading: 0.0,
            });
        }

        Ok(Self {
            settings: settings.clone(),
            body,
            transform,
            heading: 0.0,
            start_position: position,
            start_heading: 0.0,
            projectiles,
            next_slot: 0,
            fire_countdown: settings.fire_interval,
            alive: true,
        })
    }

    pub fn body(&self) -> BodyId {
        self.body
    }

    pub fn position(&self) -> Vec2 {
        self.transform.get()
    }

    pub fn heading(&self) -> f32 {
        self.heading
    }

    /// Handle for an external mover to drive the actor directly
    pub fn transform(&self) -> &TransformHandle {
        &self.transform
    }

    pub fn projectile_bodies(&self) -> impl Iterator<Item = BodyId> + '_ {
        self.projectiles.iter().map(|p| p.body)
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// Stop moving and firing until restart
    pub fn kill(&mut self) {
        self.alive = false;
    }

    pub fn set_pose(&mut self, position: Vec2, heading: f32) {
        self.transform.set(position);
        self.heading = heading;
    }

    /// Fly projectiles and fire on cadence
    pub fn update(&mut self, world: &mut World, dt: f32) {
        if !self.alive {
            return;
        }
        let step = self.settings.projectile_speed * dt;
        for shot in &self.projectiles {
            shot.transform.translate(heading_to_direction(shot.heading) * step);
        }

        self.fire_countdown -= dt;
        while self.fire_countdown <= 0.0 {
            self.fire(world);
            self.fire_countdown += self.settings.fire_interval;
        }
    }

    /// Recycle the oldest projectile slot as a fresh shot from the actor
    pub fn fire(&mut self, world: &mut World) {
        let Some(shot) = self.projectiles.get_mut(self.next_slot) else {
            return;
        };
        world.set_active(shot.body, false);
        shot.transform.set(self.transform.get());
        world.assign_to_player_cells(shot.body);
        shot.heading = self.heading;
        world.set_active(shot.body, true);
        self.next_slot = (self.next_slot + 1) % self.projectiles.len();
    }

    /// Back to the start pose with every projectile parked
    pub fn restart(&mut self, world: &mut World) {
        self.set_pose(self.start_position, self.start_heading);
        for shot in &mut self.projectiles {
            world.set_active(shot.body, false);
            shot.transform.set(self.start_position);
            shot.heading = self.start_heading;
        }
        self.next_slot = 0;
        self.fire_countdown = self.settings.fire_interval;
        self.alive = true;
    }
}
