//! Physics world: body registry and per-frame driver
//!
//! Frame order: membership refresh, collision pass (parallel over cells),
//! hit dispatch, respawn window. Everything but the collision pass runs on
//! the calling thread, and shared state (active flags, respawn timers) is only
//! written during dispatch, after the parallel pass has joined.

use glam::Vec2;

use super::body::{Body, BodyId, BodyKind, CollisionResponse};
use super::collision::{ContactPair, ContactRules, collision_pass};
use super::grid::{Grid, GridSnapshot};
use super::respawn::{RespawnScheduler, RespawnStats};
use crate::error::PhysicsError;
use crate::settings::PhysicsSettings;

/// Axis-aligned query window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    /// Square window of half-width `half_extent` around `center`
    pub fn around(center: Vec2, half_extent: f32) -> Self {
        Self {
            min: center - Vec2::splat(half_extent),
            max: center + Vec2::splat(half_extent),
        }
    }

    #[inline]
    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }
}

/// What a renderer needs to know about a body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyView {
    pub id: BodyId,
    pub kind: BodyKind,
    pub position: Vec2,
}

/// Summary of one simulated frame
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StepReport {
    /// Cell memberships dropped because a body left the cell
    pub departures: usize,
    /// Distinct bodies hit this frame
    pub hit_bodies: usize,
    pub respawn: RespawnStats,
}

/// State that only exists once every body has registered
#[derive(Debug)]
struct Ready {
    actor: BodyId,
    respawn: RespawnScheduler,
    start_cells: GridSnapshot,
}

/// Owns every body, the cell grid and the respawn timers
#[derive(Debug)]
pub struct World {
    settings: PhysicsSettings,
    /// Number of bodies that must register before the world can start
    expected: usize,
    bodies: Vec<Body>,
    responses: Vec<CollisionResponse>,
    grid: Grid,
    rules: ContactRules,
    ready: Option<Ready>,
    simulating: bool,
    /// Simulated seconds; advances before the collision pass, so hits are never stamped 0
    time: f64,
    /// Pair and hit buffers reused across frames
    pairs: Vec<ContactPair>,
    hits: Vec<BodyId>,
}

impl World {
    /// Create an empty world that expects exactly `expected` registrations
    pub fn new(settings: PhysicsSettings, expected: usize) -> Result<Self, PhysicsError> {
        settings.validate()?;
        let grid = Grid::new(&settings, expected);
        let rules = ContactRules::from_settings(&settings);
        Ok(Self {
            settings,
            expected,
            bodies: Vec::with_capacity(expected),
            responses: Vec::with_capacity(expected),
            grid,
            rules,
            ready: None,
            simulating: true,
            time: 0.0,
            pairs: Vec::new(),
            hits: Vec::new(),
        })
    }

    /// Add a body; fails once the registry holds `expected` bodies
    pub fn register(
        &mut self,
        body: Body,
        response: CollisionResponse,
    ) -> Result<BodyId, PhysicsError> {
        if self.bodies.len() >= self.expected {
            return Err(PhysicsError::CapacityExceeded {
                capacity: self.expected,
            });
        }
        let id = BodyId(self.bodies.len() as u32);
        self.bodies.push(body);
        self.responses.push(response);
        Ok(id)
    }

    /// Register a hazard that respawns after being destroyed
    pub fn register_hazard(&mut self, pos: Vec2) -> Result<BodyId, PhysicsError> {
        self.register(Body::hazard(pos), CollisionResponse::Respawn)
    }

    pub fn registered(&self) -> usize {
        self.bodies.len()
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    pub fn is_initialized(&self) -> bool {
        self.ready.is_some()
    }

    /// Initialize once every expected body has registered
    ///
    /// Returns `Ok(false)` while registrations are still outstanding.
    pub fn try_initialize(&mut self) -> Result<bool, PhysicsError> {
        if self.ready.is_some() {
            return Ok(true);
        }
        if self.bodies.len() < self.expected {
            return Ok(false);
        }
        self.initialize()?;
        Ok(true)
    }

    /// Place every body in the grid and capture the restart snapshot
    pub fn initialize(&mut self) -> Result<(), PhysicsError> {
        if self.ready.is_some() {
            return Ok(());
        }
        if self.bodies.len() < self.expected {
            return Err(PhysicsError::RegistrationIncomplete {
                registered: self.bodies.len(),
                expected: self.expected,
            });
        }

        let actors: Vec<BodyId> = self.ids_of(BodyKind::Actor).collect();
        let &[actor] = actors.as_slice() else {
            return Err(PhysicsError::ActorCount {
                found: actors.len(),
            });
        };
        let hazards: Vec<BodyId> = self.ids_of(BodyKind::Hazard).collect();

        for (i, body) in self.bodies.iter().enumerate() {
            self.grid.assign(BodyId(i as u32), body.position());
        }

        let respawn = RespawnScheduler::new(
            &self.settings,
            hazards,
            self.bodies.len(),
            self.grid.cell_count(),
        );
        log::info!(
            "Physics world ready: {} bodies ({} hazards) in {}x{} cells",
            self.bodies.len(),
            respawn.hazard_count(),
            self.grid.size(),
            self.grid.size()
        );
        self.ready = Some(Ready {
            actor,
            respawn,
            start_cells: self.grid.snapshot(),
        });
        Ok(())
    }

    fn ids_of(&self, kind: BodyKind) -> impl Iterator<Item = BodyId> + '_ {
        self.bodies
            .iter()
            .enumerate()
            .filter(move |(_, body)| body.kind() == kind)
            .map(|(i, _)| BodyId(i as u32))
    }

    /// Poll initialization, then advance one frame
    ///
    /// The frame that completes initialization does not simulate. Errors only
    /// come from initialization and mean the loop must not start.
    pub fn step(&mut self, dt: f32) -> Result<StepReport, PhysicsError> {
        if self.ready.is_none() {
            self.try_initialize()?;
            return Ok(StepReport::default());
        }
        Ok(self.advance(dt))
    }

    /// Advance one frame of an initialized world (no-op otherwise)
    pub fn advance(&mut self, dt: f32) -> StepReport {
        let mut report = StepReport::default();
        if self.ready.is_none() || !self.simulating {
            return report;
        }

        report.departures = self.grid.refresh(&self.bodies);

        self.time += dt as f64;
        let mut pairs = std::mem::take(&mut self.pairs);
        pairs.clear();
        collision_pass(self.grid.cells(), &self.bodies, &self.rules, &mut pairs);
        pairs.sort_unstable();
        pairs.dedup();
        self.resolve_pairs(&pairs);
        self.pairs = pairs;

        let hits = std::mem::take(&mut self.hits);
        report.hit_bodies = hits.len();
        self.dispatch(&hits);
        self.hits = hits;

        let actor_pos = self.actor_position();
        if let Some(ready) = self.ready.as_mut() {
            report.respawn =
                ready
                    .respawn
                    .run_batch(self.time, &mut self.grid, &mut self.bodies, actor_pos);
        }
        report
    }

    /// Turn sorted pairs into this frame's hit list, consuming bodies as it goes
    ///
    /// A pair is dropped when either body was consumed by an earlier pair, in
    /// any cell, so one projectile destroys at most one hazard per frame.
    fn resolve_pairs(&mut self, pairs: &[ContactPair]) {
        self.hits.clear();
        for &(a, b) in pairs {
            if !self.bodies[a.index()].is_active() || !self.bodies[b.index()].is_active() {
                continue;
            }
            for id in [a, b] {
                let body = &mut self.bodies[id.index()];
                if body.kind().consumed_on_hit() {
                    body.set_active(false);
                }
                self.hits.push(id);
            }
        }
        self.hits.sort_unstable();
        self.hits.dedup();
    }

    /// Respond once per hit body
    fn dispatch(&mut self, hits: &[BodyId]) {
        let Some(ready) = self.ready.as_mut() else {
            return;
        };
        for &id in hits {
            match &mut self.responses[id.index()] {
                CollisionResponse::Respawn => {
                    ready.respawn.schedule(id, self.time);
                }
                CollisionResponse::Notify(observer) => observer(),
            }
        }
    }

    /// Restore start-of-game cell membership and clear every respawn timer
    ///
    /// Body positions belong to their owners, which reset them alongside.
    pub fn restart(&mut self) {
        let Some(ready) = self.ready.as_mut() else {
            return;
        };
        self.grid.restore(&ready.start_cells);
        ready.respawn.reset();
        self.simulating = true;
        log::info!("Physics world restarted");
    }

    /// Freeze or resume the whole pipeline
    pub fn set_simulating(&mut self, simulating: bool) {
        self.simulating = simulating;
    }

    pub fn is_simulating(&self) -> bool {
        self.simulating
    }

    /// Queue a hazard for respawn at the current simulated time
    pub fn schedule_respawn(&mut self, id: BodyId) -> bool {
        match self.ready.as_mut() {
            Some(ready) => ready.respawn.schedule(id, self.time),
            None => false,
        }
    }

    pub fn respawn_timer(&self, id: BodyId) -> Option<f64> {
        self.ready.as_ref().and_then(|ready| ready.respawn.timer(id))
    }

    pub fn pending_respawns(&self) -> usize {
        self.ready
            .as_ref()
            .map_or(0, |ready| ready.respawn.pending_count())
    }

    /// Put a teleported body into every cell the actor occupies
    ///
    /// Neighbour fan-out cannot find a body that jumped across the map, so
    /// recycled projectiles are seeded from the actor's cells instead.
    pub fn assign_to_player_cells(&mut self, id: BodyId) -> usize {
        match self.ready.as_ref() {
            Some(ready) => self.grid.copy_membership(ready.actor, id),
            None => 0,
        }
    }

    pub fn actor(&self) -> Option<BodyId> {
        self.ready.as_ref().map(|ready| ready.actor)
    }

    pub fn actor_position(&self) -> Vec2 {
        self.actor()
            .map_or(Vec2::ZERO, |id| self.bodies[id.index()].position())
    }

    pub fn body(&self, id: BodyId) -> &Body {
        &self.bodies[id.index()]
    }

    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub fn set_position(&mut self, id: BodyId, pos: Vec2) {
        self.bodies[id.index()].set_position(pos);
    }

    pub fn translate(&mut self, id: BodyId, delta: Vec2) {
        let body = &mut self.bodies[id.index()];
        body.set_position(body.position() + delta);
    }

    pub fn set_active(&mut self, id: BodyId, active: bool) {
        self.bodies[id.index()].set_active(active);
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Whether cell membership equals the snapshot taken at initialization
    pub fn matches_start_cells(&self) -> bool {
        self.ready
            .as_ref()
            .is_some_and(|ready| self.grid.matches_snapshot(&ready.start_cells))
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn settings(&self) -> &PhysicsSettings {
        &self.settings
    }

    /// Active bodies inside a window, for rendering
    pub fn visible_bodies(&self, window: Rect) -> impl Iterator<Item = BodyView> + '_ {
        self.bodies
            .iter()
            .enumerate()
            .filter(|(_, body)| body.is_active())
            .map(|(i, body)| BodyView {
                id: BodyId(i as u32),
                kind: body.kind(),
                position: body.position(),
            })
            .filter(move |view| window.contains(view.position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::body::TransformHandle;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn small() -> PhysicsSettings {
        PhysicsSettings {
            grid_size: 4,
            cell_size: 9.0,
            cell_overlap: 1.0,
            respawn_batch: 16,
            ..Default::default()
        }
    }

    fn actor_at(world: &mut World, pos: Vec2) -> (BodyId, TransformHandle) {
        let transform = TransformHandle::new(pos);
        let id = world
            .register(
                Body::actor(transform.clone()),
                CollisionResponse::notify(|| {}),
            )
            .unwrap();
        (id, transform)
    }

    fn sorted(cells: &[usize]) -> Vec<usize> {
        let mut cells = cells.to_vec();
        cells.sort_unstable();
        cells
    }

    #[test]
    fn test_register_past_capacity_fails() {
        let mut world = World::new(small(), 1).unwrap();
        world.register_hazard(Vec2::ZERO).unwrap();
        let err = world.register_hazard(Vec2::ZERO).unwrap_err();
        assert!(matches!(err, PhysicsError::CapacityExceeded { capacity: 1 }));
    }

    #[test]
    fn test_initialization_waits_for_every_body() {
        let mut world = World::new(small(), 2).unwrap();
        actor_at(&mut world, Vec2::ZERO);

        assert!(!world.try_initialize().unwrap());
        assert!(world.step(0.1).is_ok());
        assert!(!world.is_initialized());
        assert!(matches!(
            world.initialize(),
            Err(PhysicsError::RegistrationIncomplete {
                registered: 1,
                expected: 2
            })
        ));

        world.register_hazard(Vec2::new(5.0, 5.0)).unwrap();
        world.step(0.1).unwrap();
        assert!(world.is_initialized());
        // The initializing frame does not simulate
        assert_eq!(world.time(), 0.0);
    }

    #[test]
    fn test_missing_actor_is_a_config_error() {
        let mut world = World::new(small(), 1).unwrap();
        world.register_hazard(Vec2::ZERO).unwrap();
        assert!(matches!(
            world.initialize(),
            Err(PhysicsError::ActorCount { found: 0 })
        ));
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let settings = PhysicsSettings {
            grid_size: 3,
            ..small()
        };
        assert!(matches!(
            World::new(settings, 1),
            Err(PhysicsError::Config(_))
        ));
    }

    #[test]
    fn test_close_hazards_destroy_each_other() {
        let mut world = World::new(small(), 3).unwrap();
        actor_at(&mut world, Vec2::new(-13.0, -13.0));
        let a = world.register_hazard(Vec2::new(4.0, 4.0)).unwrap();
        let b = world.register_hazard(Vec2::new(4.1, 4.0)).unwrap();
        world.initialize().unwrap();

        let report = world.step(0.25).unwrap();

        assert_eq!(report.hit_bodies, 2);
        assert!(!world.body(a).is_active());
        assert!(!world.body(b).is_active());
        assert_eq!(world.respawn_timer(a), Some(0.25));
        assert_eq!(world.respawn_timer(b), Some(world.time()));
    }

    #[test]
    fn test_observer_fires_once_per_frame_across_cells() {
        let mut world = World::new(small(), 3).unwrap();
        actor_at(&mut world, Vec2::new(-13.0, -13.0));
        // Corner shared by cells 5, 6, 9 and 10
        world.register_hazard(Vec2::new(-0.5, -0.5)).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        world
            .register(
                Body::projectile(TransformHandle::new(Vec2::new(-0.4, -0.5))),
                CollisionResponse::notify(move || {
                    counter.fetch_add(1, Ordering::Relaxed);
                }),
            )
            .unwrap();
        world.initialize().unwrap();
        assert_eq!(world.grid().cells_of(BodyId(2)).len(), 4);

        world.step(0.1).unwrap();
        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert!(!world.body(BodyId(2)).is_active());
    }

    #[test]
    fn test_projectile_destroys_one_hazard_across_cells() {
        let mut world = World::new(small(), 4).unwrap();
        actor_at(&mut world, Vec2::new(-13.0, -13.0));
        // Shot on the corner of cells 5, 6, 9 and 10, one hazard either side
        let left = world.register_hazard(Vec2::new(-1.02, -0.5)).unwrap();
        let right = world.register_hazard(Vec2::new(0.02, -0.5)).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let shot = world
            .register(
                Body::projectile(TransformHandle::new(Vec2::new(-0.5, -0.5))),
                CollisionResponse::notify(move || {
                    counter.fetch_add(1, Ordering::Relaxed);
                }),
            )
            .unwrap();
        world.initialize().unwrap();
        assert!(!world.grid().cells_of(left).contains(&6));
        assert!(!world.grid().cells_of(right).contains(&5));

        let report = world.step(0.1).unwrap();

        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert_eq!(report.hit_bodies, 2);
        assert!(!world.body(shot).is_active());
        // Lower id wins the tie
        assert!(!world.body(left).is_active());
        assert!(world.body(right).is_active());
        assert_eq!(world.pending_respawns(), 1);
    }

    #[test]
    fn test_actor_hit_notifies_but_stays_active() {
        let mut world = World::new(small(), 2).unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let actor = world
            .register(
                Body::actor(TransformHandle::new(Vec2::new(4.0, 4.0))),
                CollisionResponse::notify(move || {
                    counter.fetch_add(1, Ordering::Relaxed);
                }),
            )
            .unwrap();
        let hazard = world.register_hazard(Vec2::new(4.5, 4.0)).unwrap();
        world.initialize().unwrap();

        world.step(0.1).unwrap();
        assert_eq!(hits.load(Ordering::Relaxed), 1);
        assert!(world.body(actor).is_active());
        assert!(!world.body(hazard).is_active());
    }

    #[test]
    fn test_frozen_world_does_nothing() {
        let mut world = World::new(small(), 3).unwrap();
        actor_at(&mut world, Vec2::new(-13.0, -13.0));
        let a = world.register_hazard(Vec2::new(4.0, 4.0)).unwrap();
        world.register_hazard(Vec2::new(4.1, 4.0)).unwrap();
        world.initialize().unwrap();

        world.set_simulating(false);
        world.step(0.25).unwrap();
        assert!(world.body(a).is_active());
        assert_eq!(world.time(), 0.0);
    }

    #[test]
    fn test_destroyed_hazard_respawns_clear_of_actor() {
        let mut world = World::new(small(), 3).unwrap();
        actor_at(&mut world, Vec2::ZERO);
        let a = world.register_hazard(Vec2::new(12.0, 12.0)).unwrap();
        let b = world.register_hazard(Vec2::new(12.1, 12.0)).unwrap();
        world.initialize().unwrap();

        world.step(0.5).unwrap();
        assert_eq!(world.pending_respawns(), 2);

        // Destroyed at 0.5, delay 1.0: still waiting at 1.5, back by 2.0
        world.step(0.5).unwrap();
        world.step(0.5).unwrap();
        assert_eq!(world.pending_respawns(), 2);
        let report = world.step(0.5).unwrap();
        assert_eq!(report.respawn.respawned, 2);

        for id in [a, b] {
            let body = world.body(id);
            assert!(body.is_active());
            let d = (body.position() - world.actor_position()).abs();
            assert!(d.x > 10.0 || d.y > 10.0);
            assert_eq!(world.respawn_timer(id), None);
        }
    }

    #[test]
    fn test_restart_restores_start_cells() {
        let mut world = World::new(small(), 3).unwrap();
        actor_at(&mut world, Vec2::new(-13.0, -13.0));
        let a = world.register_hazard(Vec2::new(4.0, 4.0)).unwrap();
        let b = world.register_hazard(Vec2::new(-13.0, 4.0)).unwrap();
        world.initialize().unwrap();

        world.step(0.25).unwrap();
        world.set_active(b, false);
        assert!(world.schedule_respawn(b));
        world.set_position(a, Vec2::new(12.0, 4.0));
        world.step(0.25).unwrap();
        assert!(!world.matches_start_cells());

        world.restart();
        // Owners put bodies back where they started
        world.set_position(a, Vec2::new(4.0, 4.0));
        world.set_active(b, true);
        world.step(0.01).unwrap();

        assert!(world.matches_start_cells());
        assert_eq!(world.pending_respawns(), 0);
        assert_eq!(world.respawn_timer(b), None);
        assert!(world.is_simulating());
    }

    #[test]
    fn test_recycled_projectile_joins_actor_cells() {
        let mut world = World::new(small(), 2).unwrap();
        let (actor, actor_transform) = actor_at(&mut world, Vec2::new(-5.0, -5.0));
        let shot_transform = TransformHandle::new(Vec2::new(-13.0, -13.0));
        let shot = world
            .register(
                Body::projectile(shot_transform.clone()),
                CollisionResponse::notify(|| {}),
            )
            .unwrap();
        world.initialize().unwrap();

        // Actor drifts onto the corner shared by four cells
        actor_transform.set(Vec2::new(-0.5, -0.5));
        world.step(0.1).unwrap();
        assert_eq!(sorted(world.grid().cells_of(actor)), vec![5, 6, 9, 10]);

        // Shot teleports back to the actor
        shot_transform.set(actor_transform.get());
        world.assign_to_player_cells(shot);
        for &cell in world.grid().cells_of(actor) {
            assert!(world.grid().members(cell).contains(&shot));
        }

        // Stale membership is dropped on the next refresh
        world.step(0.1).unwrap();
        assert_eq!(sorted(world.grid().cells_of(shot)), vec![5, 6, 9, 10]);
    }

    #[test]
    fn test_visible_bodies_filters_window_and_inactive() {
        let mut world = World::new(small(), 3).unwrap();
        actor_at(&mut world, Vec2::ZERO);
        let near = world.register_hazard(Vec2::new(3.0, 3.0)).unwrap();
        world.register_hazard(Vec2::new(50.0, 50.0)).unwrap();
        world.initialize().unwrap();

        let visible: Vec<BodyView> = world.visible_bodies(Rect::around(Vec2::ZERO, 10.0)).collect();
        assert_eq!(visible.len(), 2);
        assert!(visible.iter().any(|v| v.id == near && v.kind == BodyKind::Hazard));

        world.set_active(near, false);
        let visible: Vec<BodyView> = world.visible_bodies(Rect::around(Vec2::ZERO, 10.0)).collect();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].kind, BodyKind::Actor);
    }
}
