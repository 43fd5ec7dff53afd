//! Deferred hazard respawn
//!
//! A destroyed hazard records the simulated time it was hit. Each frame only
//! a fixed-size window of the hazard population is examined, sweeping
//! round-robin across frames, so per-frame cost stays constant no matter
//! how many hazards exist. Expired hazards are dropped into the next cell (in
//! cursor order) that is far enough from the actor.

use std::ops::Range;

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::body::{Body, BodyId};
use super::grid::{CellId, Grid};
use crate::settings::PhysicsSettings;

/// Outcome of one frame's respawn window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RespawnStats {
    pub examined: usize,
    pub respawned: usize,
    /// Expired hazards left waiting because no cell was far enough from the actor
    pub deferred: usize,
}

#[derive(Debug, Clone)]
pub struct RespawnScheduler {
    /// Hazard bodies in slot order
    hazards: Vec<BodyId>,
    /// Slot of each body, indexed by `BodyId`; `None` for non-hazards
    slot_of: Vec<Option<u32>>,
    /// Time each hazard was destroyed, `None` while in play
    timers: Vec<Option<f64>>,
    batch: usize,
    /// Next slot to examine
    cursor: usize,
    /// Last cell handed out for a respawn
    spawn_cursor: CellId,
    delay: f64,
    safe_distance: f32,
    offset: Vec2,
    jitter: f32,
    rng: Pcg32,
}

impl RespawnScheduler {
    pub fn new(
        settings: &PhysicsSettings,
        hazards: Vec<BodyId>,
        body_count: usize,
        cell_count: usize,
    ) -> Self {
        let mut slot_of = vec![None; body_count];
        for (slot, id) in hazards.iter().enumerate() {
            slot_of[id.index()] = Some(slot as u32);
        }
        let mut rng = Pcg32::seed_from_u64(settings.seed);
        let spawn_cursor = rng.random_range(0..cell_count.max(1));

        Self {
            timers: vec![None; hazards.len()],
            hazards,
            slot_of,
            batch: settings.respawn_batch.max(1),
            cursor: 0,
            spawn_cursor,
            delay: settings.respawn_delay as f64,
            safe_distance: settings.respawn_safe_distance,
            offset: settings.respawn_offset,
            jitter: settings.respawn_jitter,
            rng,
        }
    }

    pub fn hazard_count(&self) -> usize {
        self.hazards.len()
    }

    /// Mark a hazard destroyed at `now`
    ///
    /// Repeated calls before the respawn happens keep the first time, so a
    /// hazard hit from several cells in one frame has a single pending timer.
    /// Returns whether a new timer was started.
    pub fn schedule(&mut self, body: BodyId, now: f64) -> bool {
        let Some(slot) = self.slot(body) else {
            return false;
        };
        match self.timers[slot] {
            Some(_) => false,
            None => {
                self.timers[slot] = Some(now);
                true
            }
        }
    }

    /// Time the hazard was destroyed, if it is waiting to respawn
    pub fn timer(&self, body: BodyId) -> Option<f64> {
        self.slot(body).and_then(|slot| self.timers[slot])
    }

    pub fn pending_count(&self) -> usize {
        self.timers.iter().filter(|t| t.is_some()).count()
    }

    /// Forget every pending respawn and restart the sweep
    pub fn reset(&mut self) {
        self.timers.fill(None);
        self.cursor = 0;
    }

    /// Next window of hazard slots to examine
    ///
    /// Windows are contiguous; the last one of a sweep may be short, after
    /// which the sweep starts again from slot 0.
    pub fn next_batch(&mut self) -> Range<usize> {
        let count = self.hazards.len();
        if count == 0 {
            return 0..0;
        }
        let start = self.cursor;
        let end = (start + self.batch).min(count);
        self.cursor = if end == count { 0 } else { end };
        start..end
    }

    /// Whether `point` is inside the square no-spawn zone around the actor
    ///
    /// The zone is closed, so a point exactly `safe_distance` away on its
    /// farther axis is still rejected.
    #[inline]
    pub fn too_close(&self, point: Vec2, actor: Vec2) -> bool {
        let d = (point - actor).abs();
        d.x <= self.safe_distance && d.y <= self.safe_distance
    }

    /// Advance the spawn cursor to a cell whose landing point clears the actor
    ///
    /// Gives up after one full lap of the grid.
    pub fn pick_spawn(&mut self, grid: &Grid, actor: Vec2) -> Option<(CellId, Vec2)> {
        let jitter = Vec2::new(self.rng.random::<f32>() * self.jitter, 0.0);
        let count = grid.cell_count();
        for _ in 0..count {
            self.spawn_cursor = (self.spawn_cursor + 1) % count;
            let point = grid.shape(self.spawn_cursor).min + self.offset + jitter;
            if !self.too_close(point, actor) {
                return Some((self.spawn_cursor, point));
            }
        }
        None
    }

    /// Examine this frame's window and respawn every expired hazard in it
    pub fn run_batch(
        &mut self,
        now: f64,
        grid: &mut Grid,
        bodies: &mut [Body],
        actor: Vec2,
    ) -> RespawnStats {
        let mut stats = RespawnStats::default();
        let mut grid_exhausted = false;

        for slot in self.next_batch() {
            stats.examined += 1;
            let Some(destroyed_at) = self.timers[slot] else {
                continue;
            };
            if now - destroyed_at <= self.delay {
                continue;
            }
            if grid_exhausted {
                stats.deferred += 1;
                continue;
            }
            let Some((cell, pos)) = self.pick_spawn(grid, actor) else {
                grid_exhausted = true;
                stats.deferred += 1;
                continue;
            };

            let id = self.hazards[slot];
            let body = &mut bodies[id.index()];
            body.set_position(pos);
            body.set_active(true);
            grid.assign_from_seed(id, pos, cell);
            self.timers[slot] = None;
            stats.respawned += 1;
        }

        if stats.deferred > 0 {
            log::warn!(
                "No cell clear of the actor at {:?}; deferring {} respawns",
                actor,
                stats.deferred
            );
        }
        stats
    }

    #[inline]
    fn slot(&self, body: BodyId) -> Option<usize> {
        self.slot_of
            .get(body.index())
            .copied()
            .flatten()
            .map(|slot| slot as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(batch: usize) -> PhysicsSettings {
        PhysicsSettings {
            grid_size: 4,
            respawn_batch: batch,
            respawn_delay: 1.0,
            respawn_safe_distance: 10.0,
            ..Default::default()
        }
    }

    fn scheduler(batch: usize, hazards: u32) -> RespawnScheduler {
        let ids = (0..hazards).map(BodyId).collect();
        RespawnScheduler::new(&settings(batch), ids, hazards as usize + 1, 16)
    }

    #[test]
    fn test_schedule_is_idempotent() {
        let mut respawn = scheduler(4, 3);
        assert!(respawn.schedule(BodyId(1), 2.5));
        assert!(!respawn.schedule(BodyId(1), 2.5));
        assert!(!respawn.schedule(BodyId(1), 3.0));
        assert_eq!(respawn.timer(BodyId(1)), Some(2.5));
        assert_eq!(respawn.pending_count(), 1);
    }

    #[test]
    fn test_schedule_ignores_non_hazards() {
        let mut respawn = scheduler(4, 3);
        // Body 3 exists but is not a hazard
        assert!(!respawn.schedule(BodyId(3), 1.0));
        assert!(!respawn.schedule(BodyId(99), 1.0));
        assert_eq!(respawn.pending_count(), 0);
    }

    #[test]
    fn test_batch_of_two_over_five_takes_three_frames() {
        let mut respawn = scheduler(2, 5);
        let mut seen = vec![0; 5];
        let mut frames = 0;
        while seen.iter().any(|&n| n == 0) {
            for slot in respawn.next_batch() {
                seen[slot] += 1;
            }
            frames += 1;
        }
        assert_eq!(frames, 3);
        assert_eq!(seen, vec![1; 5]);
        // Next sweep starts over
        assert_eq!(respawn.next_batch(), 0..2);
    }

    #[test]
    fn test_reset_clears_timers() {
        let mut respawn = scheduler(2, 5);
        respawn.schedule(BodyId(0), 1.0);
        respawn.schedule(BodyId(4), 1.0);
        respawn.next_batch();
        respawn.reset();
        assert_eq!(respawn.pending_count(), 0);
        assert_eq!(respawn.next_batch(), 0..2);
    }

    #[test]
    fn test_safe_zone_boundary_is_too_close() {
        let respawn = scheduler(4, 1);
        let actor = Vec2::new(2.0, -3.0);
        assert!(respawn.too_close(actor + Vec2::new(10.0, 0.0), actor));
        assert!(respawn.too_close(actor + Vec2::new(-10.0, 10.0), actor));
        assert!(!respawn.too_close(actor + Vec2::new(10.5, 0.0), actor));
        assert!(!respawn.too_close(actor + Vec2::new(0.0, -10.5), actor));
    }

    #[test]
    fn test_spawn_point_always_clears_actor() {
        let physics = settings(4);
        let grid = Grid::new(&physics, 1);
        let mut respawn = scheduler(4, 1);
        let actors = [
            Vec2::ZERO,
            Vec2::new(-15.0, -15.0),
            Vec2::new(14.0, -3.0),
            Vec2::new(100.0, 100.0),
        ];
        for actor in actors {
            for _ in 0..40 {
                let (cell, point) = respawn.pick_spawn(&grid, actor).unwrap();
                assert!(!respawn.too_close(point, actor));
                assert!(grid.contains_point(cell, point));
            }
        }
    }

    #[test]
    fn test_respawn_waits_for_delay() {
        let physics = settings(4);
        let mut grid = Grid::new(&physics, 2);
        let mut bodies = vec![Body::hazard(Vec2::ZERO), Body::hazard(Vec2::ZERO)];
        let mut respawn = scheduler(4, 2);

        bodies[0].set_active(false);
        respawn.schedule(BodyId(0), 1.0);

        let stats = respawn.run_batch(1.5, &mut grid, &mut bodies, Vec2::ZERO);
        assert_eq!(stats.respawned, 0);
        assert!(!bodies[0].is_active());

        let stats = respawn.run_batch(2.1, &mut grid, &mut bodies, Vec2::ZERO);
        assert_eq!(stats.respawned, 1);
        assert!(bodies[0].is_active());
        assert_eq!(respawn.timer(BodyId(0)), None);

        let pos = bodies[0].position();
        assert!(!respawn.too_close(pos, Vec2::ZERO));
        assert!(!grid.cells_of(BodyId(0)).is_empty());
        for &cell in grid.cells_of(BodyId(0)) {
            assert!(grid.contains_point(cell, pos));
        }
    }

    #[test]
    fn test_respawn_defers_when_no_cell_is_safe() {
        let physics = PhysicsSettings {
            respawn_safe_distance: 1e9,
            ..settings(4)
        };
        let mut grid = Grid::new(&physics, 1);
        let mut bodies = vec![Body::hazard(Vec2::ZERO)];
        let mut respawn =
            RespawnScheduler::new(&physics, vec![BodyId(0)], 1, grid.cell_count());

        bodies[0].set_active(false);
        respawn.schedule(BodyId(0), 1.0);
        let stats = respawn.run_batch(5.0, &mut grid, &mut bodies, Vec2::ZERO);

        assert_eq!(stats.deferred, 1);
        assert_eq!(stats.respawned, 0);
        assert_eq!(respawn.timer(BodyId(0)), Some(1.0));
        assert!(!bodies[0].is_active());
    }
}
