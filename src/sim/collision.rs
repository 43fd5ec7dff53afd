//! Narrow-phase circle collision inside grid cells
//!
//! Cells are independent units of work, so the pass runs them in parallel
//! (rayon, behind the `parallel` feature). Workers never mutate shared state:
//! each emits the overlapping pairs it found, and the lists are merged after
//! the join for single-threaded dispatch.

use glam::Vec2;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::body::{Body, BodyId, BodyKind};
use crate::settings::PhysicsSettings;

/// Squared contact distances for the pairs that can collide
#[derive(Debug, Clone, Copy)]
pub struct ContactRules {
    hazard_hazard: f32,
    hazard_projectile: f32,
}

impl ContactRules {
    pub fn new(hazard_radius: f32, projectile_radius: f32) -> Self {
        let hh = hazard_radius + hazard_radius;
        let hp = hazard_radius + projectile_radius;
        Self {
            hazard_hazard: hh * hh,
            hazard_projectile: hp * hp,
        }
    }

    pub fn from_settings(settings: &PhysicsSettings) -> Self {
        Self::new(settings.hazard_radius, settings.projectile_radius)
    }

    /// Squared contact distance for a pair, or `None` if the pair never collides
    ///
    /// The actor shares the hazard radius but ignores projectiles, and
    /// projectiles ignore each other. Argument order does not matter.
    #[inline]
    pub fn threshold(&self, a: BodyKind, b: BodyKind) -> Option<f32> {
        use BodyKind::*;
        match (a, b) {
            (Hazard | Actor, Hazard | Actor) => Some(self.hazard_hazard),
            (Hazard, Projectile) | (Projectile, Hazard) => Some(self.hazard_projectile),
            (Actor, Projectile) | (Projectile, Actor) | (Projectile, Projectile) => None,
        }
    }
}

/// Circle overlap without a square root
#[inline]
pub fn circles_overlap(a: Vec2, b: Vec2, contact_sq: f32) -> bool {
    a.distance_squared(b) <= contact_sq
}

/// Overlapping pair reported by the collision pass, lower id first
pub type ContactPair = (BodyId, BodyId);

/// Test every unordered pair of active members of one cell
///
/// Overlapping pairs are appended to `pairs`. A body consumed by an earlier
/// pair in this cell is treated as inactive for the rest of the cell, so it
/// is never hit twice here.
pub fn collide_cell(
    members: &[BodyId],
    bodies: &[Body],
    rules: &ContactRules,
    pairs: &mut Vec<ContactPair>,
) {
    if members.len() < 2 {
        return;
    }
    let start = pairs.len();

    for (i, &a_id) in members.iter().enumerate() {
        for &b_id in &members[i + 1..] {
            let a = &bodies[a_id.index()];
            if !is_live(a_id, a, &pairs[start..]) {
                break;
            }
            let b = &bodies[b_id.index()];
            if !is_live(b_id, b, &pairs[start..]) {
                continue;
            }
            let Some(contact_sq) = rules.threshold(a.kind(), b.kind()) else {
                continue;
            };
            if circles_overlap(a.position(), b.position(), contact_sq) {
                pairs.push((a_id.min(b_id), a_id.max(b_id)));
            }
        }
    }
}

#[inline]
fn is_live(id: BodyId, body: &Body, cell_pairs: &[ContactPair]) -> bool {
    body.is_active()
        && !(body.kind().consumed_on_hit()
            && cell_pairs.iter().any(|&(a, b)| a == id || b == id))
}

/// Run `collide_cell` over every cell, appending all pairs to `pairs`
///
/// A pair sharing several cells is reported once per cell, and a body may
/// appear in pairs from different cells; the caller resolves both.
pub fn collision_pass(
    cells: &[Vec<BodyId>],
    bodies: &[Body],
    rules: &ContactRules,
    pairs: &mut Vec<ContactPair>,
) {
    #[cfg(feature = "parallel")]
    {
        let mut merged = cells
            .par_iter()
            .filter(|members| members.len() >= 2)
            .fold(Vec::new, |mut local, members| {
                collide_cell(members, bodies, rules, &mut local);
                local
            })
            .reduce(Vec::new, |mut a, mut b| {
                a.append(&mut b);
                a
            });
        pairs.append(&mut merged);
    }

    #[cfg(not(feature = "parallel"))]
    {
        for members in cells {
            collide_cell(members, bodies, rules, pairs);
        }
    }
}
