//! Overlapping cell grid for broad-phase collision
//!
//! The world is split into a fixed square array of cells. Every cell reaches
//! `overlap` units into its lower-x and lower-y neighbours, so bodies sitting
//! on a shared border belong to both cells and no pair is missed. Cells on
//! the rim are unbounded outward, so every position belongs to some cell.
//!
//! Cells are numbered row by row from the bottom-left:
//!
//! ```text
//! 6 7 8
//! 3 4 5
//! 0 1 2
//! ```
//!
//! Membership is incremental. A body is located by a full scan once, and from
//! then on only the 3×3 neighbourhood of a cell it left (or sits on the edge
//! of) is examined, because no body crosses a whole cell in one step.

use glam::Vec2;

use super::body::{Body, BodyId};
use crate::settings::PhysicsSettings;

/// Index into the flat cell array (`y * size + x`)
pub type CellId = usize;

/// Where a cell sits in the grid; rim cells ignore their outward bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellPosition {
    Inside,
    Left,
    Right,
    Up,
    Down,
    LeftUp,
    RightUp,
    LeftDown,
    RightDown,
}

impl CellPosition {
    pub fn classify(x: usize, y: usize, size: usize) -> Self {
        let last = size - 1;
        match (x == 0, x == last, y == 0, y == last) {
            (true, _, true, _) => CellPosition::LeftDown,
            (_, true, true, _) => CellPosition::RightDown,
            (true, _, _, true) => CellPosition::LeftUp,
            (_, true, _, true) => CellPosition::RightUp,
            (true, _, _, _) => CellPosition::Left,
            (_, true, _, _) => CellPosition::Right,
            (_, _, true, _) => CellPosition::Down,
            (_, _, _, true) => CellPosition::Up,
            _ => CellPosition::Inside,
        }
    }

    /// Sides extending to infinity: (left, right, down, up)
    #[inline]
    fn open_sides(self) -> (bool, bool, bool, bool) {
        match self {
            CellPosition::Inside => (false, false, false, false),
            CellPosition::Left => (true, false, false, false),
            CellPosition::Right => (false, true, false, false),
            CellPosition::Down => (false, false, true, false),
            CellPosition::Up => (false, false, false, true),
            CellPosition::LeftDown => (true, false, true, false),
            CellPosition::RightDown => (false, true, true, false),
            CellPosition::LeftUp => (true, false, false, true),
            CellPosition::RightUp => (false, true, false, true),
        }
    }
}

/// Finite bounds of a cell plus which of them are ignored
#[derive(Debug, Clone, Copy)]
pub struct CellShape {
    pub min: Vec2,
    pub max: Vec2,
    pub position: CellPosition,
}

impl CellShape {
    #[inline]
    pub fn contains(&self, p: Vec2) -> bool {
        let (left, right, down, up) = self.position.open_sides();
        (left || p.x >= self.min.x)
            && (right || p.x <= self.max.x)
            && (down || p.y >= self.min.y)
            && (up || p.y <= self.max.y)
    }

    /// Whether `p` lies in the strip this cell shares with a neighbour
    #[inline]
    fn near_shared_edge(&self, p: Vec2, overlap: f32) -> bool {
        let (left, right, down, up) = self.position.open_sides();
        (!left && p.x <= self.min.x + overlap)
            || (!right && p.x >= self.max.x - overlap)
            || (!down && p.y <= self.min.y + overlap)
            || (!up && p.y >= self.max.y - overlap)
    }
}

/// Saved cell membership, restored on restart
#[derive(Debug, Clone, PartialEq)]
pub struct GridSnapshot {
    cells: Vec<Vec<BodyId>>,
    body_cells: Vec<Vec<CellId>>,
}

/// Fixed square grid of overlapping cells
#[derive(Debug, Clone)]
pub struct Grid {
    size: usize,
    overlap: f32,
    shapes: Vec<CellShape>,
    /// Bodies currently in each cell (non-owning handles)
    cells: Vec<Vec<BodyId>>,
    /// Reverse index: cells each body currently belongs to
    body_cells: Vec<Vec<CellId>>,
    /// Scratch list of (body, seed cell) needing fan-out, reused every refresh
    pending: Vec<(BodyId, CellId)>,
}

impl Grid {
    /// Build the grid centred on the origin, sized for `body_capacity` bodies
    pub fn new(settings: &PhysicsSettings, body_capacity: usize) -> Self {
        let size = settings.grid_size;
        let cell_size = settings.cell_size;
        let overlap = settings.cell_overlap;
        let origin = -(size as f32) * cell_size / 2.0;

        let mut shapes = Vec::with_capacity(size * size);
        for y in 0..size {
            for x in 0..size {
                let lower = Vec2::new(x as f32, y as f32) * cell_size + Vec2::splat(origin);
                shapes.push(CellShape {
                    min: lower - Vec2::splat(overlap),
                    max: lower + Vec2::splat(cell_size),
                    position: CellPosition::classify(x, y, size),
                });
            }
        }

        Self {
            size,
            overlap,
            shapes,
            cells: (0..size * size).map(|_| Vec::with_capacity(8)).collect(),
            body_cells: (0..body_capacity).map(|_| Vec::with_capacity(4)).collect(),
            pending: Vec::new(),
        }
    }

    /// Cells per side
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn cell_count(&self) -> usize {
        self.shapes.len()
    }

    #[inline]
    pub fn cell_id(&self, x: usize, y: usize) -> CellId {
        y * self.size + x
    }

    #[inline]
    pub fn cell_coords(&self, id: CellId) -> (usize, usize) {
        (id % self.size, id / self.size)
    }

    pub fn shape(&self, id: CellId) -> &CellShape {
        &self.shapes[id]
    }

    /// Bodies currently in a cell
    pub fn members(&self, id: CellId) -> &[BodyId] {
        &self.cells[id]
    }

    /// Membership lists of every cell, indexed by `CellId`
    pub fn cells(&self) -> &[Vec<BodyId>] {
        &self.cells
    }

    /// Cells a body currently belongs to
    pub fn cells_of(&self, body: BodyId) -> &[CellId] {
        &self.body_cells[body.index()]
    }

    /// Cell `(dx, dy)` away from `id`, or `None` past the rim (no wraparound)
    pub fn neighbor(&self, id: CellId, dx: isize, dy: isize) -> Option<CellId> {
        let (x, y) = self.cell_coords(id);
        let nx = x.checked_add_signed(dx)?;
        let ny = y.checked_add_signed(dy)?;
        (nx < self.size && ny < self.size).then(|| self.cell_id(nx, ny))
    }

    #[inline]
    pub fn contains_point(&self, id: CellId, p: Vec2) -> bool {
        self.shapes[id].contains(p)
    }

    #[inline]
    pub fn is_in_cell(&self, id: CellId, body: &Body) -> bool {
        self.contains_point(id, body.position())
    }

    /// Add a body to a cell unless it is already there
    pub fn insert(&mut self, id: CellId, body: BodyId) -> bool {
        if self.cells[id].contains(&body) {
            return false;
        }
        self.cells[id].push(body);
        self.body_cells[body.index()].push(id);
        true
    }

    /// First cell containing `p`, by scanning the whole grid
    pub fn locate(&self, p: Vec2) -> Option<CellId> {
        self.shapes.iter().position(|shape| shape.contains(p))
    }

    /// Initial placement: full scan for one cell, then fan out around it
    pub fn assign(&mut self, body: BodyId, pos: Vec2) -> usize {
        match self.locate(pos) {
            Some(seed) => self.fan_out(body, pos, seed),
            None => 0,
        }
    }

    /// Add `body` to every cell of the 3×3 block around `seed` containing `pos`
    ///
    /// Falls back to a full scan when the body ends up in no cell at all,
    /// which only happens after a teleport.
    pub fn assign_from_seed(&mut self, body: BodyId, pos: Vec2, seed: CellId) -> usize {
        let added = self.fan_out(body, pos, seed);
        if self.body_cells[body.index()].is_empty() {
            log::debug!("Body {} left the neighbourhood of cell {}, rescanning", body.0, seed);
            return self.assign(body, pos);
        }
        added
    }

    fn fan_out(&mut self, body: BodyId, pos: Vec2, seed: CellId) -> usize {
        let mut added = 0;
        for dy in -1..=1 {
            for dx in -1..=1 {
                let Some(id) = self.neighbor(seed, dx, dy) else {
                    continue;
                };
                if self.shapes[id].contains(pos) && self.insert(id, body) {
                    added += 1;
                }
            }
        }
        added
    }

    /// Give `body` the same cells `template` currently occupies
    pub fn copy_membership(&mut self, template: BodyId, body: BodyId) -> usize {
        let mut added = 0;
        for i in 0..self.body_cells[template.index()].len() {
            let id = self.body_cells[template.index()][i];
            if self.insert(id, body) {
                added += 1;
            }
        }
        added
    }

    /// Re-check every member of every cell against its current position
    ///
    /// Members that left a cell are dropped from it and re-assigned from that
    /// cell's neighbourhood. Members on a shared edge are fanned out too, so a
    /// body drifting into an overlap strip joins the neighbour the same frame.
    /// Returns the number of departures.
    pub fn refresh(&mut self, bodies: &[Body]) -> usize {
        let Grid {
            shapes,
            cells,
            body_cells,
            pending,
            overlap,
            ..
        } = self;
        pending.clear();
        let mut departures = 0;

        for (id, members) in cells.iter_mut().enumerate() {
            if members.is_empty() {
                continue;
            }
            let shape = shapes[id];
            members.retain(|&body| {
                let pos = bodies[body.index()].position();
                if shape.contains(pos) {
                    if shape.near_shared_edge(pos, *overlap) {
                        pending.push((body, id));
                    }
                    true
                } else {
                    body_cells[body.index()].retain(|&c| c != id);
                    pending.push((body, id));
                    departures += 1;
                    false
                }
            });
        }

        let pending = std::mem::take(&mut self.pending);
        for &(body, seed) in &pending {
            let pos = bodies[body.index()].position();
            self.assign_from_seed(body, pos, seed);
        }
        self.pending = pending;

        departures
    }

    /// Capture current membership
    pub fn snapshot(&self) -> GridSnapshot {
        GridSnapshot {
            cells: self.cells.clone(),
            body_cells: self.body_cells.clone(),
        }
    }

    /// Restore membership in place, reusing existing list storage
    pub fn restore(&mut self, snapshot: &GridSnapshot) {
        for (cell, saved) in self.cells.iter_mut().zip(&snapshot.cells) {
            cell.clone_from(saved);
        }
        for (cells, saved) in self.body_cells.iter_mut().zip(&snapshot.body_cells) {
            cells.clone_from(saved);
        }
    }

    /// Whether membership matches a snapshot, ignoring order within a cell
    pub fn matches_snapshot(&self, snapshot: &GridSnapshot) -> bool {
        fn same<T: Ord + Clone>(a: &[T], b: &[T]) -> bool {
            let mut a = a.to_vec();
            let mut b = b.to_vec();
            a.sort_unstable();
            b.sort_unstable();
            a == b
        }
        self.cells.len() == snapshot.cells.len()
            && self.cells.iter().zip(&snapshot.cells).all(|(a, b)| same(a, b))
            && self
                .body_cells
                .iter()
                .zip(&snapshot.body_cells)
                .all(|(a, b)| same(a, b))
    }
}
