//! Uniform navigation grid: walkability, movement cost, and coordinate
//! conversions between world space and grid cells.

use serde::{Deserialize, Serialize};

/// A grid cell coordinate. Signed so callers can express points outside
/// the grid and have [`NavGrid::world_to_grid`] reject them explicitly
/// rather than wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

impl Cell {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A uniform grid of square cells, each with a walkability flag and a
/// movement-cost multiplier (1.0 = normal terrain).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavGrid {
    width: i32,
    height: i32,
    cell_size: f32,
    walkable: Vec<bool>,
    cost: Vec<f32>,
}

impl NavGrid {
    pub fn new(width: i32, height: i32, cell_size: f32) -> Self {
        let n = (width * height).max(0) as usize;
        Self {
            width,
            height,
            cell_size,
            walkable: vec![true; n],
            cost: vec![1.0; n],
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    fn index(&self, cell: Cell) -> Option<usize> {
        if cell.x < 0 || cell.y < 0 || cell.x >= self.width || cell.y >= self.height {
            None
        } else {
            Some((cell.y * self.width + cell.x) as usize)
        }
    }

    pub fn in_bounds(&self, cell: Cell) -> bool {
        self.index(cell).is_some()
    }

    /// World coordinates to the containing cell, or `None` if outside the
    /// grid. Matches `0 <= cell < (width, height)` after flooring.
    pub fn world_to_grid(&self, x: f32, y: f32) -> Option<Cell> {
        let cell = Cell::new((x / self.cell_size).floor() as i32, (y / self.cell_size).floor() as i32);
        self.in_bounds(cell).then_some(cell)
    }

    /// The center of a cell in world space.
    pub fn grid_to_world(&self, cell: Cell) -> (f32, f32) {
        (
            (cell.x as f32 + 0.5) * self.cell_size,
            (cell.y as f32 + 0.5) * self.cell_size,
        )
    }

    pub fn is_walkable(&self, cell: Cell) -> bool {
        self.index(cell).map(|i| self.walkable[i]).unwrap_or(false)
    }

    pub fn set_walkable(&mut self, cell: Cell, walkable: bool) {
        if let Some(i) = self.index(cell) {
            self.walkable[i] = walkable;
        }
    }

    pub fn get_movement_cost(&self, cell: Cell) -> f32 {
        self.index(cell).map(|i| self.cost[i]).unwrap_or(f32::INFINITY)
    }

    pub fn set_movement_cost(&mut self, cell: Cell, cost: f32) {
        if let Some(i) = self.index(cell) {
            self.cost[i] = cost;
        }
    }

    /// Mark every cell inside a world-space rectangle unwalkable or
    /// walkable, used by [`crate::PathfindingService::invalidate_region`]
    /// callers that also need to flip terrain.
    pub fn set_region_walkable(&mut self, min: (f32, f32), max: (f32, f32), walkable: bool) {
        let min_cell = Cell::new((min.0 / self.cell_size).floor() as i32, (min.1 / self.cell_size).floor() as i32);
        let max_cell = Cell::new((max.0 / self.cell_size).ceil() as i32, (max.1 / self.cell_size).ceil() as i32);
        for y in min_cell.y.max(0)..max_cell.y.min(self.height) {
            for x in min_cell.x.max(0)..max_cell.x.min(self.width) {
                self.set_walkable(Cell::new(x, y), walkable);
            }
        }
    }

    /// 8-connected neighbors with their step cost. Diagonal moves that
    /// would cut across a blocked corner (either orthogonal neighbor
    /// unwalkable) are excluded.
    pub fn neighbors(&self, cell: Cell) -> Vec<(Cell, f32)> {
        const ORTHOGONAL: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
        const DIAGONAL: [(i32, i32); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];

        let mut out = Vec::with_capacity(8);
        for (dx, dy) in ORTHOGONAL {
            let n = Cell::new(cell.x + dx, cell.y + dy);
            if self.is_walkable(n) {
                out.push((n, self.get_movement_cost(n)));
            }
        }
        for (dx, dy) in DIAGONAL {
            let n = Cell::new(cell.x + dx, cell.y + dy);
            let corner_a = Cell::new(cell.x + dx, cell.y);
            let corner_b = Cell::new(cell.x, cell.y + dy);
            if self.is_walkable(n) && self.is_walkable(corner_a) && self.is_walkable(corner_b) {
                out.push((n, self.get_movement_cost(n) * std::f32::consts::SQRT_2));
            }
        }
        out
    }
}
