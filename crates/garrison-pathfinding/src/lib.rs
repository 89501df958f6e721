//! A* pathfinding service over a uniform navigation grid, with LRU path
//! caching and group-movement formation support.

pub mod astar;
pub mod cache;
pub mod grid;
pub mod group;

use std::collections::HashMap;

use garrison_ecs::entity::EntityId;
use tracing::{debug, warn};

pub use astar::{PathResult, DEFAULT_NODE_BUDGET};
pub use cache::{PathCache, DEFAULT_CAPACITY as DEFAULT_CACHE_CAPACITY};
pub use grid::{Cell, NavGrid};
pub use group::GroupPaths;

/// Errors surfaced to callers of [`PathfindingService`]. `Unreachable` is
/// not an error variant here — an unreachable goal is a normal, successful
/// return of an empty path; only malformed requests are errors.
#[derive(Debug, thiserror::Error)]
pub enum PathfindingError {
    #[error("start point ({0}, {1}) lies outside the navigation grid")]
    OutOfBoundsStart(f32, f32),
    #[error("goal point ({0}, {1}) lies outside the navigation grid")]
    OutOfBoundsGoal(f32, f32),
}

/// Owns the navigation grid and its path cache; the unit of pathfinding
/// work handed to the scheduler each tick.
pub struct PathfindingService {
    grid: NavGrid,
    cache: PathCache,
    node_budget: usize,
    formation_spacing: f32,
}

impl PathfindingService {
    pub fn new(grid: NavGrid) -> Self {
        let formation_spacing = grid_default_spacing(&grid);
        Self {
            grid,
            cache: PathCache::new(DEFAULT_CACHE_CAPACITY),
            node_budget: DEFAULT_NODE_BUDGET,
            formation_spacing,
        }
    }

    pub fn with_budget(mut self, node_budget: usize) -> Self {
        self.node_budget = node_budget;
        self
    }

    pub fn grid(&self) -> &NavGrid {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut NavGrid {
        &mut self.grid
    }

    /// Plan a path for a single agent. Cache-checked first; a miss runs
    /// A* and populates the cache. An unreachable goal is a successful
    /// empty path, not an error.
    pub fn find_path(&mut self, from: (f32, f32), to: (f32, f32)) -> Result<PathResult, PathfindingError> {
        let start = self
            .grid
            .world_to_grid(from.0, from.1)
            .ok_or(PathfindingError::OutOfBoundsStart(from.0, from.1))?;
        let goal = self
            .grid
            .world_to_grid(to.0, to.1)
            .ok_or(PathfindingError::OutOfBoundsGoal(to.0, to.1))?;

        if let Some(cached) = self.cache.get(start, goal) {
            debug!(?start, ?goal, "path cache hit");
            return Ok(cached);
        }

        let result = astar::find_path(&self.grid, start, goal, self.node_budget);
        if result.incomplete {
            warn!(?start, ?goal, "path search exhausted node budget, returning partial path");
        }
        self.cache.insert(start, goal, result.clone());
        Ok(result)
    }

    /// Plan paths for multiple agents converging on one goal in the same
    /// tick, sharing a main corridor and diverging onto formation slots
    /// near the goal.
    pub fn find_paths_group(
        &mut self,
        starts: &[(EntityId, (f32, f32))],
        to: (f32, f32),
    ) -> Result<HashMap<EntityId, PathResult>, PathfindingError> {
        let goal = self
            .grid
            .world_to_grid(to.0, to.1)
            .ok_or(PathfindingError::OutOfBoundsGoal(to.0, to.1))?;

        let mut cells = Vec::with_capacity(starts.len());
        for &(entity, (x, y)) in starts {
            let cell = self.grid.world_to_grid(x, y).ok_or(PathfindingError::OutOfBoundsStart(x, y))?;
            cells.push((entity, cell));
        }

        let group = group::find_paths_group(&self.grid, &cells, goal, self.node_budget, self.formation_spacing);
        Ok(group.paths.into_iter().collect())
    }

    /// Drop cached paths and mark cells unwalkable inside a world-space
    /// rectangle, e.g. after a structure is built or destroyed.
    pub fn invalidate_region(&mut self, min: (f32, f32), max: (f32, f32)) {
        if let (Some(min_cell), Some(max_cell)) = (self.grid.world_to_grid(min.0, min.1), self.grid.world_to_grid(max.0, max.1)) {
            self.cache.invalidate_region(min_cell, max_cell);
        }
    }
}

fn grid_default_spacing(grid: &NavGrid) -> f32 {
    grid.cell_size() * 2.0
}
