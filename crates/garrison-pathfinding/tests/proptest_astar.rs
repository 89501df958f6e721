//! Property tests for A* over a fully walkable grid: a path should always
//! be found, stay in bounds, and land on the requested goal cell.

use garrison_pathfinding::astar::find_path;
use garrison_pathfinding::grid::{Cell, NavGrid};
use proptest::prelude::*;

const WIDTH: i32 = 40;
const HEIGHT: i32 = 40;
const CELL: f32 = 32.0;
const BUDGET: usize = 10_000;

fn cell_strategy() -> impl Strategy<Value = Cell> {
    (0..WIDTH, 0..HEIGHT).prop_map(|(x, y)| Cell::new(x, y))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1_000))]

    #[test]
    fn a_fully_open_grid_always_reaches_the_goal(start in cell_strategy(), goal in cell_strategy()) {
        let grid = NavGrid::new(WIDTH, HEIGHT, CELL);
        let result = find_path(&grid, start, goal, BUDGET);

        prop_assert!(!result.incomplete);
        if start == goal {
            prop_assert!(result.waypoints.is_empty() || result.waypoints.len() == 1);
        } else {
            prop_assert!(!result.waypoints.is_empty());
            let (gx, gy) = grid.grid_to_world(goal);
            let last = *result.waypoints.last().unwrap();
            prop_assert!((last.0 - gx).abs() < f32::EPSILON && (last.1 - gy).abs() < f32::EPSILON);
        }

        for &(x, y) in &result.waypoints {
            prop_assert!(x >= 0.0 && x <= WIDTH as f32 * CELL);
            prop_assert!(y >= 0.0 && y <= HEIGHT as f32 * CELL);
        }
    }

    /// A single impassable wall with a one-cell gap must still be routable;
    /// the path must never step onto an unwalkable cell.
    #[test]
    fn a_path_never_crosses_unwalkable_cells(gap_y in 0..HEIGHT) {
        let mut grid = NavGrid::new(WIDTH, HEIGHT, CELL);
        let wall_x = WIDTH / 2;
        for y in 0..HEIGHT {
            if y != gap_y {
                grid.set_walkable(Cell::new(wall_x, y), false);
            }
        }

        let start = Cell::new(0, HEIGHT / 2);
        let goal = Cell::new(WIDTH - 1, HEIGHT / 2);
        let result = find_path(&grid, start, goal, BUDGET);

        for &(x, y) in &result.waypoints {
            let cell = grid.world_to_grid(x, y).unwrap();
            prop_assert!(grid.is_walkable(cell), "path stepped onto unwalkable cell {:?}", cell);
        }
    }
}
