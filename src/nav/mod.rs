//! Grid navigation: cell mapping, walkability and A* search

pub mod grid;
pub mod pathfinding;

pub use grid::NavGrid;
pub use pathfinding::{find_cell_path, find_path, path_cost, PathError};
