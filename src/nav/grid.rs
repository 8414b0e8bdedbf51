//! Navigation grid over the ground disc
//!
//! Maps continuous ground coordinates to integer cells of a fixed size and
//! reports which cells are walkable. A cell is walkable when its center lies
//! on the ground disc and outside every built shelter footprint.

use ahash::AHashSet;

use crate::core::types::{Cell, Vec3};

/// Cost of a diagonal step relative to an orthogonal one
pub const DIAGONAL_COST: f32 = std::f32::consts::SQRT_2;

const NEIGHBOR_OFFSETS: [(i32, i32); 8] = [
    (1, 0),
    (-1, 0),
    (0, 1),
    (0, -1),
    (1, 1),
    (1, -1),
    (-1, 1),
    (-1, -1),
];

#[derive(Debug, Clone)]
pub struct NavGrid {
    cell_size: f32,
    ground_radius: f32,
    /// Cells span [-half_cells, half_cells) on both axes
    half_cells: i32,
    blocked: AHashSet<Cell>,
    /// Bumped whenever walkability changes; paths built on an older version
    /// are stale
    version: u64,
}

impl NavGrid {
    pub fn new(ground_radius: f32, cell_size: f32) -> Self {
        let cell_size = cell_size.max(0.01);
        Self {
            cell_size,
            ground_radius,
            half_cells: Self::half_cells_for(ground_radius, cell_size),
            blocked: AHashSet::new(),
            version: 1,
        }
    }

    fn half_cells_for(ground_radius: f32, cell_size: f32) -> i32 {
        (ground_radius / cell_size).ceil() as i32
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn ground_radius(&self) -> f32 {
        self.ground_radius
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Grid dimensions in cells (width, depth)
    pub fn dimensions(&self) -> (usize, usize) {
        let side = (self.half_cells * 2) as usize;
        (side, side)
    }

    /// Convert world position to cell coordinates
    #[inline]
    pub fn to_cell(&self, pos: Vec3) -> Cell {
        Cell::new(
            (pos.x / self.cell_size).floor() as i32,
            (pos.z / self.cell_size).floor() as i32,
        )
    }

    /// Cell center in world coordinates
    #[inline]
    pub fn to_world(&self, cell: Cell) -> Vec3 {
        Vec3::ground(
            (cell.ix as f32 + 0.5) * self.cell_size,
            (cell.iz as f32 + 0.5) * self.cell_size,
        )
    }

    /// Inside the grid rectangle and on the ground disc
    pub fn in_bounds(&self, cell: Cell) -> bool {
        let h = self.half_cells;
        if cell.ix < -h || cell.ix >= h || cell.iz < -h || cell.iz >= h {
            return false;
        }
        self.to_world(cell).ground_length() <= self.ground_radius
    }

    pub fn is_blocked(&self, cell: Cell) -> bool {
        self.blocked.contains(&cell)
    }

    pub fn is_walkable(&self, cell: Cell) -> bool {
        self.in_bounds(cell) && !self.is_blocked(cell)
    }

    /// Block every cell whose center falls inside a circular footprint
    pub fn block_footprint(&mut self, center: Vec3, radius: f32) {
        let c = self.to_cell(center);
        let reach = (radius / self.cell_size).ceil() as i32 + 1;
        let mut changed = false;
        for dx in -reach..=reach {
            for dz in -reach..=reach {
                let cell = Cell::new(c.ix + dx, c.iz + dz);
                if self.to_world(cell).ground_distance(&center) <= radius {
                    changed |= self.blocked.insert(cell);
                }
            }
        }
        if changed {
            self.version += 1;
        }
    }

    /// Recompute dimensions for a new ground radius and re-block footprints
    pub fn rebuild(&mut self, ground_radius: f32, footprints: impl IntoIterator<Item = (Vec3, f32)>) {
        self.ground_radius = ground_radius;
        self.half_cells = Self::half_cells_for(ground_radius, self.cell_size);
        self.blocked.clear();
        for (center, radius) in footprints {
            self.block_footprint(center, radius);
        }
        self.version += 1;
    }

    /// Walkable neighbors with step cost; diagonals may not cut corners
    pub fn neighbors(&self, cell: Cell) -> impl Iterator<Item = (Cell, f32)> + '_ {
        NEIGHBOR_OFFSETS.iter().filter_map(move |&(dx, dz)| {
            let next = Cell::new(cell.ix + dx, cell.iz + dz);
            if !self.is_walkable(next) {
                return None;
            }
            if dx != 0 && dz != 0 {
                let side_a = Cell::new(cell.ix + dx, cell.iz);
                let side_b = Cell::new(cell.ix, cell.iz + dz);
                if !self.is_walkable(side_a) || !self.is_walkable(side_b) {
                    return None;
                }
                Some((next, DIAGONAL_COST))
            } else {
                Some((next, 1.0))
            }
        })
    }

    /// Nearest walkable cell to `pos`, searching outward ring by ring
    pub fn nearest_walkable(&self, pos: Vec3, max_rings: i32) -> Option<Cell> {
        let origin = self.to_cell(pos);
        if self.is_walkable(origin) {
            return Some(origin);
        }
        for ring in 1..=max_rings {
            let mut best: Option<(Cell, f32)> = None;
            for dx in -ring..=ring {
                for dz in -ring..=ring {
                    if dx.abs() != ring && dz.abs() != ring {
                        continue;
                    }
                    let cell = Cell::new(origin.ix + dx, origin.iz + dz);
                    if !self.is_walkable(cell) {
                        continue;
                    }
                    let d = self.to_world(cell).ground_distance(&pos);
                    match best {
                        Some((_, bd)) if d >= bd => {}
                        _ => best = Some((cell, d)),
                    }
                }
            }
            if let Some((cell, _)) = best {
                return Some(cell);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_cell_and_back() {
        let grid = NavGrid::new(10.0, 1.0);
        let cell = grid.to_cell(Vec3::ground(2.3, -0.4));
        assert_eq!(cell, Cell::new(2, -1));
        assert_eq!(grid.to_world(cell), Vec3::ground(2.5, -0.5));
        // Cell centers map back to the same cell
        assert_eq!(grid.to_cell(grid.to_world(cell)), cell);
    }

    #[test]
    fn test_out_of_disc_not_walkable() {
        let grid = NavGrid::new(10.0, 1.0);
        assert!(grid.is_walkable(Cell::new(0, 0)));
        assert!(!grid.is_walkable(Cell::new(9, 9))); // corner of the square, off the disc
        assert!(!grid.is_walkable(Cell::new(20, 0)));
    }

    #[test]
    fn test_footprint_blocks_cells() {
        let mut grid = NavGrid::new(10.0, 1.0);
        let before = grid.version();
        grid.block_footprint(Vec3::ground(0.5, 0.5), 1.2);
        assert!(!grid.is_walkable(Cell::new(0, 0)));
        assert!(!grid.is_walkable(Cell::new(1, 0)));
        assert!(grid.is_walkable(Cell::new(2, 0)));
        assert!(grid.version() > before);
    }

    #[test]
    fn test_rebuild_resizes_and_bumps_version() {
        let mut grid = NavGrid::new(10.0, 1.0);
        let before = grid.version();
        assert!(!grid.is_walkable(Cell::new(14, 0)));

        grid.rebuild(20.0, vec![(Vec3::ground(0.5, 0.5), 0.5)]);
        assert!(grid.is_walkable(Cell::new(14, 0)));
        assert!(!grid.is_walkable(Cell::new(0, 0)));
        assert_eq!(grid.dimensions(), (40, 40));
        assert!(grid.version() > before);
    }

    #[test]
    fn test_neighbors_no_corner_cutting() {
        let mut grid = NavGrid::new(10.0, 1.0);
        grid.block_footprint(Vec3::ground(1.5, 0.5), 0.1);
        let neighbors: Vec<Cell> = grid.neighbors(Cell::new(0, 0)).map(|(c, _)| c).collect();
        assert!(!neighbors.contains(&Cell::new(1, 0)));
        assert!(!neighbors.contains(&Cell::new(1, 1)));
        assert!(!neighbors.contains(&Cell::new(1, -1)));
        assert!(neighbors.contains(&Cell::new(-1, 1)));
    }

    #[test]
    fn test_nearest_walkable() {
        let mut grid = NavGrid::new(10.0, 1.0);
        grid.block_footprint(Vec3::ground(0.5, 0.5), 0.1);
        let cell = grid.nearest_walkable(Vec3::ground(0.5, 0.5), 3).unwrap();
        assert_ne!(cell, Cell::new(0, 0));
        assert!(grid.is_walkable(cell));
    }
}
