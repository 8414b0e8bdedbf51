//! A* pathfinding over the navigation grid
//!
//! Node bookkeeping lives in a per-search arena (a `Vec` of nodes with
//! integer parent indices). The arena is dropped when the call returns, so
//! the grid is never mutated and concurrent searches are independent.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use ahash::AHashMap;
use ordered_float::OrderedFloat;
use thiserror::Error;

use crate::core::types::{Cell, Vec3};
use crate::nav::grid::{NavGrid, DIAGONAL_COST};

/// Why a search produced no path; callers treat every variant as NotFound
/// and the variants only feed the logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("goal cell is not walkable")]
    GoalBlocked,
    #[error("goal unreachable")]
    Unreachable,
    #[error("search abandoned after {0} expansions")]
    ExpansionLimit(usize),
}

/// Arena node
#[derive(Debug, Clone)]
struct NavNode {
    cell: Cell,
    g: f32,
    h: f32,
    parent: Option<usize>,
    closed: bool,
}

/// Entry in the A* open set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OpenEntry {
    f: OrderedFloat<f32>,
    h: OrderedFloat<f32>,
    node: usize,
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap: lowest f, then lowest h, then oldest node
        other
            .f
            .cmp(&self.f)
            .then_with(|| other.h.cmp(&self.h))
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Octile distance; exact cost on an empty 8-connected grid, so admissible
pub fn octile(a: Cell, b: Cell) -> f32 {
    let dx = (a.ix - b.ix).abs() as f32;
    let dz = (a.iz - b.iz).abs() as f32;
    let (lo, hi) = if dx < dz { (dx, dz) } else { (dz, dx) };
    hi - lo + lo * DIAGONAL_COST
}

/// Find a cell path from `start` to `goal`
///
/// The start cell is accepted even when blocked (a bot standing next to a
/// freshly built wall must still be able to leave). Returns a single-cell
/// path when start and goal coincide.
pub fn find_cell_path(
    grid: &NavGrid,
    start: Cell,
    goal: Cell,
    max_expansions: usize,
) -> Result<Vec<Cell>, PathError> {
    if start == goal {
        return Ok(vec![start]);
    }
    if !grid.is_walkable(goal) {
        return Err(PathError::GoalBlocked);
    }

    let mut arena: Vec<NavNode> = Vec::new();
    let mut index: AHashMap<Cell, usize> = AHashMap::new();
    let mut open = BinaryHeap::new();

    let h = octile(start, goal);
    arena.push(NavNode {
        cell: start,
        g: 0.0,
        h,
        parent: None,
        closed: false,
    });
    index.insert(start, 0);
    open.push(OpenEntry {
        f: OrderedFloat(h),
        h: OrderedFloat(h),
        node: 0,
    });

    let mut expansions = 0usize;

    while let Some(entry) = open.pop() {
        let current = entry.node;
        if arena[current].closed {
            continue; // stale entry
        }
        if arena[current].cell == goal {
            return Ok(reconstruct_path(&arena, current));
        }

        expansions += 1;
        if expansions > max_expansions {
            return Err(PathError::ExpansionLimit(max_expansions));
        }
        arena[current].closed = true;

        let current_cell = arena[current].cell;
        let current_g = arena[current].g;

        for (neighbor, step) in grid.neighbors(current_cell) {
            let tentative_g = current_g + step;
            let slot = match index.get(&neighbor) {
                Some(&idx) => {
                    if arena[idx].closed || tentative_g >= arena[idx].g {
                        continue;
                    }
                    arena[idx].g = tentative_g;
                    arena[idx].parent = Some(current);
                    idx
                }
                None => {
                    let idx = arena.len();
                    arena.push(NavNode {
                        cell: neighbor,
                        g: tentative_g,
                        h: octile(neighbor, goal),
                        parent: Some(current),
                        closed: false,
                    });
                    index.insert(neighbor, idx);
                    idx
                }
            };

            let node = &arena[slot];
            open.push(OpenEntry {
                f: OrderedFloat(node.g + node.h),
                h: OrderedFloat(node.h),
                node: slot,
            });
        }
    }

    Err(PathError::Unreachable)
}

/// Walk parent indices back from the goal into a flat cell list
fn reconstruct_path(arena: &[NavNode], goal: usize) -> Vec<Cell> {
    let mut path = Vec::new();
    let mut cursor = Some(goal);
    while let Some(idx) = cursor {
        path.push(arena[idx].cell);
        cursor = arena[idx].parent;
    }
    path.reverse();
    path
}

/// Find a path between world positions as cell-center waypoints
pub fn find_path(
    grid: &NavGrid,
    start: Vec3,
    goal: Vec3,
    max_expansions: usize,
) -> Result<Vec<Vec3>, PathError> {
    let cells = find_cell_path(grid, grid.to_cell(start), grid.to_cell(goal), max_expansions)?;
    Ok(cells.into_iter().map(|c| grid.to_world(c)).collect())
}

/// Total step cost of a cell path
pub fn path_cost(path: &[Cell]) -> f32 {
    path.windows(2)
        .map(|w| {
            let diagonal = w[0].ix != w[1].ix && w[0].iz != w[1].iz;
            if diagonal {
                DIAGONAL_COST
            } else {
                1.0
            }
        })
        .sum()
}
