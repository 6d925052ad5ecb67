/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Spatial hash grid for near-linear collision candidate enumeration.
//!
//! Particles are bucketed by their screen-plane position under packed
//! integer cell keys. Each cell is tested against itself and a fixed set of
//! forward neighbours, so every adjacent pair of cells is visited exactly
//! once. The grid is built per tick and thrown away afterwards.

use euclid::default::Point2D;
use std::collections::HashMap;

/// Packed `(cx, cy)` cell coordinate
pub type CellKey = u64;

/// Right, right-down, down, left-down. Their mirrors are covered when the
/// neighbouring cell takes its own turn.
const FORWARD_NEIGHBORS: [(i32, i32); 4] = [(1, 0), (1, 1), (0, 1), (-1, 1)];

/// Smallest cell size accepted, guards against degenerate grids
const MIN_CELL_SIZE: f32 = 1.0;

pub fn pack_cell(cx: i32, cy: i32) -> CellKey {
    (u64::from(cx as u32) << 32) | u64::from(cy as u32)
}

pub fn unpack_cell(key: CellKey) -> (i32, i32) {
    ((key >> 32) as u32 as i32, key as u32 as i32)
}

/// Spatial hash grid over particle indices
pub struct SpatialGrid {
    /// Edge length of a square cell
    cell_size: f32,

    /// Packed cell coordinate -> indices of particles in that cell
    cells: HashMap<CellKey, Vec<usize>>,
}

impl SpatialGrid {
    /// Create a new spatial grid with the given cell size
    pub fn new(cell_size: f32) -> Self {
        let cell_size = if cell_size.is_finite() {
            cell_size.max(MIN_CELL_SIZE)
        } else {
            MIN_CELL_SIZE
        };
        Self {
            cell_size,
            cells: HashMap::new(),
        }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Insert a particle index at a position
    pub fn insert(&mut self, index: usize, position: Point2D<f32>) {
        let (cx, cy) = self.position_to_cell(position);
        self.cells
            .entry(pack_cell(cx, cy))
            .or_insert_with(Vec::new)
            .push(index);
    }

    /// Number of occupied cells
    pub fn occupied_cells(&self) -> usize {
        self.cells.len()
    }

    /// Every unordered pair `(a, b)` with `a < b` sharing a cell or lying in
    /// adjacent cells, kept when `accept` returns true. Sorted so callers see
    /// the same order for the same input.
    pub fn candidate_pairs<F>(&self, mut accept: F) -> Vec<(usize, usize)>
    where
        F: FnMut(usize, usize) -> bool,
    {
        let mut pairs = Vec::new();
        let mut consider = |i: usize, j: usize| {
            let pair = if i < j { (i, j) } else { (j, i) };
            if pair.0 != pair.1 && accept(pair.0, pair.1) {
                pairs.push(pair);
            }
        };

        for (&key, members) in &self.cells {
            for (n, &i) in members.iter().enumerate() {
                for &j in &members[n + 1..] {
                    consider(i, j);
                }
            }

            let (cx, cy) = unpack_cell(key);
            for (dx, dy) in FORWARD_NEIGHBORS {
                let neighbor_key = pack_cell(cx.wrapping_add(dx), cy.wrapping_add(dy));
                let Some(neighbors) = self.cells.get(&neighbor_key) else {
                    continue;
                };
                for &i in members {
                    for &j in neighbors {
                        consider(i, j);
                    }
                }
            }
        }

        pairs.sort_unstable();
        pairs
    }

    /// Convert a position to a grid cell coordinate
    fn position_to_cell(&self, position: Point2D<f32>) -> (i32, i32) {
        let x = (position.x / self.cell_size).floor() as i32;
        let y = (position.y / self.cell_size).floor() as i32;
        (x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_pack_roundtrip_negative_coordinates() {
        for (cx, cy) in [(0, 0), (-1, 5), (7, -3), (i32::MIN, i32::MAX)] {
            assert_eq!(unpack_cell(pack_cell(cx, cy)), (cx, cy));
        }
        assert_ne!(pack_cell(1, 0), pack_cell(0, 1));
    }

    #[test]
    fn test_same_cell_pair() {
        let mut grid = SpatialGrid::new(100.0);
        grid.insert(0, Point2D::new(10.0, 10.0));
        grid.insert(1, Point2D::new(20.0, 20.0));
        assert_eq!(grid.candidate_pairs(|_, _| true), vec![(0, 1)]);
    }

    #[test]
    fn test_each_neighbor_pair_reported_once() {
        let mut grid = SpatialGrid::new(10.0);
        // A 3x3 block of cells with one particle each.
        let mut index = 0;
        for cy in 0..3 {
            for cx in 0..3 {
                grid.insert(index, Point2D::new(cx as f32 * 10.0 + 5.0, cy as f32 * 10.0 + 5.0));
                index += 1;
            }
        }
        let pairs = grid.candidate_pairs(|_, _| true);

        let mut deduped = pairs.clone();
        deduped.dedup();
        assert_eq!(deduped.len(), pairs.len());
        // The centre cell neighbours all eight others.
        assert_eq!(pairs.iter().filter(|(a, b)| *a == 4 || *b == 4).count(), 8);
        // Corners are not adjacent to the opposite corner.
        assert!(!pairs.contains(&(0, 8)));
        assert!(!pairs.contains(&(2, 6)));
        assert!(pairs.contains(&(1, 3)));
        assert!(pairs.contains(&(2, 4)));
    }

    #[test]
    fn test_far_cells_are_not_paired() {
        let mut grid = SpatialGrid::new(10.0);
        grid.insert(0, Point2D::new(0.0, 0.0));
        grid.insert(1, Point2D::new(25.0, 0.0));
        assert!(grid.candidate_pairs(|_, _| true).is_empty());
    }

    #[test]
    fn test_matches_brute_force() {
        let mut rng = StdRng::seed_from_u64(7);
        let points: Vec<(Point2D<f32>, f32)> = (0..300)
            .map(|_| {
                (
                    Point2D::new(rng.gen_range(-50.0..450.0), rng.gen_range(0.0..300.0)),
                    rng.gen_range(2.0..9.0),
                )
            })
            .collect();
        let band = 3.0;
        let within = |i: usize, j: usize| {
            let (pi, ri) = points[i];
            let (pj, rj) = points[j];
            (pj - pi).length() < band * (ri + rj)
        };

        let max_radius = points.iter().map(|(_, r)| *r).fold(0.0, f32::max);
        let mut grid = SpatialGrid::new(band * 2.0 * max_radius);
        for (i, (position, _)) in points.iter().enumerate() {
            grid.insert(i, *position);
        }
        let from_grid = grid.candidate_pairs(|i, j| within(i, j));

        let mut brute_force = Vec::new();
        for i in 0..points.len() {
            for j in i + 1..points.len() {
                if within(i, j) {
                    brute_force.push((i, j));
                }
            }
        }

        assert!(!brute_force.is_empty());
        assert_eq!(from_grid, brute_force);
    }

    #[test]
    fn test_degenerate_cell_size_is_clamped() {
        assert_eq!(SpatialGrid::new(0.0).cell_size(), MIN_CELL_SIZE);
        assert_eq!(SpatialGrid::new(f32::NAN).cell_size(), MIN_CELL_SIZE);
    }
}
