//! Conway's Game of Life on a toroidal grid.
//!
//! The grid is double-buffered: [`Simulation::step`] reads the current
//! buffer, writes the next generation into the other, and swaps. Neighbor
//! lookups wrap at the edges.

use rand::Rng;
use rand::distributions::Bernoulli;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{SimError, SimResult};

/// Probability that a cell starts alive after [`Simulation::randomize`].
const RANDOMIZE_ALIVE_RATIO: f64 = 0.25;

/// Serialized grid state: the grid dimension and the live cell
/// coordinates.
#[derive(Serialize, Deserialize)]
struct SaveData {
    grid_size: u64,
    cells: Vec<[u64; 2]>,
}

/// Double-buffered Game of Life state.
pub struct Simulation {
    grid_size: usize,
    /// Two generations of cell state; `current` indexes the live one.
    buffers: [Vec<bool>; 2],
    current: usize,
}

impl Simulation {
    /// Creates a simulation with all cells dead.
    pub fn new(grid_size: usize) -> Self {
        let cells = grid_size * grid_size;
        Self {
            grid_size,
            buffers: [vec![false; cells], vec![false; cells]],
            current: 0,
        }
    }

    /// Returns the grid dimension (the grid is square).
    #[inline]
    pub fn grid_size(&self) -> usize {
        self.grid_size
    }

    /// Returns whether the cell at `(x, y)` is alive.
    ///
    /// # Panics
    ///
    /// Panics if `x` or `y` is outside the grid.
    #[inline]
    pub fn is_alive(&self, x: usize, y: usize) -> bool {
        self.buffers[self.current][y * self.grid_size + x]
    }

    /// Sets the cell at `(x, y)` in the current generation.
    #[inline]
    pub fn set_alive(&mut self, x: usize, y: usize, alive: bool) {
        self.buffers[self.current][y * self.grid_size + x] = alive;
    }

    /// Counts live cells in the current generation.
    pub fn live_count(&self) -> usize {
        self.buffers[self.current].iter().filter(|&&c| c).count()
    }

    /// Iterates the coordinates of live cells in row-major order.
    pub fn live_cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let grid_size = self.grid_size;
        self.buffers[self.current]
            .iter()
            .enumerate()
            .filter(|&(_, &alive)| alive)
            .map(move |(i, _)| (i % grid_size, i / grid_size))
    }

    /// Repopulates the grid, each cell alive with probability 0.25.
    pub fn randomize(&mut self) {
        let mut rng = rand::thread_rng();
        // Ratio is a compile-time constant in range
        let dist = Bernoulli::new(RANDOMIZE_ALIVE_RATIO)
            .unwrap_or_else(|_| unreachable!("ratio is in [0, 1]"));

        for cell in &mut self.buffers[self.current] {
            *cell = rng.sample(dist);
        }

        info!(
            "Randomized {}x{} grid, {} cells alive",
            self.grid_size,
            self.grid_size,
            self.live_count()
        );
    }

    /// Advances one generation and swaps buffers.
    ///
    /// A cell survives with exactly 2 or 3 live neighbors and is born
    /// with exactly 3; neighbors wrap toroidally.
    pub fn step(&mut self) {
        let next = 1 - self.current;
        let n = self.grid_size;

        for y in 0..n {
            for x in 0..n {
                let xp1 = (x + 1) % n;
                let xm1 = (x + n - 1) % n;
                let yp1 = (y + 1) % n;
                let ym1 = (y + n - 1) % n;

                let neighbors = self.is_alive(xm1, y) as u8
                    + self.is_alive(xm1, ym1) as u8
                    + self.is_alive(x, ym1) as u8
                    + self.is_alive(xp1, ym1) as u8
                    + self.is_alive(xp1, y) as u8
                    + self.is_alive(xp1, yp1) as u8
                    + self.is_alive(x, yp1) as u8
                    + self.is_alive(xm1, yp1) as u8;

                let alive = (self.is_alive(x, y) && neighbors == 2) || neighbors == 3;
                self.buffers[next][y * n + x] = alive;
            }
        }

        self.current = next;
    }

    /// Serializes the current generation to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> SimResult<String> {
        let data = SaveData {
            grid_size: self.grid_size as u64,
            cells: self
                .live_cells()
                .map(|(x, y)| [x as u64, y as u64])
                .collect(),
        };

        let json = serde_json::to_string(&data)?;
        debug!("Serialized {} live cell(s)", data.cells.len());
        Ok(json)
    }

    /// Rebuilds a simulation from JSON produced by [`Simulation::to_json`].
    ///
    /// # Errors
    ///
    /// Returns an error on malformed JSON, more cells than the grid can
    /// hold, or out-of-range coordinates.
    pub fn from_json(json: &str) -> SimResult<Self> {
        let data: SaveData = serde_json::from_str(json)?;

        let grid_size = data.grid_size as usize;
        if data.cells.len() > grid_size * grid_size {
            return Err(SimError::MalformedSave(format!(
                "{} cells cannot fit a {}x{} grid",
                data.cells.len(),
                grid_size,
                grid_size
            )));
        }

        let mut simulation = Self::new(grid_size);
        for &[x, y] in &data.cells {
            if x >= data.grid_size || y >= data.grid_size {
                return Err(SimError::MalformedSave(format!(
                    "cell ({}, {}) is outside a {}x{} grid",
                    x, y, grid_size, grid_size
                )));
            }
            simulation.set_alive(x as usize, y as usize, true);
        }

        info!(
            "Loaded {}x{} grid with {} live cell(s)",
            grid_size,
            grid_size,
            data.cells.len()
        );
        Ok(simulation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_live(grid_size: usize, cells: &[(usize, usize)]) -> Simulation {
        let mut sim = Simulation::new(grid_size);
        for &(x, y) in cells {
            sim.set_alive(x, y, true);
        }
        sim
    }

    #[test]
    fn test_underpopulation_dies() {
        let mut sim = with_live(5, &[(2, 2), (2, 3)]);
        sim.step();
        assert!(!sim.is_alive(2, 2));
        assert!(!sim.is_alive(2, 3));
    }

    #[test]
    fn test_block_is_stable() {
        let block = [(1, 1), (2, 1), (1, 2), (2, 2)];
        let mut sim = with_live(5, &block);
        sim.step();
        for &(x, y) in &block {
            assert!(sim.is_alive(x, y));
        }
        assert_eq!(sim.live_count(), 4);
    }

    #[test]
    fn test_blinker_oscillates() {
        let mut sim = with_live(5, &[(1, 2), (2, 2), (3, 2)]);
        sim.step();
        assert!(sim.is_alive(2, 1));
        assert!(sim.is_alive(2, 2));
        assert!(sim.is_alive(2, 3));
        assert!(!sim.is_alive(1, 2));
        assert!(!sim.is_alive(3, 2));

        sim.step();
        assert!(sim.is_alive(1, 2));
        assert!(sim.is_alive(2, 2));
        assert!(sim.is_alive(3, 2));
    }

    #[test]
    fn test_birth_with_three_neighbors() {
        let mut sim = with_live(5, &[(1, 1), (2, 1), (1, 2)]);
        sim.step();
        assert!(sim.is_alive(2, 2));
    }

    #[test]
    fn test_toroidal_wrap_across_edges() {
        // Horizontal blinker straddling the left/right seam of row 0
        let mut sim = with_live(5, &[(4, 0), (0, 0), (1, 0)]);
        sim.step();
        assert!(sim.is_alive(0, 4));
        assert!(sim.is_alive(0, 0));
        assert!(sim.is_alive(0, 1));
    }

    #[test]
    fn test_save_load_round_trip() {
        let sim = with_live(8, &[(0, 0), (3, 5), (7, 7)]);
        let json = sim.to_json().unwrap();

        let loaded = Simulation::from_json(&json).unwrap();
        assert_eq!(loaded.grid_size(), 8);
        assert_eq!(loaded.live_count(), 3);
        assert!(loaded.is_alive(0, 0));
        assert!(loaded.is_alive(3, 5));
        assert!(loaded.is_alive(7, 7));
    }

    #[test]
    fn test_load_rejects_out_of_range_cell() {
        let json = r#"{"grid_size": 4, "cells": [[4, 0]]}"#;
        assert!(matches!(
            Simulation::from_json(json),
            Err(SimError::MalformedSave(_))
        ));
    }

    #[test]
    fn test_load_rejects_too_many_cells() {
        let json = r#"{"grid_size": 1, "cells": [[0, 0], [0, 0]]}"#;
        assert!(matches!(
            Simulation::from_json(json),
            Err(SimError::MalformedSave(_))
        ));
    }

    #[test]
    fn test_load_rejects_malformed_json() {
        assert!(matches!(
            Simulation::from_json("{"),
            Err(SimError::Json(_))
        ));
    }

    #[test]
    fn test_live_cells_iterates_in_row_major_order() {
        let sim = with_live(3, &[(2, 0), (0, 1), (1, 2)]);
        let cells: Vec<_> = sim.live_cells().collect();
        assert_eq!(cells, vec![(2, 0), (0, 1), (1, 2)]);
    }
}
