//! Vertex generation for the cell grid.
//!
//! Each live cell becomes a 36-vertex box (six faces, two triangles
//! each); a 6-vertex gradient quad underneath covers the whole grid. The
//! vertex list is rebuilt lazily when the bound cell state changes and is
//! handed out as chunks, each small enough to fit the device's
//! per-allocation ceiling.

use glam::Vec3;
use tracing::debug;

use cellgrid_rhi::vertex::CellVertex;

use crate::error::{SimError, SimResult};
use crate::grid::Simulation;

/// Vertices per live cell.
pub const VERTS_PER_CELL: usize = 36;
/// Vertices in the background quad.
pub const BACKGROUND_VERT_COUNT: usize = 6;

const CELL_WIDTH: f32 = 0.5;
const CELL_HEIGHT: f32 = 0.25;
const CELL_BORDER: f32 = 0.1;
/// Distance between adjacent cell origins.
const CELL_POS_OFFSET: f32 = CELL_WIDTH + CELL_BORDER;

const COLOR_CELL: Vec3 = Vec3::new(1.0, 0.0, 0.0);
const COLOR_LIGHT_GREEN: Vec3 = Vec3::new(0.0, 0.085, 0.0);
const COLOR_DARK_GREEN: Vec3 = Vec3::new(0.0, 0.025, 0.0);
const COLOR_LIGHT_BLUE: Vec3 = Vec3::new(0.0, 0.0, 0.085);
const COLOR_DARK_BLUE: Vec3 = Vec3::new(0.0, 0.0, 0.025);

const W: f32 = CELL_WIDTH;
const H: f32 = CELL_HEIGHT;
const NORMAL_UP: Vec3 = Vec3::new(0.0, 0.0, 1.0);
const NORMAL_DOWN: Vec3 = Vec3::new(0.0, 0.0, -1.0);
const NORMAL_BACK: Vec3 = Vec3::new(0.0, -1.0, 0.0);
const NORMAL_FRONT: Vec3 = Vec3::new(0.0, 1.0, 0.0);
const NORMAL_LEFT: Vec3 = Vec3::new(-1.0, 0.0, 0.0);
const NORMAL_RIGHT: Vec3 = Vec3::new(1.0, 0.0, 0.0);

const fn v(x: f32, y: f32, z: f32, normal: Vec3) -> CellVertex {
    CellVertex::new(Vec3::new(x, y, z), normal, COLOR_CELL)
}

/// One cell's box at the origin; instances are translated per cell.
const BASE_VERTS: [CellVertex; VERTS_PER_CELL] = [
    // Top (z = H)
    v(0.0, 0.0, H, NORMAL_UP),
    v(W, 0.0, H, NORMAL_UP),
    v(0.0, W, H, NORMAL_UP),
    v(W, 0.0, H, NORMAL_UP),
    v(W, W, H, NORMAL_UP),
    v(0.0, W, H, NORMAL_UP),
    // Bottom (z = 0)
    v(0.0, 0.0, 0.0, NORMAL_DOWN),
    v(0.0, W, 0.0, NORMAL_DOWN),
    v(W, 0.0, 0.0, NORMAL_DOWN),
    v(W, 0.0, 0.0, NORMAL_DOWN),
    v(0.0, W, 0.0, NORMAL_DOWN),
    v(W, W, 0.0, NORMAL_DOWN),
    // Back (y = 0)
    v(0.0, 0.0, 0.0, NORMAL_BACK),
    v(W, 0.0, 0.0, NORMAL_BACK),
    v(0.0, 0.0, H, NORMAL_BACK),
    v(0.0, 0.0, H, NORMAL_BACK),
    v(W, 0.0, 0.0, NORMAL_BACK),
    v(W, 0.0, H, NORMAL_BACK),
    // Front (y = W)
    v(W, W, H, NORMAL_FRONT),
    v(W, W, 0.0, NORMAL_FRONT),
    v(0.0, W, 0.0, NORMAL_FRONT),
    v(W, W, H, NORMAL_FRONT),
    v(0.0, W, 0.0, NORMAL_FRONT),
    v(0.0, W, H, NORMAL_FRONT),
    // Left (x = 0)
    v(0.0, W, H, NORMAL_LEFT),
    v(0.0, W, 0.0, NORMAL_LEFT),
    v(0.0, 0.0, 0.0, NORMAL_LEFT),
    v(0.0, W, H, NORMAL_LEFT),
    v(0.0, 0.0, 0.0, NORMAL_LEFT),
    v(0.0, 0.0, H, NORMAL_LEFT),
    // Right (x = W)
    v(W, W, H, NORMAL_RIGHT),
    v(W, 0.0, 0.0, NORMAL_RIGHT),
    v(W, W, 0.0, NORMAL_RIGHT),
    v(W, W, H, NORMAL_RIGHT),
    v(W, 0.0, H, NORMAL_RIGHT),
    v(W, 0.0, 0.0, NORMAL_RIGHT),
];

/// A borrowed run of vertices sized to fit one GPU allocation.
///
/// `max_size_bytes` is the capacity the backing buffer must provide,
/// which can exceed the live data in the final chunk.
#[derive(Clone, Copy, Debug)]
pub struct VertexChunk<'a> {
    /// Live vertex data for this chunk.
    pub vertices: &'a [CellVertex],
    /// Capacity in bytes a buffer for this chunk must have.
    pub max_size_bytes: u64,
}

impl VertexChunk<'_> {
    /// Number of live vertices in this chunk.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Size of the live vertex data in bytes.
    #[inline]
    pub fn data_size_bytes(&self) -> u64 {
        (self.vertices.len() * CellVertex::size()) as u64
    }
}

/// Largest chunk capacity in vertices for a byte budget.
///
/// The capacity is the largest multiple of [`VERTS_PER_CELL`] whose bytes
/// fit `max_chunk_bytes`, capped at `worst_case_verts` so a small grid
/// never allocates more than it can ever use. Returns 0 when the budget
/// cannot hold even one cell.
pub fn chunk_capacity_verts(max_chunk_bytes: u64, worst_case_verts: usize) -> usize {
    let budget_verts = (max_chunk_bytes as usize / CellVertex::size()) / VERTS_PER_CELL
        * VERTS_PER_CELL;
    budget_verts.min(worst_case_verts)
}

/// Lazily generated grid geometry.
///
/// Holds a snapshot of the live cell coordinates taken by
/// [`CellGeometry::bind_cells`]; the vertex list is rebuilt on the next
/// [`CellGeometry::vertex_chunks`] call after a bind.
pub struct CellGeometry {
    grid_size: usize,
    live_cells: Vec<(usize, usize)>,
    vertices: Vec<CellVertex>,
    dirty: bool,
}

impl CellGeometry {
    /// Creates an empty geometry source with nothing bound.
    pub fn new() -> Self {
        Self {
            grid_size: 0,
            live_cells: Vec::new(),
            vertices: Vec::new(),
            dirty: false,
        }
    }

    /// Snapshots the simulation's live cells and marks the vertex list
    /// stale.
    pub fn bind_cells(&mut self, simulation: &Simulation) {
        self.grid_size = simulation.grid_size();
        self.live_cells.clear();
        self.live_cells.extend(simulation.live_cells());
        self.dirty = true;
    }

    /// Whether the vertex list is stale relative to the bound cells.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Worst-case vertex count for the bound grid: every cell alive plus
    /// the background quad.
    pub fn worst_case_vertex_count(&self) -> usize {
        if self.grid_size == 0 {
            return 0;
        }
        self.grid_size * self.grid_size * VERTS_PER_CELL + BACKGROUND_VERT_COUNT
    }

    /// Returns the geometry split into chunks of at most
    /// `max_chunk_bytes`, rebuilding the vertex list first if stale.
    ///
    /// Every chunk's vertex count is a multiple of [`VERTS_PER_CELL`]
    /// except the last, which carries the background quad tail. An
    /// unbound or empty grid yields no chunks.
    ///
    /// # Errors
    ///
    /// Returns an error if `max_chunk_bytes` cannot hold one cell.
    pub fn vertex_chunks(&mut self, max_chunk_bytes: u64) -> SimResult<Vec<VertexChunk<'_>>> {
        if self.grid_size == 0 {
            self.dirty = false;
            return Ok(Vec::new());
        }

        let capacity = chunk_capacity_verts(max_chunk_bytes, self.worst_case_vertex_count());
        if capacity == 0 {
            return Err(SimError::ChunkBudgetTooSmall(max_chunk_bytes));
        }

        if self.dirty {
            self.rebuild();
            self.dirty = false;
        }

        let max_size_bytes = (capacity * CellVertex::size()) as u64;
        let chunks: Vec<VertexChunk<'_>> = self
            .vertices
            .chunks(capacity)
            .map(|vertices| VertexChunk {
                vertices,
                max_size_bytes,
            })
            .collect();

        debug!(
            "Geometry: {} vertices in {} chunk(s) of up to {} bytes",
            self.vertices.len(),
            chunks.len(),
            max_size_bytes
        );

        Ok(chunks)
    }

    fn rebuild(&mut self) {
        self.vertices.clear();
        self.vertices
            .reserve(self.live_cells.len() * VERTS_PER_CELL + BACKGROUND_VERT_COUNT);

        let half = self.grid_size as f32 / 2.0;

        for &(x, y) in &self.live_cells {
            let cell_x = (x as f32 - half) * CELL_POS_OFFSET;
            let cell_y = (y as f32 - half) * CELL_POS_OFFSET;

            for base in &BASE_VERTS {
                self.vertices.push(CellVertex::new(
                    base.position + Vec3::new(cell_x, cell_y, 0.0),
                    base.normal,
                    base.color,
                ));
            }
        }

        // Background quad spanning the grid footprint at z = 0
        let lo = -half * CELL_POS_OFFSET;
        let hi = half * CELL_POS_OFFSET - CELL_BORDER;

        let ul = CellVertex::new(Vec3::new(lo, lo, 0.0), NORMAL_UP, COLOR_LIGHT_GREEN);
        let ur = CellVertex::new(Vec3::new(hi, lo, 0.0), NORMAL_UP, COLOR_LIGHT_BLUE);
        let ll = CellVertex::new(Vec3::new(lo, hi, 0.0), NORMAL_UP, COLOR_DARK_GREEN);
        let lr = CellVertex::new(Vec3::new(hi, hi, 0.0), NORMAL_UP, COLOR_DARK_BLUE);

        self.vertices.extend_from_slice(&[ul, lr, ll, ul, ur, lr]);
    }
}

impl Default for CellGeometry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CELL_BYTES: u64 = (VERTS_PER_CELL * 36) as u64;

    fn geometry_with_live(grid_size: usize, cells: &[(usize, usize)]) -> CellGeometry {
        let mut sim = Simulation::new(grid_size);
        for &(x, y) in cells {
            sim.set_alive(x, y, true);
        }
        let mut geometry = CellGeometry::new();
        geometry.bind_cells(&sim);
        geometry
    }

    #[test]
    fn test_chunk_capacity_is_multiple_of_cell_verts() {
        // Budget for 2.5 cells rounds down to 2 cells
        let capacity = chunk_capacity_verts(CELL_BYTES * 5 / 2, usize::MAX);
        assert_eq!(capacity, 2 * VERTS_PER_CELL);
        assert_eq!(capacity % VERTS_PER_CELL, 0);
    }

    #[test]
    fn test_chunk_capacity_caps_at_worst_case() {
        let worst_case = 4 * VERTS_PER_CELL + BACKGROUND_VERT_COUNT;
        let capacity = chunk_capacity_verts(u64::MAX / 2, worst_case);
        assert_eq!(capacity, worst_case);
    }

    #[test]
    fn test_chunk_capacity_degenerate_budget() {
        assert_eq!(chunk_capacity_verts(CELL_BYTES - 1, usize::MAX), 0);
        assert_eq!(chunk_capacity_verts(0, usize::MAX), 0);
    }

    #[test]
    fn test_tiny_budget_is_an_error() {
        let mut geometry = geometry_with_live(4, &[(0, 0)]);
        assert!(matches!(
            geometry.vertex_chunks(100),
            Err(SimError::ChunkBudgetTooSmall(100))
        ));
    }

    #[test]
    fn test_unbound_geometry_yields_no_chunks() {
        let mut geometry = CellGeometry::new();
        let chunks = geometry.vertex_chunks(1 << 20).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_single_chunk_holds_cells_and_background() {
        let mut geometry = geometry_with_live(4, &[(0, 0), (2, 3)]);
        let chunks = geometry.vertex_chunks(1 << 20).unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(
            chunks[0].vertex_count(),
            2 * VERTS_PER_CELL + BACKGROUND_VERT_COUNT
        );
        assert_eq!(
            chunks[0].data_size_bytes(),
            ((2 * VERTS_PER_CELL + BACKGROUND_VERT_COUNT) * 36) as u64
        );
    }

    #[test]
    fn test_split_into_chunks_with_background_tail() {
        // Budget of 2 cells per chunk, 5 live cells: 36*2 | 36*2 | 36 + 6
        let mut geometry =
            geometry_with_live(4, &[(0, 0), (1, 0), (2, 0), (3, 0), (0, 1)]);
        let chunks = geometry.vertex_chunks(CELL_BYTES * 2).unwrap();

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].vertex_count(), 2 * VERTS_PER_CELL);
        assert_eq!(chunks[1].vertex_count(), 2 * VERTS_PER_CELL);
        assert_eq!(
            chunks[2].vertex_count(),
            VERTS_PER_CELL + BACKGROUND_VERT_COUNT
        );

        for chunk in &chunks {
            assert_eq!(chunk.max_size_bytes, CELL_BYTES * 2);
            assert!(chunk.data_size_bytes() <= chunk.max_size_bytes);
        }
    }

    #[test]
    fn test_bind_marks_dirty_and_chunks_clear_it() {
        let mut geometry = geometry_with_live(4, &[(1, 1)]);
        assert!(geometry.is_dirty());

        geometry.vertex_chunks(1 << 20).unwrap();
        assert!(!geometry.is_dirty());
    }

    #[test]
    fn test_cells_are_translated_to_grid_positions() {
        let mut geometry = geometry_with_live(2, &[(1, 0)]);
        let chunks = geometry.vertex_chunks(1 << 20).unwrap();

        // Cell (1, 0) on a 2x2 grid sits at x = (1 - 1) * 0.6 = 0
        let first = chunks[0].vertices[0];
        assert!((first.position.x - 0.0).abs() < 1e-6);
        assert!((first.position.y - (-CELL_POS_OFFSET)).abs() < 1e-6);
    }

    #[test]
    fn test_empty_grid_still_emits_background() {
        let mut geometry = geometry_with_live(4, &[]);
        let chunks = geometry.vertex_chunks(1 << 20).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].vertex_count(), BACKGROUND_VERT_COUNT);
    }
}
