//! Game of Life state and grid geometry generation.

pub mod error;
pub mod geometry;
pub mod grid;

pub use error::{SimError, SimResult};
pub use geometry::{CellGeometry, VertexChunk};
pub use grid::Simulation;
