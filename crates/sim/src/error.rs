//! Simulation error types.

use thiserror::Error;

/// Errors from grid state management and geometry generation.
#[derive(Error, Debug)]
pub enum SimError {
    /// Save data failed to serialize or deserialize
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Save data parsed but described an impossible grid
    #[error("Malformed save data: {0}")]
    MalformedSave(String),

    /// The per-allocation budget cannot hold even one cell's vertices
    #[error("Chunk budget of {0} bytes is smaller than one cell's vertex data")]
    ChunkBudgetTooSmall(u64),
}

/// Result type alias for simulation operations.
pub type SimResult<T> = std::result::Result<T, SimError>;
