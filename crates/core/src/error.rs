//! Error types shared across the application.

use thiserror::Error;

/// Top-level error type for the cell grid application.
#[derive(Error, Debug)]
pub enum Error {
    /// Vulkan-related errors
    #[error("Vulkan error: {0}")]
    Vulkan(String),

    /// Window creation or management errors
    #[error("Window error: {0}")]
    Window(String),

    /// Shader loading errors
    #[error("Shader error: {0}")]
    Shader(String),

    /// Simulation state errors (save/load, malformed grid data)
    #[error("Simulation error: {0}")]
    Simulation(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using the application's Error type.
pub type Result<T> = std::result::Result<T, Error>;
