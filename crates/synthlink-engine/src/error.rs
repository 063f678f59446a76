//! Error types.

use thiserror::Error;

/// Error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Shared segment layer error.
    #[error(transparent)]
    Core(#[from] synthlink_core::Error),

    /// A required shared segment was not supplied at initialization.
    #[error("Missing shared segment: {0}")]
    MissingSegment(&'static str),

    /// A supplied segment does not match the session layout.
    #[error("Invalid shared segment '{name}': {reason}")]
    InvalidSegment { name: &'static str, reason: String },

    /// Declared ring size differs from the session's.
    #[error("Ring size mismatch: initialization declares {declared}, session uses {expected}")]
    RingSizeMismatch { declared: usize, expected: usize },

    /// The producer thread could not be spawned.
    #[error("Failed to spawn producer thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
