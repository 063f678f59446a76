//! Error types.

use thiserror::Error;

/// Error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Shared segment layer error.
    #[error(transparent)]
    Core(#[from] synthlink_core::Error),

    /// Sample does not fit the shared sample buffer.
    #[error("Sample too long: {length} samples, buffer holds {max}")]
    SampleTooLong { length: usize, max: usize },

    /// Sample too long for the high-quality path.
    #[error("Sample too long for high quality processing ({duration_seconds:.2} s); use mono or standard quality")]
    TooLongForHighQuality { duration_seconds: f32 },

    /// No loaded sample with this id.
    #[error("Sample not found: {0}")]
    SampleNotFound(u32),

    /// High-quality sample still being processed.
    #[error("Sample {0} is still being processed")]
    SampleNotReady(u32),

    /// Import without audio data.
    #[error("Sample has no audio data")]
    EmptySample,

    /// Invalid import metadata.
    #[error("Invalid sample: {0}")]
    InvalidSample(String),

    /// Sample processing worker is not running.
    #[error("Sample processor stopped")]
    ProcessorStopped,

    /// The worker thread could not be spawned.
    #[error("Failed to spawn sample processor: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
