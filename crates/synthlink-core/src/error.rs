//! Error types for synthlink-core.

use thiserror::Error;

/// Error type for synthlink-core operations.
///
/// Queue overload and render underflow are not represented here: both are
/// expected under load and only surface through [`crate::Diagnostics`].
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Failed to map shared segment '{name}' ({bytes} bytes): {source}")]
    SegmentMap {
        name: &'static str,
        bytes: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Shared segment '{name}' is {actual} bytes, layout requires {expected}")]
    SegmentSize {
        name: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Sample of {length} samples exceeds the {max} sample buffer")]
    SampleTooLong { length: usize, max: usize },

    #[error("Invalid sample event: {0}")]
    InvalidSampleEvent(String),

    #[error("Invalid device: {0}")]
    InvalidDevice(String),

    #[cfg(feature = "output")]
    #[error("Audio device not available")]
    DeviceNotAvailable(#[from] cpal::DefaultStreamConfigError),

    #[cfg(feature = "output")]
    #[error("Failed to build audio stream")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[cfg(feature = "output")]
    #[error("Failed to play audio stream")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[cfg(feature = "output")]
    #[error("Failed to enumerate devices")]
    DevicesError(#[from] cpal::DevicesError),

    #[cfg(feature = "output")]
    #[error("Failed to get device name")]
    DeviceNameError(#[from] cpal::DeviceNameError),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
