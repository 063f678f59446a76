//! Producer side of synthlink.
//!
//! - [`ProducerThread`]: dedicated thread feeding the audio ring
//! - [`SynthEngine`]: what the producer drives once per quantum
//! - [`ProducerInit`] / [`EngineMessage`]: the initialization request and the
//!   notifications sent back

pub mod error;
pub use error::{Error, Result};

mod engine;
pub use engine::{SilenceEngine, SynthEngine};

pub mod protocol;
pub use protocol::{EngineMessage, LogLevel, ProducerInit, ProducerLinks};

mod producer;
pub use producer::{ProducerState, ProducerThread};
