//! # Synthlink - Shared-memory synth session runtime
//!
//! Streams synthesized audio from a producer thread to a real-time render
//! callback while a caller sends control events, all over fixed-size shared
//! memory with no locks on the hot path.
//!
//! ## Architecture
//!
//! Synthlink is an umbrella crate that coordinates:
//! - **synthlink-core** - Shared segments, control queues, sample-ready mailbox,
//!   audio ring with backpressure, render consumer
//! - **synthlink-engine** - Producer thread and the `SynthEngine` boundary
//! - **synthlink-sampler** - Sample library and high-quality sample processing
//!
//! ## Quick Start
//!
//! ```ignore
//! use synthlink::prelude::*;
//!
//! let orchestrator = Orchestrator::builder()
//!     .engine(|| Box::new(SilenceEngine))
//!     .build()?;
//!
//! let session = orchestrator.acquire()?;
//! let mut consumer = session.take_render_consumer().unwrap();
//!
//! session.play_note(60);
//! let sampler = session.create_sampler()?;
//! session.update_sampler(sampler, ParamKey::Attack, 25.0);
//!
//! // From the audio callback
//! let mut block = vec![0.0; 512 * 2];
//! consumer.process(&mut block);
//! ```
//!
//! ## Feature Flags
//!
//! - `default` - Headless sessions; the caller drives the render consumer
//! - `output` - Render to an audio device through CPAL

/// Re-export of synthlink-core for direct access
pub use synthlink_core as core;
/// Re-export of synthlink-engine
pub use synthlink_engine as engine;
/// Re-export of synthlink-sampler
pub use synthlink_sampler as sampler;

pub use synthlink_core::{
    units, DiagnosticsSnapshot, EchoParam, EffectEvent, EffectKind, FilterParam, NoteEvent,
    NoteKind, ParamKey, RenderConsumer, SampleEvent, SamplerEvent, SessionConfig,
};

pub use synthlink_engine::{EngineMessage, LogLevel, ProducerInit, SilenceEngine, SynthEngine};

pub use synthlink_sampler::{ProcessorEvent, Quality, SampleData, SampleImport};

pub mod error;
pub use error::{Error, Result};

mod builder;
mod control;
mod orchestrator;
mod session;

pub use builder::{EngineFactory, OrchestratorBuilder, OutputMode};
pub use control::{convert_param, DEFAULT_VELOCITY};
pub use orchestrator::{Orchestrator, SessionHandle};
pub use session::{Session, SessionState, StartOutcome};

/// Convenience prelude for common imports
pub mod prelude {
    pub use crate::{
        Orchestrator, OrchestratorBuilder, OutputMode, Session, SessionHandle, SessionState,
        StartOutcome,
    };

    pub use crate::core::{EffectKind, ParamKey, RenderConsumer, SessionConfig};

    pub use crate::engine::{EngineMessage, SilenceEngine, SynthEngine};

    pub use crate::sampler::{Quality, SampleImport};
}
