//! Shared-memory transport between a synth producer and a real-time renderer.
//!
//! # Primary API
//!
//! - [`SessionSegments`]: every shared segment of one session
//! - [`QueueWriter`] / [`QueueReader`]: SPSC control queues for [`NoteEvent`],
//!   [`SamplerEvent`] and [`EffectEvent`]
//! - [`MailboxWriter`] / [`MailboxReader`]: latest-wins sample-ready slot
//! - [`AudioRing`]: interleaved stereo ring with a backpressure flag
//! - [`RenderConsumer`]: the real-time side of the ring
//! - [`Diagnostics`]: drop and underflow counters
//!
//! # Feature-gated APIs
//!
//! - `"output"`: [`OutputStream`], CPAL binding of a [`RenderConsumer`]

pub mod error;
pub use error::{Error, Result};

pub mod config;
pub use config::SessionConfig;

pub mod units;

mod segment;
pub use segment::{layout, SessionSegments, SharedSegment};

pub mod events;
pub use events::{
    EchoParam, EffectEvent, EffectEventKind, EffectKind, FilterParam, NoteEvent, NoteKind,
    ParamKey, SamplerEvent, SamplerEventKind, WireEvent,
};

mod queue;
pub use queue::{Drained, QueueReader, QueueWriter};

mod mailbox;
pub use mailbox::{MailboxReader, MailboxWriter, SampleBuffer, SampleEvent};

mod ring;
pub use ring::{
    AudioRing, Dither, ReadReport, RingReader, RingWriter, WriteOutcome, DITHER_AMPLITUDE,
    FLAG_IDLE, FLAG_WAITING,
};

mod render;
pub use render::{RenderConsumer, RenderSwitch};

mod diagnostics;
pub use diagnostics::{Diagnostics, DiagnosticsSnapshot, QueueKind};

#[cfg(feature = "output")]
mod output;
#[cfg(feature = "output")]
pub use output::OutputStream;
