//! Messages crossing the producer boundary.
//!
//! [`ProducerInit`] is the initialization request: every shared segment plus
//! the declared ring size. It is validated as a whole before a producer thread
//! exists, so a malformed request never reaches queue-reading code.
//! [`EngineMessage`] is what the producer reports back.

use crate::error::{Error, Result};
use std::sync::Arc;
use synthlink_core::{
    layout, EffectEvent, MailboxReader, NoteEvent, QueueReader, RingWriter, SampleBuffer,
    SampleEvent, SamplerEvent, SessionConfig, SharedSegment,
};

/// Initialization request for the producer.
///
/// Fields are optional so an incomplete request can be represented and
/// rejected at the boundary.
#[derive(Default)]
pub struct ProducerInit {
    pub ring: Option<RingWriter>,
    pub midi: Option<Arc<SharedSegment>>,
    pub osc: Option<Arc<SharedSegment>>,
    pub fx: Option<Arc<SharedSegment>>,
    pub mailbox: Option<Arc<SharedSegment>>,
    pub samples: Option<Arc<SharedSegment>>,
    /// Audio ring length in f32 values.
    pub ring_size: usize,
}

impl std::fmt::Debug for ProducerInit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProducerInit")
            .field("ring", &self.ring.as_ref().map(|w| w.ring().capacity()))
            .field("midi", &self.midi.as_ref().map(|s| s.len()))
            .field("osc", &self.osc.as_ref().map(|s| s.len()))
            .field("fx", &self.fx.as_ref().map(|s| s.len()))
            .field("mailbox", &self.mailbox.as_ref().map(|s| s.len()))
            .field("samples", &self.samples.as_ref().map(|s| s.len()))
            .field("ring_size", &self.ring_size)
            .finish()
    }
}

/// Every view the producer thread works through.
pub struct ProducerLinks {
    pub ring: RingWriter,
    pub midi: QueueReader<NoteEvent>,
    pub osc: QueueReader<SamplerEvent>,
    pub fx: QueueReader<EffectEvent>,
    pub mailbox: MailboxReader,
    pub samples: SampleBuffer,
}

fn require<T>(segment: Option<T>, name: &'static str) -> Result<T> {
    segment.ok_or(Error::MissingSegment(name))
}

fn invalid(name: &'static str) -> impl FnOnce(synthlink_core::Error) -> Error {
    move |err| Error::InvalidSegment {
        name,
        reason: err.to_string(),
    }
}

impl ProducerInit {
    /// Check the request against `config` and attach every view.
    pub fn validate(self, config: &SessionConfig) -> Result<ProducerLinks> {
        let expected = config.ring_capacity();
        if self.ring_size != expected {
            return Err(Error::RingSizeMismatch {
                declared: self.ring_size,
                expected,
            });
        }

        let ring = require(self.ring, "audio")?;
        let ring_capacity = ring.ring().capacity();
        if ring_capacity != expected {
            return Err(Error::InvalidSegment {
                name: "audio",
                reason: format!("ring holds {ring_capacity} values, expected {expected}"),
            });
        }

        let midi = require(self.midi, "midi")?;
        let osc = require(self.osc, "osc")?;
        let fx = require(self.fx, "fx")?;
        let mailbox = require(self.mailbox, "sample_event")?;
        let samples = require(self.samples, "sample_buffer")?;

        let segments = [&midi, &osc, &fx, &mailbox, &samples];
        for (segment, &(name, bytes)) in segments.into_iter().zip(&expected_layout(config)) {
            segment.expect_len(bytes).map_err(invalid(name))?;
        }

        Ok(ProducerLinks {
            ring,
            midi: QueueReader::attach(midi, config.midi_queue_capacity).map_err(invalid("midi"))?,
            osc: QueueReader::attach(osc, config.osc_queue_capacity).map_err(invalid("osc"))?,
            fx: QueueReader::attach(fx, config.fx_queue_capacity).map_err(invalid("fx"))?,
            mailbox: MailboxReader::attach(mailbox).map_err(invalid("sample_event"))?,
            samples: SampleBuffer::attach(samples, config.max_sample_length)
                .map_err(invalid("sample_buffer"))?,
        })
    }
}

/// Byte size of each control segment for `config`, in the order
/// midi, osc, fx, mailbox, sample buffer. The audio ring is checked by capacity.
fn expected_layout(config: &SessionConfig) -> [(&'static str, usize); 5] {
    [
        ("midi", layout::queue_bytes::<NoteEvent>(config.midi_queue_capacity)),
        ("osc", layout::queue_bytes::<SamplerEvent>(config.osc_queue_capacity)),
        ("fx", layout::queue_bytes::<EffectEvent>(config.fx_queue_capacity)),
        ("sample_event", layout::mailbox_bytes()),
        ("sample_buffer", layout::sample_bytes(config.max_sample_length)),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// Notification from the producer thread.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineMessage {
    /// The producer loop is up.
    ModuleReady,
    /// Initialization was accepted for a ring of `ring_size` values.
    Initialize { ring_size: usize },
    /// Diagnostic line.
    Log { level: LogLevel, message: String },
    /// A sample delivered through the mailbox reached the engine.
    SampleUpdate(SampleEvent),
}

impl EngineMessage {
    pub fn log(level: LogLevel, message: impl Into<String>) -> Self {
        Self::Log {
            level,
            message: message.into(),
        }
    }
}
