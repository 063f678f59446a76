//! Caller-side control API.
//!
//! Every event write is non-blocking. A full queue drops the event, bumps the
//! matching drop counter and returns `false`.

use crate::session::Session;
use crate::{Error, Result};
use crossbeam_channel::Receiver;
use std::sync::atomic::Ordering;
use synthlink_core::units::{ms_to_samples, semitones_to_ratio};
use synthlink_core::{
    EffectEvent, EffectKind, NoteEvent, ParamKey, QueueKind, SampleEvent, SamplerEvent,
};
use synthlink_sampler::{ProcessorEvent, Quality, SampleData, SampleImport};

/// Velocity used by [`Session::play_note`].
pub const DEFAULT_VELOCITY: u8 = 100;

/// Value as stored on the wire: durations in samples, pitch as a ratio.
pub fn convert_param(key: ParamKey, value: f32) -> f32 {
    if key.is_duration() {
        ms_to_samples(value) as f32
    } else if key == ParamKey::Pitch {
        semitones_to_ratio(value)
    } else {
        value
    }
}

impl Session {
    fn dropped(&self, queue: QueueKind) -> bool {
        self.diagnostics_handle().record_drop(queue);
        tracing::warn!("{} queue full, event dropped", queue.name());
        false
    }

    fn send_note(&self, event: NoteEvent) -> bool {
        if self.queues.midi.lock().write(&event) {
            true
        } else {
            self.dropped(QueueKind::Midi)
        }
    }

    fn send_sampler(&self, event: SamplerEvent) -> bool {
        if self.queues.osc.lock().write(&event) {
            true
        } else {
            self.dropped(QueueKind::Osc)
        }
    }

    fn send_effect(&self, event: EffectEvent) -> bool {
        if self.queues.fx.lock().write(&event) {
            true
        } else {
            self.dropped(QueueKind::Fx)
        }
    }

    // Notes

    pub fn play_note(&self, pitch: u8) -> bool {
        self.play_note_with_velocity(pitch, DEFAULT_VELOCITY)
    }

    pub fn play_note_with_velocity(&self, pitch: u8, velocity: u8) -> bool {
        self.send_note(NoteEvent::note_on(pitch, velocity))
    }

    pub fn stop_note(&self, pitch: u8) -> bool {
        self.send_note(NoteEvent::note_off(pitch))
    }

    // Samplers

    /// Allocate the next sampler index and announce it to the producer.
    ///
    /// The index is consumed even if the add event is dropped. Indices are
    /// never reused within a session; the 257th call fails.
    pub fn create_sampler(&self) -> Result<u8> {
        let next = self
            .queues
            .next_sampler
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |next| {
                (next <= u16::from(u8::MAX)).then_some(next + 1)
            })
            .map_err(|_| Error::SamplerIdsExhausted)?;
        let id = next as u8;
        self.send_sampler(SamplerEvent::add(id));
        Ok(id)
    }

    pub fn remove_sampler(&self, id: u8) -> bool {
        self.send_sampler(SamplerEvent::remove(id))
    }

    /// Durations are given in milliseconds, pitch in semitones.
    pub fn update_sampler(&self, id: u8, key: ParamKey, value: f32) -> bool {
        self.send_sampler(SamplerEvent::update(id, key, convert_param(key, value)))
    }

    // Effects

    pub fn add_effect(&self, kind: EffectKind) -> u32 {
        let id = self.queues.next_effect.fetch_add(1, Ordering::Relaxed);
        self.send_effect(EffectEvent::add(id, kind));
        id
    }

    pub fn edit_effect(&self, id: u32, param_index: impl Into<u32>, value: f32) -> bool {
        self.send_effect(EffectEvent::edit(id, param_index.into(), value))
    }

    pub fn remove_effect(&self, id: u32) -> bool {
        self.send_effect(EffectEvent::remove(id))
    }

    // Samples

    fn with_library<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&synthlink_sampler::SampleLibrary) -> synthlink_sampler::Result<T>,
    ) -> Result<T> {
        let library = self.library.lock();
        match library.as_ref() {
            Some(library) => Ok(f(library)?),
            None => Err(Error::InvalidState {
                state: self.state(),
                operation,
            }),
        }
    }

    /// Import decoded audio for `sampler_id`. See
    /// [`SampleLibrary::import_sample`](synthlink_sampler::SampleLibrary::import_sample).
    pub fn import_sample(
        &self,
        sampler_id: u32,
        import: SampleImport,
        quality: Quality,
    ) -> Result<SampleData> {
        self.with_library("import a sample", |library| {
            library.import_sample(sampler_id, import, quality)
        })
    }

    pub fn set_existing_sample(&self, sample_id: u32, sampler_id: u32) -> Result<SampleEvent> {
        self.with_library("reuse a sample", |library| {
            library.set_existing_sample(sample_id, sampler_id)
        })
    }

    pub fn loaded_samples(&self) -> Vec<SampleData> {
        self.library
            .lock()
            .as_ref()
            .map(|library| library.loaded_samples())
            .unwrap_or_default()
    }

    /// High-quality import completions, `None` once the session is released.
    pub fn processor_events(&self) -> Option<Receiver<ProcessorEvent>> {
        self.library
            .lock()
            .as_ref()
            .map(|library| library.processor_events())
    }
}
