//! The boundary between the producer thread and the synthesis code.

use synthlink_core::{EffectEvent, NoteEvent, SampleEvent, SamplerEvent};

/// Synthesis engine driven by the producer thread.
///
/// Every method runs on the producer thread. Events arrive already drained
/// from their queues, in FIFO order per queue; `render` is called once per
/// quantum after all events for that quantum were delivered.
pub trait SynthEngine: Send + 'static {
    fn on_note(&mut self, _event: NoteEvent) {}

    fn on_sampler(&mut self, _event: SamplerEvent) {}

    fn on_effect(&mut self, _event: EffectEvent) {}

    /// A sample finished loading. `data` is empty for a reuse event
    /// (`event.length == 0`), planar otherwise.
    fn on_sample_ready(&mut self, _event: &SampleEvent, _data: &[f32]) {}

    /// Fill one quantum of interleaved stereo. `out` arrives zeroed.
    fn render(&mut self, out: &mut [f32]);

    fn name(&self) -> &str {
        "engine"
    }
}

/// Engine that renders silence and ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilenceEngine;

impl SynthEngine for SilenceEngine {
    fn render(&mut self, out: &mut [f32]) {
        out.fill(0.0);
    }

    fn name(&self) -> &str {
        "silence"
    }
}

impl<E: SynthEngine + ?Sized> SynthEngine for Box<E> {
    fn on_note(&mut self, event: NoteEvent) {
        (**self).on_note(event)
    }

    fn on_sampler(&mut self, event: SamplerEvent) {
        (**self).on_sampler(event)
    }

    fn on_effect(&mut self, event: EffectEvent) {
        (**self).on_effect(event)
    }

    fn on_sample_ready(&mut self, event: &SampleEvent, data: &[f32]) {
        (**self).on_sample_ready(event, data)
    }

    fn render(&mut self, out: &mut [f32]) {
        (**self).render(out)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_engine() {
        let mut engine: Box<dyn SynthEngine> = Box::new(SilenceEngine);
        let mut out = [1.0f32; 8];
        engine.on_note(NoteEvent::note_on(60, 100));
        engine.render(&mut out);
        assert_eq!(out, [0.0; 8]);
        assert_eq!(engine.name(), "silence");
    }
}
