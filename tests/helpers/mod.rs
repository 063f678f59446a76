//! Test helpers and fixtures for synthlink integration tests
//!
//! Sessions run headless: tests take the `RenderConsumer` and call
//! `process` themselves, which makes the test the render clock.

#![allow(dead_code)]

pub mod tolerances;

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use synthlink::prelude::*;
use synthlink::core::ReadReport;
use synthlink::{EffectEvent, NoteEvent, SampleEvent, SamplerEvent};

/// Small sample buffer so tests don't map the full 64 MB segment.
pub const TEST_MAX_SAMPLE_LENGTH: usize = 44_100 * 4;

/// Upper bound for anything a test waits on.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn test_config() -> SessionConfig {
    SessionConfig {
        max_sample_length: TEST_MAX_SAMPLE_LENGTH,
        ..Default::default()
    }
}

/// Everything a [`RecordingEngine`] saw, shared with the test.
#[derive(Default)]
pub struct Recorded {
    pub notes: Vec<NoteEvent>,
    pub sampler_events: Vec<SamplerEvent>,
    pub effect_events: Vec<EffectEvent>,
    pub samples: Vec<(SampleEvent, Vec<f32>)>,
    pub blocks: usize,
}

/// Engine that records events and renders silence.
pub struct RecordingEngine {
    recorded: Arc<Mutex<Recorded>>,
}

impl SynthEngine for RecordingEngine {
    fn on_note(&mut self, event: NoteEvent) {
        self.recorded.lock().notes.push(event);
    }

    fn on_sampler(&mut self, event: SamplerEvent) {
        self.recorded.lock().sampler_events.push(event);
    }

    fn on_effect(&mut self, event: EffectEvent) {
        self.recorded.lock().effect_events.push(event);
    }

    fn on_sample_ready(&mut self, event: &SampleEvent, data: &[f32]) {
        self.recorded.lock().samples.push((*event, data.to_vec()));
    }

    fn render(&mut self, out: &mut [f32]) {
        out.fill(0.0);
        self.recorded.lock().blocks += 1;
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Headless orchestrator whose sessions run a [`RecordingEngine`].
pub fn recording_orchestrator(
    config: SessionConfig,
    autostart: bool,
) -> (Orchestrator, Arc<Mutex<Recorded>>) {
    init_tracing();
    let recorded = Arc::new(Mutex::new(Recorded::default()));
    let shared = Arc::clone(&recorded);

    let orchestrator = Orchestrator::builder()
        .config(config)
        .autostart(autostart)
        .engine(move || {
            Box::new(RecordingEngine {
                recorded: Arc::clone(&shared),
            })
        })
        .build()
        .expect("Failed to build orchestrator");

    (orchestrator, recorded)
}

/// Headless orchestrator rendering silence.
pub fn silent_orchestrator(config: SessionConfig) -> Orchestrator {
    init_tracing();
    Orchestrator::builder()
        .config(config)
        .build()
        .expect("Failed to build orchestrator")
}

/// Poll `condition` until it holds or [`TEST_TIMEOUT`] passes.
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + TEST_TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    condition()
}

/// One render callback of a full quantum.
pub fn render_quantum(consumer: &mut RenderConsumer) -> (Vec<f32>, ReadReport) {
    let mut out = vec![0.0f32; consumer.quantum() * consumer.channels()];
    let report = consumer.process(&mut out);
    (out, report)
}

/// Render `callbacks` quanta, giving the producer time to refill before each.
///
/// Returns how many callbacks underflowed.
pub fn render_paced(consumer: &mut RenderConsumer, callbacks: usize) -> usize {
    let mut underflows = 0;
    for _ in 0..callbacks {
        let ring = Arc::clone(consumer.ring());
        assert!(
            wait_until(|| ring.available_frames() >= ring.quantum()),
            "Producer did not refill the ring"
        );
        let (_, report) = render_quantum(consumer);
        if report.underflowed() {
            underflows += 1;
        }
    }
    underflows
}

pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().map(|s| s.abs()).fold(0.0_f32, f32::max)
}

/// Planar test tone, `frames` long per channel.
pub fn generate_tone(frames: usize, channels: usize) -> Vec<Vec<f32>> {
    (0..channels)
        .map(|c| {
            (0..frames)
                .map(|i| ((i + c * 7) as f32 * 0.05).sin() * 0.5)
                .collect()
        })
        .collect()
}
