//! Real-time render consumer.

use crate::diagnostics::Diagnostics;
use crate::ring::{AudioRing, Dither, ReadReport, RingReader};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Connects or disconnects a [`RenderConsumer`] from its ring.
///
/// A disconnected consumer writes zeros and no longer touches shared memory.
#[derive(Debug, Clone)]
pub struct RenderSwitch {
    connected: Arc<AtomicBool>,
}

impl RenderSwitch {
    fn new() -> Self {
        Self {
            connected: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::Release);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

/// Drains the audio ring once per output callback.
///
/// Never blocks, allocates or logs. Underflows are counted in [`Diagnostics`]
/// exactly once per callback that needed dither.
pub struct RenderConsumer {
    reader: RingReader,
    dither: Dither,
    diagnostics: Arc<Diagnostics>,
    switch: RenderSwitch,
}

impl RenderConsumer {
    pub fn new(reader: RingReader, diagnostics: Arc<Diagnostics>) -> Self {
        Self {
            reader,
            dither: Dither::default(),
            diagnostics,
            switch: RenderSwitch::new(),
        }
    }

    pub fn switch(&self) -> RenderSwitch {
        self.switch.clone()
    }

    pub fn ring(&self) -> &Arc<AudioRing> {
        self.reader.ring()
    }

    pub fn channels(&self) -> usize {
        self.reader.ring().stride()
    }

    /// Frames per callback the ring was sized for.
    pub fn quantum(&self) -> usize {
        self.reader.ring().quantum()
    }

    /// Fill interleaved stereo `out`.
    #[inline]
    pub fn process(&mut self, out: &mut [f32]) -> ReadReport {
        if !self.switch.is_connected() {
            out.fill(0.0);
            return ReadReport::default();
        }

        let report = self.reader.read_frames(out, &mut self.dither);

        if report.underflowed() {
            self.diagnostics.record_underflow(report.frames_dithered);
        }
        if report.woke_producer {
            self.diagnostics.record_wake();
        }

        report
    }
}
