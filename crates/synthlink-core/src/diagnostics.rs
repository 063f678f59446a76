//! Overload and underflow counters.
//!
//! The render callback cannot log, so everything it wants to report is a
//! relaxed counter bump. Non-real-time contexts read a [`DiagnosticsSnapshot`]
//! and decide what to trace.

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Diagnostics {
    /// Render callbacks that emitted at least one dither frame
    underflow_callbacks: AtomicU64,
    /// Total frames filled with dither
    underflow_frames: AtomicU64,
    /// Times the render path cleared the backpressure flag and woke the producer
    producer_wakes: AtomicU64,
    /// Control events dropped because their queue was full
    dropped_midi: AtomicU64,
    dropped_osc: AtomicU64,
    dropped_fx: AtomicU64,
    /// Slots the producer skipped because they held unknown discriminants
    malformed_events: AtomicU64,
}

/// Point-in-time copy of [`Diagnostics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiagnosticsSnapshot {
    pub underflow_callbacks: u64,
    pub underflow_frames: u64,
    pub producer_wakes: u64,
    pub dropped_midi: u64,
    pub dropped_osc: u64,
    pub dropped_fx: u64,
    pub malformed_events: u64,
}

impl DiagnosticsSnapshot {
    pub fn dropped_total(&self) -> u64 {
        self.dropped_midi + self.dropped_osc + self.dropped_fx
    }
}

/// Which control queue dropped an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    Midi,
    Osc,
    Fx,
}

impl QueueKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Midi => "MIDI",
            Self::Osc => "OSC",
            Self::Fx => "FX",
        }
    }
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_underflow(&self, frames: usize) {
        self.underflow_callbacks.fetch_add(1, Ordering::Relaxed);
        self.underflow_frames
            .fetch_add(frames as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_wake(&self) {
        self.producer_wakes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_drop(&self, queue: QueueKind) {
        let counter = match queue {
            QueueKind::Midi => &self.dropped_midi,
            QueueKind::Osc => &self.dropped_osc,
            QueueKind::Fx => &self.dropped_fx,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.malformed_events.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn underflow_callbacks(&self) -> u64 {
        self.underflow_callbacks.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            underflow_callbacks: self.underflow_callbacks.load(Ordering::Relaxed),
            underflow_frames: self.underflow_frames.load(Ordering::Relaxed),
            producer_wakes: self.producer_wakes.load(Ordering::Relaxed),
            dropped_midi: self.dropped_midi.load(Ordering::Relaxed),
            dropped_osc: self.dropped_osc.load(Ordering::Relaxed),
            dropped_fx: self.dropped_fx.load(Ordering::Relaxed),
            malformed_events: self.malformed_events.load(Ordering::Relaxed),
        }
    }

    /// Zero the underflow counters (e.g. once playback reached steady state).
    pub fn reset_underflows(&self) {
        self.underflow_callbacks.store(0, Ordering::Relaxed);
        self.underflow_frames.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let diagnostics = Diagnostics::new();
        diagnostics.record_underflow(12);
        diagnostics.record_underflow(3);
        diagnostics.record_drop(QueueKind::Midi);
        diagnostics.record_drop(QueueKind::Fx);
        diagnostics.record_wake();

        let snap = diagnostics.snapshot();
        assert_eq!(snap.underflow_callbacks, 2);
        assert_eq!(snap.underflow_frames, 15);
        assert_eq!(snap.dropped_total(), 2);
        assert_eq!(snap.producer_wakes, 1);

        diagnostics.reset_underflows();
        assert_eq!(diagnostics.underflow_callbacks(), 0);
        assert_eq!(diagnostics.snapshot().dropped_midi, 1);
    }
}
