//! Unit conversions applied when control events are written.

use crate::config::SAMPLE_RATE;

pub const FREQ_A4: f32 = 440.0;

/// Milliseconds to a whole number of samples at 44.1 kHz (floored).
#[inline]
pub fn ms_to_samples(ms: f32) -> u32 {
    let samples = (ms as f64 / 1000.0 * SAMPLE_RATE as f64).floor();
    samples.max(0.0) as u32
}

/// Semitone offset to a frequency multiplier.
#[inline]
pub fn semitones_to_ratio(semitones: f32) -> f32 {
    2.0_f32.powf(semitones / 12.0)
}

/// MIDI note number to frequency in Hz (note 69 = A4).
#[inline]
pub fn midi_to_freq(note: u8) -> f32 {
    FREQ_A4 * semitones_to_ratio(note as f32 - 69.0)
}
