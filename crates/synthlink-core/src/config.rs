//! Session configuration.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

pub const SAMPLE_RATE: u32 = 44_100;
/// Frames handed to the output device per render callback.
pub const RENDER_QUANTUM: usize = 512;
/// Number of render quanta the audio ring can hold.
pub const QUEUE_LENGTH: usize = 2;
pub const CHANNELS: usize = 2;

pub const MIDI_QUEUE_CAPACITY: usize = 64;
pub const OSC_QUEUE_CAPACITY: usize = 100;
pub const FX_QUEUE_CAPACITY: usize = 64;

/// Largest sample (in f32 values, all channels) the shared sample buffer holds.
pub const MAX_SAMPLE_LENGTH: usize = 2 * 8_000_000;

/// Sizes of every shared segment in a session.
///
/// Fixed once a session is allocated; a new configuration only applies to the
/// next session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Sample rate in Hz (default: 44100)
    pub sample_rate: u32,
    /// Frames per render callback (default: 512)
    pub render_quantum: usize,
    /// Render quanta buffered in the audio ring (default: 2)
    pub queue_length: usize,
    /// Interleaved output channels (default: 2, the only supported value)
    pub channels: usize,
    /// MIDI queue slots (default: 64)
    pub midi_queue_capacity: usize,
    /// Oscillator/sampler queue slots (default: 100)
    pub osc_queue_capacity: usize,
    /// Effect queue slots (default: 64)
    pub fx_queue_capacity: usize,
    /// Sample buffer length in f32 values (default: 16,000,000)
    pub max_sample_length: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            render_quantum: RENDER_QUANTUM,
            queue_length: QUEUE_LENGTH,
            channels: CHANNELS,
            midi_queue_capacity: MIDI_QUEUE_CAPACITY,
            osc_queue_capacity: OSC_QUEUE_CAPACITY,
            fx_queue_capacity: FX_QUEUE_CAPACITY,
            max_sample_length: MAX_SAMPLE_LENGTH,
        }
    }
}

impl SessionConfig {
    /// Audio ring length in f32 values.
    pub fn ring_capacity(&self) -> usize {
        self.render_quantum * self.queue_length * self.channels
    }

    /// Duration of one render quantum.
    pub fn quantum_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.render_quantum as f64 / self.sample_rate as f64)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(Error::InvalidConfig("sample_rate must be non-zero".into()));
        }
        if self.render_quantum == 0 || self.queue_length == 0 {
            return Err(Error::InvalidConfig(format!(
                "ring needs at least one quantum (render_quantum={}, queue_length={})",
                self.render_quantum, self.queue_length
            )));
        }
        if self.channels != CHANNELS {
            return Err(Error::InvalidConfig(format!(
                "only interleaved stereo is supported, got {} channels",
                self.channels
            )));
        }
        for (name, capacity) in [
            ("midi_queue_capacity", self.midi_queue_capacity),
            ("osc_queue_capacity", self.osc_queue_capacity),
            ("fx_queue_capacity", self.fx_queue_capacity),
        ] {
            // One slot always stays empty to tell full from empty.
            if capacity < 2 {
                return Err(Error::InvalidConfig(format!(
                    "{name} must be at least 2, got {capacity}"
                )));
            }
        }
        if self.max_sample_length == 0 {
            return Err(Error::InvalidConfig(
                "max_sample_length must be non-zero".into(),
            ));
        }
        Ok(())
    }
}
