//! High-quality sample processing thread.
//!
//! Re-pitches imported samples four octaves up, from the C4 they are assumed
//! to be recorded at to a C0 reference table, with windowed-sinc
//! interpolation, then resamples to 44.1 kHz. Samplers can then play any
//! note by reading the table slower instead of interpolating upward.

use crate::error::{Error, Result};
use crate::library::{Records, SampleStore};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use std::f32::consts::PI;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use synthlink_core::config::SAMPLE_RATE;
use synthlink_core::SampleEvent;

/// Taps on each side of the interpolation point.
const WINDOW_SIZE: usize = 64;
const ORIGINAL_NOTE: i32 = 60;
const TARGET_NOTE: i32 = 12;

const COMMAND_CAPACITY: usize = 16;

/// Hamming window over `WINDOW_SIZE + 1` taps.
fn hamming_window() -> [f32; WINDOW_SIZE + 1] {
    let mut window = [0.0f32; WINDOW_SIZE + 1];
    for (n, w) in window.iter_mut().enumerate() {
        *w = 0.54 - 0.46 * ((2.0 * PI * n as f32) / (WINDOW_SIZE as f32 - 1.0)).cos();
    }
    window
}

#[inline]
fn sinc(x: f32) -> f32 {
    if x == 0.0 {
        1.0
    } else {
        (PI * x).sin() / (PI * x)
    }
}

/// Normalized windowed-sinc value of `samples` at fractional `position`.
fn interpolate(samples: &[f32], position: f32, window: &[f32; WINDOW_SIZE + 1]) -> f32 {
    let half = (WINDOW_SIZE / 2) as isize;
    let base = position.floor() as isize;

    let mut sum = 0.0;
    let mut weight = 0.0;
    for offset in -half..=half {
        let index = base + offset;
        if index < 0 || index as usize >= samples.len() {
            continue;
        }
        let tap = sinc(position - index as f32) * window[(offset + half) as usize];
        sum += samples[index as usize] * tap;
        weight += tap;
    }

    if weight != 0.0 {
        sum / weight
    } else {
        0.0
    }
}

fn pitch_factor() -> f32 {
    2f32.powf((ORIGINAL_NOTE - TARGET_NOTE) as f32 / 12.0)
}

/// Length of the C0 table built from `len` samples at `sample_rate`.
pub fn c0_table_len(len: usize, sample_rate: f32) -> usize {
    let resample = sample_rate / SAMPLE_RATE as f32;
    (len as f32 * pitch_factor() / resample).floor() as usize
}

/// Build the C0 reference table of one channel.
pub fn c0_table(samples: &[f32], sample_rate: f32) -> Vec<f32> {
    let pitch = pitch_factor();
    let resample = sample_rate / SAMPLE_RATE as f32;
    let window = hamming_window();

    (0..c0_table_len(samples.len(), sample_rate))
        .map(|i| interpolate(samples, i as f32 / pitch * resample, &window))
        .collect()
}

/// A sample waiting for high-quality processing.
#[derive(Debug, Clone)]
pub(crate) struct HqRequest {
    pub sampler_id: u32,
    pub sample_id: u32,
    pub sample_rate: u32,
    pub channels: Vec<Vec<f32>>,
}

pub(crate) enum ProcessorCommand {
    Process(HqRequest),
    Shutdown,
}

/// Outcome of a high-quality import.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessorEvent {
    /// Written to the sample buffer and published to the producer.
    Completed(SampleEvent),
    /// Dropped; the library no longer lists `sample_id`.
    Rejected { sample_id: u32, reason: String },
}

/// Worker thread running [`c0_table`] off the caller's thread.
pub struct SampleProcessor {
    command_tx: Sender<ProcessorCommand>,
    events_rx: Receiver<ProcessorEvent>,
    thread_handle: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl SampleProcessor {
    pub(crate) fn spawn(store: Arc<SampleStore>, records: Records) -> Result<Self> {
        let (command_tx, command_rx) = bounded(COMMAND_CAPACITY);
        let (events_tx, events_rx) = unbounded();
        let shutdown = Arc::new(AtomicBool::new(false));

        let handle = {
            let shutdown = Arc::clone(&shutdown);
            thread::Builder::new()
                .name("synthlink-sample-processor".into())
                .spawn(move || processor_loop(command_rx, events_tx, store, records, &shutdown))
                .map_err(Error::Spawn)?
        };

        Ok(Self {
            command_tx,
            events_rx,
            thread_handle: Some(handle),
            shutdown,
        })
    }

    pub(crate) fn submit(&self, request: HqRequest) -> Result<()> {
        if self.thread_handle.is_none() {
            return Err(Error::ProcessorStopped);
        }
        self.command_tx
            .send(ProcessorCommand::Process(request))
            .map_err(|_| Error::ProcessorStopped)
    }

    pub fn events(&self) -> Receiver<ProcessorEvent> {
        self.events_rx.clone()
    }

    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let _ = self.command_tx.try_send(ProcessorCommand::Shutdown);

        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SampleProcessor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn processor_loop(
    commands: Receiver<ProcessorCommand>,
    events: Sender<ProcessorEvent>,
    store: Arc<SampleStore>,
    records: Records,
    shutdown: &AtomicBool,
) {
    while let Ok(command) = commands.recv() {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        let request = match command {
            ProcessorCommand::Process(request) => request,
            ProcessorCommand::Shutdown => break,
        };

        let sample_id = request.sample_id;
        let event = match process(&store, request) {
            Ok(event) => {
                records.lock().mark_ready(sample_id);
                tracing::debug!(
                    "Processed high quality sample {} ({} values)",
                    event.sample_id,
                    event.length
                );
                ProcessorEvent::Completed(event)
            }
            Err(err) => {
                tracing::warn!("High quality processing of sample {} failed: {}", sample_id, err);
                records.lock().remove(sample_id);
                ProcessorEvent::Rejected {
                    sample_id,
                    reason: err.to_string(),
                }
            }
        };
        let _ = events.send(event);
    }
}

fn process(store: &SampleStore, request: HqRequest) -> Result<SampleEvent> {
    let sample_rate = request.sample_rate as f32;
    let total: usize = request
        .channels
        .iter()
        .map(|channel| c0_table_len(channel.len(), sample_rate))
        .sum();
    if total > store.capacity() {
        return Err(Error::SampleTooLong {
            length: total,
            max: store.capacity(),
        });
    }

    let tables: Vec<Vec<f32>> = request
        .channels
        .iter()
        .map(|channel| c0_table(channel, sample_rate))
        .collect();
    let planar: Vec<&[f32]> = tables.iter().map(|t| t.as_slice()).collect();

    store.store(
        &planar,
        SampleEvent {
            sampler_id: request.sampler_id,
            sample_id: request.sample_id,
            length: 0,
            channel_count: planar.len() as u32,
            high_quality: true,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_table_length() {
        // Four octaves up at the same rate
        assert_eq!(c0_table_len(100, 44100.0), 1600);
        // Half the source rate halves the table
        assert_eq!(c0_table_len(100, 88200.0), 800);
    }

    #[test]
    fn test_constant_signal_preserved() {
        let table = c0_table(&[0.5; 32], 44100.0);
        assert_eq!(table.len(), 512);
        for value in &table {
            assert_relative_eq!(*value, 0.5, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_integer_positions_hit_source() {
        let samples: Vec<f32> = (0..16).map(|i| (i as f32 * 0.3).sin()).collect();
        let table = c0_table(&samples, 44100.0);
        // Every 16th output lands exactly on a source sample.
        for (i, expected) in samples.iter().enumerate() {
            assert_relative_eq!(table[i * 16], *expected, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_window_symmetric_endpoints() {
        let window = hamming_window();
        assert_relative_eq!(window[0], 0.08, epsilon = 1e-6);
        assert!(window[WINDOW_SIZE / 2] > 0.99);
    }

    #[test]
    fn test_empty_input() {
        assert!(c0_table(&[], 44100.0).is_empty());
    }
}
