//! Sample-ready mailbox and the shared sample buffer it announces.
//!
//! The mailbox is a single latest-wins slot of six words:
//! `[sequence, sampler_id, sample_id, length, channel_count, quality]`.
//! Publishers bump `sequence` and overwrite the slot; each reader remembers the
//! last sequence it returned and only reports a slot whose sequence differs.
//!
//! While a publisher rewrites the fields the high bit of `sequence` is set.
//! A reader that sees the bit, or a sequence that changed under it, treats the
//! slot as not yet published and tries again on its next poll.

use crate::error::{Error, Result};
use crate::segment::{layout, SharedSegment, WORD_BYTES};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{fence, AtomicU32, Ordering};
use std::sync::Arc;

const SEQUENCE: usize = 0;
const SAMPLER_ID: usize = 1;
const SAMPLE_ID: usize = 2;
const LENGTH: usize = 3;
const CHANNEL_COUNT: usize = 4;
const QUALITY: usize = 5;

/// Set on the sequence word while a publish is in progress.
const WRITING: u32 = 0x8000_0000;

/// A completed sample load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleEvent {
    pub sampler_id: u32,
    pub sample_id: u32,
    /// Values written to the sample buffer (all channels, planar).
    /// Zero means "reuse the already loaded sample `sample_id`".
    pub length: u32,
    pub channel_count: u32,
    pub high_quality: bool,
}

impl SampleEvent {
    /// Reject events that could not have come from a valid import.
    pub fn validate(&self, max_sample_length: usize) -> Result<()> {
        if self.length as usize > max_sample_length {
            return Err(Error::SampleTooLong {
                length: self.length as usize,
                max: max_sample_length,
            });
        }
        if self.channel_count > 2 {
            return Err(Error::InvalidSampleEvent(format!(
                "{} channels, at most 2 supported",
                self.channel_count
            )));
        }
        if self.length > 0 && self.channel_count == 0 {
            return Err(Error::InvalidSampleEvent(
                "sample data without channels".into(),
            ));
        }
        Ok(())
    }

    /// Event that points a sampler at an already loaded sample.
    pub fn reuse(sampler_id: u32, sample_id: u32) -> Self {
        Self {
            sampler_id,
            sample_id,
            length: 0,
            channel_count: 0,
            high_quality: false,
        }
    }

    pub fn is_reuse(&self) -> bool {
        self.length == 0
    }
}

/// Publishing side of the mailbox. Cheap to clone; publishers may race.
#[derive(Clone)]
pub struct MailboxWriter {
    segment: Arc<SharedSegment>,
}

impl MailboxWriter {
    pub fn attach(segment: Arc<SharedSegment>) -> Result<Self> {
        segment.expect_len(layout::mailbox_bytes())?;
        Ok(Self { segment })
    }

    /// Overwrite the slot and bump the sequence. Returns the new sequence.
    pub fn publish(&self, event: &SampleEvent) -> u32 {
        let sequence = self.segment.word(SEQUENCE);

        let next = loop {
            let current = sequence.load(Ordering::Relaxed);
            if current & WRITING != 0 {
                std::hint::spin_loop();
                continue;
            }
            let mut next = current.wrapping_add(1) & !WRITING;
            if next == 0 {
                next = 1;
            }
            if sequence
                .compare_exchange_weak(current, next | WRITING, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                break next;
            }
        };
        fence(Ordering::Release);

        let word = |index| self.segment.word(index);
        word(SAMPLER_ID).store(event.sampler_id, Ordering::Relaxed);
        word(SAMPLE_ID).store(event.sample_id, Ordering::Relaxed);
        word(LENGTH).store(event.length, Ordering::Relaxed);
        word(CHANNEL_COUNT).store(event.channel_count, Ordering::Relaxed);
        word(QUALITY).store(event.high_quality as u32, Ordering::Relaxed);

        sequence.store(next, Ordering::Release);
        next
    }
}

/// Reading side of the mailbox. Each reader tracks its own last sequence.
pub struct MailboxReader {
    segment: Arc<SharedSegment>,
    last_seen: u32,
}

impl MailboxReader {
    pub fn attach(segment: Arc<SharedSegment>) -> Result<Self> {
        segment.expect_len(layout::mailbox_bytes())?;
        Ok(Self {
            segment,
            last_seen: 0,
        })
    }

    /// The latest event, if it was published after the last one returned here.
    pub fn poll(&mut self) -> Option<SampleEvent> {
        let sequence = self.segment.word(SEQUENCE);

        let before = sequence.load(Ordering::Acquire);
        if before == 0 || before & WRITING != 0 || before == self.last_seen {
            return None;
        }

        let word = |index| self.segment.word(index).load(Ordering::Relaxed);
        let event = SampleEvent {
            sampler_id: word(SAMPLER_ID),
            sample_id: word(SAMPLE_ID),
            length: word(LENGTH),
            channel_count: word(CHANNEL_COUNT),
            high_quality: word(QUALITY) != 0,
        };

        fence(Ordering::Acquire);
        if sequence.load(Ordering::Relaxed) != before {
            return None;
        }

        self.last_seen = before;
        Some(event)
    }

    /// Sequence of the last event returned by [`poll`](Self::poll).
    pub fn last_seen(&self) -> u32 {
        self.last_seen
    }
}

/// The shared sample data buffer (planar f32, channel 0 then channel 1).
///
/// Values are stored as relaxed atomic words; visibility to the producer is
/// established by the mailbox publish that follows a write.
#[derive(Clone)]
pub struct SampleBuffer {
    segment: Arc<SharedSegment>,
}

impl SampleBuffer {
    pub fn attach(segment: Arc<SharedSegment>, max_sample_length: usize) -> Result<Self> {
        segment.expect_len(layout::sample_bytes(max_sample_length))?;
        Ok(Self { segment })
    }

    /// Capacity in f32 values.
    pub fn capacity(&self) -> usize {
        self.segment.len() / WORD_BYTES
    }

    fn cells(&self) -> &[AtomicU32] {
        // SAFETY: the segment is page aligned, its length is a multiple of 4
        // and every access goes through `AtomicU32`.
        unsafe {
            std::slice::from_raw_parts(
                self.segment.ptr_at(0) as *const AtomicU32,
                self.capacity(),
            )
        }
    }

    /// Write `channels` back to back from the start of the buffer.
    ///
    /// Nothing is written when the total exceeds the capacity.
    pub fn write_planar(&self, channels: &[&[f32]]) -> Result<usize> {
        let total: usize = channels.iter().map(|c| c.len()).sum();
        if total > self.capacity() {
            return Err(Error::SampleTooLong {
                length: total,
                max: self.capacity(),
            });
        }

        let cells = self.cells();
        let mut offset = 0;
        for channel in channels {
            for (cell, value) in cells[offset..offset + channel.len()].iter().zip(channel.iter()) {
                cell.store(value.to_bits(), Ordering::Relaxed);
            }
            offset += channel.len();
        }
        Ok(total)
    }

    /// Copy the first `length` values into `out`, replacing its contents.
    pub fn read_into(&self, length: usize, out: &mut Vec<f32>) {
        let length = length.min(self.capacity());
        out.clear();
        out.extend(
            self.cells()[..length]
                .iter()
                .map(|cell| f32::from_bits(cell.load(Ordering::Relaxed))),
        );
    }
}
