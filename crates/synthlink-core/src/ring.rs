//! Interleaved stereo audio ring with a backpressure flag.
//!
//! Segment layout: `[flag, read_index, write_index]` followed by `capacity`
//! f32 values. Indices count f32 values and always move by whole frames
//! (`stride` = channel count). The ring is full when
//! `(write_index + stride) % capacity == read_index`.
//!
//! The producer ([`RingWriter`]) blocks when the ring is full: it sets the
//! flag and parks. The render side ([`RingReader`]) never waits; after each
//! read pass it clears the flag and unparks the producer once fewer than one
//! quantum of frames is left.

use crate::error::{Error, Result};
use crate::segment::{layout, SharedSegment, AUDIO_HEADER_WORDS, WORD_BYTES};
use arc_swap::ArcSwapOption;
use std::sync::atomic::{fence, AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::Thread;
use std::time::Duration;

const FLAG: usize = 0;
const READ_INDEX: usize = 1;
const WRITE_INDEX: usize = 2;
const PAYLOAD_OFFSET: usize = AUDIO_HEADER_WORDS * WORD_BYTES;

/// Flag value while the producer waits for space.
pub const FLAG_WAITING: u32 = 1;
pub const FLAG_IDLE: u32 = 0;

/// Peak magnitude of the underflow dither.
pub const DITHER_AMPLITUDE: f32 = 5e-6;

/// Shared state of one audio ring.
pub struct AudioRing {
    segment: Arc<SharedSegment>,
    capacity: usize,
    stride: usize,
    quantum: usize,
    /// Thread parked in [`RingWriter::write_frames`], if any.
    waiter: ArcSwapOption<Thread>,
}

impl AudioRing {
    /// Attach to an audio segment holding `capacity` f32 values.
    pub fn attach(
        segment: Arc<SharedSegment>,
        capacity: usize,
        channels: usize,
        quantum: usize,
    ) -> Result<Arc<Self>> {
        if channels == 0 || capacity % channels != 0 || capacity < 2 * channels {
            return Err(Error::InvalidConfig(format!(
                "ring capacity {capacity} is not a multiple of {channels} channels"
            )));
        }
        segment.expect_len(layout::audio_bytes(capacity))?;
        Ok(Arc::new(Self {
            segment,
            capacity,
            stride: channels,
            quantum,
            waiter: ArcSwapOption::empty(),
        }))
    }

    /// Split into the producer and render halves.
    pub fn split(self: &Arc<Self>) -> (RingWriter, RingReader) {
        (self.writer(), self.reader())
    }

    /// A producer half. At most one may be in use at a time.
    pub fn writer(self: &Arc<Self>) -> RingWriter {
        RingWriter {
            ring: Arc::clone(self),
            registered: false,
            park_timeout: Duration::from_millis(100),
        }
    }

    /// A render half. At most one may be in use at a time.
    pub fn reader(self: &Arc<Self>) -> RingReader {
        RingReader {
            ring: Arc::clone(self),
        }
    }

    #[inline]
    fn flag_word(&self) -> &AtomicU32 {
        self.segment.word(FLAG)
    }

    #[inline]
    fn read_word(&self) -> &AtomicU32 {
        self.segment.word(READ_INDEX)
    }

    #[inline]
    fn write_word(&self) -> &AtomicU32 {
        self.segment.word(WRITE_INDEX)
    }

    #[inline]
    fn payload(&self) -> *mut f32 {
        // SAFETY: the payload starts right after the 12-byte header, inside
        // the segment (checked at attach) and 4-byte aligned.
        unsafe { self.segment.ptr_at(PAYLOAD_OFFSET) as *mut f32 }
    }

    /// Capacity in f32 values.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Values per frame.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Frames per render callback.
    pub fn quantum(&self) -> usize {
        self.quantum
    }

    /// Readable f32 values, always in `[0, capacity)`.
    #[inline]
    pub fn available(&self) -> usize {
        let write = self.write_word().load(Ordering::Acquire) as usize % self.capacity;
        let read = self.read_word().load(Ordering::Acquire) as usize % self.capacity;
        (write + self.capacity - read) % self.capacity
    }

    /// Readable frames.
    #[inline]
    pub fn available_frames(&self) -> usize {
        self.available() / self.stride
    }

    /// Frames the producer can write without waiting.
    #[inline]
    pub fn free_frames(&self) -> usize {
        (self.capacity - self.stride - self.available()) / self.stride
    }

    /// Current flag value ([`FLAG_IDLE`] or [`FLAG_WAITING`]).
    pub fn flag(&self) -> u32 {
        self.flag_word().load(Ordering::Acquire)
    }

    /// Clear the flag and unpark the producer if it is parked.
    ///
    /// Lock-free; safe from the render callback.
    #[inline]
    pub fn wake_producer(&self) {
        self.flag_word().store(FLAG_IDLE, Ordering::Release);
        if let Some(thread) = &*self.waiter.load() {
            thread.unpark();
        }
    }
}

impl std::fmt::Debug for AudioRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioRing")
            .field("capacity", &self.capacity)
            .field("available", &self.available())
            .field("flag", &self.flag())
            .finish()
    }
}

/// How a [`RingWriter::write_frames`] call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Every frame was written.
    Written,
    /// Shutdown was requested while waiting for space.
    Cancelled { frames_written: usize },
}

/// Producer half. Owns the write index and may block.
pub struct RingWriter {
    ring: Arc<AudioRing>,
    registered: bool,
    park_timeout: Duration,
}

impl RingWriter {
    pub fn ring(&self) -> &Arc<AudioRing> {
        &self.ring
    }

    /// Upper bound on a single park. The loop re-checks space after each wake,
    /// so this only limits how long a missed wake can stall the producer.
    pub fn set_park_timeout(&mut self, timeout: Duration) {
        self.park_timeout = timeout;
    }

    /// Write interleaved `samples` (a whole number of frames), waiting for
    /// space as needed. Returns early once `shutdown` is set.
    pub fn write_frames(&mut self, samples: &[f32], shutdown: &AtomicBool) -> WriteOutcome {
        debug_assert_eq!(samples.len() % self.ring.stride, 0);
        self.register_current_thread();

        let mut offset = 0;
        while offset < samples.len() {
            if shutdown.load(Ordering::Acquire) {
                return WriteOutcome::Cancelled {
                    frames_written: offset / self.ring.stride,
                };
            }

            let frames = self.try_write_frames(&samples[offset..]);
            if frames > 0 {
                offset += frames * self.ring.stride;
                continue;
            }

            self.wait_for_space(shutdown);
        }

        WriteOutcome::Written
    }

    /// Write as many whole frames of `samples` as fit. Never blocks.
    pub fn try_write_frames(&mut self, samples: &[f32]) -> usize {
        let ring = &*self.ring;
        let frames = (samples.len() / ring.stride).min(ring.free_frames());
        if frames == 0 {
            return 0;
        }

        let mut write = ring.write_word().load(Ordering::Relaxed) as usize % ring.capacity;
        let payload = ring.payload();
        for value in &samples[..frames * ring.stride] {
            // SAFETY: `write` lies in the free region the reader never touches
            // until the release store below.
            unsafe { payload.add(write).write(*value) };
            write = (write + 1) % ring.capacity;
        }

        ring.write_word().store(write as u32, Ordering::Release);
        frames
    }

    fn register_current_thread(&mut self) {
        if !self.registered {
            self.ring
                .waiter
                .store(Some(Arc::new(std::thread::current())));
            self.registered = true;
        }
    }

    fn wait_for_space(&self, shutdown: &AtomicBool) {
        let ring = &*self.ring;
        ring.flag_word().store(FLAG_WAITING, Ordering::Release);
        // Pairs with the fence in `RingReader::read_frames`: either we see the
        // reader's new index here, or the reader sees the flag.
        fence(Ordering::SeqCst);

        if ring.free_frames() > 0 || shutdown.load(Ordering::Acquire) {
            ring.flag_word().store(FLAG_IDLE, Ordering::Release);
            return;
        }

        std::thread::park_timeout(self.park_timeout);
    }
}

impl Drop for RingWriter {
    fn drop(&mut self) {
        if self.registered {
            self.ring.waiter.store(None);
        }
    }
}

/// Result of one [`RingReader::read_frames`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadReport {
    pub frames_copied: usize,
    /// Frames filled with dither because the ring was empty.
    pub frames_dithered: usize,
    /// The flag was set and the producer was woken.
    pub woke_producer: bool,
}

impl ReadReport {
    pub fn underflowed(&self) -> bool {
        self.frames_dithered > 0
    }
}

/// Low-amplitude noise for underflow fill. Xorshift, no allocation.
#[derive(Debug, Clone)]
pub struct Dither {
    state: u32,
}

impl Dither {
    pub fn new(seed: u32) -> Self {
        Self {
            state: if seed == 0 { 1 } else { seed },
        }
    }

    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        self.state ^= self.state << 13;
        self.state ^= self.state >> 17;
        self.state ^= self.state << 5;
        let unit = self.state as f32 / u32::MAX as f32;
        (unit - 0.5) * 2.0 * DITHER_AMPLITUDE
    }
}

impl Default for Dither {
    fn default() -> Self {
        Self::new(0x9E37_79B9)
    }
}

/// Render half. Owns the read index and never blocks.
pub struct RingReader {
    ring: Arc<AudioRing>,
}

impl RingReader {
    pub fn ring(&self) -> &Arc<AudioRing> {
        &self.ring
    }

    /// Fill interleaved `out` from the ring, one frame at a time, with dither
    /// for every frame the ring cannot supply. Then wake the producer if it
    /// waits and less than one quantum is left.
    ///
    /// The threshold compares whole frames with the frame quantum. Counting
    /// interleaved values instead would halve it for stereo and wake the
    /// producer only once less than half a quantum is buffered.
    #[inline]
    pub fn read_frames(&mut self, out: &mut [f32], dither: &mut Dither) -> ReadReport {
        let ring = &*self.ring;
        let mut report = ReadReport::default();

        let mut read = ring.read_word().load(Ordering::Relaxed) as usize % ring.capacity;
        let write = ring.write_word().load(Ordering::Acquire) as usize % ring.capacity;
        let payload = ring.payload();

        for frame in out.chunks_exact_mut(ring.stride) {
            if read == write {
                for sample in frame.iter_mut() {
                    *sample = dither.next_sample();
                }
                report.frames_dithered += 1;
            } else {
                for (channel, sample) in frame.iter_mut().enumerate() {
                    // SAFETY: [read, write) was published by the writer's
                    // release store; stride divides capacity so the frame
                    // does not straddle the end.
                    *sample = unsafe { payload.add(read + channel).read() };
                }
                read = (read + ring.stride) % ring.capacity;
                report.frames_copied += 1;
            }
        }

        ring.read_word().store(read as u32, Ordering::Release);
        fence(Ordering::SeqCst);

        if ring.available_frames() < ring.quantum
            && ring.flag_word().load(Ordering::Acquire) == FLAG_WAITING
        {
            ring.wake_producer();
            report.woke_producer = true;
        }

        report
    }
}
