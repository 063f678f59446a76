//! Shared memory segments.
//!
//! Every logical buffer of a session (audio ring, each control queue, the
//! sample mailbox, the sample data buffer) lives in its own contiguous,
//! zero-initialized anonymous mapping. Views over a segment ([`crate::AudioRing`],
//! [`crate::QueueWriter`], [`crate::MailboxReader`]) hold an `Arc` to it, so
//! the memory is only unmapped once the last execution context lets go.

use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::events::{EffectEvent, NoteEvent, SamplerEvent, WireEvent};
use memmap2::MmapMut;
use std::ptr::NonNull;
use std::sync::atomic::AtomicU32;
use std::sync::Arc;

/// Size of one header word (index, flag or mailbox field).
pub const WORD_BYTES: usize = 4;

/// Audio segment header: `[flag, read_index, write_index]`.
pub const AUDIO_HEADER_WORDS: usize = 3;
/// Control queue header: `[write_index, read_index]`.
pub const QUEUE_HEADER_WORDS: usize = 2;
/// Mailbox: `[sequence, sampler_id, sample_id, length, channel_count, quality]`.
pub const MAILBOX_WORDS: usize = 6;

/// A contiguous block of memory shared between execution contexts.
pub struct SharedSegment {
    name: &'static str,
    base: NonNull<u8>,
    len: usize,
    _map: MmapMut,
}

// SAFETY: the mapping is never reallocated or moved while the segment lives.
// Header words are only touched through atomics; payload bytes are handed out
// as raw pointers whose exclusive use is guaranteed by the index protocols of
// the views built on top (one writer context per region at any time).
unsafe impl Send for SharedSegment {}
unsafe impl Sync for SharedSegment {}

impl SharedSegment {
    /// Map `len` zeroed bytes.
    pub fn allocate(name: &'static str, len: usize) -> Result<Self> {
        let mut map = MmapMut::map_anon(len.max(WORD_BYTES)).map_err(|source| Error::SegmentMap {
            name,
            bytes: len,
            source,
        })?;
        let base = NonNull::new(map.as_mut_ptr()).ok_or_else(|| Error::SegmentMap {
            name,
            bytes: len,
            source: std::io::Error::other("null mapping"),
        })?;

        tracing::debug!("Mapped shared segment '{}' ({} bytes)", name, len);

        Ok(Self {
            name,
            base,
            len,
            _map: map,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Usable length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Check the segment is exactly `expected` bytes.
    pub fn expect_len(&self, expected: usize) -> Result<()> {
        if self.len != expected {
            return Err(Error::SegmentSize {
                name: self.name,
                expected,
                actual: self.len,
            });
        }
        Ok(())
    }

    /// The `index`-th 32-bit header word.
    ///
    /// # Panics
    /// If the word lies outside the segment.
    #[inline]
    pub fn word(&self, index: usize) -> &AtomicU32 {
        let offset = index * WORD_BYTES;
        assert!(
            offset + WORD_BYTES <= self.len,
            "word {index} out of bounds for segment '{}'",
            self.name
        );
        // SAFETY: in bounds (checked above), 4-byte aligned because the
        // mapping is page aligned and offsets are multiples of 4, and
        // `AtomicU32` has the same layout as `u32`.
        unsafe { &*(self.base.as_ptr().add(offset) as *const AtomicU32) }
    }

    /// Raw pointer to byte `offset`.
    ///
    /// # Safety
    /// `offset + len` of the intended access must lie inside the segment and
    /// the caller must own that byte range under the view's index protocol.
    #[inline]
    pub(crate) unsafe fn ptr_at(&self, offset: usize) -> *mut u8 {
        debug_assert!(offset <= self.len);
        self.base.as_ptr().add(offset)
    }
}

impl std::fmt::Debug for SharedSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSegment")
            .field("name", &self.name)
            .field("len", &self.len)
            .finish()
    }
}

/// Byte sizes of each segment for a given configuration.
pub mod layout {
    use super::*;

    pub fn audio_bytes(ring_capacity: usize) -> usize {
        AUDIO_HEADER_WORDS * WORD_BYTES + ring_capacity * std::mem::size_of::<f32>()
    }

    pub fn queue_bytes<E: WireEvent>(capacity: usize) -> usize {
        QUEUE_HEADER_WORDS * WORD_BYTES + capacity * E::SLOT_BYTES
    }

    pub fn mailbox_bytes() -> usize {
        MAILBOX_WORDS * WORD_BYTES
    }

    pub fn sample_bytes(max_sample_length: usize) -> usize {
        max_sample_length * std::mem::size_of::<f32>()
    }
}

/// Every shared segment of one session.
#[derive(Debug, Clone)]
pub struct SessionSegments {
    pub audio: Arc<SharedSegment>,
    pub midi: Arc<SharedSegment>,
    pub osc: Arc<SharedSegment>,
    pub fx: Arc<SharedSegment>,
    pub mailbox: Arc<SharedSegment>,
    pub samples: Arc<SharedSegment>,
}

impl SessionSegments {
    /// Allocate and lay out all segments for `config`.
    pub fn allocate(config: &SessionConfig) -> Result<Self> {
        config.validate()?;

        let segments = Self {
            audio: Arc::new(SharedSegment::allocate(
                "audio",
                layout::audio_bytes(config.ring_capacity()),
            )?),
            midi: Arc::new(SharedSegment::allocate(
                "midi",
                layout::queue_bytes::<NoteEvent>(config.midi_queue_capacity),
            )?),
            osc: Arc::new(SharedSegment::allocate(
                "osc",
                layout::queue_bytes::<SamplerEvent>(config.osc_queue_capacity),
            )?),
            fx: Arc::new(SharedSegment::allocate(
                "fx",
                layout::queue_bytes::<EffectEvent>(config.fx_queue_capacity),
            )?),
            mailbox: Arc::new(SharedSegment::allocate(
                "sample_event",
                layout::mailbox_bytes(),
            )?),
            samples: Arc::new(SharedSegment::allocate(
                "sample_buffer",
                layout::sample_bytes(config.max_sample_length),
            )?),
        };

        Ok(segments)
    }

    /// Total mapped bytes across all segments.
    pub fn total_bytes(&self) -> usize {
        [
            &self.audio,
            &self.midi,
            &self.osc,
            &self.fx,
            &self.mailbox,
            &self.samples,
        ]
        .iter()
        .map(|s| s.len())
        .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    #[test]
    fn test_segment_is_zeroed() {
        let segment = SharedSegment::allocate("test", 64).unwrap();
        assert_eq!(segment.len(), 64);
        for i in 0..16 {
            assert_eq!(segment.word(i).load(Ordering::Relaxed), 0);
        }
    }

    #[test]
    fn test_word_roundtrip() {
        let segment = SharedSegment::allocate("test", 12).unwrap();
        segment.word(2).store(7, Ordering::Release);
        assert_eq!(segment.word(2).load(Ordering::Acquire), 7);
    }

    #[test]
    #[should_panic]
    fn test_word_out_of_bounds() {
        let segment = SharedSegment::allocate("test", 8).unwrap();
        segment.word(2);
    }

    #[test]
    fn test_expect_len() {
        let segment = SharedSegment::allocate("test", 8).unwrap();
        assert!(segment.expect_len(8).is_ok());
        assert!(matches!(
            segment.expect_len(12),
            Err(Error::SegmentSize {
                expected: 12,
                actual: 8,
                ..
            })
        ));
    }

    #[test]
    fn test_session_layout() {
        let config = SessionConfig {
            max_sample_length: 1024,
            ..Default::default()
        };
        let segments = SessionSegments::allocate(&config).unwrap();
        assert_eq!(segments.audio.len(), 12 + 2048 * 4);
        assert_eq!(segments.midi.len(), 8 + 64 * 4);
        assert_eq!(segments.osc.len(), 8 + 100 * 8);
        assert_eq!(segments.fx.len(), 8 + 64 * 16);
        assert_eq!(segments.mailbox.len(), 24);
        assert_eq!(segments.samples.len(), 4096);
    }
}
