//! Single-producer/single-consumer control queue over a shared segment.
//!
//! Segment layout: `[write_index, read_index]` header words followed by the
//! payload (header lane of `capacity * E::HEADER_BYTES`, then value lane of
//! `capacity * E::VALUE_BYTES`). The write index is owned by the
//! [`QueueWriter`], the read index by the [`QueueReader`]. One slot always
//! stays empty: the queue is full when `(write + 1) % capacity == read`.
//!
//! Writes never block. A write into a full queue is dropped and reported as
//! `false`; nothing in the queue changes.

use crate::error::{Error, Result};
use crate::events::WireEvent;
use crate::segment::{layout, SharedSegment, QUEUE_HEADER_WORDS, WORD_BYTES};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

const WRITE_INDEX: usize = 0;
const READ_INDEX: usize = 1;
const PAYLOAD_OFFSET: usize = QUEUE_HEADER_WORDS * WORD_BYTES;

/// Shared view over a queue segment. Not exposed: use the writer/reader halves.
struct QueueView<E> {
    segment: Arc<SharedSegment>,
    capacity: usize,
    _event: PhantomData<fn() -> E>,
}

impl<E: WireEvent> QueueView<E> {
    fn attach(segment: Arc<SharedSegment>, capacity: usize) -> Result<Self> {
        if capacity < 2 {
            return Err(Error::InvalidConfig(format!(
                "queue '{}' needs at least 2 slots, got {capacity}",
                segment.name()
            )));
        }
        segment.expect_len(layout::queue_bytes::<E>(capacity))?;
        Ok(Self {
            segment,
            capacity,
            _event: PhantomData,
        })
    }

    #[inline]
    fn write_index(&self) -> &AtomicU32 {
        self.segment.word(WRITE_INDEX)
    }

    #[inline]
    fn read_index(&self) -> &AtomicU32 {
        self.segment.word(READ_INDEX)
    }

    #[inline]
    fn len(&self) -> usize {
        let write = self.write_index().load(Ordering::Acquire) as usize % self.capacity;
        let read = self.read_index().load(Ordering::Acquire) as usize % self.capacity;
        (write + self.capacity - read) % self.capacity
    }

    /// Byte ranges of slot `index` in both lanes.
    ///
    /// # Safety
    /// The caller must own the slot under the index protocol.
    #[inline]
    #[allow(clippy::mut_from_ref)]
    unsafe fn slot(&self, index: usize) -> (&mut [u8], &mut [u8]) {
        debug_assert!(index < self.capacity);
        let header_offset = PAYLOAD_OFFSET + index * E::HEADER_BYTES;
        let value_offset =
            PAYLOAD_OFFSET + self.capacity * E::HEADER_BYTES + index * E::VALUE_BYTES;
        (
            std::slice::from_raw_parts_mut(self.segment.ptr_at(header_offset), E::HEADER_BYTES),
            std::slice::from_raw_parts_mut(self.segment.ptr_at(value_offset), E::VALUE_BYTES),
        )
    }
}

/// Writing half of a control queue. Owns the write index.
pub struct QueueWriter<E> {
    view: QueueView<E>,
}

impl<E: WireEvent> QueueWriter<E> {
    /// Attach to a queue segment sized for `capacity` slots.
    ///
    /// At most one writer may be attached to a segment at a time.
    pub fn attach(segment: Arc<SharedSegment>, capacity: usize) -> Result<Self> {
        Ok(Self {
            view: QueueView::attach(segment, capacity)?,
        })
    }

    /// Publish one event. Returns `false` (and changes nothing) if full.
    pub fn write(&mut self, event: &E) -> bool {
        let capacity = self.view.capacity;
        let write = self.view.write_index().load(Ordering::Relaxed) as usize % capacity;
        let read = self.view.read_index().load(Ordering::Acquire) as usize % capacity;

        let next = (write + 1) % capacity;
        if next == read {
            return false;
        }

        // SAFETY: slot `write` is outside [read, write) so the reader will not
        // touch it until the release store below publishes it.
        let (header, value) = unsafe { self.view.slot(write) };
        event.encode(header, value);

        self.view
            .write_index()
            .store(next as u32, Ordering::Release);
        true
    }

    pub fn len(&self) -> usize {
        self.view.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() == self.view.capacity - 1
    }

    /// Slot count, one of which is always kept empty.
    pub fn capacity(&self) -> usize {
        self.view.capacity
    }
}

/// Result of a [`QueueReader::drain_all`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Drained {
    /// Events handed to the consumer
    pub events: usize,
    /// Slots skipped because they did not decode
    pub malformed: usize,
}

/// Reading half of a control queue. Owns the read index.
pub struct QueueReader<E> {
    view: QueueView<E>,
}

impl<E: WireEvent> QueueReader<E> {
    /// Attach to a queue segment sized for `capacity` slots.
    ///
    /// At most one reader may be attached to a segment at a time.
    pub fn attach(segment: Arc<SharedSegment>, capacity: usize) -> Result<Self> {
        Ok(Self {
            view: QueueView::attach(segment, capacity)?,
        })
    }

    /// Consume every event published before the call, in FIFO order, then
    /// release the slots with a single store of the read index.
    pub fn drain_all<F>(&mut self, mut consume: F) -> Drained
    where
        F: FnMut(E),
    {
        let capacity = self.view.capacity;
        let mut read = self.view.read_index().load(Ordering::Relaxed) as usize % capacity;
        let write = self.view.write_index().load(Ordering::Acquire) as usize % capacity;

        let mut drained = Drained::default();
        if read == write {
            return drained;
        }

        while read != write {
            // SAFETY: slots in [read, write) were published by the writer's
            // release store and are not reused until our store below.
            let (header, value) = unsafe { self.view.slot(read) };
            match E::decode(header, value) {
                Some(event) => {
                    drained.events += 1;
                    consume(event);
                }
                None => drained.malformed += 1,
            }
            read = (read + 1) % capacity;
        }

        self.view.read_index().store(read as u32, Ordering::Release);
        drained
    }

    pub fn len(&self) -> usize {
        self.view.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.view.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EffectEvent, NoteEvent, ParamKey, SamplerEvent};
    use proptest::prelude::*;
    use std::collections::VecDeque;

    fn note_queue(capacity: usize) -> (QueueWriter<NoteEvent>, QueueReader<NoteEvent>) {
        let segment = Arc::new(
            SharedSegment::allocate("midi", layout::queue_bytes::<NoteEvent>(capacity)).unwrap(),
        );
        (
            QueueWriter::attach(Arc::clone(&segment), capacity).unwrap(),
            QueueReader::attach(segment, capacity).unwrap(),
        )
    }

    #[test]
    fn test_drop_at_capacity_boundary() {
        let (mut writer, mut reader) = note_queue(4);

        let accepted: Vec<bool> = (0..10)
            .map(|i| writer.write(&NoteEvent::note_on(i, 100)))
            .collect();

        assert_eq!(accepted.iter().filter(|&&ok| ok).count(), 3);
        assert_eq!(accepted.iter().filter(|&&ok| !ok).count(), 7);
        assert!(writer.is_full());

        let mut notes = Vec::new();
        let drained = reader.drain_all(|event| notes.push(event.note));
        assert_eq!(drained.events, 3);
        assert_eq!(notes, vec![0, 1, 2]);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_drain_empty_queue() {
        let (_writer, mut reader) = note_queue(8);
        let drained = reader.drain_all(|_| panic!("nothing to drain"));
        assert_eq!(drained, Drained::default());
    }

    #[test]
    fn test_wraparound_keeps_order() {
        let (mut writer, mut reader) = note_queue(4);
        let mut seen = Vec::new();
        for round in 0..10u8 {
            assert!(writer.write(&NoteEvent::note_on(round * 2, 1)));
            assert!(writer.write(&NoteEvent::note_on(round * 2 + 1, 1)));
            reader.drain_all(|event| seen.push(event.note));
        }
        assert_eq!(seen, (0..20).collect::<Vec<u8>>());
    }

    #[test]
    fn test_malformed_slot_skipped() {
        let capacity = 4;
        let segment = Arc::new(
            SharedSegment::allocate("midi", layout::queue_bytes::<NoteEvent>(capacity)).unwrap(),
        );
        let mut writer = QueueWriter::<NoteEvent>::attach(Arc::clone(&segment), capacity).unwrap();
        let mut reader = QueueReader::<NoteEvent>::attach(Arc::clone(&segment), capacity).unwrap();

        writer.write(&NoteEvent::note_on(60, 1));
        // Corrupt the event type byte of slot 0.
        unsafe { *segment.ptr_at(PAYLOAD_OFFSET) = 9 };

        let drained = reader.drain_all(|_| {});
        assert_eq!(drained.events, 0);
        assert_eq!(drained.malformed, 1);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_sampler_queue_roundtrip() {
        let capacity = 100;
        let segment = Arc::new(
            SharedSegment::allocate("osc", layout::queue_bytes::<SamplerEvent>(capacity)).unwrap(),
        );
        let mut writer = QueueWriter::attach(Arc::clone(&segment), capacity).unwrap();
        let mut reader = QueueReader::<SamplerEvent>::attach(segment, capacity).unwrap();

        writer.write(&SamplerEvent::add(3));
        writer.write(&SamplerEvent::update(3, ParamKey::Attack, 441.0));

        let mut events = Vec::new();
        reader.drain_all(|event| events.push(event));
        assert_eq!(events[0], SamplerEvent::add(3));
        assert_eq!(events[1].key, ParamKey::Attack);
        assert_eq!(events[1].value, 441.0);
    }

    #[test]
    fn test_effect_queue_parallel_lanes() {
        let capacity = 64;
        let segment = Arc::new(
            SharedSegment::allocate("fx", layout::queue_bytes::<EffectEvent>(capacity)).unwrap(),
        );
        let mut writer = QueueWriter::attach(Arc::clone(&segment), capacity).unwrap();
        let mut reader = QueueReader::<EffectEvent>::attach(Arc::clone(&segment), capacity).unwrap();

        writer.write(&EffectEvent::edit(1, 2, 0.5));
        writer.write(&EffectEvent::edit(2, 3, 0.75));

        // Value lane starts after all 64 int triples.
        let value_lane = PAYLOAD_OFFSET + capacity * 12;
        let second_value = unsafe {
            let mut bytes = [0u8; 4];
            std::ptr::copy_nonoverlapping(segment.ptr_at(value_lane + 4), bytes.as_mut_ptr(), 4);
            f32::from_le_bytes(bytes)
        };
        assert_eq!(second_value, 0.75);

        let mut events = Vec::new();
        reader.drain_all(|event| events.push(event));
        assert_eq!(events, vec![EffectEvent::edit(1, 2, 0.5), EffectEvent::edit(2, 3, 0.75)]);
    }

    #[test]
    fn test_attach_rejects_wrong_size() {
        let segment = Arc::new(SharedSegment::allocate("midi", 16).unwrap());
        assert!(QueueWriter::<NoteEvent>::attach(segment, 64).is_err());
    }

    #[test]
    fn test_concurrent_fifo() {
        let (mut writer, mut reader) = note_queue(16);
        const COUNT: usize = 20_000;

        let producer = std::thread::spawn(move || {
            let mut i = 0usize;
            while i < COUNT {
                if writer.write(&NoteEvent::note_on((i % 128) as u8, (i / 128 % 128) as u8)) {
                    i += 1;
                } else {
                    std::thread::yield_now();
                }
            }
        });

        let mut expected = 0usize;
        while expected < COUNT {
            reader.drain_all(|event| {
                assert_eq!(event.note as usize, expected % 128);
                assert_eq!(event.velocity as usize, expected / 128 % 128);
                expected += 1;
            });
        }
        producer.join().unwrap();
    }

    proptest! {
        #[test]
        fn prop_occupancy_never_exceeds_capacity(
            capacity in 2usize..16,
            ops in proptest::collection::vec(any::<bool>(), 0..200),
        ) {
            let (mut writer, mut reader) = note_queue(capacity);
            let mut model: VecDeque<u8> = VecDeque::new();
            let mut next = 0u8;

            for write in ops {
                if write {
                    let accepted = writer.write(&NoteEvent::note_on(next, 1));
                    prop_assert_eq!(accepted, model.len() < capacity - 1);
                    if accepted {
                        model.push_back(next);
                    }
                    next = next.wrapping_add(1);
                } else {
                    let mut drained = Vec::new();
                    reader.drain_all(|event| drained.push(event.note));
                    let expected: Vec<u8> = model.drain(..).collect();
                    prop_assert_eq!(drained, expected);
                }
                prop_assert!(writer.len() <= capacity - 1);
                prop_assert_eq!(writer.len(), model.len());
            }
        }
    }
}
