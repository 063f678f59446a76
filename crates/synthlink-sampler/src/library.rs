//! Imported samples: id assignment, length limits, publication to the producer.

use crate::error::{Error, Result};
use crate::processor::{HqRequest, ProcessorEvent, SampleProcessor};
use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use synthlink_core::{MailboxWriter, SampleBuffer, SampleEvent};

/// Stereo samples shorter than this keep both channels on the HQ path.
pub const HQ_STEREO_MAX_SECONDS: f32 = 5.0;
/// Samples shorter than this are accepted on the HQ path (channel 0 only).
pub const HQ_MONO_MAX_SECONDS: f32 = 10.0;

/// Decoded audio ready to import. Channels are planar.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleImport {
    pub title: String,
    pub sample_rate: u32,
    pub channels: Vec<Vec<f32>>,
}

impl SampleImport {
    pub fn new(title: impl Into<String>, sample_rate: u32, channels: Vec<Vec<f32>>) -> Self {
        Self {
            title: title.into(),
            sample_rate,
            channels,
        }
    }

    pub fn duration_seconds(&self) -> f32 {
        match self.channels.first() {
            Some(channel) if self.sample_rate > 0 => channel.len() as f32 / self.sample_rate as f32,
            _ => 0.0,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(Error::InvalidSample(format!(
                "'{}' has a sample rate of 0",
                self.title
            )));
        }
        match self.channels.first() {
            Some(channel) if !channel.is_empty() => Ok(()),
            _ => Err(Error::EmptySample),
        }
    }

    /// Channel 0, then channel 1 if present. Further channels are ignored.
    fn planar(&self) -> Vec<&[f32]> {
        self.channels.iter().take(2).map(|c| c.as_slice()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Quality {
    #[default]
    Standard,
    /// Re-pitched to the C0 reference table by the sample processor.
    High,
}

/// A loaded sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleData {
    pub title: String,
    pub sample_id: u32,
    pub duration_seconds: f32,
    pub high_quality: bool,
}

/// Sample buffer and mailbox, written together so each publish announces the
/// data written just before it.
pub(crate) struct SampleStore {
    buffer: SampleBuffer,
    mailbox: MailboxWriter,
    lock: Mutex<()>,
}

impl SampleStore {
    pub(crate) fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Write `channels` and publish `event` with its length filled in.
    pub(crate) fn store(&self, channels: &[&[f32]], mut event: SampleEvent) -> Result<SampleEvent> {
        let total: usize = channels.iter().map(|c| c.len()).sum();
        if total > self.capacity() {
            return Err(Error::SampleTooLong {
                length: total,
                max: self.capacity(),
            });
        }

        let _guard = self.lock.lock();
        self.buffer.write_planar(channels)?;
        event.length = total as u32;
        self.mailbox.publish(&event);
        Ok(event)
    }

    pub(crate) fn announce(&self, event: &SampleEvent) {
        let _guard = self.lock.lock();
        self.mailbox.publish(event);
    }
}

/// Loaded samples. High-quality imports are listed as soon as they are queued
/// but stay pending until the processor has published their table.
#[derive(Debug, Default)]
pub(crate) struct RecordSet {
    loaded: Vec<SampleData>,
    pending: Vec<u32>,
}

impl RecordSet {
    /// Smallest id not used by any record.
    fn next_id(&self) -> u32 {
        let mut id = 0;
        while self.loaded.iter().any(|record| record.sample_id == id) {
            id += 1;
        }
        id
    }

    fn insert(&mut self, data: SampleData, pending: bool) {
        if pending {
            self.pending.push(data.sample_id);
        }
        self.loaded.push(data);
    }

    pub(crate) fn mark_ready(&mut self, sample_id: u32) {
        self.pending.retain(|id| *id != sample_id);
    }

    pub(crate) fn remove(&mut self, sample_id: u32) {
        self.mark_ready(sample_id);
        self.loaded.retain(|record| record.sample_id != sample_id);
    }

    /// A sample can be pointed at once its data sits in the shared buffer.
    fn check_reusable(&self, sample_id: u32) -> Result<()> {
        if !self.loaded.iter().any(|record| record.sample_id == sample_id) {
            return Err(Error::SampleNotFound(sample_id));
        }
        if self.pending.contains(&sample_id) {
            return Err(Error::SampleNotReady(sample_id));
        }
        Ok(())
    }
}

/// Records shared with the sample processor, which marks high-quality
/// imports ready or drops the ones it had to reject.
pub(crate) type Records = Arc<Mutex<RecordSet>>;

/// Every sample imported into a session.
pub struct SampleLibrary {
    store: Arc<SampleStore>,
    records: Records,
    processor: SampleProcessor,
}

impl SampleLibrary {
    /// Start the library and its sample processor thread.
    pub fn new(buffer: SampleBuffer, mailbox: MailboxWriter) -> Result<Self> {
        let store = Arc::new(SampleStore {
            buffer,
            mailbox,
            lock: Mutex::new(()),
        });
        let records: Records = Arc::new(Mutex::new(RecordSet::default()));
        let processor = SampleProcessor::spawn(Arc::clone(&store), Arc::clone(&records))?;

        Ok(Self {
            store,
            records,
            processor,
        })
    }

    /// Buffer capacity in f32 values.
    pub fn max_sample_length(&self) -> usize {
        self.store.capacity()
    }

    /// Import a decoded sample for `sampler_id`.
    ///
    /// Standard quality writes the sample and notifies the producer before
    /// returning. High quality hands the sample to the processor thread and
    /// returns once the request is queued; completion is reported on
    /// [`processor_events`](Self::processor_events).
    pub fn import_sample(
        &self,
        sampler_id: u32,
        import: SampleImport,
        quality: Quality,
    ) -> Result<SampleData> {
        import.validate()?;
        match quality {
            Quality::Standard => self.import_standard(sampler_id, import),
            Quality::High => self.import_high_quality(sampler_id, import),
        }
    }

    fn import_standard(&self, sampler_id: u32, import: SampleImport) -> Result<SampleData> {
        let planar = import.planar();
        let total: usize = planar.iter().map(|c| c.len()).sum();
        if total > self.store.capacity() {
            tracing::warn!(
                "Sample '{}' too long for the sample buffer ({} > {})",
                import.title,
                total,
                self.store.capacity()
            );
            return Err(Error::SampleTooLong {
                length: total,
                max: self.store.capacity(),
            });
        }

        let mut records = self.records.lock();
        let sample_id = records.next_id();

        let event = self.store.store(
            &planar,
            SampleEvent {
                sampler_id,
                sample_id,
                length: 0,
                channel_count: planar.len() as u32,
                high_quality: false,
            },
        )?;

        let data = SampleData {
            title: import.title.clone(),
            sample_id,
            duration_seconds: import.duration_seconds(),
            high_quality: false,
        };
        records.insert(data.clone(), false);

        tracing::debug!(
            "Imported sample '{}' as {} ({} values, {} channels)",
            data.title,
            sample_id,
            event.length,
            event.channel_count
        );
        Ok(data)
    }

    fn import_high_quality(&self, sampler_id: u32, import: SampleImport) -> Result<SampleData> {
        let duration_seconds = import.duration_seconds();
        let channels = high_quality_channels(&import)?;

        let data = {
            let mut records = self.records.lock();
            let data = SampleData {
                title: import.title.clone(),
                sample_id: records.next_id(),
                duration_seconds,
                high_quality: true,
            };
            records.insert(data.clone(), true);
            data
        };

        let request = HqRequest {
            sampler_id,
            sample_id: data.sample_id,
            sample_rate: import.sample_rate,
            channels,
        };
        if let Err(err) = self.processor.submit(request) {
            self.records.lock().remove(data.sample_id);
            return Err(err);
        }

        tracing::debug!(
            "Queued high quality processing of '{}' as {}",
            data.title,
            data.sample_id
        );
        Ok(data)
    }

    /// Point `sampler_id` at an already loaded sample.
    ///
    /// A high-quality import is rejected with [`Error::SampleNotReady`] until
    /// its [`ProcessorEvent::Completed`] has been sent.
    pub fn set_existing_sample(&self, sample_id: u32, sampler_id: u32) -> Result<SampleEvent> {
        self.records.lock().check_reusable(sample_id)?;

        let event = SampleEvent::reuse(sampler_id, sample_id);
        self.store.announce(&event);
        Ok(event)
    }

    /// Every record, pending high-quality imports included.
    pub fn loaded_samples(&self) -> Vec<SampleData> {
        self.records.lock().loaded.clone()
    }

    /// Completion notifications of high-quality imports.
    pub fn processor_events(&self) -> Receiver<ProcessorEvent> {
        self.processor.events()
    }

    /// Stop the processor thread. Pending high-quality imports are dropped.
    pub fn shutdown(&mut self) {
        self.processor.stop();
    }
}

/// Channels sent to the sample processor: both for short stereo samples,
/// channel 0 alone for anything else short enough.
fn high_quality_channels(import: &SampleImport) -> Result<Vec<Vec<f32>>> {
    let duration_seconds = import.duration_seconds();
    let stereo = import.channels.len() >= 2;

    if stereo && duration_seconds < HQ_STEREO_MAX_SECONDS {
        Ok(import.channels[..2].to_vec())
    } else if duration_seconds < HQ_MONO_MAX_SECONDS {
        Ok(vec![import.channels[0].clone()])
    } else {
        Err(Error::TooLongForHighQuality { duration_seconds })
    }
}
