//! One session: its shared segments, producer thread and render path.

use crate::builder::{EngineFactory, OutputMode};
use crate::{Error, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU16, AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;
use synthlink_core::{
    AudioRing, Diagnostics, DiagnosticsSnapshot, EffectEvent, MailboxWriter, NoteEvent,
    QueueWriter, RenderConsumer, RenderSwitch, SampleBuffer, SamplerEvent, SessionConfig,
    SessionSegments,
};
use synthlink_engine::{EngineMessage, ProducerInit, ProducerThread};
use synthlink_sampler::SampleLibrary;

/// Session lifecycle.
///
/// `Uninitialized → Allocated → Running → Draining → Released`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Uninitialized = 0,
    /// Segments exist, no producer yet.
    Allocated = 1,
    /// Producer and render path active.
    Running = 2,
    /// Teardown in progress.
    Draining = 3,
    /// Segments freed.
    Released = 4,
}

impl SessionState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Uninitialized,
            1 => Self::Allocated,
            2 => Self::Running,
            3 => Self::Draining,
            _ => Self::Released,
        }
    }
}

/// Result of starting a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A producer and render path were created.
    Started,
    /// The session was already running; nothing was created.
    AlreadyRunning,
}

/// Caller-side queue writers. The locks serialize callers only; the producer
/// and render path never touch them.
pub(crate) struct ControlQueues {
    pub(crate) midi: Mutex<QueueWriter<NoteEvent>>,
    pub(crate) osc: Mutex<QueueWriter<SamplerEvent>>,
    pub(crate) fx: Mutex<QueueWriter<EffectEvent>>,
    /// Next sampler index; one past `u8::MAX` once every index is taken.
    pub(crate) next_sampler: AtomicU16,
    pub(crate) next_effect: AtomicU32,
}

#[derive(Default)]
struct RenderPath {
    switch: Option<RenderSwitch>,
    /// Headless consumer not yet taken by the caller.
    consumer: Option<RenderConsumer>,
    #[cfg(feature = "output")]
    stream: Option<synthlink_core::OutputStream>,
}

/// Shared segments and execution contexts of one session.
pub struct Session {
    config: SessionConfig,
    output: OutputMode,
    engine_factory: EngineFactory,
    state: Arc<AtomicU8>,

    segments: SessionSegments,
    ring: Arc<AudioRing>,
    diagnostics: Arc<Diagnostics>,

    pub(crate) queues: ControlQueues,
    pub(crate) library: Mutex<Option<SampleLibrary>>,

    producer: Mutex<Option<ProducerThread>>,
    render: Mutex<RenderPath>,

    messages_tx: Sender<EngineMessage>,
    messages_rx: Receiver<EngineMessage>,
}

impl Session {
    /// Allocate every segment and attach the caller-side views.
    pub(crate) fn allocate(
        config: SessionConfig,
        output: OutputMode,
        engine_factory: EngineFactory,
        message_capacity: usize,
    ) -> Result<Self> {
        let segments = SessionSegments::allocate(&config)?;

        let ring = AudioRing::attach(
            Arc::clone(&segments.audio),
            config.ring_capacity(),
            config.channels,
            config.render_quantum,
        )?;

        let queues = ControlQueues {
            midi: Mutex::new(QueueWriter::attach(
                Arc::clone(&segments.midi),
                config.midi_queue_capacity,
            )?),
            osc: Mutex::new(QueueWriter::attach(
                Arc::clone(&segments.osc),
                config.osc_queue_capacity,
            )?),
            fx: Mutex::new(QueueWriter::attach(
                Arc::clone(&segments.fx),
                config.fx_queue_capacity,
            )?),
            next_sampler: AtomicU16::new(0),
            next_effect: AtomicU32::new(0),
        };

        let library = SampleLibrary::new(
            SampleBuffer::attach(Arc::clone(&segments.samples), config.max_sample_length)?,
            MailboxWriter::attach(Arc::clone(&segments.mailbox))?,
        )?;

        let (messages_tx, messages_rx) = bounded(message_capacity);

        tracing::debug!(
            "Allocated session segments ({} bytes)",
            segments.total_bytes()
        );

        Ok(Self {
            config,
            output,
            engine_factory,
            state: Arc::new(AtomicU8::new(SessionState::Allocated as u8)),
            segments,
            ring,
            diagnostics: Arc::new(Diagnostics::new()),
            queues,
            library: Mutex::new(Some(library)),
            producer: Mutex::new(None),
            render: Mutex::new(RenderPath::default()),
            messages_tx,
            messages_rx,
        })
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn state_cell(&self) -> Arc<AtomicU8> {
        Arc::clone(&self.state)
    }

    fn set_state(&self, state: SessionState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Initialization request built from this session's own segments.
    pub fn producer_init(&self) -> ProducerInit {
        ProducerInit {
            ring: Some(self.ring.writer()),
            midi: Some(Arc::clone(&self.segments.midi)),
            osc: Some(Arc::clone(&self.segments.osc)),
            fx: Some(Arc::clone(&self.segments.fx)),
            mailbox: Some(Arc::clone(&self.segments.mailbox)),
            samples: Some(Arc::clone(&self.segments.samples)),
            ring_size: self.config.ring_capacity(),
        }
    }

    /// Start the producer and render path from this session's segments.
    pub fn start(&self) -> Result<StartOutcome> {
        self.initialize(self.producer_init())
    }

    /// Start the producer with `init` and connect the render path.
    ///
    /// A running session is left untouched and reports
    /// [`StartOutcome::AlreadyRunning`]. A rejected `init` leaves the session
    /// `Allocated`.
    pub fn initialize(&self, init: ProducerInit) -> Result<StartOutcome> {
        let mut producer = self.producer.lock();

        match self.state() {
            SessionState::Running => return Ok(StartOutcome::AlreadyRunning),
            SessionState::Allocated => {}
            state => {
                return Err(Error::InvalidState {
                    state,
                    operation: "initialize",
                })
            }
        }

        let mut thread = ProducerThread::spawn(
            init,
            (self.engine_factory)(),
            self.config,
            Arc::clone(&self.diagnostics),
            self.messages_tx.clone(),
        )?;

        if let Err(err) = self.connect_render() {
            tracing::error!("Failed to connect render path: {}", err);
            thread.stop();
            return Err(err);
        }

        *producer = Some(thread);
        self.set_state(SessionState::Running);
        tracing::info!(
            "Session running ({} Hz, {} frame quantum, ring of {} values)",
            self.config.sample_rate,
            self.config.render_quantum,
            self.config.ring_capacity()
        );
        Ok(StartOutcome::Started)
    }

    fn connect_render(&self) -> Result<()> {
        let consumer = RenderConsumer::new(self.ring.reader(), Arc::clone(&self.diagnostics));
        let mut render = self.render.lock();
        render.switch = Some(consumer.switch());

        match self.output {
            OutputMode::Headless => {
                render.consumer = Some(consumer);
            }
            #[cfg(feature = "output")]
            OutputMode::Device { index } => {
                let stream =
                    synthlink_core::OutputStream::start(consumer, index, self.config.sample_rate)?;
                render.stream = Some(stream);
            }
        }
        Ok(())
    }

    /// Take the render consumer to drive it manually (headless mode only).
    pub fn take_render_consumer(&self) -> Option<RenderConsumer> {
        self.render.lock().consumer.take()
    }

    pub fn ring(&self) -> &Arc<AudioRing> {
        &self.ring
    }

    /// Drop and underflow counters.
    pub fn diagnostics(&self) -> DiagnosticsSnapshot {
        self.diagnostics.snapshot()
    }

    /// Zero the underflow counters, e.g. once playback reached steady state.
    pub fn reset_underflows(&self) {
        self.diagnostics.reset_underflows();
    }

    pub(crate) fn diagnostics_handle(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Notifications from the producer thread.
    pub fn messages(&self) -> Receiver<EngineMessage> {
        self.messages_rx.clone()
    }

    /// Disconnect the render path, stop the producer, stop the sample
    /// processor. Segments are freed once the last reference drops.
    pub(crate) fn shutdown(&self) {
        let mut producer = self.producer.lock();
        if self.state() == SessionState::Released {
            return;
        }
        self.set_state(SessionState::Draining);

        {
            let mut render = self.render.lock();
            if let Some(switch) = render.switch.take() {
                switch.disconnect();
            }
            render.consumer = None;
            #[cfg(feature = "output")]
            {
                render.stream = None;
            }
        }

        if let Some(mut thread) = producer.take() {
            thread.stop();
        }

        if let Some(mut library) = self.library.lock().take() {
            library.shutdown();
        }

        self.set_state(SessionState::Released);
        tracing::info!("Session released");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}
