//! Producer thread: drains control queues, renders, feeds the audio ring.

use crate::engine::SynthEngine;
use crate::error::{Error, Result};
use crate::protocol::{EngineMessage, LogLevel, ProducerInit, ProducerLinks};
use crossbeam_channel::Sender;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use synthlink_core::{Diagnostics, SessionConfig, WriteOutcome};
use thread_priority::ThreadPriority;

/// Producer lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ProducerState {
    Starting = 0,
    Running = 1,
    Stopped = 2,
}

impl ProducerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Starting,
            1 => Self::Running,
            _ => Self::Stopped,
        }
    }
}

/// The producer execution context.
///
/// Sole reader of every control queue and the mailbox, sole writer of the
/// audio ring. Blocks on ring backpressure; [`stop`](Self::stop) wakes it.
pub struct ProducerThread {
    thread_handle: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
}

impl ProducerThread {
    /// Validate `init` and start the producer loop.
    ///
    /// Nothing is spawned when validation fails.
    pub fn spawn(
        init: ProducerInit,
        engine: Box<dyn SynthEngine>,
        config: SessionConfig,
        diagnostics: Arc<Diagnostics>,
        messages: Sender<EngineMessage>,
    ) -> Result<Self> {
        let ring_size = init.ring_size;
        let links = match init.validate(&config) {
            Ok(links) => links,
            Err(err) => {
                tracing::error!("Rejected producer initialization: {}", err);
                let _ = messages.try_send(EngineMessage::log(LogLevel::Error, err.to_string()));
                return Err(err);
            }
        };
        let _ = messages.try_send(EngineMessage::Initialize { ring_size });

        let shutdown = Arc::new(AtomicBool::new(false));
        let state = Arc::new(AtomicU8::new(ProducerState::Starting as u8));

        let handle = {
            let shutdown = Arc::clone(&shutdown);
            let state = Arc::clone(&state);
            thread::Builder::new()
                .name("synthlink-producer".into())
                .spawn(move || {
                    let _ = thread_priority::set_current_thread_priority(ThreadPriority::Max);

                    producer_loop(links, engine, config, diagnostics, messages, &shutdown, &state);
                    state.store(ProducerState::Stopped as u8, Ordering::Release);
                })
                .map_err(Error::Spawn)?
        };

        tracing::debug!("Producer thread started (ring {} values)", ring_size);

        Ok(Self {
            thread_handle: Some(handle),
            shutdown,
            state,
        })
    }

    pub fn state(&self) -> ProducerState {
        ProducerState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle.is_some() && self.state() != ProducerState::Stopped
    }

    /// Request shutdown, wake the thread if it waits on the ring, and join it.
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);

        if let Some(handle) = self.thread_handle.take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                tracing::error!("Producer thread panicked");
            }
            tracing::debug!("Producer thread stopped");
        }
    }
}

impl Drop for ProducerThread {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Producer main loop, one iteration per render quantum.
fn producer_loop(
    mut links: ProducerLinks,
    mut engine: Box<dyn SynthEngine>,
    config: SessionConfig,
    diagnostics: Arc<Diagnostics>,
    messages: Sender<EngineMessage>,
    shutdown: &AtomicBool,
    state: &AtomicU8,
) {
    let mut block = vec![0.0f32; config.render_quantum * config.channels];
    let mut sample_data: Vec<f32> = Vec::new();
    let mut seen_underflows = diagnostics.underflow_callbacks();

    state.store(ProducerState::Running as u8, Ordering::Release);
    let _ = messages.try_send(EngineMessage::ModuleReady);
    tracing::debug!("Producer loop running engine '{}'", engine.name());

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        let mut malformed = 0;
        malformed += links.midi.drain_all(|event| engine.on_note(event)).malformed;
        malformed += links.osc.drain_all(|event| engine.on_sampler(event)).malformed;
        malformed += links.fx.drain_all(|event| engine.on_effect(event)).malformed;
        for _ in 0..malformed {
            diagnostics.record_malformed();
        }
        if malformed > 0 {
            tracing::warn!("Skipped {} malformed control events", malformed);
        }

        if let Some(event) = links.mailbox.poll() {
            match event.validate(config.max_sample_length) {
                Ok(()) => {
                    if event.is_reuse() {
                        sample_data.clear();
                    } else {
                        links.samples.read_into(event.length as usize, &mut sample_data);
                    }
                    engine.on_sample_ready(&event, &sample_data);
                    let _ = messages.try_send(EngineMessage::SampleUpdate(event));
                }
                Err(err) => {
                    tracing::warn!("Ignored sample event: {}", err);
                    let _ = messages.try_send(EngineMessage::log(LogLevel::Warn, err.to_string()));
                }
            }
        }

        block.fill(0.0);
        engine.render(&mut block);

        if let WriteOutcome::Cancelled { .. } = links.ring.write_frames(&block, shutdown) {
            break;
        }

        let underflows = diagnostics.underflow_callbacks();
        if underflows > seen_underflows {
            let new = underflows - seen_underflows;
            tracing::warn!("Render underflow: {} callbacks without audio", new);
            let _ = messages.try_send(EngineMessage::log(
                LogLevel::Warn,
                format!("{new} underflowing render callbacks"),
            ));
        }
        seen_underflows = underflows;
    }
}
