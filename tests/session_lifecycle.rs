//! Session lifecycle tests
//!
//! Acquire/release reference counting, re-acquisition while an old session
//! tears down, double initialization and rejected producer initialization.

#[path = "helpers/mod.rs"]
mod helpers;

use helpers::{
    init_tracing, recording_orchestrator, render_quantum, silent_orchestrator, test_config,
    wait_until,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use synthlink::engine::Error as EngineError;
use synthlink::prelude::*;
use synthlink::{Error, ProducerInit};

/// Silent engine whose drop (at the end of its producer thread) is slow,
/// which stretches a session's teardown.
struct SlowDropEngine {
    dropping: Arc<AtomicBool>,
}

impl SynthEngine for SlowDropEngine {
    fn render(&mut self, out: &mut [f32]) {
        out.fill(0.0);
    }
}

impl Drop for SlowDropEngine {
    fn drop(&mut self) {
        self.dropping.store(true, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(300));
    }
}

// =============================================================================
// Acquire / Release
// =============================================================================

#[test]
fn test_acquire_starts_session_once() {
    let orchestrator = silent_orchestrator(test_config());
    assert_eq!(orchestrator.state(), SessionState::Uninitialized);

    let first = orchestrator.acquire().unwrap();
    let _second = orchestrator.acquire().unwrap();
    assert_eq!(orchestrator.state(), SessionState::Running);
    assert_eq!(orchestrator.refcount(), 2);

    // Both handles reach the same producer: one initialization only.
    let messages = first.messages();
    assert!(wait_until(|| messages.len() >= 2));
    let initializations = messages
        .try_iter()
        .filter(|m| matches!(m, EngineMessage::Initialize { .. }))
        .count();
    assert_eq!(initializations, 1);
}

#[test]
fn test_release_order_and_teardown() {
    let orchestrator = silent_orchestrator(test_config());
    let first = orchestrator.acquire().unwrap();
    let second = first.clone();
    assert_eq!(orchestrator.refcount(), 2);

    orchestrator.release(first);
    assert_eq!(orchestrator.state(), SessionState::Running);

    orchestrator.release(second);
    assert_eq!(orchestrator.state(), SessionState::Released);
    assert_eq!(orchestrator.refcount(), 0);
}

#[test]
fn test_teardown_unblocks_parked_producer() {
    let orchestrator = silent_orchestrator(test_config());
    let session = orchestrator.acquire().unwrap();
    let ring = std::sync::Arc::clone(session.ring());

    // Nobody renders, so the producer fills the ring and parks.
    assert!(wait_until(|| ring.flag() == synthlink::core::FLAG_WAITING));

    let started = std::time::Instant::now();
    drop(session);
    assert_eq!(orchestrator.state(), SessionState::Released);
    assert!(started.elapsed() < helpers::TEST_TIMEOUT);
}

#[test]
fn test_released_consumer_outputs_silence() {
    let orchestrator = silent_orchestrator(test_config());
    let session = orchestrator.acquire().unwrap();
    let mut consumer = session.take_render_consumer().unwrap();
    drop(session);

    let (out, report) = render_quantum(&mut consumer);
    assert!(out.iter().all(|s| *s == 0.0));
    assert!(!report.underflowed());
}

#[test]
fn test_reacquire_builds_fresh_session() {
    let orchestrator = silent_orchestrator(test_config());
    let session = orchestrator.acquire().unwrap();
    let extra = session.clone();
    drop(session);
    drop(extra);

    let session = orchestrator.acquire().unwrap();
    assert_eq!(session.state(), SessionState::Running);
    assert!(session.take_render_consumer().is_some());
}

#[test]
fn test_reacquire_during_teardown_keeps_new_session_running() {
    init_tracing();
    let dropping = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&dropping);
    let orchestrator = Orchestrator::builder()
        .config(test_config())
        .engine(move || {
            Box::new(SlowDropEngine {
                dropping: Arc::clone(&flag),
            })
        })
        .build()
        .unwrap();

    let first = orchestrator.acquire().unwrap();
    let teardown = std::thread::spawn(move || drop(first));

    // The old session left the slot and is joining its producer.
    assert!(wait_until(|| dropping.load(Ordering::SeqCst)));
    let second = orchestrator.acquire().unwrap();
    assert_eq!(second.state(), SessionState::Running);

    teardown.join().unwrap();
    assert_eq!(second.state(), SessionState::Running);
    assert_eq!(orchestrator.state(), SessionState::Running);
    assert_eq!(orchestrator.refcount(), 1);
    assert_eq!(second.start().unwrap(), StartOutcome::AlreadyRunning);
    assert!(second.take_render_consumer().is_some());

    // The new session still gets its own full teardown.
    let messages = second.messages();
    drop(second);
    assert_eq!(orchestrator.state(), SessionState::Released);
    assert_eq!(orchestrator.refcount(), 0);
    // Producer joined and session freed: every sender is gone.
    loop {
        match messages.recv_timeout(helpers::TEST_TIMEOUT) {
            Ok(_) => continue,
            Err(err) => {
                assert!(err.is_disconnected());
                break;
            }
        }
    }
}

#[test]
fn test_state_follows_old_session_until_reacquire() {
    init_tracing();
    let dropping = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&dropping);
    let orchestrator = Orchestrator::builder()
        .config(test_config())
        .engine(move || {
            Box::new(SlowDropEngine {
                dropping: Arc::clone(&flag),
            })
        })
        .build()
        .unwrap();

    let first = orchestrator.acquire().unwrap();
    let teardown = std::thread::spawn(move || drop(first));

    assert!(wait_until(|| dropping.load(Ordering::SeqCst)));
    assert_eq!(orchestrator.state(), SessionState::Draining);

    teardown.join().unwrap();
    assert_eq!(orchestrator.state(), SessionState::Released);
}

// =============================================================================
// Initialization
// =============================================================================

#[test]
fn test_double_initialize_is_noop() {
    let orchestrator = silent_orchestrator(test_config());
    let session = orchestrator.acquire().unwrap();
    assert_eq!(session.state(), SessionState::Running);

    assert_eq!(session.start().unwrap(), StartOutcome::AlreadyRunning);
    assert_eq!(
        session.initialize(session.producer_init()).unwrap(),
        StartOutcome::AlreadyRunning
    );

    // Still exactly one render consumer.
    assert!(session.take_render_consumer().is_some());
    assert!(session.take_render_consumer().is_none());
}

#[test]
fn test_missing_segment_leaves_session_allocated() {
    let (orchestrator, _recorded) = recording_orchestrator(test_config(), false);
    let session = orchestrator.acquire().unwrap();
    assert_eq!(session.state(), SessionState::Allocated);

    let messages = session.messages();
    let init = ProducerInit {
        mailbox: None,
        ..session.producer_init()
    };
    let result = session.initialize(init);
    assert!(matches!(
        result,
        Err(Error::Engine(EngineError::MissingSegment("sample_event")))
    ));
    assert_eq!(session.state(), SessionState::Allocated);
    assert!(session.take_render_consumer().is_none());
    assert!(matches!(
        messages.try_recv(),
        Ok(EngineMessage::Log {
            level: synthlink::LogLevel::Error,
            ..
        })
    ));

    // A valid request still starts the session afterwards.
    assert_eq!(session.start().unwrap(), StartOutcome::Started);
    assert_eq!(session.state(), SessionState::Running);
}

#[test]
fn test_ring_size_mismatch_rejected() {
    let (orchestrator, _recorded) = recording_orchestrator(test_config(), false);
    let session = orchestrator.acquire().unwrap();

    let init = ProducerInit {
        ring_size: 4096,
        ..session.producer_init()
    };
    assert!(matches!(
        session.initialize(init),
        Err(Error::Engine(EngineError::RingSizeMismatch { .. }))
    ));
    assert_eq!(session.state(), SessionState::Allocated);
}
