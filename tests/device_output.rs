//! Device output tests (requires "output" feature)
//!
//! CI machines usually have no audio device, so these only check that both
//! outcomes leave the orchestrator consistent.
//!
//! Run with:
//! ```bash
//! cargo test -p synthlink --test device_output --features output
//! ```

#![cfg(feature = "output")]

#[path = "helpers/mod.rs"]
mod helpers;

use helpers::{init_tracing, test_config};
use synthlink::prelude::*;

#[test]
fn test_default_device_session() {
    init_tracing();
    let orchestrator = Orchestrator::builder()
        .config(test_config())
        .output(OutputMode::Device { index: None })
        .build()
        .unwrap();

    match orchestrator.acquire() {
        Ok(session) => {
            assert_eq!(session.state(), SessionState::Running);
            // The device owns the consumer.
            assert!(session.take_render_consumer().is_none());
            drop(session);
            assert_eq!(orchestrator.state(), SessionState::Released);
        }
        Err(err) => {
            tracing::info!("No output device: {}", err);
            assert_eq!(orchestrator.state(), SessionState::Released);
            assert_eq!(orchestrator.refcount(), 0);
        }
    }
}
