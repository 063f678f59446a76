//! Centralized error type for the synthlink umbrella crate.
//!
//! Wraps all subsystem errors so `?` propagates naturally across crate boundaries.

use crate::SessionState;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] synthlink_core::Error),

    #[error("Engine: {0}")]
    Engine(#[from] synthlink_engine::Error),

    #[error("Sampler: {0}")]
    Sampler(#[from] synthlink_sampler::Error),

    /// Every sampler index of the session has been handed out.
    #[error("All 256 sampler indices are in use")]
    SamplerIdsExhausted,

    /// Operation not valid in the session's current state.
    #[error("Session is {state:?}, cannot {operation}")]
    InvalidState {
        state: SessionState,
        operation: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
