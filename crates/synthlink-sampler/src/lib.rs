//! Sample library for synthlink.
//!
//! [`SampleLibrary`] assigns one id per imported sample, enforces the shared
//! buffer's length limit, and announces finished samples through the
//! sample-ready mailbox. High-quality imports are re-pitched on a
//! [`SampleProcessor`] thread first.

pub mod error;
pub use error::{Error, Result};

mod library;
pub use library::{
    Quality, SampleData, SampleImport, SampleLibrary, HQ_MONO_MAX_SECONDS, HQ_STEREO_MAX_SECONDS,
};

mod processor;
pub use processor::{c0_table, c0_table_len, ProcessorEvent, SampleProcessor};
