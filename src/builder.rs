//! Builder for configuring and constructing an `Orchestrator`.

use crate::{Orchestrator, Result};
use std::sync::Arc;
use synthlink_core::SessionConfig;
use synthlink_engine::{SilenceEngine, SynthEngine};

/// Creates the engine of each new session's producer.
pub type EngineFactory = Arc<dyn Fn() -> Box<dyn SynthEngine> + Send + Sync>;

/// Where the render consumer's output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// The caller takes the `RenderConsumer` and drives it.
    #[default]
    Headless,
    /// Render to an output device (`None` = default device).
    #[cfg(feature = "output")]
    Device { index: Option<usize> },
}

/// Session sizes are fixed for every session the orchestrator creates.
///
/// # Example
///
/// ```ignore
/// use synthlink::prelude::*;
///
/// let orchestrator = Orchestrator::builder()
///     .engine(|| Box::new(SilenceEngine))
///     .build()?;
///
/// let session = orchestrator.acquire()?;
/// session.play_note(60);
/// ```
pub struct OrchestratorBuilder {
    config: SessionConfig,
    output: OutputMode,
    engine_factory: Option<EngineFactory>,
    autostart: bool,
    message_capacity: usize,
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self {
            config: SessionConfig::default(),
            output: OutputMode::default(),
            engine_factory: None,
            autostart: true,
            message_capacity: 256,
        }
    }
}

impl OrchestratorBuilder {
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Default: [`OutputMode::Headless`]
    pub fn output(mut self, output: OutputMode) -> Self {
        self.output = output;
        self
    }

    /// Default: an engine that renders silence.
    pub fn engine<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn SynthEngine> + Send + Sync + 'static,
    {
        self.engine_factory = Some(Arc::new(factory));
        self
    }

    /// Start the producer and render path on first acquisition (default: true).
    ///
    /// When disabled, sessions stay `Allocated` until `Session::start` or
    /// `Session::initialize` is called.
    pub fn autostart(mut self, autostart: bool) -> Self {
        self.autostart = autostart;
        self
    }

    /// Producer notifications kept before new ones are dropped (default: 256).
    pub fn message_capacity(mut self, capacity: usize) -> Self {
        self.message_capacity = capacity.max(1);
        self
    }

    pub fn build(self) -> Result<Orchestrator> {
        self.config.validate()?;

        let engine_factory = self
            .engine_factory
            .unwrap_or_else(|| Arc::new(|| Box::new(SilenceEngine) as Box<dyn SynthEngine>));

        Ok(Orchestrator::from_parts(
            self.config,
            self.output,
            engine_factory,
            self.autostart,
            self.message_capacity,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_builder() {
        let builder = OrchestratorBuilder::default();
        assert_eq!(builder.config, SessionConfig::default());
        assert_eq!(builder.output, OutputMode::Headless);
        assert!(builder.autostart);
        assert_eq!(builder.message_capacity, 256);
    }

    #[test]
    fn test_rejects_invalid_config() {
        let result = OrchestratorBuilder::default()
            .config(SessionConfig {
                fx_queue_capacity: 0,
                ..Default::default()
            })
            .build();
        assert!(result.is_err());
    }
}
