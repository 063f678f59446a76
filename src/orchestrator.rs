//! Reference-counted owner of the single live session.

use crate::builder::{EngineFactory, OrchestratorBuilder, OutputMode};
use crate::session::{Session, SessionState};
use crate::Result;
use parking_lot::Mutex;
use std::ops::Deref;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use synthlink_core::SessionConfig;

#[derive(Default)]
struct SessionSlot {
    session: Option<Arc<Session>>,
    refcount: usize,
    /// State of the most recently allocated session. Kept after the session
    /// leaves the slot so `state()` follows its teardown to `Released`.
    last_state: Arc<AtomicU8>,
}

struct OrchestratorInner {
    config: SessionConfig,
    output: OutputMode,
    engine_factory: EngineFactory,
    autostart: bool,
    message_capacity: usize,
    slot: Mutex<SessionSlot>,
}

/// Hands out [`SessionHandle`]s to one lazily created session.
///
/// The first `acquire` allocates the segments (and starts the session unless
/// autostart is disabled). Dropping the last handle tears everything down;
/// the next `acquire` builds a fresh session.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<OrchestratorInner>,
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    pub(crate) fn from_parts(
        config: SessionConfig,
        output: OutputMode,
        engine_factory: EngineFactory,
        autostart: bool,
        message_capacity: usize,
    ) -> Self {
        Self {
            inner: Arc::new(OrchestratorInner {
                config,
                output,
                engine_factory,
                autostart,
                message_capacity,
                slot: Mutex::new(SessionSlot::default()),
            }),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Get a handle to the live session, creating it if needed.
    pub fn acquire(&self) -> Result<SessionHandle> {
        let mut slot = self.inner.slot.lock();

        let session = match &slot.session {
            Some(session) => Arc::clone(session),
            None => {
                let session = Arc::new(Session::allocate(
                    self.inner.config,
                    self.inner.output,
                    Arc::clone(&self.inner.engine_factory),
                    self.inner.message_capacity,
                )?);
                // A session still draining after its last release keeps its
                // own state cell; only the new one is reported from here on.
                slot.last_state = session.state_cell();

                if self.inner.autostart {
                    if let Err(err) = session.start() {
                        tracing::error!("Failed to start session: {}", err);
                        session.shutdown();
                        return Err(err);
                    }
                }

                slot.session = Some(Arc::clone(&session));
                session
            }
        };

        slot.refcount += 1;
        tracing::debug!("Session acquired (refcount {})", slot.refcount);

        Ok(SessionHandle {
            orchestrator: Arc::clone(&self.inner),
            session,
        })
    }

    /// Give a handle back. Same as dropping it.
    pub fn release(&self, handle: SessionHandle) {
        drop(handle);
    }

    /// State of the live session, or of the last one while it tears down.
    pub fn state(&self) -> SessionState {
        let slot = self.inner.slot.lock();
        match &slot.session {
            Some(session) => session.state(),
            None => SessionState::from_u8(slot.last_state.load(Ordering::Acquire)),
        }
    }

    /// Live handles to the current session.
    pub fn refcount(&self) -> usize {
        self.inner.slot.lock().refcount
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.inner.config)
            .field("output", &self.inner.output)
            .field("state", &self.state())
            .finish()
    }
}

/// Counted reference to the live [`Session`].
pub struct SessionHandle {
    orchestrator: Arc<OrchestratorInner>,
    session: Arc<Session>,
}

impl Deref for SessionHandle {
    type Target = Session;

    fn deref(&self) -> &Session {
        &self.session
    }
}

impl Clone for SessionHandle {
    fn clone(&self) -> Self {
        self.orchestrator.slot.lock().refcount += 1;
        Self {
            orchestrator: Arc::clone(&self.orchestrator),
            session: Arc::clone(&self.session),
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        let last = {
            let mut slot = self.orchestrator.slot.lock();
            slot.refcount = slot.refcount.saturating_sub(1);
            if slot.refcount == 0 {
                slot.session.take()
            } else {
                None
            }
        };

        // Teardown joins threads; keep it outside the slot lock.
        if let Some(session) = last {
            tracing::debug!("Last session handle released");
            session.shutdown();
        }
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("state", &self.session.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orchestrator(autostart: bool) -> Orchestrator {
        Orchestrator::builder()
            .autostart(autostart)
            .build()
            .unwrap()
    }

    #[test]
    fn test_lazy_allocation() {
        let orchestrator = orchestrator(false);
        assert_eq!(orchestrator.state(), SessionState::Uninitialized);
        assert_eq!(orchestrator.refcount(), 0);

        let handle = orchestrator.acquire().unwrap();
        assert_eq!(orchestrator.state(), SessionState::Allocated);
        assert_eq!(handle.state(), SessionState::Allocated);
        assert_eq!(orchestrator.refcount(), 1);
    }

    #[test]
    fn test_autostart_runs_session() {
        let orchestrator = orchestrator(true);
        let handle = orchestrator.acquire().unwrap();
        assert_eq!(handle.state(), SessionState::Running);
    }

    #[test]
    fn test_handles_share_one_session() {
        let orchestrator = orchestrator(false);
        let a = orchestrator.acquire().unwrap();
        let b = orchestrator.acquire().unwrap();
        let c = a.clone();
        assert!(Arc::ptr_eq(&a.session, &b.session));
        assert!(Arc::ptr_eq(&a.session, &c.session));
        assert_eq!(orchestrator.refcount(), 3);
    }

    #[test]
    fn test_last_release_tears_down() {
        let orchestrator = orchestrator(true);
        let a = orchestrator.acquire().unwrap();
        let b = orchestrator.acquire().unwrap();

        orchestrator.release(a);
        assert_eq!(orchestrator.state(), SessionState::Running);
        assert_eq!(orchestrator.refcount(), 1);

        orchestrator.release(b);
        assert_eq!(orchestrator.state(), SessionState::Released);
        assert_eq!(orchestrator.refcount(), 0);
    }

    #[test]
    fn test_reacquire_after_release() {
        let orchestrator = orchestrator(true);
        let first = orchestrator.acquire().unwrap();
        let first_ring = Arc::clone(first.ring());
        drop(first);

        let second = orchestrator.acquire().unwrap();
        assert_eq!(second.state(), SessionState::Running);
        assert!(!Arc::ptr_eq(&first_ring, second.ring()));
    }
}
