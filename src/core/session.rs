use crate::core::bridge::UiBridge;
use crate::core::error::SessionError;
use crate::core::events::BatchEvent;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Allows one batch at a time and hands out the halt switch for it.
#[derive(Debug, Clone, Default)]
pub struct Session {
    inner: Arc<SessionInner>,
}

#[derive(Debug, Default)]
struct SessionInner {
    running: AtomicBool,
    current: Mutex<Option<CancellationToken>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a batch as running and issues a fresh cancellation token.
    /// Controls are restored when the returned guard is dropped.
    pub fn begin(&self, bridge: &UiBridge) -> Result<RunGuard, SessionError> {
        self.inner
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SessionError::AlreadyRunning)?;

        let token = CancellationToken::new();
        *self.current() = Some(token.clone());
        debug!("session acquired");

        Ok(RunGuard { session: self.clone(), bridge: bridge.clone(), token })
    }

    /// Requests a halt after the current target. Returns false when idle.
    /// Calling it again has no further effect.
    pub fn halt(&self) -> bool {
        match self.current().as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    fn current(&self) -> std::sync::MutexGuard<'_, Option<CancellationToken>> {
        self.inner.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Debug)]
pub struct RunGuard {
    session: Session,
    bridge: UiBridge,
    token: CancellationToken,
}

impl RunGuard {
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.session.current().take();
        self.session.inner.running.store(false, Ordering::Release);
        // the presentation side may already be gone during shutdown
        let _ = self.bridge.forward(BatchEvent::ControlsRestored);
        debug!("session released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bridge;

    fn restored_count(rx: &mut bridge::UiReceiver) -> usize {
        let mut n = 0;
        while let Some(evt) = rx.try_recv() {
            if evt == BatchEvent::ControlsRestored {
                n += 1;
            }
        }
        n
    }

    #[test]
    fn second_begin_is_refused_while_running() {
        let (tx, mut rx) = bridge::channel();
        let session = Session::new();

        let guard = session.begin(&tx).unwrap();
        assert!(session.is_running());
        assert_eq!(session.begin(&tx).unwrap_err(), SessionError::AlreadyRunning);

        drop(guard);
        assert!(!session.is_running());
        assert_eq!(restored_count(&mut rx), 1);

        let again = session.begin(&tx).unwrap();
        drop(again);
        assert_eq!(restored_count(&mut rx), 1);
    }

    #[test]
    fn halt_is_idempotent_and_scoped_to_the_batch() {
        let (tx, _rx) = bridge::channel();
        let session = Session::new();
        assert!(!session.halt());

        let guard = session.begin(&tx).unwrap();
        let token = guard.token();
        assert!(session.halt());
        assert!(session.halt());
        assert!(token.is_cancelled());
        drop(guard);

        let next = session.begin(&tx).unwrap();
        assert!(!next.token().is_cancelled());
    }

    #[test]
    fn controls_restored_on_panic() {
        let (tx, mut rx) = bridge::channel();
        let session = Session::new();

        let s2 = session.clone();
        let tx2 = tx.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _guard = s2.begin(&tx2).unwrap();
            panic!("boom");
        }));

        assert!(result.is_err());
        assert!(!session.is_running());
        assert_eq!(restored_count(&mut rx), 1);
    }
}
