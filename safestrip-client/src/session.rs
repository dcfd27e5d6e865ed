//! Process-wide mirror of the identity provider's session.
//!
//! The mirror is a read-only view. The only write handle is a
//! [`SessionWriter`], which is private to the crate and owned by the
//! [`SyncBridge`](crate::bridge::SyncBridge).

use std::sync::{Arc, Mutex, MutexGuard};

use safestrip_api::models::{AuthSession, User};
use tokio::sync::watch;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    session: Option<AuthSession>,
    initialized: bool,
}

impl SessionState {
    pub fn session(&self) -> Option<&AuthSession> {
        self.session.as_ref()
    }

    pub fn user(&self) -> Option<&User> {
        self.session.as_ref().map(|session| &session.user)
    }

    /// True once the first answer from the identity provider has landed.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_signed_in(&self) -> bool {
        self.session.is_some()
    }
}

/// Cloneable read handle onto the current [`SessionState`].
#[derive(Debug, Clone)]
pub struct SessionMirror {
    rx: watch::Receiver<SessionState>,
}

impl SessionMirror {
    pub fn snapshot(&self) -> SessionState {
        self.rx.borrow().clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.rx.borrow().initialized
    }

    pub fn is_signed_in(&self) -> bool {
        self.rx.borrow().session.is_some()
    }

    pub fn access_token(&self) -> Option<String> {
        self.rx
            .borrow()
            .session
            .as_ref()
            .map(|session| session.access_token.clone())
    }

    /// Waits for the next write. Returns `false` once the writer is gone.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// Waits until the first provider answer has been mirrored.
    pub async fn initialized(&mut self) -> SessionState {
        if self.rx.wait_for(|state| state.initialized).await.is_err() {
            tracing::debug!("session writer dropped before initialization");
        }
        self.snapshot()
    }
}

/// Sole write handle of the mirror. Revoking it makes every later write a
/// no-op, which is how teardown guarantees silence.
#[derive(Debug, Clone)]
pub(crate) struct SessionWriter {
    slot: Arc<Mutex<Option<watch::Sender<SessionState>>>>,
}

impl SessionWriter {
    pub(crate) fn channel() -> (SessionWriter, SessionMirror) {
        let (tx, rx) = watch::channel(SessionState::default());

        let writer = SessionWriter {
            slot: Arc::new(Mutex::new(Some(tx))),
        };

        (writer, SessionMirror { rx })
    }

    fn lock(&self) -> MutexGuard<'_, Option<watch::Sender<SessionState>>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Overwrites the session and marks the mirror initialized.
    pub(crate) fn set(&self, session: Option<AuthSession>) -> bool {
        match self.lock().as_ref() {
            Some(tx) => {
                tx.send_modify(|state| {
                    state.session = session;
                    state.initialized = true;
                });
                true
            }
            None => false,
        }
    }

    /// Drops the session, leaving `initialized` as it is.
    pub(crate) fn clear(&self) -> bool {
        match self.lock().as_ref() {
            Some(tx) => {
                tx.send_modify(|state| state.session = None);
                true
            }
            None => false,
        }
    }

    pub(crate) fn revoke(&self) {
        self.lock().take();
    }

    pub(crate) fn is_revoked(&self) -> bool {
        self.lock().is_none()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use safestrip_api::models::AuthSession;
    use safestrip_api::models::User;
    use uuid::Uuid;

    use super::*;

    pub(crate) fn session_for(email: &str) -> AuthSession {
        AuthSession {
            access_token: format!("token-{email}"),
            refresh_token: None,
            expires_at: None,
            user: User {
                id: Uuid::new_v4(),
                email: Some(email.to_string()),
                created_at: None,
            },
        }
    }

    #[test]
    fn test_starts_uninitialized_and_signed_out() {
        let (_writer, mirror) = SessionWriter::channel();
        let state = mirror.snapshot();

        assert!(!state.is_initialized());
        assert!(!state.is_signed_in());
        assert!(state.user().is_none());
    }

    #[test]
    fn test_set_initializes_even_without_session() {
        let (writer, mirror) = SessionWriter::channel();

        assert!(writer.set(None));

        assert!(mirror.is_initialized());
        assert!(!mirror.is_signed_in());
    }

    #[test]
    fn test_user_and_session_travel_together() {
        let (writer, mirror) = SessionWriter::channel();
        writer.set(Some(session_for("a@safestrip.app")));

        let state = mirror.snapshot();
        assert_eq!(
            state.user().and_then(|user| user.email.as_deref()),
            Some("a@safestrip.app")
        );
        assert_eq!(mirror.access_token().as_deref(), Some("token-a@safestrip.app"));

        writer.set(None);
        let state = mirror.snapshot();
        assert!(state.user().is_none() && state.session().is_none());
    }

    #[test]
    fn test_clear_keeps_initialized() {
        let (writer, mirror) = SessionWriter::channel();
        writer.set(Some(session_for("a@safestrip.app")));

        writer.clear();

        assert!(mirror.is_initialized());
        assert!(!mirror.is_signed_in());
    }

    #[test]
    fn test_revoked_writer_is_silent() {
        let (writer, mirror) = SessionWriter::channel();
        writer.revoke();

        assert!(!writer.set(Some(session_for("late@safestrip.app"))));
        assert!(!writer.clear());
        assert!(writer.is_revoked());
        assert!(!mirror.is_initialized());
    }

    #[tokio::test]
    async fn test_initialized_waits_for_first_write() {
        let (writer, mut mirror) = SessionWriter::channel();

        let waiter = tokio::spawn(async move { mirror.initialized().await });
        writer.set(Some(session_for("wait@safestrip.app")));

        let state = waiter.await.unwrap();
        assert!(state.is_initialized());
        assert!(state.is_signed_in());
    }
}
