mod gotrue;
mod memory;

pub use gotrue::GoTrueIdentity;
pub use memory::MemoryIdentity;

use async_trait::async_trait;
use safestrip_api::models::{AuthSession, Credentials};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

/// Capacity of the auth change channel. Receivers that fall behind skip to
/// the newest event, which is all the mirror needs.
pub(crate) const EVENT_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEventKind {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEvent {
    pub kind: AuthEventKind,
    pub session: Option<AuthSession>,
}

impl AuthEvent {
    pub fn signed_in(session: AuthSession) -> Self {
        Self {
            kind: AuthEventKind::SignedIn,
            session: Some(session),
        }
    }

    pub fn signed_out() -> Self {
        Self {
            kind: AuthEventKind::SignedOut,
            session: None,
        }
    }

    pub fn token_refreshed(session: AuthSession) -> Self {
        Self {
            kind: AuthEventKind::TokenRefreshed,
            session: Some(session),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The provider refused the request. The message is shown verbatim.
    #[error("{0}")]
    Rejected(String),

    #[error("Unable to reach the identity provider: {0}")]
    Network(String),

    #[error("No active session")]
    NoSession,
}

impl AuthError {
    pub fn rejected<S: Into<String>>(message: S) -> Self {
        AuthError::Rejected(message.into())
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        AuthError::Network(err.to_string())
    }
}

/// A registered auth change listener. Dropping it unsubscribes.
#[derive(Debug)]
pub struct AuthSubscription {
    rx: broadcast::Receiver<AuthEvent>,
}

impl AuthSubscription {
    pub(crate) fn new(rx: broadcast::Receiver<AuthEvent>) -> Self {
        Self { rx }
    }

    /// Next change, or `None` once the provider is gone.
    pub async fn recv(&mut self) -> Option<AuthEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("auth subscription lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    pub fn unsubscribe(self) {
        drop(self.rx);
    }
}

/// Issues and revokes sessions and reports every change to subscribers.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// One-shot read of the current session.
    async fn current_session(&self) -> Result<Option<AuthSession>, AuthError>;

    fn subscribe(&self) -> AuthSubscription;

    async fn sign_in_with_password(&self, credentials: &Credentials) -> Result<AuthSession, AuthError>;

    /// `Ok(None)` when the account awaits email confirmation.
    async fn sign_up(&self, credentials: &Credentials) -> Result<Option<AuthSession>, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;
}
