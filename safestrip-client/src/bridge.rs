use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::identity::{AuthError, AuthSubscription, IdentityProvider};
use crate::session::{SessionMirror, SessionWriter};

/// Keeps the [`SessionMirror`] in step with an [`IdentityProvider`]: one
/// initial fetch, then every change event, last write wins.
///
/// Mounting spawns a task and therefore needs a tokio runtime. Dropping
/// the bridge (or calling [`SyncBridge::unmount`]) releases the
/// subscription and guarantees no further writes reach the mirror.
pub struct SyncBridge {
    provider: Arc<dyn IdentityProvider>,
    writer: SessionWriter,
    mirror: SessionMirror,
    task: Option<JoinHandle<()>>,
}

impl SyncBridge {
    pub fn mount(provider: Arc<dyn IdentityProvider>) -> Self {
        let (writer, mirror) = SessionWriter::channel();

        // Subscribe before the fetch is issued so no change can slip between.
        let subscription = provider.subscribe();
        let task = tokio::spawn(Self::run(provider.clone(), subscription, writer.clone()));

        tracing::debug!("session sync bridge mounted");

        Self {
            provider,
            writer,
            mirror,
            task: Some(task),
        }
    }

    async fn run(
        provider: Arc<dyn IdentityProvider>,
        mut subscription: AuthSubscription,
        writer: SessionWriter,
    ) {
        let mut initial = provider.current_session();
        let mut fetched = false;
        let mut subscribed = true;

        loop {
            tokio::select! {
                result = &mut initial, if !fetched => {
                    fetched = true;
                    let session = result.unwrap_or_else(|e| {
                        tracing::warn!("initial session fetch failed: {}", e);
                        None
                    });
                    tracing::info!("session initialized, signed in: {}", session.is_some());
                    writer.set(session);
                }
                event = subscription.recv(), if subscribed => match event {
                    Some(event) => {
                        tracing::info!("auth state changed: {:?}", event.kind);
                        writer.set(event.session);
                    }
                    None => {
                        tracing::debug!("identity provider closed the subscription");
                        subscribed = false;
                    }
                },
                else => break,
            }
        }
    }

    pub fn provider(&self) -> &Arc<dyn IdentityProvider> {
        &self.provider
    }

    pub fn mirror(&self) -> SessionMirror {
        self.mirror.clone()
    }

    pub fn is_mounted(&self) -> bool {
        self.task.is_some() && !self.writer.is_revoked()
    }

    /// Signs out with the provider and clears the mirror. The mirror is
    /// cleared even when the provider call fails.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let result = self.provider.sign_out().await;

        if let Err(e) = &result {
            tracing::warn!("sign out failed at the identity provider: {}", e);
        }
        self.writer.clear();

        result
    }

    pub fn unmount(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        self.writer.revoke();

        if let Some(task) = self.task.take() {
            task.abort();
            tracing::debug!("session sync bridge unmounted");
        }
    }
}

impl Drop for SyncBridge {
    fn drop(&mut self) {
        self.teardown();
    }
}
