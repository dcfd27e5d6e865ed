use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use safestrip_api::models::{AuthSession, Credentials, User};
use time::{Duration, OffsetDateTime};
use tokio::sync::broadcast;
use uuid::Uuid;

use super::{AuthError, AuthEvent, AuthSubscription, EVENT_CAPACITY, IdentityProvider};

#[derive(Debug, Clone)]
struct Account {
    password: String,
    user: User,
    confirmed: bool,
}

/// In-process identity provider with password accounts. Used for local
/// development and as the provider behind the test suites.
#[derive(Debug)]
pub struct MemoryIdentity {
    accounts: Mutex<HashMap<String, Account>>,
    current: Mutex<Option<AuthSession>>,
    events: broadcast::Sender<AuthEvent>,
    require_confirmation: bool,
    session_ttl: Duration,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn account_key(email: &str) -> String {
    email.trim().to_lowercase()
}

impl MemoryIdentity {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            accounts: Mutex::new(HashMap::new()),
            current: Mutex::new(None),
            events,
            require_confirmation: false,
            session_ttl: Duration::hours(1),
        }
    }

    /// Registers a confirmed account.
    pub fn with_account(self, email: &str, password: &str) -> Self {
        self.insert_account(email, password, true);
        self
    }

    /// Registers a confirmed account and starts with it signed in, as if a
    /// previous run had persisted the session.
    pub fn signed_in_as(self, email: &str, password: &str) -> Self {
        let user = self.insert_account(email, password, true);
        let session = self.issue(user);
        *lock(&self.current) = Some(session);
        self
    }

    /// New sign-ups stay unconfirmed and receive no session.
    pub fn requiring_confirmation(mut self) -> Self {
        self.require_confirmation = true;
        self
    }

    pub fn confirm(&self, email: &str) -> bool {
        match lock(&self.accounts).get_mut(&account_key(email)) {
            Some(account) => {
                account.confirmed = true;
                true
            }
            None => false,
        }
    }

    /// Rotates the tokens of the current session.
    pub fn refresh(&self) -> Result<AuthSession, AuthError> {
        let session = {
            let mut current = lock(&self.current);
            let user = current
                .as_ref()
                .map(|session| session.user.clone())
                .ok_or(AuthError::NoSession)?;
            let session = self.issue(user);
            *current = Some(session.clone());
            session
        };

        self.publish(AuthEvent::token_refreshed(session.clone()));
        Ok(session)
    }

    /// Pushes an arbitrary change to subscribers without touching state.
    pub fn emit(&self, event: AuthEvent) {
        self.publish(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    fn insert_account(&self, email: &str, password: &str, confirmed: bool) -> User {
        let user = User {
            id: Uuid::new_v4(),
            email: Some(email.trim().to_string()),
            created_at: Some(OffsetDateTime::now_utc()),
        };

        lock(&self.accounts).insert(
            account_key(email),
            Account {
                password: password.to_string(),
                user: user.clone(),
                confirmed,
            },
        );

        user
    }

    fn issue(&self, user: User) -> AuthSession {
        AuthSession {
            access_token: Uuid::new_v4().simple().to_string(),
            refresh_token: Some(Uuid::new_v4().simple().to_string()),
            expires_at: Some(OffsetDateTime::now_utc() + self.session_ttl),
            user,
        }
    }

    fn publish(&self, event: AuthEvent) {
        // No receivers is fine, nobody is listening yet.
        let _ = self.events.send(event);
    }
}

impl Default for MemoryIdentity {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentity {
    async fn current_session(&self) -> Result<Option<AuthSession>, AuthError> {
        Ok(lock(&self.current).clone())
    }

    fn subscribe(&self) -> AuthSubscription {
        AuthSubscription::new(self.events.subscribe())
    }

    async fn sign_in_with_password(&self, credentials: &Credentials) -> Result<AuthSession, AuthError> {
        let account = lock(&self.accounts)
            .get(&account_key(&credentials.email))
            .filter(|account| account.password == credentials.password)
            .cloned()
            .ok_or_else(|| AuthError::rejected("Invalid login credentials"))?;

        if !account.confirmed {
            return Err(AuthError::rejected("Email not confirmed"));
        }

        let session = self.issue(account.user);
        *lock(&self.current) = Some(session.clone());

        tracing::debug!("memory identity signed in {}", session.user.id);
        self.publish(AuthEvent::signed_in(session.clone()));

        Ok(session)
    }

    async fn sign_up(&self, credentials: &Credentials) -> Result<Option<AuthSession>, AuthError> {
        if lock(&self.accounts).contains_key(&account_key(&credentials.email)) {
            return Err(AuthError::rejected("User already registered"));
        }

        let user = self.insert_account(
            &credentials.email,
            &credentials.password,
            !self.require_confirmation,
        );

        if self.require_confirmation {
            return Ok(None);
        }

        let session = self.issue(user);
        *lock(&self.current) = Some(session.clone());
        self.publish(AuthEvent::signed_in(session.clone()));

        Ok(Some(session))
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let previous = lock(&self.current).take();

        if previous.is_some() {
            self.publish(AuthEvent::signed_out());
        }

        Ok(())
    }
}
