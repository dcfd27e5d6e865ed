use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response};
use safestrip_api::models::{AuthSession, Credentials, User};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::{AuthError, AuthEvent, AuthSubscription, EVENT_CAPACITY, IdentityProvider};
use crate::config::normalize_base_url;

/// How often the auto refresh loop looks at the session.
const REFRESH_TICK: Duration = Duration::from_secs(30);

/// Sessions expiring within this window are refreshed ahead of time.
const EXPIRY_MARGIN: time::Duration = time::Duration::seconds(90);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: User,
}

impl TokenResponse {
    fn into_session(self, now: OffsetDateTime) -> AuthSession {
        let expires_at = self
            .expires_at
            .and_then(|at| OffsetDateTime::from_unix_timestamp(at).ok())
            .or_else(|| {
                self.expires_in
                    .map(|seconds| now + time::Duration::seconds(seconds))
            });

        AuthSession {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

/// Sign-up answers with a session, or with the bare user when the account
/// still needs email confirmation.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(TokenResponse),
    Pending(User),
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ErrorBody {
    fn into_message(self) -> Option<String> {
        self.error_description
            .or(self.msg)
            .or(self.message)
            .or(self.error)
    }
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Identity provider backed by a GoTrue (Supabase Auth) server.
///
/// The session lives in memory only; a restarted client starts signed out.
#[derive(Debug)]
pub struct GoTrueIdentity {
    http: reqwest::Client,
    url: String,
    anon_key: String,
    current: Mutex<Option<AuthSession>>,
    events: broadcast::Sender<AuthEvent>,
}

impl GoTrueIdentity {
    pub fn new(url: &str, anon_key: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            http,
            url: normalize_base_url(url),
            anon_key: anon_key.to_string(),
            current: Mutex::new(None),
            events,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1{}", self.url, path)
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header("apikey", &self.anon_key)
    }

    fn current(&self) -> MutexGuard<'_, Option<AuthSession>> {
        self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn store(&self, session: Option<AuthSession>, event: AuthEvent) {
        *self.current() = session;
        let _ = self.events.send(event);
    }

    async fn check(response: Response) -> Result<Response, AuthError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.json::<ErrorBody>().await.unwrap_or_default();
        let message = body
            .into_message()
            .unwrap_or_else(|| format!("Authentication failed ({})", status.as_u16()));

        tracing::debug!("identity provider rejected request: {}", message);
        Err(AuthError::Rejected(message))
    }

    /// Exchanges the refresh token for a new session.
    pub async fn refresh_session(&self) -> Result<AuthSession, AuthError> {
        let refresh_token = self
            .current()
            .as_ref()
            .and_then(|session| session.refresh_token.clone())
            .ok_or(AuthError::NoSession)?;

        let response = self
            .request(self.http.post(self.endpoint("/token")))
            .query(&[("grant_type", "refresh_token")])
            .json(&RefreshRequest {
                refresh_token: &refresh_token,
            })
            .send()
            .await?;

        let token: TokenResponse = Self::check(response).await?.json().await?;
        let session = token.into_session(OffsetDateTime::now_utc());

        self.store(
            Some(session.clone()),
            AuthEvent::token_refreshed(session.clone()),
        );

        Ok(session)
    }

    /// Returns the current session, refreshing it first when it expires
    /// within [`EXPIRY_MARGIN`] of `now`. A rejected refresh signs out.
    pub async fn refresh_if_expiring(
        &self,
        now: OffsetDateTime,
    ) -> Result<Option<AuthSession>, AuthError> {
        let Some(session) = self.current().clone() else {
            return Ok(None);
        };
        if !session.is_expired_at(now + EXPIRY_MARGIN) {
            return Ok(Some(session));
        }

        match self.refresh_session().await {
            Ok(refreshed) => {
                tracing::debug!("refreshed session of {}", refreshed.user_id());
                Ok(Some(refreshed))
            }
            Err(AuthError::Network(e)) if !session.is_expired_at(now) => {
                tracing::warn!("session refresh failed, keeping current token: {}", e);
                Ok(Some(session))
            }
            Err(e @ AuthError::Network(_)) => Err(e),
            Err(e) => {
                tracing::info!("session of {} ended: {}", session.user_id(), e);
                self.store(None, AuthEvent::signed_out());
                Ok(None)
            }
        }
    }

    /// Keeps the session fresh in the background. Subscribers see each
    /// refresh as a `TokenRefreshed` event. The loop ends once the
    /// provider is dropped.
    pub fn start_auto_refresh(self: &Arc<Self>) -> JoinHandle<()> {
        let identity = Arc::downgrade(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(REFRESH_TICK);

            loop {
                ticker.tick().await;

                let Some(identity) = identity.upgrade() else {
                    break;
                };
                if let Err(e) = identity.refresh_if_expiring(OffsetDateTime::now_utc()).await {
                    tracing::warn!("auto refresh failed: {}", e);
                }
            }
        })
    }
}

#[async_trait]
impl IdentityProvider for GoTrueIdentity {
    async fn current_session(&self) -> Result<Option<AuthSession>, AuthError> {
        self.refresh_if_expiring(OffsetDateTime::now_utc()).await
    }

    fn subscribe(&self) -> AuthSubscription {
        AuthSubscription::new(self.events.subscribe())
    }

    async fn sign_in_with_password(&self, credentials: &Credentials) -> Result<AuthSession, AuthError> {
        let response = self
            .request(self.http.post(self.endpoint("/token")))
            .query(&[("grant_type", "password")])
            .json(credentials)
            .send()
            .await?;

        let token: TokenResponse = Self::check(response).await?.json().await?;
        let session = token.into_session(OffsetDateTime::now_utc());

        self.store(Some(session.clone()), AuthEvent::signed_in(session.clone()));

        Ok(session)
    }

    async fn sign_up(&self, credentials: &Credentials) -> Result<Option<AuthSession>, AuthError> {
        let response = self
            .request(self.http.post(self.endpoint("/signup")))
            .json(credentials)
            .send()
            .await?;

        match Self::check(response).await?.json::<SignUpResponse>().await? {
            SignUpResponse::Session(token) => {
                let session = token.into_session(OffsetDateTime::now_utc());
                self.store(Some(session.clone()), AuthEvent::signed_in(session.clone()));
                Ok(Some(session))
            }
            SignUpResponse::Pending(user) => {
                tracing::info!("sign-up for {} awaits email confirmation", user.id);
                Ok(None)
            }
        }
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let token = self
            .current()
            .as_ref()
            .map(|session| session.access_token.clone());

        // The local session is dropped even if the server call fails.
        self.store(None, AuthEvent::signed_out());

        if let Some(token) = token {
            let response = self
                .request(self.http.post(self.endpoint("/logout")))
                .bearer_auth(token)
                .send()
                .await?;
            Self::check(response).await?;
        }

        Ok(())
    }
}
