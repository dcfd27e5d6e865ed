use safestrip_api::models::{AuthSession, Credentials};

use crate::error::ValidationError;
use crate::identity::{AuthError, IdentityProvider};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthMode {
    SignIn,
    #[default]
    SignUp,
}

impl AuthMode {
    pub fn toggled(self) -> Self {
        match self {
            AuthMode::SignIn => AuthMode::SignUp,
            AuthMode::SignUp => AuthMode::SignIn,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    SignedIn(AuthSession),
    /// Sign-up accepted, the account must confirm its email first.
    AwaitingConfirmation,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Provider(#[from] AuthError),
}

/// Email and password form for signing in or registering.
#[derive(Debug, Clone, Default)]
pub struct AuthForm {
    pub mode: AuthMode,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    error: Option<String>,
}

impl AuthForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn toggle_mode(&mut self) {
        self.mode = self.mode.toggled();
        self.error = None;
    }

    pub fn validate(&self) -> Result<Credentials, ValidationError> {
        let email = self.email.trim();

        if email.is_empty() || self.password.is_empty() {
            return Err(ValidationError::MissingCredentials);
        }

        if self.mode == AuthMode::SignUp {
            if self.password.chars().count() < MIN_PASSWORD_LEN {
                return Err(ValidationError::PasswordTooShort);
            }
            if self.password != self.confirm_password {
                return Err(ValidationError::PasswordMismatch);
            }
        }

        Ok(Credentials {
            email: email.to_string(),
            password: self.password.clone(),
        })
    }

    /// Validates and hands the credentials to `provider`. On failure the
    /// message is kept on the form as well as returned.
    pub async fn submit(
        &mut self,
        provider: &dyn IdentityProvider,
    ) -> Result<AuthOutcome, SubmitError> {
        self.error = None;

        let result = self.send(provider).await;
        if let Err(e) = &result {
            tracing::debug!("auth form rejected: {}", e);
            self.error = Some(e.to_string());
        }

        result
    }

    async fn send(&self, provider: &dyn IdentityProvider) -> Result<AuthOutcome, SubmitError> {
        let credentials = self.validate()?;

        let outcome = match self.mode {
            AuthMode::SignIn => {
                AuthOutcome::SignedIn(provider.sign_in_with_password(&credentials).await?)
            }
            AuthMode::SignUp => match provider.sign_up(&credentials).await? {
                Some(session) => AuthOutcome::SignedIn(session),
                None => AuthOutcome::AwaitingConfirmation,
            },
        };

        Ok(outcome)
    }
}
