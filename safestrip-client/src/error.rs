use serde::Deserialize;

/// Failures talking to the REST backend.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport level failure, the request never produced a response
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },
    /// The backend answered with a non-success status
    #[error("Backend responded with {status}: {message}")]
    Status { status: u16, message: String },
    /// Response body did not match the expected shape
    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

pub type Result<T, E = ClientError> = std::result::Result<T, E>;

impl ClientError {
    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::Network {
            message: message.into(),
            source: None,
        }
    }

    pub fn status<S: Into<String>>(status: u16, message: S) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    pub fn serialization<S: Into<String>>(message: S) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Builds a status error from a response body, preferring the
    /// `{"detail": ...}` envelope the backend uses.
    pub fn from_body(status: u16, body: &str) -> Self {
        #[derive(Deserialize)]
        struct Detail {
            detail: serde_json::Value,
        }

        let message = match serde_json::from_str::<Detail>(body) {
            Ok(Detail {
                detail: serde_json::Value::String(detail),
            }) => detail,
            Ok(Detail { detail }) => detail.to_string(),
            Err(_) if body.trim().is_empty() => format!("HTTP {status}"),
            Err(_) => body.trim().to_string(),
        };

        Self::status(status, message)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::Status { status: 404, .. })
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return ClientError::serialization(err.to_string());
        }

        ClientError::Network {
            message: "HTTP request failed".to_string(),
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::serialization(err.to_string())
    }
}

/// Input rejected before any network or provider call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Name must not be empty.")]
    EmptyName,

    #[error("Please enter email and password.")]
    MissingCredentials,

    #[error("Password must be at least 6 characters.")]
    PasswordTooShort,

    #[error("Passwords do not match.")]
    PasswordMismatch,
}

/// Trims `name` and rejects it when nothing is left.
pub fn required_name(name: &str) -> Result<&str, ValidationError> {
    match name.trim() {
        "" => Err(ValidationError::EmptyName),
        trimmed => Ok(trimmed),
    }
}
