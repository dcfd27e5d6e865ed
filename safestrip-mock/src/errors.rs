use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Workspace not found")]
    WorkspaceNotFound,

    #[error("Device not found")]
    DeviceNotFound,

    /// Request body or query failed validation
    #[error("{0}")]
    Validation(String),
}

impl ApiError {
    pub fn validation<S: Into<String>>(message: S) -> Self {
        ApiError::Validation(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::WorkspaceNotFound => StatusCode::NOT_FOUND,
            ApiError::DeviceNotFound => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        tracing::debug!("request failed with {}: {}", status, self);

        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

/// Checks that `value` holds between `min` and `max` characters.
pub fn check_length(field: &str, value: &str, min: usize, max: usize) -> Result<(), ApiError> {
    let len = value.chars().count();

    if len < min {
        return Err(ApiError::validation(format!(
            "{field} must be at least {min} characters"
        )));
    }
    if len > max {
        return Err(ApiError::validation(format!(
            "{field} must be at most {max} characters"
        )));
    }

    Ok(())
}
