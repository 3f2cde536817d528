use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

use parley_core::MessagingError;

/// HTTP error: a status code plus a short message in a JSON body.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn internal() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "internal error".into(),
        }
    }
}

impl From<MessagingError> for ApiError {
    fn from(e: MessagingError) -> Self {
        let status = match &e {
            MessagingError::Validation(_) | MessagingError::InvalidOperation(_) => StatusCode::BAD_REQUEST,
            MessagingError::Permission { .. } => StatusCode::FORBIDDEN,
            MessagingError::NotFound { .. } => StatusCode::NOT_FOUND,
            MessagingError::AlreadyRecalled(_) => StatusCode::CONFLICT,
            MessagingError::WindowExpired { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            MessagingError::Storage(inner) => {
                error!("Storage failure: {}", inner);
                return Self::internal();
            }
        };

        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// Run a blocking core call off the async runtime.
pub async fn blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> parley_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::internal()
        })?
        .map_err(ApiError::from)
}
