use parley_types::models::{MessageId, UserId};
use thiserror::Error;

use crate::store::StoreError;

/// Failures raised synchronously by send, recall and reaction apply.
///
/// None of these are retried automatically.
#[derive(Debug, Error)]
pub enum MessagingError {
    /// Malformed or incomplete input, or an insert that touched no rows.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{what} {id} not found")]
    NotFound { what: &'static str, id: i64 },

    #[error("user {user_id} may not {action}")]
    Permission { user_id: UserId, action: &'static str },

    #[error("message {0} was already recalled")]
    AlreadyRecalled(MessageId),

    #[error("recall window expired for message {message_id} ({elapsed_ms} ms since send, limit {window_ms} ms)")]
    WindowExpired {
        message_id: MessageId,
        elapsed_ms: i64,
        window_ms: i64,
    },

    #[error("invalid reaction action: {0:?}")]
    InvalidOperation(String),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl MessagingError {
    pub fn message_not_found(id: MessageId) -> Self {
        Self::NotFound { what: "message", id }
    }
}

pub type Result<T> = std::result::Result<T, MessagingError>;
