use std::collections::BTreeMap;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use parley_core::ReactionStore;
use parley_types::api::{
    Claims, MessageResponse, ReactionGroup, SendMessageRequest, SendMessageResponse,
};
use parley_types::models::{Message, MessageDraft, MessageId, MessageTarget, Reaction, SendStatus};

use crate::error::{ApiError, blocking};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub chat_id: Option<i64>,
    pub group_id: Option<i64>,
    /// Cursor: `created_at` (ms since epoch) of the oldest message already
    /// shown; only older messages are returned.
    pub before: Option<i64>,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    50
}

impl HistoryQuery {
    fn target(&self) -> Result<MessageTarget, ApiError> {
        match (self.chat_id, self.group_id) {
            (Some(chat_id), None) => Ok(MessageTarget::Private { chat_id }),
            (None, Some(group_id)) => Ok(MessageTarget::Group { group_id }),
            _ => Err(ApiError::bad_request("exactly one of chat_id or group_id is required")),
        }
    }
}

pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let draft = MessageDraft {
        target: req.target,
        content: req.content,
    };

    let st = state.clone();
    let receipt = blocking(move || st.service.send(claims.sub, draft)).await?;

    // Dropped is not an error in the core, but the client has to resend.
    let status = match receipt.status {
        SendStatus::Stored => StatusCode::CREATED,
        SendStatus::Queued => StatusCode::ACCEPTED,
        SendStatus::Dropped => StatusCode::SERVICE_UNAVAILABLE,
    };

    Ok((
        status,
        Json(SendMessageResponse {
            status: receipt.status,
            message: receipt.message,
        }),
    ))
}

pub async fn get_messages(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let target = query.target()?;
    let before = match query.before {
        Some(ms) => Some(
            chrono::DateTime::from_timestamp_millis(ms)
                .ok_or_else(|| ApiError::bad_request("before is out of range"))?,
        ),
        None => None,
    };
    let limit = query.limit;

    let st = state.clone();
    let (messages, reactions) = blocking(move || {
        let messages = st.service.history(claims.sub, target, before, limit)?;
        let ids: Vec<MessageId> = messages.iter().map(|m| m.id).collect();
        let reactions = st.db.reactions_for_messages(&ids)?;
        Ok((messages, reactions))
    })
    .await?;

    Ok(Json(with_reactions(messages, &reactions)))
}

pub async fn get_message(
    State(state): State<AppState>,
    Path(message_id): Path<MessageId>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let st = state.clone();
    let (message, reactions) = blocking(move || {
        let message = st.service.get(claims.sub, message_id)?;
        let reactions = st.db.reactions_for_messages(&[message_id])?;
        Ok((message, reactions))
    })
    .await?;

    let mut responses = with_reactions(vec![message], &reactions);
    responses.pop().map(Json).ok_or_else(ApiError::internal)
}

pub async fn recall_message(
    State(state): State<AppState>,
    Path(message_id): Path<MessageId>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let st = state.clone();
    let message = blocking(move || st.service.recall(claims.sub, message_id)).await?;
    Ok(Json(message))
}

/// Group reactions by message -> reaction type -> user ids (cheap in-memory
/// work, fine on the async thread).
fn with_reactions(messages: Vec<Message>, reactions: &[Reaction]) -> Vec<MessageResponse> {
    let mut reaction_map: BTreeMap<MessageId, BTreeMap<&str, Vec<i64>>> = BTreeMap::new();
    for r in reactions {
        reaction_map
            .entry(r.message_id)
            .or_default()
            .entry(r.reaction_type.as_str())
            .or_default()
            .push(r.user_id);
    }

    messages
        .into_iter()
        .map(|message| {
            let reactions = reaction_map
                .get(&message.id)
                .map(|by_type| {
                    by_type
                        .iter()
                        .map(|(reaction_type, user_ids)| ReactionGroup {
                            reaction_type: reaction_type.to_string(),
                            count: user_ids.len(),
                            user_ids: user_ids.clone(),
                        })
                        .collect()
                })
                .unwrap_or_default();

            MessageResponse { message, reactions }
        })
        .collect()
}
