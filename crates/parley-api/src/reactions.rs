use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use tracing::info;

use parley_core::reaction_event;
use parley_types::api::{Claims, ReactionRequest, ReactionResponse};
use parley_types::models::MessageId;

use crate::error::{ApiError, blocking};
use crate::state::AppState;

/// Add or remove the caller's reaction on a message they can read.
pub async fn apply_reaction(
    State(state): State<AppState>,
    Path(message_id): Path<MessageId>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ReactionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = claims.sub;
    let st = state.clone();
    let outcome = blocking(move || {
        let message = st.service.get(user_id, message_id)?;
        let outcome = st
            .reactions
            .apply(message_id, user_id, &req.action, &req.reaction_type)?;

        if let Some(event) = reaction_event(outcome, message_id, user_id, &req.reaction_type) {
            st.service.announce(&message, &event);
        }
        Ok(outcome)
    })
    .await?;

    info!(message_id, user_id, ?outcome, "Reaction request handled");
    Ok(Json(ReactionResponse { outcome }))
}
