pub mod chats;
pub mod error;
pub mod gateway;
pub mod messages;
pub mod middleware;
pub mod reactions;
pub mod state;

use axum::{
    Json, Router,
    extract::State,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;

use crate::middleware::require_auth;
use crate::state::AppState;

/// All routes. CORS and tracing layers are added by the binary.
pub fn router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/messages", get(messages::get_messages).post(messages::send_message))
        .route("/messages/{message_id}", get(messages::get_message))
        .route("/messages/{message_id}/recall", post(messages::recall_message))
        .route("/messages/{message_id}/reactions", post(reactions::apply_reaction))
        .route("/chats", get(chats::list_chats))
        .route("/chats/read", post(chats::mark_read))
        .layer(axum::middleware::from_fn_with_state(state.clone(), require_auth));

    let public_routes = Router::new()
        .route("/gateway", get(gateway::ws_upgrade))
        .route("/health", get(health));

    Router::new()
        .merge(protected_routes)
        .merge(public_routes)
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let pipeline = state.pipeline();
    let stats = pipeline.stats();

    Json(json!({
        "status": "ok",
        "queue_depth": pipeline.queue().size(),
        "queue_capacity": pipeline.queue().capacity(),
        "online_users": state.dispatcher.online_users().len(),
        "persisted": stats.persisted,
        "failed": stats.failed,
        "dropped": stats.dropped,
        "flushes": stats.flushes,
    }))
}
