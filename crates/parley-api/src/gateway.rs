use axum::{
    extract::{Query, State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::warn;

use parley_gateway::connection::handle_connection;

use crate::middleware::decode_token;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct GatewayQuery {
    pub token: String,
}

/// Browsers cannot set headers on a WebSocket handshake, so the token rides
/// in the query string.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(query): Query<GatewayQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(claims) = decode_token(&query.token, &state.jwt_secret) else {
        warn!("Gateway upgrade rejected: invalid token");
        return StatusCode::UNAUTHORIZED.into_response();
    };

    let dispatcher = state.dispatcher.clone();
    ws.on_upgrade(move |socket| handle_connection(socket, dispatcher, claims.sub))
}
