use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};

use parley_types::api::{Claims, MarkReadRequest};

use crate::error::{ApiError, blocking};
use crate::state::AppState;

pub async fn list_chats(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let st = state.clone();
    let entries = blocking(move || st.service.chat_list(claims.sub)).await?;
    Ok(Json(entries))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<MarkReadRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let st = state.clone();
    blocking(move || st.service.mark_read(claims.sub, req.peer)).await?;
    Ok(StatusCode::NO_CONTENT)
}
