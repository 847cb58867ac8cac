//! History listing/deletion and learning statistics.

use axum::{
    extract::State,
    Json,
};
use serde_json::{json, Value};

use super::{ApiError, AppState, PathParam};
use crate::auth::AuthUser;
use crate::stats::UserStats;

/// GET /history: the caller's entries, newest first
pub async fn list(State(state): State<AppState>, auth: AuthUser) -> Result<Json<Value>, ApiError> {
    let history = state.store.list_history(auth.user_id)?;
    Ok(Json(json!({ "history": history })))
}

/// DELETE /history/{id}
///
/// Entries owned by someone else are reported exactly like missing ones.
pub async fn remove(
    State(state): State<AppState>,
    auth: AuthUser,
    PathParam(id): PathParam<i64>,
) -> Result<Json<Value>, ApiError> {
    if !state.store.delete_history(id, auth.user_id)? {
        return Err(ApiError::not_found("Entry not found"));
    }

    Ok(Json(json!({ "message": "Deleted" })))
}

/// GET /stats
pub async fn stats(State(state): State<AppState>, auth: AuthUser) -> Result<Json<UserStats>, ApiError> {
    let history = state.store.list_history(auth.user_id)?;
    Ok(Json(UserStats::from_history(&history)))
}
