//! Profile routes.

use axum::extract::State;
use axum::response::Json;

use crate::error::ApiError;
use crate::routes::auth::{AuthUser, account_error};
use crate::services::account::{self, ProfilePatch, User};
use crate::state::AppState;

/// `GET /api/profile`
pub async fn get_profile(State(state): State<AppState>, auth: AuthUser) -> Result<Json<User>, ApiError> {
    let user = account::get_user(&state.pool, auth.user.id)
        .await
        .map_err(account_error)?;
    Ok(Json(user))
}

/// `PATCH /api/profile` — absent keys are kept, `null` clears.
pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(patch): Json<ProfilePatch>,
) -> Result<Json<User>, ApiError> {
    let user = account::update_profile(&state.pool, auth.user.id, patch)
        .await
        .map_err(account_error)?;
    Ok(Json(user))
}
