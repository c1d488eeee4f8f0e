use aerobook_core::identity::{ProfileUpdate, User};
use aerobook_core::CoreError;
use axum::{extract::State, routing::get, Extension, Json, Router};

use crate::error::AppError;
use crate::extract::ApiJson;
use crate::middleware::CurrentUser;
use crate::state::AppState;

/// Mounted behind `require_auth`.
pub fn routes() -> Router<AppState> {
    Router::new().route("/users/me", get(me).put(update_me))
}

async fn me(Extension(CurrentUser(user)): Extension<CurrentUser>) -> Json<User> {
    Json(user)
}

async fn update_me(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiJson(update): ApiJson<ProfileUpdate>,
) -> Result<Json<User>, AppError> {
    state
        .repos
        .users
        .update_profile(user.id, &update)
        .await?
        .map(Json)
        .ok_or_else(|| CoreError::NotFound("User not found".to_string()).into())
}
