use aerobook_core::identity::{Registration, Role, User};
use aerobook_core::CoreError;
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AppError;
use crate::extract::ApiJson;
use crate::middleware::issue_token;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum RegisterResponse {
    Session { token: String, user: User },
    PendingApproval { message: String },
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub user: User,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

pub async fn hash_password(password: String, cost: u32) -> Result<String, AppError> {
    let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??;
    Ok(hash)
}

async fn verify_password(password: String, hash: String) -> Result<bool, AppError> {
    let valid = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await??;
    Ok(valid)
}

async fn register(
    State(state): State<AppState>,
    ApiJson(registration): ApiJson<Registration>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    registration.validate()?;

    if registration.role == Role::Admin && !state.auth.allow_admin_signup {
        return Err(CoreError::Forbidden("Admin accounts cannot be self-registered".to_string()).into());
    }

    let email = registration.normalized_email();
    if state.repos.users.find_by_email(&email).await?.is_some() {
        return Err(CoreError::Conflict("User with this email already exists".to_string()).into());
    }

    let password_hash = hash_password(registration.password.clone(), state.auth.bcrypt_cost).await?;
    let user = registration.into_user(password_hash, Utc::now());
    state.repos.users.create_user(&user).await?;
    info!("Registered {} account {} ({})", user.role, user.id, user.email);

    if user.role == Role::Operator {
        return Ok((
            StatusCode::CREATED,
            Json(RegisterResponse::PendingApproval {
                message: "Operator registration successful! Your account is pending approval.".to_string(),
            }),
        ));
    }

    let token = issue_token(&state.auth, &user)?;
    Ok((StatusCode::CREATED, Json(RegisterResponse::Session { token, user })))
}

async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let user = state
        .repos
        .users
        .find_by_email(&req.email)
        .await?
        .ok_or(CoreError::InvalidCredentials)?;

    if !verify_password(req.password, user.password_hash.expose().clone()).await? {
        return Err(CoreError::InvalidCredentials.into());
    }

    let token = issue_token(&state.auth, &user)?;
    info!("User {} logged in", user.id);
    Ok(Json(SessionResponse { token, user }))
}
