use aerobook_core::identity::{Role, User};
use aerobook_core::CoreError;
use aerobook_store::app_config::AuthConfig;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// JWT Claims
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub exp: usize,
}

/// The caller, freshly loaded from the user store for this request.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

pub fn issue_token(auth: &AuthConfig, user: &User) -> Result<String, AppError> {
    let expires_at = Utc::now() + Duration::seconds(auth.jwt_expiration_seconds as i64);
    let claims = Claims { sub: user.id, role: user.role, exp: expires_at.timestamp() as usize };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(auth.jwt_secret.expose().as_bytes()),
    )?;
    Ok(token)
}

fn decode_token(auth: &AuthConfig, token: &str) -> Result<Claims, CoreError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(auth.jwt_secret.expose().as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| {
        debug!("Rejected bearer token: {}", e);
        CoreError::Unauthenticated("Token is not valid".to_string())
    })
}

// ============================================================================
// Authentication
// ============================================================================

/// Resolve the bearer token to a stored user and attach it as `CurrentUser`.
pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Result<Response, AppError> {
    let Authorization(bearer) = req
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or_else(|| CoreError::Unauthenticated("No token, authorization denied".to_string()))?;

    let claims = decode_token(&state.auth, bearer.token())?;

    // Role and approval come from the stored record, never from the token.
    let user = state
        .repos
        .users
        .get_user(claims.sub)
        .await?
        .ok_or_else(|| CoreError::Unauthenticated("Token is not valid".to_string()))?;

    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}

// ============================================================================
// Authorization
// ============================================================================

/// Must be layered inside `require_auth`.
pub async fn require_admin(req: Request, next: Next) -> Result<Response, AppError> {
    let current = req
        .extensions()
        .get::<CurrentUser>()
        .ok_or_else(|| CoreError::Unauthenticated("No token, authorization denied".to_string()))?;

    if !current.0.is_admin() {
        return Err(CoreError::Forbidden("Access Denied: Admin role required.".to_string()).into());
    }

    Ok(next.run(req).await)
}
