use aerobook_core::booking::Booking;
use aerobook_core::identity::{OperatorDecision, Role, User};
use aerobook_core::CoreError;
use aerobook_shared::ApprovalStatus;
use axum::{
    body::Bytes,
    extract::State,
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::{bookings, flights};
use crate::extract::{ApiPath, ApiQuery};
use crate::middleware::{require_admin, require_auth, CurrentUser};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStats {
    pub total_users: u64,
    pub total_bookings: u64,
    pub total_flights: u64,
    pub pending_operators: Vec<User>,
}

#[derive(Debug, Deserialize)]
pub struct ApplicationsQuery {
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RejectRequest {
    #[serde(default)]
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OperatorDecisionResponse {
    pub message: String,
    pub operator: User,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub message: String,
    pub booking: Booking,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

// ============================================================================
// Routes
// ============================================================================

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/stats", get(stats))
        .route("/admin/users", get(list_users))
        .route("/admin/users/{id}", get(get_user))
        .route("/admin/applications", get(list_applications))
        .route("/admin/operators/{id}/approve", put(approve_operator))
        .route("/admin/operators/{id}/reject", put(reject_operator))
        .route("/admin/bookings", get(bookings::list_bookings))
        .route("/admin/bookings/{id}/cancel", put(cancel_booking))
        .route("/admin/flights", get(flights::list_flights))
        .route("/admin/flights/{id}", delete(delete_flight))
        // Last layer runs first: authenticate, then check the role.
        .route_layer(from_fn(require_admin))
        .route_layer(from_fn_with_state(state.clone(), require_auth))
}

async fn stats(State(state): State<AppState>) -> Result<Json<AdminStats>, AppError> {
    Ok(Json(AdminStats {
        total_users: state.repos.users.count_by_role(Role::User).await?,
        total_bookings: state.repos.bookings.count_bookings().await?,
        total_flights: state.repos.flights.count_flights().await?,
        pending_operators: state.repos.users.list_operators(ApprovalStatus::Pending).await?,
    }))
}

async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<User>>, AppError> {
    Ok(Json(state.repos.users.list_users().await?))
}

async fn get_user(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> Result<Json<User>, AppError> {
    state
        .repos
        .users
        .get_user(id)
        .await?
        .map(Json)
        .ok_or_else(|| CoreError::NotFound("User not found".to_string()).into())
}

async fn list_applications(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ApplicationsQuery>,
) -> Result<Json<Vec<User>>, AppError> {
    let status = match query.status.as_deref() {
        None | Some("") => ApprovalStatus::Pending,
        Some(raw) => raw.parse::<ApprovalStatus>().map_err(|e| AppError::validation(e.to_string()))?,
    };
    Ok(Json(state.repos.users.list_operators(status).await?))
}

async fn decide(state: &AppState, admin: &User, id: Uuid, decision: OperatorDecision) -> Result<User, AppError> {
    Ok(state
        .repos
        .users
        .decide_operator(id, admin, &decision)
        .await?
        .ok_or_else(|| CoreError::NotFound("Operator not found".to_string()))?)
}

async fn approve_operator(
    State(state): State<AppState>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<OperatorDecisionResponse>, AppError> {
    let operator = decide(&state, &admin, id, OperatorDecision::Approve).await?;
    info!("Operator {} approved by admin {}", operator.id, admin.id);

    Ok(Json(OperatorDecisionResponse { message: "Operator approved successfully".to_string(), operator }))
}

/// The body is optional; without one the default rejection reason is stored.
async fn reject_operator(
    State(state): State<AppState>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    ApiPath(id): ApiPath<Uuid>,
    body: Bytes,
) -> Result<Json<OperatorDecisionResponse>, AppError> {
    let request: RejectRequest = if body.iter().all(u8::is_ascii_whitespace) {
        RejectRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| AppError::validation(e.to_string()))?
    };

    let decision = OperatorDecision::Reject { reason: request.rejection_reason };
    let operator = decide(&state, &admin, id, decision).await?;
    info!("Operator {} rejected by admin {}", operator.id, admin.id);

    Ok(Json(OperatorDecisionResponse { message: "Operator rejected".to_string(), operator }))
}

async fn cancel_booking(
    State(state): State<AppState>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<CancelResponse>, AppError> {
    let booking = state.booking_service.cancel_booking(id, &admin).await?;
    Ok(Json(CancelResponse { message: "Booking cancelled successfully".to_string(), booking }))
}

async fn delete_flight(
    State(state): State<AppState>,
    Extension(CurrentUser(admin)): Extension<CurrentUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    if !state.repos.flights.delete_flight(id).await? {
        return Err(CoreError::NotFound("Flight not found".to_string()).into());
    }
    info!("Flight {} deleted by admin {}", id, admin.id);
    Ok(Json(MessageResponse { message: "Flight deleted successfully".to_string() }))
}
