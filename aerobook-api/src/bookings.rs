use aerobook_booking::CreateBooking;
use aerobook_core::booking::Booking;
use axum::{
    extract::State,
    handler::Handler,
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::extract::{ApiJson, ApiPath};
use crate::middleware::{require_admin, require_auth, CurrentUser};
use crate::state::AppState;
use crate::views::{booking_views, BookingView};

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub message: String,
    pub booking: Booking,
}

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/bookings",
            post(create_booking).get(list_bookings.layer(from_fn(require_admin))),
        )
        .route("/bookings/my-bookings", get(my_bookings))
        .route("/bookings/operator/my-bookings", get(operator_bookings))
        .route("/bookings/{id}/cancel", put(cancel_booking))
        .route_layer(from_fn_with_state(state.clone(), require_auth))
}

async fn create_booking(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiJson(req): ApiJson<CreateBooking>,
) -> Result<(StatusCode, Json<BookingResponse>), AppError> {
    let booking = state.booking_service.create_booking(&user, req).await?;
    Ok((
        StatusCode::CREATED,
        Json(BookingResponse { message: "Booking successful!".to_string(), booking }),
    ))
}

async fn my_bookings(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<Vec<BookingView>>, AppError> {
    let bookings = state.repos.bookings.list_bookings_for_user(user.id).await?;
    Ok(Json(booking_views(&state, bookings).await?))
}

/// Bookings on flights the calling operator owns.
async fn operator_bookings(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<Vec<BookingView>>, AppError> {
    user.ensure_operator()?;
    let flight_ids: Vec<Uuid> = state
        .repos
        .flights
        .list_flights_by_operator(user.id)
        .await?
        .iter()
        .map(|f| f.id)
        .collect();
    let bookings = state.repos.bookings.list_bookings_for_flights(&flight_ids).await?;
    Ok(Json(booking_views(&state, bookings).await?))
}

async fn cancel_booking(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<BookingResponse>, AppError> {
    let booking = state.booking_service.cancel_booking(id, &user).await?;
    Ok(Json(BookingResponse { message: "Booking cancelled successfully".to_string(), booking }))
}

pub(crate) async fn list_bookings(State(state): State<AppState>) -> Result<Json<Vec<BookingView>>, AppError> {
    let bookings = state.repos.bookings.list_bookings().await?;
    Ok(Json(booking_views(&state, bookings).await?))
}
