use aerobook_catalog::Flight;
use axum::{
    extract::State,
    middleware::from_fn_with_state,
    routing::get,
    Extension, Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::{require_auth, CurrentUser};
use crate::state::AppState;
use crate::views::{booking_views, BookingView};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorStats {
    pub total_flights: usize,
    pub total_bookings: usize,
    pub flights: Vec<Flight>,
    pub bookings: Vec<BookingView>,
}

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/operator/stats", get(operator_stats))
        .route_layer(from_fn_with_state(state.clone(), require_auth))
}

async fn operator_stats(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<OperatorStats>, AppError> {
    user.ensure_operator()?;

    let flights = state.repos.flights.list_flights_by_operator(user.id).await?;
    let flight_ids: Vec<Uuid> = flights.iter().map(|f| f.id).collect();
    let bookings = state.repos.bookings.list_bookings_for_flights(&flight_ids).await?;
    let bookings = booking_views(&state, bookings).await?;

    Ok(Json(OperatorStats {
        total_flights: flights.len(),
        total_bookings: bookings.len(),
        flights,
        bookings,
    }))
}
