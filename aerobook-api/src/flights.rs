use aerobook_catalog::{Flight, FlightUpdate, NewFlight};
use aerobook_core::identity::{Role, User};
use aerobook_core::search::{FlightSearch, FlightSearchQuery};
use aerobook_core::CoreError;
use axum::{
    extract::State,
    handler::Handler,
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::{require_admin, require_auth, CurrentUser};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct FlightResponse {
    pub message: String,
    pub flight: Flight,
}

pub fn routes(state: &AppState) -> Router<AppState> {
    let auth = from_fn_with_state(state.clone(), require_auth);

    Router::new()
        .route("/flights/latest", get(latest_flights))
        .route("/flights/cities", get(list_cities))
        .route("/flights/search", get(search_flights))
        .route(
            "/flights",
            post(create_flight)
                .get(list_flights.layer(from_fn(require_admin)))
                .route_layer(auth.clone()),
        )
        .route(
            "/flights/{id}",
            get(get_flight).merge(put(update_flight).route_layer(auth)),
        )
}

async fn latest_flights(State(state): State<AppState>) -> Result<Json<Vec<Flight>>, AppError> {
    let flights = state
        .repos
        .flights
        .latest_approved(state.business_rules.latest_flights_limit)
        .await?;
    Ok(Json(flights))
}

async fn list_cities(State(state): State<AppState>) -> Result<Json<Vec<String>>, AppError> {
    Ok(Json(state.repos.flights.list_cities().await?))
}

async fn search_flights(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<FlightSearchQuery>,
) -> Result<Json<Vec<Flight>>, AppError> {
    let search = FlightSearch::try_from(query)?;
    Ok(Json(state.repos.flights.search_flights(&search).await?))
}

async fn get_flight(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Flight>, AppError> {
    state
        .repos
        .flights
        .get_flight(id)
        .await?
        .filter(Flight::is_approved)
        .map(Json)
        .ok_or_else(|| CoreError::NotFound("Flight not found".to_string()).into())
}

pub(crate) async fn list_flights(State(state): State<AppState>) -> Result<Json<Vec<Flight>>, AppError> {
    Ok(Json(state.repos.flights.list_flights().await?))
}

async fn create_flight(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiJson(draft): ApiJson<NewFlight>,
) -> Result<(StatusCode, Json<FlightResponse>), AppError> {
    // `user` was loaded for this request, so a revoked operator is blocked immediately.
    user.ensure_can_publish_flights()?;

    let flight = draft.into_flight(user.id, Utc::now()).map_err(CoreError::from)?;
    state.repos.flights.create_flight(&flight).await?;
    info!("Flight {} published by operator {}", flight.flight_number, user.id);

    Ok((
        StatusCode::CREATED,
        Json(FlightResponse { message: "Flight created successfully".to_string(), flight }),
    ))
}

fn may_edit(user: &User, flight: &Flight) -> bool {
    user.is_admin() || (user.role == Role::Operator && flight.created_by == user.id)
}

async fn update_flight(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(update): ApiJson<FlightUpdate>,
) -> Result<Json<FlightResponse>, AppError> {
    let existing = state
        .repos
        .flights
        .get_flight(id)
        .await?
        .ok_or_else(|| CoreError::NotFound("Flight not found".to_string()))?;

    if !may_edit(&user, &existing) {
        return Err(CoreError::Forbidden("Not authorized to update this flight".to_string()).into());
    }

    let flight = state
        .repos
        .flights
        .update_flight(id, &update)
        .await?
        .ok_or_else(|| CoreError::NotFound("Flight not found".to_string()))?;
    info!("Flight {} updated by {}", flight.flight_number, user.id);

    Ok(Json(FlightResponse { message: "Flight updated successfully".to_string(), flight }))
}
