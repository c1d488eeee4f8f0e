use aerobook_catalog::{Flight, Location};
use aerobook_core::booking::Booking;
use aerobook_core::identity::User;
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightSummary {
    pub id: Uuid,
    pub flight_number: String,
    pub airline: String,
    pub departure: Location,
    pub arrival: Location,
}

impl From<&Flight> for FlightSummary {
    fn from(flight: &Flight) -> Self {
        Self {
            id: flight.id,
            flight_number: flight.flight_number.clone(),
            airline: flight.airline.clone(),
            departure: flight.departure.clone(),
            arrival: flight.arrival.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: String,
    pub phone: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
        }
    }
}

/// A booking with its flight and user resolved. Either side is `null` once the
/// referenced record has been deleted.
#[derive(Debug, Serialize)]
pub struct BookingView {
    #[serde(flatten)]
    pub booking: Booking,
    pub flight: Option<FlightSummary>,
    pub user: Option<UserSummary>,
}

pub async fn booking_views(state: &AppState, bookings: Vec<Booking>) -> Result<Vec<BookingView>, AppError> {
    let mut flights: HashMap<Uuid, Option<FlightSummary>> = HashMap::new();
    let mut users: HashMap<Uuid, Option<UserSummary>> = HashMap::new();

    for booking in &bookings {
        if !flights.contains_key(&booking.flight_id) {
            let flight = state.repos.flights.get_flight(booking.flight_id).await?;
            flights.insert(booking.flight_id, flight.as_ref().map(FlightSummary::from));
        }
        if !users.contains_key(&booking.user_id) {
            let user = state.repos.users.get_user(booking.user_id).await?;
            users.insert(booking.user_id, user.as_ref().map(UserSummary::from));
        }
    }

    Ok(bookings
        .into_iter()
        .map(|booking| BookingView {
            flight: flights.get(&booking.flight_id).cloned().flatten(),
            user: users.get(&booking.user_id).cloned().flatten(),
            booking,
        })
        .collect())
}
