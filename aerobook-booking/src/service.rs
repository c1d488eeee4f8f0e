use aerobook_catalog::SeatClass;
use aerobook_core::booking::{generate_reference, Booking, ContactInfo, NewBooking, Passenger};
use aerobook_core::identity::User;
use aerobook_core::repository::{BookingRepository, FlightRepository, UserRepository};
use aerobook_core::{CoreError, CoreResult};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Prices closer than this are treated as equal when checking the client's total.
const PRICE_TOLERANCE: f64 = 0.005;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBooking {
    pub flight_id: Uuid,
    pub number_of_passengers: u32,
    pub seat_class: SeatClass,
    pub passengers: Vec<Passenger>,
    pub total_price: f64,
}

impl CreateBooking {
    pub fn validate(&self) -> CoreResult<()> {
        if self.number_of_passengers == 0 {
            return Err(CoreError::Validation("numberOfPassengers must be at least 1".to_string()));
        }
        if self.passengers.len() != self.number_of_passengers as usize {
            return Err(CoreError::Validation(format!(
                "expected {} passengers, got {}",
                self.number_of_passengers,
                self.passengers.len()
            )));
        }
        if self.passengers.iter().any(|p| p.name.trim().is_empty()) {
            return Err(CoreError::Validation("passenger name is required".to_string()));
        }
        if !self.total_price.is_finite() || self.total_price < 0.0 {
            return Err(CoreError::Validation("totalPrice must be a non-negative number".to_string()));
        }
        Ok(())
    }
}

pub struct BookingService {
    users: Arc<dyn UserRepository>,
    flights: Arc<dyn FlightRepository>,
    bookings: Arc<dyn BookingRepository>,
    probe_limit: u32,
}

impl BookingService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        flights: Arc<dyn FlightRepository>,
        bookings: Arc<dyn BookingRepository>,
        probe_limit: u32,
    ) -> Self {
        Self { users, flights, bookings, probe_limit }
    }

    /// Seats are checked, allocated and taken inside the store's atomic unit;
    /// the flight read here only feeds the price check.
    pub async fn create_booking(&self, requester: &User, request: CreateBooking) -> CoreResult<Booking> {
        request.validate()?;

        let flight = self
            .flights
            .get_flight(request.flight_id)
            .await?
            .ok_or_else(|| CoreError::NotFound("Flight not found".to_string()))?;

        let catalog_total = flight.fare(request.seat_class, request.number_of_passengers);
        if (catalog_total - request.total_price).abs() > PRICE_TOLERANCE {
            warn!(
                "Client total {} differs from catalog total {} for flight {} ({} x {})",
                request.total_price, catalog_total, flight.flight_number, request.number_of_passengers, request.seat_class
            );
        }

        // Contact details come from the stored record, not the token.
        let user = self
            .users
            .get_user(requester.id)
            .await?
            .ok_or_else(|| CoreError::Unauthenticated("User not found".to_string()))?;

        let draft = NewBooking {
            booking_reference: generate_reference(Utc::now()),
            user_id: user.id,
            flight_id: flight.id,
            passengers: request.passengers,
            number_of_passengers: request.number_of_passengers,
            seat_class: request.seat_class,
            total_price: request.total_price,
            contact_info: ContactInfo { email: user.email.clone(), phone: user.phone.clone() },
        };

        let booking = self.bookings.commit_booking(draft, self.probe_limit).await?;
        info!(
            "Booking {} confirmed: {} {} seat(s) on {} -> {:?}",
            booking.booking_reference, booking.number_of_passengers, booking.seat_class, flight.flight_number, booking.seats_booked
        );
        Ok(booking)
    }

    /// Owner, admin, or the operator of the booked flight may cancel. When the
    /// flight is gone only the owner or an admin qualifies.
    pub async fn cancel_booking(&self, booking_id: Uuid, requester: &User) -> CoreResult<Booking> {
        let booking = self
            .bookings
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| CoreError::NotFound("Booking not found".to_string()))?;

        if !self.may_cancel(&booking, requester).await? {
            return Err(CoreError::Unauthorized("Not authorized to cancel this booking".to_string()));
        }

        let cancelled = self.bookings.cancel_booking(booking_id).await?;
        if cancelled.inventory_restored {
            info!(
                "Booking {} cancelled by {}: {} seat(s) returned",
                cancelled.booking.booking_reference, requester.id, cancelled.booking.number_of_passengers
            );
        } else {
            info!(
                "Booking {} cancelled by {}: flight {} no longer exists",
                cancelled.booking.booking_reference, requester.id, cancelled.booking.flight_id
            );
        }
        Ok(cancelled.booking)
    }

    async fn may_cancel(&self, booking: &Booking, requester: &User) -> CoreResult<bool> {
        if booking.user_id == requester.id || requester.is_admin() {
            return Ok(true);
        }
        if requester.ensure_operator().is_err() {
            return Ok(false);
        }
        let flight = self.flights.get_flight(booking.flight_id).await?;
        Ok(flight.is_some_and(|f| f.created_by == requester.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aerobook_catalog::{Flight, NewFlight};
    use aerobook_core::booking::BookingStatus;
    use aerobook_core::identity::{Registration, Role};
    use aerobook_store::Repositories;

    struct Fixture {
        repos: Repositories,
        service: Arc<BookingService>,
        operator: User,
        traveller: User,
    }

    async fn register(repos: &Repositories, name: &str, role: Role) -> User {
        let user = Registration {
            username: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            password: "secret1".to_string(),
            phone: "555-0100".to_string(),
            role,
            license_number: None,
        }
        .into_user("hash".to_string(), Utc::now());
        repos.users.create_user(&user).await.unwrap();
        user
    }

    async fn publish(repos: &Repositories, operator: &User, economy: u32) -> Flight {
        let body = serde_json::json!({
            "flightNumber": format!("AB{}", economy * 100 + 1),
            "airline": "AeroBook Air",
            "departure": {"city": "Delhi", "date": "2025-03-01", "time": "09:00"},
            "arrival": {"city": "Mumbai", "date": "2025-03-01", "time": "11:00"},
            "price": {"economy": 100.0, "business": 250.0, "firstClass": 500.0},
            "seats": {
                "economy": {"total": economy},
                "business": {"total": 2},
                "firstClass": {"total": 1}
            }
        });
        let draft: NewFlight = serde_json::from_value(body).unwrap();
        let flight = draft.into_flight(operator.id, Utc::now()).unwrap();
        repos.flights.create_flight(&flight).await.unwrap();
        flight
    }

    async fn fixture(economy: u32) -> (Fixture, Flight) {
        let repos = Repositories::in_memory();
        let operator = register(&repos, "SkyJet", Role::Operator).await;
        let traveller = register(&repos, "Asha", Role::User).await;
        let flight = publish(&repos, &operator, economy).await;
        let service = Arc::new(BookingService::new(
            repos.users.clone(),
            repos.flights.clone(),
            repos.bookings.clone(),
            aerobook_catalog::DEFAULT_PROBE_LIMIT,
        ));
        (Fixture { repos, service, operator, traveller }, flight)
    }

    fn request(flight: &Flight, count: u32) -> CreateBooking {
        CreateBooking {
            flight_id: flight.id,
            number_of_passengers: count,
            seat_class: SeatClass::Economy,
            passengers: (0..count).map(|i| Passenger { name: format!("Passenger {}", i + 1), age: 30 }).collect(),
            total_price: flight.fare(SeatClass::Economy, count),
        }
    }

    #[tokio::test]
    async fn test_book_exhaust_then_cancel_restores_pool() {
        let (fx, flight) = fixture(2).await;

        let booking = fx.service.create_booking(&fx.traveller, request(&flight, 2)).await.unwrap();
        assert_eq!(booking.seats_booked, vec!["E1", "E2"]);
        assert_eq!(booking.contact_info.email, "asha@example.com");

        let stored = fx.repos.flights.get_flight(flight.id).await.unwrap().unwrap();
        assert_eq!(stored.seats.economy.available, 0);

        let err = fx.service.create_booking(&fx.traveller, request(&flight, 1)).await.unwrap_err();
        assert!(matches!(err, CoreError::InsufficientInventory { seat_class: SeatClass::Economy, .. }));
        let unchanged = fx.repos.flights.get_flight(flight.id).await.unwrap().unwrap();
        assert_eq!(unchanged, stored);

        fx.service.cancel_booking(booking.id, &fx.traveller).await.unwrap();
        let restored = fx.repos.flights.get_flight(flight.id).await.unwrap().unwrap();
        assert_eq!(restored.seats.economy.available, 2);
        assert!(restored.booked_seats.is_empty());
        assert!(restored.seat_ledger_consistent());
    }

    #[tokio::test]
    async fn test_second_cancel_fails_and_restores_once() {
        let (fx, flight) = fixture(3).await;
        let first = fx.service.create_booking(&fx.traveller, request(&flight, 1)).await.unwrap();
        let second = fx.service.create_booking(&fx.traveller, request(&flight, 1)).await.unwrap();
        assert_eq!(second.seats_booked, vec!["E2"]);

        let cancelled = fx.service.cancel_booking(first.id, &fx.traveller).await.unwrap();
        assert_eq!(cancelled.booking_status, BookingStatus::Cancelled);
        let err = fx.service.cancel_booking(first.id, &fx.traveller).await.unwrap_err();
        assert!(matches!(err, CoreError::AlreadyCancelled));

        let stored = fx.repos.flights.get_flight(flight.id).await.unwrap().unwrap();
        assert_eq!(stored.seats.economy.available, 2);
        assert_eq!(stored.booked_seats, vec!["E2"]);

        // The freed identifier is handed out again.
        let third = fx.service.create_booking(&fx.traveller, request(&flight, 1)).await.unwrap();
        assert_eq!(third.seats_booked, vec!["E1"]);
    }

    #[tokio::test]
    async fn test_cancel_authorization() {
        let (fx, flight) = fixture(3).await;
        let booking = fx.service.create_booking(&fx.traveller, request(&flight, 1)).await.unwrap();

        let stranger = register(&fx.repos, "Ravi", Role::User).await;
        let err = fx.service.cancel_booking(booking.id, &stranger).await.unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized(_)));

        let other_operator = register(&fx.repos, "OtherAir", Role::Operator).await;
        let err = fx.service.cancel_booking(booking.id, &other_operator).await.unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized(_)));

        fx.service.cancel_booking(booking.id, &fx.operator).await.unwrap();

        let missing = fx.service.cancel_booking(Uuid::new_v4(), &fx.operator).await.unwrap_err();
        assert!(matches!(missing, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_cancel_after_flight_deleted() {
        let (fx, flight) = fixture(3).await;
        let booking = fx.service.create_booking(&fx.traveller, request(&flight, 2)).await.unwrap();
        assert!(fx.repos.flights.delete_flight(flight.id).await.unwrap());

        let err = fx.service.cancel_booking(booking.id, &fx.operator).await.unwrap_err();
        assert!(matches!(err, CoreError::Unauthorized(_)));

        let cancelled = fx.service.cancel_booking(booking.id, &fx.traveller).await.unwrap();
        assert_eq!(cancelled.booking_status, BookingStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_flight_and_bad_manifest() {
        let (fx, flight) = fixture(3).await;

        let mut unknown = request(&flight, 1);
        unknown.flight_id = Uuid::new_v4();
        assert!(matches!(
            fx.service.create_booking(&fx.traveller, unknown).await,
            Err(CoreError::NotFound(_))
        ));

        let mut short = request(&flight, 2);
        short.passengers.pop();
        assert!(matches!(
            fx.service.create_booking(&fx.traveller, short).await,
            Err(CoreError::Validation(_))
        ));

        let mut overpriced = request(&flight, 1);
        overpriced.total_price = 1.0;
        let booking = fx.service.create_booking(&fx.traveller, overpriced).await.unwrap();
        assert_eq!(booking.total_price, 1.0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_bookings_never_oversell() {
        let (fx, flight) = fixture(5).await;

        let mut handles = Vec::new();
        for _ in 0..12 {
            let service = fx.service.clone();
            let traveller = fx.traveller.clone();
            let req = request(&flight, 1);
            handles.push(tokio::spawn(async move { service.create_booking(&traveller, req).await }));
        }

        let mut admitted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => admitted += 1,
                Err(CoreError::InsufficientInventory { .. }) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(admitted, 5);
        let stored = fx.repos.flights.get_flight(flight.id).await.unwrap().unwrap();
        assert_eq!(stored.seats.economy.available, 0);
        assert_eq!(stored.booked_seats.len(), 5);
        assert!(stored.seat_ledger_consistent());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_double_cancel_restores_once() {
        let (fx, flight) = fixture(4).await;
        let booking_id = fx.service.create_booking(&fx.traveller, request(&flight, 2)).await.unwrap().id;
        fx.service.create_booking(&fx.traveller, request(&flight, 1)).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..2 {
            let service = fx.service.clone();
            let traveller = fx.traveller.clone();
            handles.push(tokio::spawn(async move { service.cancel_booking(booking_id, &traveller).await }));
        }

        let mut cancelled = 0;
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => cancelled += 1,
                Err(CoreError::AlreadyCancelled) => rejected += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!((cancelled, rejected), (1, 1));

        let stored = fx.repos.flights.get_flight(flight.id).await.unwrap().unwrap();
        assert_eq!(stored.seats.economy.available, 3);
        assert_eq!(stored.booked_seats, vec!["E3"]);
        assert!(stored.seat_ledger_consistent());
    }
}
