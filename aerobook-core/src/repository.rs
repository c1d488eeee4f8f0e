use aerobook_catalog::{Flight, FlightUpdate};
use aerobook_shared::ApprovalStatus;
use async_trait::async_trait;
use uuid::Uuid;

use crate::booking::{Booking, NewBooking};
use crate::identity::{OperatorDecision, ProfileUpdate, Role, User};
use crate::search::FlightSearch;
use crate::CoreResult;

/// Credential Store.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `Conflict` when the email is taken.
    async fn create_user(&self, user: &User) -> CoreResult<()>;

    async fn get_user(&self, id: Uuid) -> CoreResult<Option<User>>;

    /// Case-insensitive lookup.
    async fn find_by_email(&self, email: &str) -> CoreResult<Option<User>>;

    /// Newest first.
    async fn list_users(&self) -> CoreResult<Vec<User>>;

    async fn list_operators(&self, status: ApprovalStatus) -> CoreResult<Vec<User>>;

    async fn count_by_role(&self, role: Role) -> CoreResult<u64>;

    /// Apply a self-service edit to the current record. Only profile columns
    /// are written, so operator state set concurrently is kept.
    /// `None` if the user does not exist.
    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> CoreResult<Option<User>>;

    /// Apply an admin decision to the current record, writing only the
    /// operator details. `None` if the user does not exist.
    async fn decide_operator(&self, id: Uuid, admin: &User, decision: &OperatorDecision) -> CoreResult<Option<User>>;
}

/// Flight Catalog.
#[async_trait]
pub trait FlightRepository: Send + Sync {
    /// Fails with `Conflict` when the flight number is taken.
    async fn create_flight(&self, flight: &Flight) -> CoreResult<()>;

    async fn get_flight(&self, id: Uuid) -> CoreResult<Option<Flight>>;

    /// Newest first.
    async fn list_flights(&self) -> CoreResult<Vec<Flight>>;

    async fn list_flights_by_operator(&self, operator_id: Uuid) -> CoreResult<Vec<Flight>>;

    async fn latest_approved(&self, limit: u32) -> CoreResult<Vec<Flight>>;

    async fn search_flights(&self, search: &FlightSearch) -> CoreResult<Vec<Flight>>;

    /// Sorted distinct departure and arrival cities of approved flights.
    async fn list_cities(&self) -> CoreResult<Vec<String>>;

    /// Applies the update under the same per-flight lock bookings use.
    /// `None` when the flight does not exist.
    async fn update_flight(&self, id: Uuid, update: &FlightUpdate) -> CoreResult<Option<Flight>>;

    async fn delete_flight(&self, id: Uuid) -> CoreResult<bool>;

    async fn count_flights(&self) -> CoreResult<u64>;
}

#[derive(Debug, Clone)]
pub struct CancelledBooking {
    pub booking: Booking,
    /// False when the flight no longer exists and there was nothing to restore.
    pub inventory_restored: bool,
}

/// Booking Ledger. `commit_booking` and `cancel_booking` are the atomic units
/// that keep a flight's seat pools and its bookings in agreement.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Locks the flight, reserves seats, persists the booking. On any error the
    /// flight is left unmodified and no booking exists.
    async fn commit_booking(&self, booking: NewBooking, probe_limit: u32) -> CoreResult<Booking>;

    /// Locks the booking (and its flight, if still present), marks it cancelled and
    /// returns its seats. A second cancel fails with `AlreadyCancelled`.
    async fn cancel_booking(&self, id: Uuid) -> CoreResult<CancelledBooking>;

    async fn get_booking(&self, id: Uuid) -> CoreResult<Option<Booking>>;

    /// Newest first.
    async fn list_bookings(&self) -> CoreResult<Vec<Booking>>;

    async fn list_bookings_for_user(&self, user_id: Uuid) -> CoreResult<Vec<Booking>>;

    async fn list_bookings_for_flights(&self, flight_ids: &[Uuid]) -> CoreResult<Vec<Booking>>;

    async fn count_bookings(&self) -> CoreResult<u64>;
}
