use aerobook_catalog::{Flight, FlightUpdate};
use aerobook_core::booking::{Booking, NewBooking};
use aerobook_core::identity::{OperatorDecision, ProfileUpdate, Role, User};
use aerobook_core::repository::{BookingRepository, CancelledBooking, FlightRepository, UserRepository};
use aerobook_core::search::FlightSearch;
use aerobook_core::{eq_lowercase, CoreError, CoreResult};
use aerobook_shared::ApprovalStatus;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    flights: HashMap<Uuid, Flight>,
    bookings: HashMap<Uuid, Booking>,
}

/// Non-persistent store behind one lock. Every write takes the lock for its
/// whole read-modify-write, which gives the same atomic units as the
/// row-locked Postgres transactions.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first<T, F>(mut items: Vec<T>, created_at: F) -> Vec<T>
where
    F: Fn(&T) -> chrono::DateTime<Utc>,
{
    items.sort_by_key(|item| std::cmp::Reverse(created_at(item)));
    items
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create_user(&self, user: &User) -> CoreResult<()> {
        let mut state = self.state.write().await;
        if state.users.values().any(|u| eq_lowercase(&u.email, &user.email)) {
            return Err(CoreError::Conflict("User with this email already exists".to_string()));
        }
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> CoreResult<Option<User>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> CoreResult<Option<User>> {
        let email = email.trim();
        let state = self.state.read().await;
        Ok(state.users.values().find(|u| eq_lowercase(&u.email, email)).cloned())
    }

    async fn list_users(&self) -> CoreResult<Vec<User>> {
        let users = self.state.read().await.users.values().cloned().collect();
        Ok(newest_first(users, |u: &User| u.created_at))
    }

    async fn list_operators(&self, status: ApprovalStatus) -> CoreResult<Vec<User>> {
        let users = self
            .state
            .read()
            .await
            .users
            .values()
            .filter(|u| u.role == Role::Operator && u.approval_status() == Some(status))
            .cloned()
            .collect();
        Ok(newest_first(users, |u: &User| u.created_at))
    }

    async fn count_by_role(&self, role: Role) -> CoreResult<u64> {
        Ok(self.state.read().await.users.values().filter(|u| u.role == role).count() as u64)
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> CoreResult<Option<User>> {
        let mut state = self.state.write().await;
        let Some(stored) = state.users.get_mut(&id) else {
            return Ok(None);
        };
        let mut user = stored.clone();
        user.apply_profile(update, Utc::now())?;
        *stored = user.clone();
        Ok(Some(user))
    }

    async fn decide_operator(&self, id: Uuid, admin: &User, decision: &OperatorDecision) -> CoreResult<Option<User>> {
        let mut state = self.state.write().await;
        let Some(stored) = state.users.get_mut(&id) else {
            return Ok(None);
        };
        let mut user = stored.clone();
        user.apply_decision(admin, decision, Utc::now())?;
        *stored = user.clone();
        Ok(Some(user))
    }
}

#[async_trait]
impl FlightRepository for MemoryStore {
    async fn create_flight(&self, flight: &Flight) -> CoreResult<()> {
        let mut state = self.state.write().await;
        if state.flights.values().any(|f| f.flight_number == flight.flight_number) {
            return Err(CoreError::Conflict("A flight with this number already exists.".to_string()));
        }
        state.flights.insert(flight.id, flight.clone());
        Ok(())
    }

    async fn get_flight(&self, id: Uuid) -> CoreResult<Option<Flight>> {
        Ok(self.state.read().await.flights.get(&id).cloned())
    }

    async fn list_flights(&self) -> CoreResult<Vec<Flight>> {
        let flights = self.state.read().await.flights.values().cloned().collect();
        Ok(newest_first(flights, |f: &Flight| f.created_at))
    }

    async fn list_flights_by_operator(&self, operator_id: Uuid) -> CoreResult<Vec<Flight>> {
        let flights = self
            .state
            .read()
            .await
            .flights
            .values()
            .filter(|f| f.created_by == operator_id)
            .cloned()
            .collect();
        Ok(newest_first(flights, |f: &Flight| f.created_at))
    }

    async fn latest_approved(&self, limit: u32) -> CoreResult<Vec<Flight>> {
        let flights = self.state.read().await.flights.values().filter(|f| f.is_approved()).cloned().collect();
        let mut flights = newest_first(flights, |f: &Flight| f.created_at);
        flights.truncate(limit as usize);
        Ok(flights)
    }

    async fn search_flights(&self, search: &FlightSearch) -> CoreResult<Vec<Flight>> {
        let mut flights: Vec<Flight> =
            self.state.read().await.flights.values().filter(|f| search.matches(f)).cloned().collect();
        flights.sort_by_key(|f| f.departure.date);
        Ok(flights)
    }

    async fn list_cities(&self) -> CoreResult<Vec<String>> {
        let state = self.state.read().await;
        let cities: BTreeSet<String> = state
            .flights
            .values()
            .filter(|f| f.is_approved())
            .flat_map(|f| [f.departure.city.clone(), f.arrival.city.clone()])
            .collect();
        Ok(cities.into_iter().collect())
    }

    async fn update_flight(&self, id: Uuid, update: &FlightUpdate) -> CoreResult<Option<Flight>> {
        let mut state = self.state.write().await;
        let Some(flight) = state.flights.get_mut(&id) else {
            return Ok(None);
        };
        update.apply_to(flight, Utc::now())?;
        Ok(Some(flight.clone()))
    }

    async fn delete_flight(&self, id: Uuid) -> CoreResult<bool> {
        Ok(self.state.write().await.flights.remove(&id).is_some())
    }

    async fn count_flights(&self) -> CoreResult<u64> {
        Ok(self.state.read().await.flights.len() as u64)
    }
}

#[async_trait]
impl BookingRepository for MemoryStore {
    async fn commit_booking(&self, draft: NewBooking, probe_limit: u32) -> CoreResult<Booking> {
        let mut state = self.state.write().await;
        if state.bookings.values().any(|b| b.booking_reference == draft.booking_reference) {
            return Err(CoreError::Conflict("Booking reference collision, please retry".to_string()));
        }
        let flight = state
            .flights
            .get_mut(&draft.flight_id)
            .ok_or_else(|| CoreError::NotFound("Flight not found".to_string()))?;

        let now = Utc::now();
        let seats = flight.reserve(draft.seat_class, draft.number_of_passengers, probe_limit)?;
        flight.updated_at = now;

        let booking = draft.into_booking(seats, now);
        state.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn cancel_booking(&self, id: Uuid) -> CoreResult<CancelledBooking> {
        let mut state = self.state.write().await;
        let MemoryState { flights, bookings, .. } = &mut *state;

        let booking = bookings
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound("Booking not found".to_string()))?;
        let now = Utc::now();
        booking.cancel(now)?;

        let inventory_restored = match flights.get_mut(&booking.flight_id) {
            Some(flight) => {
                flight.release(booking.seat_class, booking.number_of_passengers, &booking.seats_booked);
                flight.updated_at = now;
                true
            }
            None => false,
        };
        Ok(CancelledBooking { booking: booking.clone(), inventory_restored })
    }

    async fn get_booking(&self, id: Uuid) -> CoreResult<Option<Booking>> {
        Ok(self.state.read().await.bookings.get(&id).cloned())
    }

    async fn list_bookings(&self) -> CoreResult<Vec<Booking>> {
        let bookings = self.state.read().await.bookings.values().cloned().collect();
        Ok(newest_first(bookings, |b: &Booking| b.created_at))
    }

    async fn list_bookings_for_user(&self, user_id: Uuid) -> CoreResult<Vec<Booking>> {
        let bookings = self
            .state
            .read()
            .await
            .bookings
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        Ok(newest_first(bookings, |b: &Booking| b.created_at))
    }

    async fn list_bookings_for_flights(&self, flight_ids: &[Uuid]) -> CoreResult<Vec<Booking>> {
        let bookings = self
            .state
            .read()
            .await
            .bookings
            .values()
            .filter(|b| flight_ids.contains(&b.flight_id))
            .cloned()
            .collect();
        Ok(newest_first(bookings, |b: &Booking| b.created_at))
    }

    async fn count_bookings(&self) -> CoreResult<u64> {
        Ok(self.state.read().await.bookings.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aerobook_catalog::{FlightStatus, Location, PriceTiers, SeatClass, SeatPool, SeatPools};
    use aerobook_core::booking::{generate_reference, ContactInfo, Passenger};
    use aerobook_core::search::FlightSearchQuery;
    use chrono::{Duration, TimeZone};

    fn flight(number: &str, from: &str, to: &str, economy: u32) -> Flight {
        let now = Utc::now();
        let date = Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).unwrap();
        let location = |city: &str| Location {
            airport: None,
            city: city.to_string(),
            country: None,
            date,
            time: "09:30".to_string(),
        };
        Flight {
            id: Uuid::new_v4(),
            flight_number: number.to_string(),
            airline: "AeroBook Air".to_string(),
            departure: location(from),
            arrival: location(to),
            price: PriceTiers { economy: 100.0, business: 200.0, first_class: 400.0 },
            seats: SeatPools {
                economy: SeatPool::new(economy),
                business: SeatPool::new(1),
                first_class: SeatPool::new(0),
            },
            booked_seats: Vec::new(),
            duration: None,
            aircraft: None,
            status: FlightStatus::Scheduled,
            approval_status: ApprovalStatus::Approved,
            created_by: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        }
    }

    fn draft(flight: &Flight, count: u32) -> NewBooking {
        NewBooking {
            booking_reference: generate_reference(Utc::now()),
            user_id: Uuid::new_v4(),
            flight_id: flight.id,
            passengers: (0..count).map(|i| Passenger { name: format!("P{}", i), age: 40 }).collect(),
            number_of_passengers: count,
            seat_class: SeatClass::Economy,
            total_price: 100.0 * f64::from(count),
            contact_info: ContactInfo { email: "p@example.com".to_string(), phone: "1".to_string() },
        }
    }

    #[tokio::test]
    async fn test_failed_commit_leaves_flight_untouched() {
        let store = MemoryStore::new();
        let f = flight("AB100", "Delhi", "Goa", 1);
        store.create_flight(&f).await.unwrap();

        let err = store.commit_booking(draft(&f, 2), 500).await.unwrap_err();
        assert!(matches!(err, CoreError::InsufficientInventory { requested: 2, available: 1, .. }));
        assert_eq!(store.get_flight(f.id).await.unwrap().unwrap(), f);
        assert_eq!(store.count_bookings().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cancel_without_flight_still_cancels() {
        let store = MemoryStore::new();
        let f = flight("AB101", "Delhi", "Goa", 3);
        store.create_flight(&f).await.unwrap();
        let booking = store.commit_booking(draft(&f, 2), 500).await.unwrap();
        store.delete_flight(f.id).await.unwrap();

        let cancelled = store.cancel_booking(booking.id).await.unwrap();
        assert!(!cancelled.inventory_restored);
        assert!(cancelled.booking.is_cancelled());
        assert!(matches!(store.cancel_booking(booking.id).await, Err(CoreError::AlreadyCancelled)));
    }

    #[tokio::test]
    async fn test_duplicate_flight_number_conflicts() {
        let store = MemoryStore::new();
        store.create_flight(&flight("AB102", "Delhi", "Goa", 3)).await.unwrap();
        let err = store.create_flight(&flight("AB102", "Pune", "Goa", 3)).await.unwrap_err();
        assert!(matches!(err, CoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_search_and_cities() {
        let store = MemoryStore::new();
        let mut later = flight("AB103", "Delhi", "Mumbai", 3);
        later.departure.date += Duration::days(1);
        let mut pending = flight("AB104", "Delhi", "Mumbai", 3);
        pending.approval_status = ApprovalStatus::Pending;
        for f in [flight("AB105", "Delhi", "Mumbai", 3), later, pending, flight("AB106", "Pune", "Goa", 3)] {
            store.create_flight(&f).await.unwrap();
        }

        let search = FlightSearch::try_from(FlightSearchQuery {
            from: Some("DELHI".to_string()),
            to: Some("mumbai".to_string()),
            date: Some("2025-03-01".to_string()),
        })
        .unwrap();
        let found = store.search_flights(&search).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].flight_number, "AB105");

        let cities = store.list_cities().await.unwrap();
        assert_eq!(cities, vec!["Delhi", "Goa", "Mumbai", "Pune"]);
    }

    #[tokio::test]
    async fn test_update_rejects_capacity_below_booked() {
        let store = MemoryStore::new();
        let f = flight("AB107", "Delhi", "Goa", 4);
        store.create_flight(&f).await.unwrap();
        store.commit_booking(draft(&f, 3), 500).await.unwrap();

        let shrink: FlightUpdate = serde_json::from_str(r#"{"seats":{"economy":2}}"#).unwrap();
        assert!(matches!(store.update_flight(f.id, &shrink).await, Err(CoreError::Validation(_))));

        let grow: FlightUpdate = serde_json::from_str(r#"{"seats":{"economy":6}}"#).unwrap();
        let updated = store.update_flight(f.id, &grow).await.unwrap().unwrap();
        assert_eq!(updated.seats.economy, SeatPool { total: 6, available: 3 });
        assert!(updated.seat_ledger_consistent());

        assert!(store.update_flight(Uuid::new_v4(), &grow).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_search_folds_non_ascii_cities() {
        let store = MemoryStore::new();
        store.create_flight(&flight("AB108", "São Paulo", "Zürich", 3)).await.unwrap();

        let search = FlightSearch::try_from(FlightSearchQuery {
            from: Some("SÃO PAULO".to_string()),
            to: Some("zürich".to_string()),
            date: None,
        })
        .unwrap();
        assert_eq!(store.search_flights(&search).await.unwrap().len(), 1);
    }

    fn account(name: &str, role: Role) -> User {
        aerobook_core::identity::Registration {
            username: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            password: "secret1".to_string(),
            phone: "555-0100".to_string(),
            role,
            license_number: None,
        }
        .into_user("hash".to_string(), Utc::now())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_profile_edits_and_decisions_do_not_overwrite_each_other() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let admin = account("Root", Role::Admin);
        let operator = account("SkyJet", Role::Operator);
        store.create_user(&admin).await.unwrap();
        store.create_user(&operator).await.unwrap();

        // A snapshot taken before the decision must not be able to undo it.
        let stale = store.get_user(operator.id).await.unwrap().unwrap();
        assert_eq!(stale.approval_status(), Some(ApprovalStatus::Pending));

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            let id = operator.id;
            handles.push(tokio::spawn(async move {
                let update = ProfileUpdate { phone: Some(format!("555-01{:02}", i)), ..Default::default() };
                store.update_profile(id, &update).await.map(|_| ())
            }));
        }
        {
            let store = store.clone();
            let admin = admin.clone();
            let id = operator.id;
            handles.push(tokio::spawn(async move {
                store.decide_operator(id, &admin, &OperatorDecision::Approve).await.map(|_| ())
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let update = ProfileUpdate { last_name: Some("Air".to_string()), ..Default::default() };
        store.update_profile(stale.id, &update).await.unwrap().unwrap();

        let stored = store.get_user(operator.id).await.unwrap().unwrap();
        assert_eq!(stored.approval_status(), Some(ApprovalStatus::Approved));
        assert_eq!(stored.operator_details.as_ref().unwrap().approved_by, Some(admin.id));
        assert_eq!(stored.last_name.as_deref(), Some("Air"));
        assert!(stored.phone.starts_with("555-01"));

        // Decisions leave profile fields alone.
        let reject = OperatorDecision::Reject { reason: Some("expired license".to_string()) };
        let rejected = store.decide_operator(operator.id, &admin, &reject).await.unwrap().unwrap();
        assert_eq!(rejected.last_name.as_deref(), Some("Air"));
        assert_eq!(rejected.approval_status(), Some(ApprovalStatus::Rejected));

        assert!(store.update_profile(uuid::Uuid::new_v4(), &update).await.unwrap().is_none());
    }
}
