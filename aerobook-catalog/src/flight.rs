use aerobook_shared::ApprovalStatus;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Seat classes
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum SeatClass {
    Economy,
    Business,
    FirstClass,
}

impl SeatClass {
    pub const ALL: [SeatClass; 3] = [SeatClass::Economy, SeatClass::Business, SeatClass::FirstClass];

    /// Letter that prefixes every seat identifier of this class (`E12`, `B3`, `F1`).
    pub fn prefix(&self) -> char {
        match self {
            SeatClass::Economy => 'E',
            SeatClass::Business => 'B',
            SeatClass::FirstClass => 'F',
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SeatClass::Economy => "economy",
            SeatClass::Business => "business",
            SeatClass::FirstClass => "firstClass",
        }
    }

    /// True when `seat_id` is a derived identifier of this class.
    pub fn owns_seat(&self, seat_id: &str) -> bool {
        seat_id
            .strip_prefix(self.prefix())
            .is_some_and(|n| !n.is_empty() && n.parse::<u32>().is_ok())
    }
}

impl fmt::Display for SeatClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeatClass {
    type Err = FlightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "economy" => Ok(SeatClass::Economy),
            "business" => Ok(SeatClass::Business),
            "firstClass" => Ok(SeatClass::FirstClass),
            other => Err(FlightError::Invalid(format!("unknown seat class: {}", other))),
        }
    }
}

// ============================================================================
// Operational status
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FlightStatus {
    #[default]
    Scheduled,
    Delayed,
    Cancelled,
}

impl FlightStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlightStatus::Scheduled => "scheduled",
            FlightStatus::Delayed => "delayed",
            FlightStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for FlightStatus {
    type Err = FlightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(FlightStatus::Scheduled),
            "delayed" => Ok(FlightStatus::Delayed),
            "cancelled" => Ok(FlightStatus::Cancelled),
            other => Err(FlightError::Invalid(format!("unknown flight status: {}", other))),
        }
    }
}

// ============================================================================
// Embedded value types
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Location {
    #[serde(default)]
    pub airport: Option<String>,
    pub city: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(deserialize_with = "deserialize_flexible_date")]
    pub date: DateTime<Utc>,
    pub time: String,
}

impl Location {
    fn validate(&self, field: &str) -> Result<(), FlightError> {
        if self.city.trim().is_empty() {
            return Err(FlightError::Invalid(format!("{}.city is required", field)));
        }
        if self.time.trim().is_empty() {
            return Err(FlightError::Invalid(format!("{}.time is required", field)));
        }
        Ok(())
    }

    fn normalized(mut self) -> Self {
        self.city = self.city.trim().to_string();
        self.time = self.time.trim().to_string();
        self.airport = self.airport.map(|a| a.trim().to_string()).filter(|a| !a.is_empty());
        self.country = self.country.map(|c| c.trim().to_string()).filter(|c| !c.is_empty());
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PriceTiers {
    pub economy: f64,
    pub business: f64,
    pub first_class: f64,
}

impl PriceTiers {
    pub fn get(&self, class: SeatClass) -> f64 {
        match class {
            SeatClass::Economy => self.economy,
            SeatClass::Business => self.business,
            SeatClass::FirstClass => self.first_class,
        }
    }

    fn validate(&self) -> Result<(), FlightError> {
        for class in SeatClass::ALL {
            let price = self.get(class);
            if !price.is_finite() || price < 0.0 {
                return Err(FlightError::Invalid(format!("price.{} must be a non-negative number", class)));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeatPool {
    pub total: u32,
    pub available: u32,
}

impl SeatPool {
    pub fn new(total: u32) -> Self {
        Self { total, available: total }
    }

    pub fn booked(&self) -> u32 {
        self.total.saturating_sub(self.available)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SeatPools {
    pub economy: SeatPool,
    pub business: SeatPool,
    pub first_class: SeatPool,
}

impl SeatPools {
    pub fn get(&self, class: SeatClass) -> &SeatPool {
        match class {
            SeatClass::Economy => &self.economy,
            SeatClass::Business => &self.business,
            SeatClass::FirstClass => &self.first_class,
        }
    }

    pub fn get_mut(&mut self, class: SeatClass) -> &mut SeatPool {
        match class {
            SeatClass::Economy => &mut self.economy,
            SeatClass::Business => &mut self.business,
            SeatClass::FirstClass => &mut self.first_class,
        }
    }
}

// ============================================================================
// Flight
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Flight {
    pub id: Uuid,
    pub flight_number: String,
    pub airline: String,
    pub departure: Location,
    pub arrival: Location,
    pub price: PriceTiers,
    pub seats: SeatPools,
    pub booked_seats: Vec<String>,
    pub duration: Option<String>,
    pub aircraft: Option<String>,
    pub status: FlightStatus,
    pub approval_status: ApprovalStatus,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Flight {
    pub fn is_approved(&self) -> bool {
        self.approval_status == ApprovalStatus::Approved
    }

    /// Catalog price for `passengers` seats of `class`.
    pub fn fare(&self, class: SeatClass, passengers: u32) -> f64 {
        self.price.get(class) * f64::from(passengers)
    }

    /// Seat identifiers of `class` currently held by bookings.
    pub fn booked_in_class(&self, class: SeatClass) -> impl Iterator<Item = &str> {
        self.booked_seats
            .iter()
            .map(String::as_str)
            .filter(move |seat| class.owns_seat(seat))
    }

    /// `available + |booked seats of class| == total` for every class, with no duplicate seats.
    pub fn seat_ledger_consistent(&self) -> bool {
        let mut seen = std::collections::HashSet::new();
        if !self.booked_seats.iter().all(|s| seen.insert(s.as_str())) {
            return false;
        }
        SeatClass::ALL.iter().all(|class| {
            let pool = self.seats.get(*class);
            pool.available <= pool.total
                && pool.available as usize + self.booked_in_class(*class).count() == pool.total as usize
        })
    }
}

// ============================================================================
// Allow-listed inputs
// ============================================================================

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeatCapacity {
    pub total: u32,
    #[serde(default)]
    pub available: Option<u32>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SeatCapacities {
    pub economy: SeatCapacity,
    pub business: SeatCapacity,
    pub first_class: SeatCapacity,
}

/// Fields an approved operator supplies when publishing a flight.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewFlight {
    pub flight_number: String,
    pub airline: String,
    pub departure: Location,
    pub arrival: Location,
    pub price: PriceTiers,
    pub seats: SeatCapacities,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub aircraft: Option<String>,
    #[serde(default)]
    pub status: Option<FlightStatus>,
}

impl NewFlight {
    /// Validate and build the catalog record. Flights go live immediately.
    pub fn into_flight(self, operator_id: Uuid, now: DateTime<Utc>) -> Result<Flight, FlightError> {
        let flight_number = self.flight_number.trim().to_string();
        if flight_number.is_empty() {
            return Err(FlightError::Invalid("flightNumber is required".to_string()));
        }
        let airline = self.airline.trim().to_string();
        if airline.is_empty() {
            return Err(FlightError::Invalid("airline is required".to_string()));
        }
        self.departure.validate("departure")?;
        self.arrival.validate("arrival")?;
        self.price.validate()?;

        let pool = |class: SeatClass, capacity: SeatCapacity| match capacity.available {
            Some(available) if available != capacity.total => Err(FlightError::Invalid(format!(
                "seats.{}.available must equal total for a new flight",
                class
            ))),
            _ => Ok(SeatPool::new(capacity.total)),
        };

        Ok(Flight {
            id: Uuid::new_v4(),
            flight_number,
            airline,
            departure: self.departure.normalized(),
            arrival: self.arrival.normalized(),
            price: self.price,
            seats: SeatPools {
                economy: pool(SeatClass::Economy, self.seats.economy)?,
                business: pool(SeatClass::Business, self.seats.business)?,
                first_class: pool(SeatClass::FirstClass, self.seats.first_class)?,
            },
            booked_seats: Vec::new(),
            duration: self.duration,
            aircraft: self.aircraft,
            status: self.status.unwrap_or_default(),
            approval_status: ApprovalStatus::Approved,
            created_by: operator_id,
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SeatTotals {
    #[serde(default)]
    pub economy: Option<u32>,
    #[serde(default)]
    pub business: Option<u32>,
    #[serde(default)]
    pub first_class: Option<u32>,
}

impl SeatTotals {
    fn get(&self, class: SeatClass) -> Option<u32> {
        match class {
            SeatClass::Economy => self.economy,
            SeatClass::Business => self.business,
            SeatClass::FirstClass => self.first_class,
        }
    }
}

/// Mutable flight fields. Flight number, owner, approval state and the booked
/// seat ledger are deliberately absent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FlightUpdate {
    #[serde(default)]
    pub airline: Option<String>,
    #[serde(default)]
    pub departure: Option<Location>,
    #[serde(default)]
    pub arrival: Option<Location>,
    #[serde(default)]
    pub price: Option<PriceTiers>,
    #[serde(default)]
    pub seats: Option<SeatTotals>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub aircraft: Option<String>,
    #[serde(default)]
    pub status: Option<FlightStatus>,
}

impl FlightUpdate {
    /// Validate everything first, then merge; a rejected update leaves `flight` untouched.
    pub fn apply_to(&self, flight: &mut Flight, now: DateTime<Utc>) -> Result<(), FlightError> {
        if let Some(airline) = &self.airline {
            if airline.trim().is_empty() {
                return Err(FlightError::Invalid("airline is required".to_string()));
            }
        }
        if let Some(departure) = &self.departure {
            departure.validate("departure")?;
        }
        if let Some(arrival) = &self.arrival {
            arrival.validate("arrival")?;
        }
        if let Some(price) = &self.price {
            price.validate()?;
        }
        let mut seats = flight.seats;
        if let Some(totals) = &self.seats {
            for class in SeatClass::ALL {
                if let Some(total) = totals.get(class) {
                    let pool = seats.get_mut(class);
                    let booked = pool.booked();
                    if total < booked {
                        return Err(FlightError::CapacityBelowBooked { seat_class: class, booked, requested: total });
                    }
                    *pool = SeatPool { total, available: total - booked };
                }
            }
        }

        if let Some(airline) = &self.airline {
            flight.airline = airline.trim().to_string();
        }
        if let Some(departure) = &self.departure {
            flight.departure = departure.clone().normalized();
        }
        if let Some(arrival) = &self.arrival {
            flight.arrival = arrival.clone().normalized();
        }
        if let Some(price) = self.price {
            flight.price = price;
        }
        if self.duration.is_some() {
            flight.duration = self.duration.clone();
        }
        if self.aircraft.is_some() {
            flight.aircraft = self.aircraft.clone();
        }
        if let Some(status) = self.status {
            flight.status = status;
        }
        flight.seats = seats;
        flight.updated_at = now;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum FlightError {
    #[error("{0}")]
    Invalid(String),

    #[error("Cannot set {seat_class} capacity to {requested}: {booked} seats are already booked")]
    CapacityBelowBooked {
        seat_class: SeatClass,
        booked: u32,
        requested: u32,
    },
}

/// Accepts RFC 3339 timestamps or bare `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_flexible_date(raw: &str) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|d| d.and_time(NaiveTime::MIN).and_utc())
        .map_err(|_| format!("invalid date: {}", raw))
}

fn deserialize_flexible_date<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_flexible_date(&raw).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn new_flight_json() -> serde_json::Value {
        json!({
            "flightNumber": " AB123 ",
            "airline": "Aero",
            "departure": { "city": "Delhi", "date": "2025-03-01", "time": "09:30" },
            "arrival": { "city": "Mumbai", "airport": "BOM", "date": "2025-03-01T11:45:00Z", "time": "11:45" },
            "price": { "economy": 100.0, "business": 250.0, "firstClass": 600.0 },
            "seats": {
                "economy": { "total": 2, "available": 2 },
                "business": { "total": 1 },
                "firstClass": { "total": 0 }
            }
        })
    }

    fn sample_flight() -> Flight {
        let new: NewFlight = serde_json::from_value(new_flight_json()).unwrap();
        new.into_flight(Uuid::new_v4(), Utc::now()).unwrap()
    }

    #[test]
    fn test_new_flight_goes_live_with_full_pools() {
        let flight = sample_flight();
        assert_eq!(flight.flight_number, "AB123");
        assert_eq!(flight.approval_status, ApprovalStatus::Approved);
        assert_eq!(flight.status, FlightStatus::Scheduled);
        assert_eq!(flight.seats.economy, SeatPool { total: 2, available: 2 });
        assert!(flight.booked_seats.is_empty());
        assert_eq!(flight.departure.date, NaiveDate::from_ymd_opt(2025, 3, 1).unwrap().and_time(NaiveTime::MIN).and_utc());
        assert!(flight.seat_ledger_consistent());
    }

    #[test]
    fn test_new_flight_rejects_partial_availability() {
        let mut body = new_flight_json();
        body["seats"]["economy"]["available"] = json!(1);
        let new: NewFlight = serde_json::from_value(body).unwrap();
        assert!(matches!(new.into_flight(Uuid::new_v4(), Utc::now()), Err(FlightError::Invalid(_))));
    }

    #[test]
    fn test_new_flight_rejects_unknown_fields() {
        let mut body = new_flight_json();
        body["approvalStatus"] = json!("approved");
        assert!(serde_json::from_value::<NewFlight>(body).is_err());
    }

    #[test]
    fn test_update_cannot_touch_ledger_fields() {
        assert!(serde_json::from_value::<FlightUpdate>(json!({ "bookedSeats": [] })).is_err());
        assert!(serde_json::from_value::<FlightUpdate>(json!({ "flightNumber": "X1" })).is_err());
        assert!(serde_json::from_value::<FlightUpdate>(json!({ "createdBy": Uuid::new_v4() })).is_err());
    }

    #[test]
    fn test_update_resizes_pool_around_booked_seats() {
        let mut flight = sample_flight();
        flight.seats.economy.available = 1;
        flight.booked_seats.push("E1".to_string());

        let update: FlightUpdate = serde_json::from_value(json!({
            "seats": { "economy": 5 },
            "status": "delayed"
        }))
        .unwrap();
        update.apply_to(&mut flight, Utc::now()).unwrap();

        assert_eq!(flight.seats.economy, SeatPool { total: 5, available: 4 });
        assert_eq!(flight.status, FlightStatus::Delayed);
        assert!(flight.seat_ledger_consistent());
    }

    #[test]
    fn test_update_rejects_capacity_below_booked_without_partial_merge() {
        let mut flight = sample_flight();
        flight.seats.economy.available = 0;
        flight.booked_seats.extend(["E1".to_string(), "E2".to_string()]);
        let before = flight.clone();

        let update = FlightUpdate {
            airline: Some("Renamed".to_string()),
            seats: Some(SeatTotals { economy: Some(1), ..Default::default() }),
            ..Default::default()
        };
        let err = update.apply_to(&mut flight, Utc::now()).unwrap_err();

        assert_eq!(err, FlightError::CapacityBelowBooked { seat_class: SeatClass::Economy, booked: 2, requested: 1 });
        assert_eq!(flight, before);
    }

    #[test]
    fn test_seat_class_ownership() {
        assert!(SeatClass::Economy.owns_seat("E12"));
        assert!(!SeatClass::Economy.owns_seat("B12"));
        assert!(!SeatClass::FirstClass.owns_seat("F"));
        assert!(!SeatClass::Business.owns_seat("Bx"));
        assert_eq!("firstClass".parse::<SeatClass>().unwrap(), SeatClass::FirstClass);
    }
}
