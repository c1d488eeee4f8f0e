use aerobook_catalog::SeatClass;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::{CoreError, CoreResult};

const REFERENCE_PREFIX: &str = "BK";
const REFERENCE_SUFFIX_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const REFERENCE_SUFFIX_LEN: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Passenger {
    pub name: String,
    pub age: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
    Pending,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Pending => "pending",
        }
    }
}

impl FromStr for BookingStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            "pending" => Ok(BookingStatus::Pending),
            other => Err(CoreError::Internal(format!("unknown booking status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Completed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Completed => "completed",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(PaymentStatus::Completed),
            other => Err(CoreError::Internal(format!("unknown payment status: {}", other))),
        }
    }
}

/// Contact details copied from the booking user when the booking is made.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContactInfo {
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Uuid,
    pub booking_reference: String,
    pub user_id: Uuid,
    pub flight_id: Uuid,
    pub passengers: Vec<Passenger>,
    pub seats_booked: Vec<String>,
    pub number_of_passengers: u32,
    pub seat_class: SeatClass,
    pub total_price: f64,
    pub payment_status: PaymentStatus,
    pub contact_info: ContactInfo,
    pub booking_status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn is_cancelled(&self) -> bool {
        self.booking_status == BookingStatus::Cancelled
    }

    /// Transition: confirmed | pending -> cancelled. Cancelling twice is an error.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> CoreResult<()> {
        if self.is_cancelled() {
            return Err(CoreError::AlreadyCancelled);
        }
        self.booking_status = BookingStatus::Cancelled;
        self.updated_at = now;
        Ok(())
    }
}

/// A booking waiting for seats. Stores turn it into a `Booking` inside the
/// same atomic unit that takes the seats from the flight.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub booking_reference: String,
    pub user_id: Uuid,
    pub flight_id: Uuid,
    pub passengers: Vec<Passenger>,
    pub number_of_passengers: u32,
    pub seat_class: SeatClass,
    pub total_price: f64,
    pub contact_info: ContactInfo,
}

impl NewBooking {
    pub fn into_booking(self, seats_booked: Vec<String>, now: DateTime<Utc>) -> Booking {
        Booking {
            id: Uuid::new_v4(),
            booking_reference: self.booking_reference,
            user_id: self.user_id,
            flight_id: self.flight_id,
            passengers: self.passengers,
            seats_booked,
            number_of_passengers: self.number_of_passengers,
            seat_class: self.seat_class,
            total_price: self.total_price,
            payment_status: PaymentStatus::Completed,
            contact_info: self.contact_info,
            booking_status: BookingStatus::Confirmed,
            created_at: now,
            updated_at: now,
        }
    }
}

/// `BK` + epoch milliseconds + four random uppercase alphanumerics. Uniqueness is
/// probabilistic; the store's unique index is the backstop.
pub fn generate_reference(now: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..REFERENCE_SUFFIX_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..REFERENCE_SUFFIX_CHARSET.len());
            char::from(REFERENCE_SUFFIX_CHARSET[idx])
        })
        .collect();
    format!("{}{}{}", REFERENCE_PREFIX, now.timestamp_millis(), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> NewBooking {
        NewBooking {
            booking_reference: generate_reference(Utc::now()),
            user_id: Uuid::new_v4(),
            flight_id: Uuid::new_v4(),
            passengers: vec![Passenger { name: "Asha".to_string(), age: 31 }],
            number_of_passengers: 1,
            seat_class: SeatClass::Economy,
            total_price: 120.0,
            contact_info: ContactInfo { email: "asha@example.com".to_string(), phone: "555".to_string() },
        }
    }

    #[test]
    fn test_reference_format() {
        let now = Utc::now();
        let reference = generate_reference(now);
        let millis = now.timestamp_millis().to_string();

        assert!(reference.starts_with(&format!("BK{}", millis)));
        let suffix = &reference[2 + millis.len()..];
        assert_eq!(suffix.len(), 4);
        assert!(suffix.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_new_booking_is_confirmed_and_paid() {
        let booking = draft().into_booking(vec!["E1".to_string()], Utc::now());
        assert_eq!(booking.booking_status, BookingStatus::Confirmed);
        assert_eq!(booking.payment_status, PaymentStatus::Completed);
        assert_eq!(booking.seats_booked.len(), booking.passengers.len());
    }

    #[test]
    fn test_cancel_is_one_way() {
        let mut booking = draft().into_booking(vec!["E1".to_string()], Utc::now());
        booking.cancel(Utc::now()).unwrap();
        assert!(booking.is_cancelled());
        assert!(matches!(booking.cancel(Utc::now()), Err(CoreError::AlreadyCancelled)));
    }

    #[test]
    fn test_booking_serializes_camel_case() {
        let booking = draft().into_booking(vec!["E1".to_string()], Utc::now());
        let json = serde_json::to_value(&booking).unwrap();
        assert_eq!(json["seatClass"], "economy");
        assert_eq!(json["bookingStatus"], "confirmed");
        assert_eq!(json["seatsBooked"][0], "E1");
        assert_eq!(json["contactInfo"]["email"], "asha@example.com");
    }
}
