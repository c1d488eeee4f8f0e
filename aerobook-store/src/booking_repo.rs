use aerobook_catalog::SeatClass;
use aerobook_core::booking::{Booking, BookingStatus, ContactInfo, NewBooking, Passenger, PaymentStatus};
use aerobook_core::repository::{BookingRepository, CancelledBooking};
use aerobook_core::{CoreError, CoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::database::{corrupt, db_error, from_db_count, to_db_count};
use crate::flight_repo::{lock_flight, write_flight};

const BOOKING_COLUMNS: &str = "id, booking_reference, user_id, flight_id, passengers, seats_booked, \
     number_of_passengers, seat_class, total_price, payment_status, contact_email, contact_phone, \
     booking_status, created_at, updated_at";

pub struct PostgresBookingRepository {
    pool: PgPool,
}

impl PostgresBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    booking_reference: String,
    user_id: Uuid,
    flight_id: Uuid,
    passengers: Json<Vec<Passenger>>,
    seats_booked: Vec<String>,
    number_of_passengers: i32,
    seat_class: String,
    total_price: f64,
    payment_status: String,
    contact_email: String,
    contact_phone: String,
    booking_status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = CoreError;

    fn try_from(row: BookingRow) -> CoreResult<Self> {
        Ok(Booking {
            id: row.id,
            booking_reference: row.booking_reference,
            user_id: row.user_id,
            flight_id: row.flight_id,
            passengers: row.passengers.0,
            seats_booked: row.seats_booked,
            number_of_passengers: from_db_count(row.number_of_passengers)?,
            seat_class: row.seat_class.parse::<SeatClass>().map_err(corrupt)?,
            total_price: row.total_price,
            payment_status: row.payment_status.parse::<PaymentStatus>()?,
            contact_info: ContactInfo { email: row.contact_email, phone: row.contact_phone },
            booking_status: row.booking_status.parse::<BookingStatus>()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_bookings(rows: Vec<BookingRow>) -> CoreResult<Vec<Booking>> {
    rows.into_iter().map(Booking::try_from).collect()
}

async fn insert_booking(conn: &mut PgConnection, booking: &Booking) -> CoreResult<()> {
    sqlx::query(&format!(
        "INSERT INTO bookings ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
        BOOKING_COLUMNS
    ))
    .bind(booking.id)
    .bind(&booking.booking_reference)
    .bind(booking.user_id)
    .bind(booking.flight_id)
    .bind(Json(&booking.passengers))
    .bind(&booking.seats_booked)
    .bind(to_db_count(booking.number_of_passengers)?)
    .bind(booking.seat_class.as_str())
    .bind(booking.total_price)
    .bind(booking.payment_status.as_str())
    .bind(&booking.contact_info.email)
    .bind(&booking.contact_info.phone)
    .bind(booking.booking_status.as_str())
    .bind(booking.created_at)
    .bind(booking.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(db_error)?;
    Ok(())
}

#[async_trait]
impl BookingRepository for PostgresBookingRepository {
    async fn commit_booking(&self, draft: NewBooking, probe_limit: u32) -> CoreResult<Booking> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        // Dropping `tx` on any early return rolls the whole unit back.
        let mut flight = lock_flight(&mut *tx, draft.flight_id)
            .await?
            .ok_or_else(|| CoreError::NotFound("Flight not found".to_string()))?;

        let now = Utc::now();
        let seats = flight.reserve(draft.seat_class, draft.number_of_passengers, probe_limit)?;
        flight.updated_at = now;
        write_flight(&mut *tx, &flight).await?;

        let booking = draft.into_booking(seats, now);
        insert_booking(&mut *tx, &booking).await?;

        tx.commit().await.map_err(db_error)?;
        Ok(booking)
    }

    async fn cancel_booking(&self, id: Uuid) -> CoreResult<CancelledBooking> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE id = $1 FOR UPDATE",
            BOOKING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error)?
        .ok_or_else(|| CoreError::NotFound("Booking not found".to_string()))?;

        let mut booking = Booking::try_from(row)?;
        let now = Utc::now();
        booking.cancel(now)?;

        let inventory_restored = match lock_flight(&mut *tx, booking.flight_id).await? {
            Some(mut flight) => {
                flight.release(booking.seat_class, booking.number_of_passengers, &booking.seats_booked);
                flight.updated_at = now;
                write_flight(&mut *tx, &flight).await?;
                true
            }
            None => false,
        };

        sqlx::query("UPDATE bookings SET booking_status = $2, updated_at = $3 WHERE id = $1")
            .bind(booking.id)
            .bind(booking.booking_status.as_str())
            .bind(booking.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;

        tx.commit().await.map_err(db_error)?;
        Ok(CancelledBooking { booking, inventory_restored })
    }

    async fn get_booking(&self, id: Uuid) -> CoreResult<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!("SELECT {} FROM bookings WHERE id = $1", BOOKING_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        row.map(Booking::try_from).transpose()
    }

    async fn list_bookings(&self) -> CoreResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings ORDER BY created_at DESC",
            BOOKING_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        into_bookings(rows)
    }

    async fn list_bookings_for_user(&self, user_id: Uuid) -> CoreResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE user_id = $1 ORDER BY created_at DESC",
            BOOKING_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        into_bookings(rows)
    }

    async fn list_bookings_for_flights(&self, flight_ids: &[Uuid]) -> CoreResult<Vec<Booking>> {
        if flight_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE flight_id = ANY($1) ORDER BY created_at DESC",
            BOOKING_COLUMNS
        ))
        .bind(flight_ids.to_vec())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        into_bookings(rows)
    }

    async fn count_bookings(&self) -> CoreResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookings")
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(count.max(0) as u64)
    }
}
