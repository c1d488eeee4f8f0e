use aerobook_catalog::{Flight, FlightStatus, FlightUpdate, Location, PriceTiers, SeatPool, SeatPools};
use aerobook_core::repository::FlightRepository;
use aerobook_core::search::FlightSearch;
use aerobook_core::{CoreError, CoreResult};
use aerobook_shared::ApprovalStatus;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::database::{corrupt, db_error, from_db_count, to_db_count};

const FLIGHT_COLUMNS: &str = "id, flight_number, airline, \
     departure_airport, departure_city, departure_country, departure_date, departure_time, \
     arrival_airport, arrival_city, arrival_country, arrival_date, arrival_time, \
     price_economy, price_business, price_first_class, \
     economy_total, economy_available, business_total, business_available, \
     first_class_total, first_class_available, booked_seats, duration, aircraft, \
     status, approval_status, created_by, created_at, updated_at";

pub struct PostgresFlightRepository {
    pool: PgPool,
}

impl PostgresFlightRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct FlightRow {
    id: Uuid,
    flight_number: String,
    airline: String,
    departure_airport: Option<String>,
    departure_city: String,
    departure_country: Option<String>,
    departure_date: DateTime<Utc>,
    departure_time: String,
    arrival_airport: Option<String>,
    arrival_city: String,
    arrival_country: Option<String>,
    arrival_date: DateTime<Utc>,
    arrival_time: String,
    price_economy: f64,
    price_business: f64,
    price_first_class: f64,
    economy_total: i32,
    economy_available: i32,
    business_total: i32,
    business_available: i32,
    first_class_total: i32,
    first_class_available: i32,
    booked_seats: Vec<String>,
    duration: Option<String>,
    aircraft: Option<String>,
    status: String,
    approval_status: String,
    created_by: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn pool(total: i32, available: i32) -> CoreResult<SeatPool> {
    Ok(SeatPool { total: from_db_count(total)?, available: from_db_count(available)? })
}

impl TryFrom<FlightRow> for Flight {
    type Error = CoreError;

    fn try_from(row: FlightRow) -> CoreResult<Self> {
        Ok(Flight {
            id: row.id,
            flight_number: row.flight_number,
            airline: row.airline,
            departure: Location {
                airport: row.departure_airport,
                city: row.departure_city,
                country: row.departure_country,
                date: row.departure_date,
                time: row.departure_time,
            },
            arrival: Location {
                airport: row.arrival_airport,
                city: row.arrival_city,
                country: row.arrival_country,
                date: row.arrival_date,
                time: row.arrival_time,
            },
            price: PriceTiers {
                economy: row.price_economy,
                business: row.price_business,
                first_class: row.price_first_class,
            },
            seats: SeatPools {
                economy: pool(row.economy_total, row.economy_available)?,
                business: pool(row.business_total, row.business_available)?,
                first_class: pool(row.first_class_total, row.first_class_available)?,
            },
            booked_seats: row.booked_seats,
            duration: row.duration,
            aircraft: row.aircraft,
            status: row.status.parse::<FlightStatus>().map_err(corrupt)?,
            approval_status: row.approval_status.parse::<ApprovalStatus>().map_err(corrupt)?,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_flights(rows: Vec<FlightRow>) -> CoreResult<Vec<Flight>> {
    rows.into_iter().map(Flight::try_from).collect()
}

/// `SELECT ... FOR UPDATE` on one flight. Must run inside a transaction; the lock
/// is what serializes bookings, cancellations and edits of the same flight.
pub(crate) async fn lock_flight(conn: &mut PgConnection, id: Uuid) -> CoreResult<Option<Flight>> {
    let row = sqlx::query_as::<_, FlightRow>(&format!("SELECT {} FROM flights WHERE id = $1 FOR UPDATE", FLIGHT_COLUMNS))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error)?;
    row.map(Flight::try_from).transpose()
}

/// Write back every mutable column of a flight previously read with `lock_flight`.
pub(crate) async fn write_flight(conn: &mut PgConnection, flight: &Flight) -> CoreResult<()> {
    sqlx::query(
        r#"
        UPDATE flights SET
            airline = $2,
            departure_airport = $3, departure_city = $4, departure_country = $5, departure_date = $6, departure_time = $7,
            arrival_airport = $8, arrival_city = $9, arrival_country = $10, arrival_date = $11, arrival_time = $12,
            price_economy = $13, price_business = $14, price_first_class = $15,
            economy_total = $16, economy_available = $17,
            business_total = $18, business_available = $19,
            first_class_total = $20, first_class_available = $21,
            booked_seats = $22, duration = $23, aircraft = $24, status = $25, updated_at = $26
        WHERE id = $1
        "#,
    )
    .bind(flight.id)
    .bind(&flight.airline)
    .bind(&flight.departure.airport)
    .bind(&flight.departure.city)
    .bind(&flight.departure.country)
    .bind(flight.departure.date)
    .bind(&flight.departure.time)
    .bind(&flight.arrival.airport)
    .bind(&flight.arrival.city)
    .bind(&flight.arrival.country)
    .bind(flight.arrival.date)
    .bind(&flight.arrival.time)
    .bind(flight.price.economy)
    .bind(flight.price.business)
    .bind(flight.price.first_class)
    .bind(to_db_count(flight.seats.economy.total)?)
    .bind(to_db_count(flight.seats.economy.available)?)
    .bind(to_db_count(flight.seats.business.total)?)
    .bind(to_db_count(flight.seats.business.available)?)
    .bind(to_db_count(flight.seats.first_class.total)?)
    .bind(to_db_count(flight.seats.first_class.available)?)
    .bind(&flight.booked_seats)
    .bind(&flight.duration)
    .bind(&flight.aircraft)
    .bind(flight.status.as_str())
    .bind(flight.updated_at)
    .execute(&mut *conn)
    .await
    .map_err(db_error)?;
    Ok(())
}

#[async_trait]
impl FlightRepository for PostgresFlightRepository {
    async fn create_flight(&self, flight: &Flight) -> CoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO flights ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, \
             $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29, $30)",
            FLIGHT_COLUMNS
        ))
        .bind(flight.id)
        .bind(&flight.flight_number)
        .bind(&flight.airline)
        .bind(&flight.departure.airport)
        .bind(&flight.departure.city)
        .bind(&flight.departure.country)
        .bind(flight.departure.date)
        .bind(&flight.departure.time)
        .bind(&flight.arrival.airport)
        .bind(&flight.arrival.city)
        .bind(&flight.arrival.country)
        .bind(flight.arrival.date)
        .bind(&flight.arrival.time)
        .bind(flight.price.economy)
        .bind(flight.price.business)
        .bind(flight.price.first_class)
        .bind(to_db_count(flight.seats.economy.total)?)
        .bind(to_db_count(flight.seats.economy.available)?)
        .bind(to_db_count(flight.seats.business.total)?)
        .bind(to_db_count(flight.seats.business.available)?)
        .bind(to_db_count(flight.seats.first_class.total)?)
        .bind(to_db_count(flight.seats.first_class.available)?)
        .bind(&flight.booked_seats)
        .bind(&flight.duration)
        .bind(&flight.aircraft)
        .bind(flight.status.as_str())
        .bind(flight.approval_status.as_str())
        .bind(flight.created_by)
        .bind(flight.created_at)
        .bind(flight.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    async fn get_flight(&self, id: Uuid) -> CoreResult<Option<Flight>> {
        let row = sqlx::query_as::<_, FlightRow>(&format!("SELECT {} FROM flights WHERE id = $1", FLIGHT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        row.map(Flight::try_from).transpose()
    }

    async fn list_flights(&self) -> CoreResult<Vec<Flight>> {
        let rows = sqlx::query_as::<_, FlightRow>(&format!("SELECT {} FROM flights ORDER BY created_at DESC", FLIGHT_COLUMNS))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        into_flights(rows)
    }

    async fn list_flights_by_operator(&self, operator_id: Uuid) -> CoreResult<Vec<Flight>> {
        let rows = sqlx::query_as::<_, FlightRow>(&format!(
            "SELECT {} FROM flights WHERE created_by = $1 ORDER BY created_at DESC",
            FLIGHT_COLUMNS
        ))
        .bind(operator_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        into_flights(rows)
    }

    async fn latest_approved(&self, limit: u32) -> CoreResult<Vec<Flight>> {
        let rows = sqlx::query_as::<_, FlightRow>(&format!(
            "SELECT {} FROM flights WHERE approval_status = 'approved' ORDER BY created_at DESC LIMIT $1",
            FLIGHT_COLUMNS
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        into_flights(rows)
    }

    async fn search_flights(&self, search: &FlightSearch) -> CoreResult<Vec<Flight>> {
        let bounds = search.day_bounds();
        let rows = sqlx::query_as::<_, FlightRow>(&format!(
            r#"
            SELECT {} FROM flights
            WHERE approval_status = 'approved'
              AND LOWER(departure_city) = LOWER($1)
              AND LOWER(arrival_city) = LOWER($2)
              AND ($3::timestamptz IS NULL OR departure_date BETWEEN $3 AND $4)
            ORDER BY departure_date ASC
            "#,
            FLIGHT_COLUMNS
        ))
        .bind(&search.from)
        .bind(&search.to)
        .bind(bounds.map(|(start, _)| start))
        .bind(bounds.map(|(_, end)| end))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        into_flights(rows)
    }

    async fn list_cities(&self) -> CoreResult<Vec<String>> {
        sqlx::query_scalar(
            r#"
            SELECT city FROM (
                SELECT departure_city AS city FROM flights WHERE approval_status = 'approved'
                UNION
                SELECT arrival_city AS city FROM flights WHERE approval_status = 'approved'
            ) cities
            ORDER BY city
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)
    }

    async fn update_flight(&self, id: Uuid, update: &FlightUpdate) -> CoreResult<Option<Flight>> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let Some(mut flight) = lock_flight(&mut *tx, id).await? else {
            return Ok(None);
        };
        update.apply_to(&mut flight, Utc::now())?;
        write_flight(&mut *tx, &flight).await?;
        tx.commit().await.map_err(db_error)?;
        Ok(Some(flight))
    }

    async fn delete_flight(&self, id: Uuid) -> CoreResult<bool> {
        let result = sqlx::query("DELETE FROM flights WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_flights(&self) -> CoreResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM flights")
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(count.max(0) as u64)
    }
}
