use aerobook_core::CoreError;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use std::time::Duration;
use tracing::{error, info};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

#[derive(Clone)]
pub struct DbClient {
    pub pool: Pool<Postgres>,
}

impl DbClient {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations").run(&self.pool).await?;
        info!("Migrations completed successfully.");
        Ok(())
    }
}

/// Unique violations become `Conflict` with a message naming the duplicate field;
/// everything else is logged and surfaced as `Internal`.
pub(crate) fn db_error(err: sqlx::Error) -> CoreError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.is_unique_violation() {
            let message = match db_err.constraint() {
                Some("users_email_key") => "User with this email already exists",
                Some("flights_flight_number_key") => "A flight with this number already exists.",
                Some("bookings_booking_reference_key") => "Booking reference collision, please retry",
                _ => "Duplicate value",
            };
            return CoreError::Conflict(message.to_string());
        }
    }
    error!("Database error: {}", err);
    CoreError::Internal(err.to_string())
}

/// A stored value that no longer parses into its domain type.
pub(crate) fn corrupt<E: std::fmt::Display>(err: E) -> CoreError {
    error!("Corrupt row: {}", err);
    CoreError::Internal(format!("corrupt row: {}", err))
}

pub(crate) fn to_db_count(value: u32) -> Result<i32, CoreError> {
    i32::try_from(value).map_err(|_| CoreError::Validation(format!("{} is out of range", value)))
}

pub(crate) fn from_db_count(value: i32) -> Result<u32, CoreError> {
    u32::try_from(value).map_err(corrupt)
}
