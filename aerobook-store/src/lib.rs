pub mod app_config;
pub mod booking_repo;
pub mod database;
pub mod flight_repo;
pub mod memory_repo;
pub mod redis_repo;
pub mod user_repo;

pub use database::{DbClient, StoreError};
pub use memory_repo::MemoryStore;
pub use redis_repo::RedisClient;

use aerobook_core::repository::{BookingRepository, FlightRepository, UserRepository};
use app_config::DatabaseConfig;
use booking_repo::PostgresBookingRepository;
use flight_repo::PostgresFlightRepository;
use std::sync::Arc;
use tracing::{info, warn};
use user_repo::PostgresUserRepository;

const MEMORY_SCHEME: &str = "memory:";

/// The three persisted collections, behind their repository traits.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub flights: Arc<dyn FlightRepository>,
    pub bookings: Arc<dyn BookingRepository>,
}

impl Repositories {
    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self { users: store.clone(), flights: store.clone(), bookings: store }
    }

    pub fn postgres(db: &DbClient) -> Self {
        Self {
            users: Arc::new(PostgresUserRepository::new(db.pool.clone())),
            flights: Arc::new(PostgresFlightRepository::new(db.pool.clone())),
            bookings: Arc::new(PostgresBookingRepository::new(db.pool.clone())),
        }
    }

    /// `memory://` selects the in-process store; anything else is a Postgres URL,
    /// which is connected to and migrated before use.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        if config.url.starts_with(MEMORY_SCHEME) {
            warn!("Using in-memory store; data is lost on restart");
            return Ok(Self::in_memory());
        }
        let db = DbClient::new(&config.url, config.max_connections).await?;
        db.migrate().await?;
        info!("Connected to Postgres");
        Ok(Self::postgres(&db))
    }
}
