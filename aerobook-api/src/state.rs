use aerobook_booking::BookingService;
use aerobook_store::app_config::{AuthConfig, BusinessRules};
use aerobook_store::{RedisClient, Repositories};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub repos: Repositories,
    pub booking_service: Arc<BookingService>,
    pub auth: AuthConfig,
    pub business_rules: BusinessRules,
    /// Present only when rate limiting is configured.
    pub redis: Option<Arc<RedisClient>>,
}

impl AppState {
    pub fn new(
        repos: Repositories,
        auth: AuthConfig,
        business_rules: BusinessRules,
        redis: Option<Arc<RedisClient>>,
    ) -> Self {
        let booking_service = Arc::new(BookingService::new(
            repos.users.clone(),
            repos.flights.clone(),
            repos.bookings.clone(),
            business_rules.seat_probe_limit,
        ));
        Self { repos, booking_service, auth, business_rules, redis }
    }
}
