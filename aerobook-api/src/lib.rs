use axum::{http::Method, middleware::from_fn_with_state, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod admin;
pub mod auth;
pub mod bookings;
pub mod error;
pub mod extract;
pub mod flights;
pub mod middleware;
pub mod operator;
pub mod state;
pub mod users;
pub mod views;

pub use error::AppError;
pub use state::AppState;

/// Every endpoint lives under `/api`.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    let protected_users = users::routes().route_layer(from_fn_with_state(state.clone(), middleware::require_auth));

    let api = Router::new()
        .merge(auth::routes())
        .merge(flights::routes(&state))
        .merge(bookings::routes(&state))
        .merge(operator::routes(&state))
        .merge(admin::routes(&state))
        .merge(protected_users);

    let mut router = Router::new()
        .nest("/api", api)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    if state.redis.is_some() {
        router = router.layer(from_fn_with_state(state.clone(), middleware::rate_limit_middleware));
    }

    router.with_state(state)
}
