// API module - HTTP endpoints

pub mod auth;
pub mod convocations;
pub mod dashboard;
pub mod health;
pub mod members;
pub mod middleware;
pub mod notifications;
pub mod users;

use axum::{middleware::from_fn_with_state, routing::get, Router};
use tower_http::trace::TraceLayer;

use self::middleware::{auth::require_auth, session::create_session_layer, session::AppState};

/// Builds the full application router
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .merge(auth::protected_router())
        .merge(dashboard::router())
        .merge(members::router())
        .merge(convocations::router())
        .merge(notifications::router())
        .merge(users::router())
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/health", get(health::health_check))
        .merge(auth::router())
        .merge(protected)
        .layer(create_session_layer(state.config.cookie_secure))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
