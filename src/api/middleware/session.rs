use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

use crate::backend::{AuthEvents, BackendClient};
use crate::config::Config;

/// Session keys used in the application
pub const SESSION_KEY_ACCESS_TOKEN: &str = "access_token";
pub const SESSION_KEY_REFRESH_TOKEN: &str = "refresh_token";
pub const SESSION_KEY_USER_ID: &str = "user_id";
pub const SESSION_KEY_USER_EMAIL: &str = "user_email";
pub const SESSION_KEY_USER_NAME: &str = "user_name";
pub const SESSION_KEY_SYSTEM_ROLE: &str = "system_role";

/// Creates a session layer for Axum
pub fn create_session_layer(cookie_secure: bool) -> SessionManagerLayer<MemoryStore> {
    SessionManagerLayer::new(MemoryStore::default())
        .with_secure(cookie_secure)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::hours(24)))
}

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub backend: BackendClient,
    pub config: Config,
    pub events: AuthEvents,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            backend: BackendClient::from_config(&config),
            config,
            events: AuthEvents::default(),
        }
    }
}
