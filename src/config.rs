use secrecy::Secret;
use serde::Deserialize;

pub const DEFAULT_EXPIRATION_ALERT_SCHEDULE: &str = "0 0 6 * * *";
pub const DEFAULT_UNIT: &str = "Matriz";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,

    // Hosted backend (auth, REST store, functions)
    pub supabase_url: String,
    pub supabase_anon_key: Secret<String>,

    // Only needed by the expiration alert job, which runs without a user session
    pub supabase_service_role_key: Option<Secret<String>>,

    // Session cookie
    pub cookie_secure: bool,

    pub expiration_alert_schedule: String,
    pub default_unit: String,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Load .env file if it exists (for local development)
        let _ = dotenvy::dotenv();

        let config = config::Config::builder()
            .add_source(config::Environment::default().separator("__"))
            .build()?;

        Ok(Self {
            host: config.get("host").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: config.get("port")?,

            supabase_url: parse_backend_url(&config.get::<String>("supabase_url")?)?,
            supabase_anon_key: Secret::new(config.get("supabase_anon_key")?),

            supabase_service_role_key: config
                .get::<String>("supabase_service_role_key")
                .ok()
                .map(Secret::new),

            cookie_secure: config.get("cookie_secure").unwrap_or(true),

            expiration_alert_schedule: config
                .get("expiration_alert_schedule")
                .unwrap_or_else(|_| DEFAULT_EXPIRATION_ALERT_SCHEDULE.to_string()),
            default_unit: config
                .get("default_unit")
                .unwrap_or_else(|_| DEFAULT_UNIT.to_string()),
        })
    }

    /// Configuration pointing at a given backend URL, used by tests.
    pub fn for_backend(supabase_url: &str) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            supabase_url: supabase_url.to_string(),
            supabase_anon_key: Secret::new("anon-key".to_string()),
            supabase_service_role_key: None,
            cookie_secure: false,
            expiration_alert_schedule: DEFAULT_EXPIRATION_ALERT_SCHEDULE.to_string(),
            default_unit: DEFAULT_UNIT.to_string(),
        }
    }
}

/// The backend URL must be absolute http(s); trailing slashes are dropped
fn parse_backend_url(raw: &str) -> Result<String, config::ConfigError> {
    let url = url::Url::parse(raw.trim())
        .map_err(|e| config::ConfigError::Message(format!("Invalid SUPABASE_URL '{}': {}", raw, e)))?;

    match url.scheme() {
        "http" | "https" => Ok(url.as_str().trim_end_matches('/').to_string()),
        other => Err(config::ConfigError::Message(format!(
            "Invalid SUPABASE_URL scheme '{}'",
            other
        ))),
    }
}
