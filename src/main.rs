use std::net::SocketAddr;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use easyaso::api::{self, middleware::session::AppState};
use easyaso::backend::{AuthEvent, BackendClient};
use easyaso::config::Config;
use easyaso::jobs::expiration_alerts;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "easyaso=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting EasyASO server...");

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!(backend = %config.supabase_url, "Configuration loaded successfully");

    let state = AppState::new(config.clone());

    // Session change subscription
    let mut auth_events = state.events.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = auth_events.recv().await {
            match event {
                AuthEvent::SignedIn { user_id, email } => {
                    tracing::info!(%user_id, %email, "Session started")
                }
                AuthEvent::SignedOut { user_id } => tracing::info!(%user_id, "Session ended"),
            }
        }
    });

    // Expiration alerts need the service-role key
    let _scheduler = match BackendClient::service_role(&config) {
        Some(service_backend) => Some(
            expiration_alerts::start_scheduler(service_backend, &config.expiration_alert_schedule)
                .await
                .context("Failed to start expiration alert job")?,
        ),
        None => {
            tracing::warn!("SUPABASE_SERVICE_ROLE_KEY not set, expiration alerts disabled");
            None
        }
    };

    let app = api::router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid HOST/PORT")?;
    tracing::info!("Listening on {}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, cleaning up...");
}
