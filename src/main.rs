//! Wallet authentication server
//!
//! Serves the challenge-response sign-in API over HTTP. State lives in
//! PostgreSQL when `DATABASE_URL` is set and in process memory otherwise.

use anyhow::Context;
use axum::http::{header, HeaderValue, Method};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::cors::CorsLayer;

use wallet_auth_server::auth::{AuthService, SystemClock};
use wallet_auth_server::config::Config;
use wallet_auth_server::middleware::{self, RateLimiter};
use wallet_auth_server::state::AppState;
use wallet_auth_server::store::{AuthStore, MemoryStore, PgStore};
use wallet_auth_server::{app, db};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(true)
        .with_line_number(true)
        .init();

    tracing::info!(
        environment = config.environment.as_str(),
        "Starting wallet auth server"
    );

    let store: Arc<dyn AuthStore> = if config.database_url.is_some() {
        let pool = db::create_pool(&config).await?;
        db::run_migrations(&pool).await?;
        Arc::new(PgStore::new(pool))
    } else {
        tracing::warn!("DATABASE_URL not set, using in-memory store (state is lost on restart)");
        Arc::new(MemoryStore::new())
    };

    let settings = config.auth_settings();
    if config.auth_dev_signature_bypass && settings.dev_bypass.is_none() {
        tracing::warn!(
            "AUTH_DEV_SIGNATURE_BYPASS is set but the dev-signature-bypass feature is not compiled in; ignoring"
        );
    }

    let auth_service = Arc::new(AuthService::new(store, Arc::new(SystemClock), settings));
    let rate_limiter =
        RateLimiter::new(config.rate_limit_rps).trust_proxy_headers(config.trust_proxy_headers);
    if config.trust_proxy_headers {
        tracing::info!("Rate limiting keyed on proxy headers");
    }

    spawn_maintenance(
        auth_service.clone(),
        rate_limiter.clone(),
        config.auth_challenge_purge_interval_seconds,
    );

    let app_state = AppState::new(auth_service, rate_limiter, config.environment.as_str());

    let mut router = app(app_state).layer(configure_cors(&config));
    if config.environment.is_production() {
        router = router.layer(axum::middleware::from_fn(middleware::hsts_header));
    }

    let addr = SocketAddr::new(config.bind_address, config.port);

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Health check at http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    // Serve with graceful shutdown
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Periodically purge expired challenges and idle rate-limit buckets
fn spawn_maintenance(auth_service: Arc<AuthService>, rate_limiter: RateLimiter, interval_secs: u64) {
    let period = std::time::Duration::from_secs(interval_secs);
    // Expired challenges linger one period so late redeems still see ChallengeExpired
    let grace = chrono::Duration::seconds(interval_secs as i64);

    tokio::spawn(async move {
        tracing::info!(interval_secs, "Challenge purge task started");
        let mut ticker = tokio::time::interval(period);

        loop {
            ticker.tick().await;

            match auth_service.purge_expired_challenges(grace).await {
                Ok(0) => {}
                Ok(purged) => tracing::debug!(purged, "Purged expired challenges"),
                Err(e) => tracing::warn!(error = %e, "Challenge purge failed"),
            }

            rate_limiter.cleanup(period * 10).await;
        }
    });
}

fn configure_cors(config: &Config) -> CorsLayer {
    let allowed_origins_str = config.cors_allowed_origins.clone().unwrap_or_default();

    if allowed_origins_str.is_empty() {
        tracing::warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (permissive)");
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed_origins_str
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
