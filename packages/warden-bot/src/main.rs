//! Warden Bot
//!
//! The process that hosts the Warden moderation engine:
//!
//! 1. **Event ingestion**: a gateway shim posts platform events to
//!    `POST /api/events`; each is dispatched on its community's lane.
//!
//! 2. **Discord binding**: every outbound command goes through the Discord
//!    REST API using the bot token.
//!
//! 3. **Operator API**: health, stats and per-community configuration
//!    (channels, roles, AutoMod policy), guarded by an optional bearer token.
//!
//! Configuration is persisted to one JSON file, rewritten atomically after
//! every change and once more on shutdown.

mod api;
mod discord;
mod ingest;
mod state;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::Method,
    routing::{get, post},
    Router,
};
use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use warden_core::ConfigStore;

use discord::DiscordPlatform;
use state::{AppState, BotConfig};

// ── CLI Arguments ─────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "warden-bot", version, about = "Warden community moderation bot")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value_t = 3000, env = "WARDEN_PORT")]
    port: u16,

    /// Config store file
    #[arg(long, default_value = "warden-data.json", env = "WARDEN_DATA_FILE")]
    data_file: String,

    /// Discord bot token
    #[arg(long, env = "DISCORD_TOKEN", hide_env_values = true)]
    discord_token: String,

    /// Discord REST API base URL
    #[arg(long, default_value = discord::DEFAULT_API_URL, env = "DISCORD_API_URL")]
    discord_api_url: String,

    /// Public URL of this server, shown by /dashboard
    #[arg(long, env = "PUBLIC_URL")]
    public_url: Option<String>,

    /// Operator bearer token for the config and event endpoints
    #[arg(long, env = "DASHBOARD_TOKEN", hide_env_values = true)]
    dashboard_token: Option<String>,

    /// Rate-window sweep interval in seconds
    #[arg(long, default_value_t = 60, env = "RATE_SWEEP_INTERVAL_SECS")]
    rate_sweep_interval_secs: u64,

    /// Evict senders idle for this many spam windows
    #[arg(long, default_value_t = 10, env = "RATE_IDLE_WINDOWS")]
    rate_idle_windows: u32,
}

// ── Entry Point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warden_bot=info,warden_core=info,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();

    let config = BotConfig {
        port: args.port,
        data_file: args.data_file,
        public_url: args
            .public_url
            .unwrap_or_else(|| format!("http://localhost:{}", args.port)),
        dashboard_token: args.dashboard_token.filter(|t| !t.trim().is_empty()),
        sweep_interval_secs: args.rate_sweep_interval_secs.max(1),
        idle_windows: args.rate_idle_windows.max(1),
    };

    if config.dashboard_token.is_none() {
        tracing::warn!("No DASHBOARD_TOKEN configured, operator API is unauthenticated");
    }

    let store = ConfigStore::open(&config.data_file);
    tracing::info!(
        path = config.data_file.as_str(),
        communities = store.len(),
        "Config store loaded"
    );

    let platform = DiscordPlatform::connect(&args.discord_api_url, &args.discord_token)
        .await
        .expect("Failed to reach the Discord API");

    let state = AppState::new(config.clone(), store.clone(), Arc::new(platform));

    // Spawn periodic rate-window sweep
    let sweep_state = state.clone();
    let sweep_interval = config.sweep_interval_secs;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(sweep_interval));
        loop {
            interval.tick().await;
            sweep_state.sweep();
        }
    });

    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Warden bot starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    match store.close() {
        Ok(()) => tracing::info!("Config store flushed"),
        Err(e) => tracing::error!(error = %e, "Failed to flush config store on shutdown"),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

/// All HTTP routes.
pub(crate) fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(api::health_handler))
        .route("/stats", get(api::stats_handler))
        .route("/api/config", get(api::list_configs))
        .route("/api/config/:id", get(api::get_config))
        .route("/api/config/:id/channels", post(api::update_channels))
        .route("/api/config/:id/roles", post(api::update_roles))
        .route("/api/config/:id/automod", post(api::update_automod))
        .route("/api/events", post(ingest::ingest_event))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
