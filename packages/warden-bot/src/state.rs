//! Server state management.
//!
//! Everything the HTTP handlers and background loops share: the config
//! store, the event router and the process configuration.

use std::sync::Arc;

use axum::http::HeaderMap;
use warden_core::time::now_millis;
use warden_core::{ConfigStore, EventRouter, Platform, RouterSettings};

/// Default rate-window sweep interval in seconds.
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Default idle threshold, in multiples of the longest spam window.
const DEFAULT_IDLE_WINDOWS: u32 = 10;

/// Process configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub port: u16,
    /// Backing file of the config store.
    pub data_file: String,
    /// Link shown by the dashboard command.
    pub public_url: String,
    /// Operator bearer token. When unset the API is open.
    pub dashboard_token: Option<String>,
    pub sweep_interval_secs: u64,
    pub idle_windows: u32,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            data_file: "warden-data.json".to_string(),
            public_url: "http://localhost:3000".to_string(),
            dashboard_token: None,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            idle_windows: DEFAULT_IDLE_WINDOWS,
        }
    }
}

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    /// Per-community configuration, also held by the router.
    pub store: ConfigStore,

    /// Dispatches ingested events.
    pub router: Arc<EventRouter>,

    pub config: BotConfig,

    /// Process start, Unix millis.
    pub started_at: i64,
}

impl AppState {
    pub fn new(config: BotConfig, store: ConfigStore, platform: Arc<dyn Platform>) -> Self {
        let router = EventRouter::new(
            store.clone(),
            platform,
            RouterSettings {
                public_url: config.public_url.clone(),
            },
        );
        Self {
            store,
            router: Arc::new(router),
            config,
            started_at: now_millis(),
        }
    }

    pub fn uptime_secs(&self) -> i64 {
        (now_millis() - self.started_at).max(0) / 1000
    }

    /// Whether the request carries the operator token (or none is required).
    pub fn authorized(&self, headers: &HeaderMap) -> bool {
        let Some(expected) = self.config.dashboard_token.as_deref() else {
            return true;
        };
        headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|token| token.trim() == expected)
            .unwrap_or(false)
    }

    /// Evict idle rate-window keys; called from the sweep loop.
    pub fn sweep(&self) -> usize {
        self.router
            .sweep_rate_window(now_millis(), self.config.idle_windows)
    }
}
