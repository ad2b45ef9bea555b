//! Operator REST API handlers.
//!
//! Status endpoints plus read/update access to per-community configuration.
//! Config endpoints require `Authorization: Bearer <token>` when an operator
//! token is configured.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use warden_core::{CommunityConfig, ConfigSlot, Error};

use crate::state::AppState;

/// Upper bound for `spamMax` accepted from the API.
const MAX_SPAM_MAX: u32 = 100;

/// Accepted `spamWindowMs` range.
const SPAM_WINDOW_RANGE: std::ops::RangeInclusive<u64> = 1_000..=3_600_000;

// ── Request / Response Types ─────────────────────────────────────────────────

/// Distinguish an absent field (`None`) from an explicit `null` (`Some(None)`).
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// POST /api/config/:id/channels
///
/// Absent fields are left alone; `null` or `""` clears the slot.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelsUpdate {
    #[serde(default, deserialize_with = "present")]
    pub welcome_channel_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub leave_channel_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub mod_log_channel_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub suggestion_channel_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub ticket_category_id: Option<Option<String>>,
}

impl ChannelsUpdate {
    fn slots(self) -> Vec<(ConfigSlot, Option<Option<String>>)> {
        vec![
            (ConfigSlot::WelcomeChannel, self.welcome_channel_id),
            (ConfigSlot::LeaveChannel, self.leave_channel_id),
            (ConfigSlot::ModLogChannel, self.mod_log_channel_id),
            (ConfigSlot::SuggestionChannel, self.suggestion_channel_id),
            (ConfigSlot::TicketCategory, self.ticket_category_id),
        ]
    }
}

/// POST /api/config/:id/roles
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RolesUpdate {
    #[serde(default, deserialize_with = "present")]
    pub staff_role_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub autorole_id: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub muted_role_id: Option<Option<String>>,
}

impl RolesUpdate {
    fn slots(self) -> Vec<(ConfigSlot, Option<Option<String>>)> {
        vec![
            (ConfigSlot::StaffRole, self.staff_role_id),
            (ConfigSlot::AutoRole, self.autorole_id),
            (ConfigSlot::MutedRole, self.muted_role_id),
        ]
    }
}

/// POST /api/config/:id/automod
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoModUpdate {
    pub enabled: Option<bool>,
    pub anti_invite: Option<bool>,
    pub anti_link: Option<bool>,
    pub spam_max: Option<u32>,
    pub spam_window_ms: Option<u64>,
    pub banned_words: Option<Vec<String>>,
}

impl AutoModUpdate {
    fn validate(&self) -> Result<(), Error> {
        if let Some(max) = self.spam_max {
            if !(1..=MAX_SPAM_MAX).contains(&max) {
                return Err(Error::Validation(format!(
                    "spamMax must be between 1 and {}",
                    MAX_SPAM_MAX
                )));
            }
        }
        if let Some(window) = self.spam_window_ms {
            if !SPAM_WINDOW_RANGE.contains(&window) {
                return Err(Error::Validation(format!(
                    "spamWindowMs must be between {} and {}",
                    SPAM_WINDOW_RANGE.start(),
                    SPAM_WINDOW_RANGE.end()
                )));
            }
        }
        Ok(())
    }

    fn apply(self, cfg: &mut CommunityConfig) {
        let policy = &mut cfg.automod;
        if let Some(v) = self.enabled {
            policy.enabled = v;
        }
        if let Some(v) = self.anti_invite {
            policy.anti_invite = v;
        }
        if let Some(v) = self.anti_link {
            policy.anti_link = v;
        }
        if let Some(v) = self.spam_max {
            policy.spam_max = v;
        }
        if let Some(v) = self.spam_window_ms {
            policy.spam_window_ms = v;
        }
        if let Some(words) = self.banned_words {
            policy.banned_words = words;
        }
        policy.normalize();
    }
}

/// Generic response envelope.
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn success(data: T) -> Json<Self> {
        Json(Self {
            ok: true,
            data: Some(data),
            error: None,
        })
    }
}

pub(crate) fn error_response(status: StatusCode, msg: &str) -> Response {
    (
        status,
        Json(ApiResponse::<()> {
            ok: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
        .into_response()
}

/// HTTP status for a core error, by error category.
pub(crate) fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::Validation(_) => StatusCode::BAD_REQUEST,
        Error::PermissionDenied(_) => StatusCode::FORBIDDEN,
        Error::TargetNotFound(_) => StatusCode::NOT_FOUND,
        Error::AlreadyExists { .. } => StatusCode::CONFLICT,
        Error::ExternalActionFailed(_) => StatusCode::BAD_GATEWAY,
        Error::Persistence(_) | Error::Serialization(_) | Error::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

pub(crate) fn core_error_response(err: &Error) -> Response {
    error_response(status_for(err), &err.to_string())
}

pub(crate) fn unauthorized() -> Response {
    error_response(StatusCode::UNAUTHORIZED, "Missing or invalid operator token")
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// GET /health
pub async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "warden-bot",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "communities": state.store.len(),
        "events_handled": state.router.events_handled(),
        "tracked_rate_keys": state.router.rate_window().tracked_keys(),
        "open_tickets": state.router.tickets().open_count(),
        "uptime_secs": state.uptime_secs(),
    }))
}

/// GET /api/config: IDs of every known community.
pub async fn list_configs(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    ApiResponse::success(state.store.community_ids()).into_response()
}

/// GET /api/config/:id: full config, created with defaults if unknown.
pub async fn get_config(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    ApiResponse::success(state.store.get(&id)).into_response()
}

fn update_slots(
    state: &AppState,
    id: &str,
    slots: Vec<(ConfigSlot, Option<Option<String>>)>,
) -> Response {
    let result = state.store.update(id, |cfg| {
        for (slot, value) in slots {
            if let Some(value) = value {
                cfg.set_slot(slot, value);
            }
        }
        cfg.clone()
    });
    match result {
        Ok(config) => {
            tracing::info!(community_id = id, "Config updated via API");
            ApiResponse::success(config).into_response()
        }
        Err(e) => core_error_response(&e),
    }
}

/// POST /api/config/:id/channels
pub async fn update_channels(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<ChannelsUpdate>,
) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    update_slots(&state, &id, req.slots())
}

/// POST /api/config/:id/roles
pub async fn update_roles(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<RolesUpdate>,
) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    update_slots(&state, &id, req.slots())
}

/// POST /api/config/:id/automod
pub async fn update_automod(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<AutoModUpdate>,
) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }
    if let Err(e) = req.validate() {
        return core_error_response(&e);
    }
    match state.store.update(&id, |cfg| {
        req.apply(cfg);
        cfg.clone()
    }) {
        Ok(config) => {
            tracing::info!(community_id = id.as_str(), "AutoMod policy updated via API");
            ApiResponse::success(config).into_response()
        }
        Err(e) => core_error_response(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::BotConfig;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;
    use warden_core::platform::memory::MemoryPlatform;
    use warden_core::ConfigStore;

    fn state(token: Option<&str>) -> AppState {
        let config = BotConfig {
            dashboard_token: token.map(str::to_string),
            ..Default::default()
        };
        AppState::new(config, ConfigStore::in_memory(), Arc::new(MemoryPlatform::new()))
    }

    async fn call(state: &AppState, request: Request<Body>) -> (StatusCode, Value) {
        let response = crate::build_router(state.clone())
            .oneshot(request)
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn post(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = call(&state(None), Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], "warden-bot");
    }

    #[tokio::test]
    async fn test_get_config_returns_defaults() {
        let state = state(None);
        let (status, body) = call(&state, Request::get("/api/config/g1").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["data"]["prefix"], "!");
        assert_eq!(body["data"]["automod"]["spamMax"], 6);
        assert!(state.store.contains("g1"));
    }

    #[tokio::test]
    async fn test_token_required_when_configured() {
        let state = state(Some("tok"));
        let (status, body) = call(&state, Request::get("/api/config/g1").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["ok"], false);

        let request = Request::get("/api/config/g1")
            .header("authorization", "Bearer tok")
            .body(Body::empty())
            .unwrap();
        let (status, _) = call(&state, request).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_channels_partial_update() {
        let state = state(None);
        state
            .store
            .update("g1", |cfg| cfg.leave_channel_id = Some("bye".into()))
            .unwrap();

        let (status, body) = call(
            &state,
            post(
                "/api/config/g1/channels",
                json!({ "welcomeChannelId": "hello", "modLogChannelId": null }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["welcomeChannelId"], "hello");

        let cfg = state.store.get("g1");
        assert_eq!(cfg.welcome_channel_id.as_deref(), Some("hello"));
        assert_eq!(cfg.leave_channel_id.as_deref(), Some("bye"));
        assert!(cfg.mod_log_channel_id.is_none());
    }

    #[tokio::test]
    async fn test_roles_blank_clears() {
        let state = state(None);
        state
            .store
            .update("g1", |cfg| cfg.staff_role_id = Some("mods".into()))
            .unwrap();
        let (status, _) = call(&state, post("/api/config/g1/roles", json!({ "staffRoleId": "" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(state.store.get("g1").staff_role_id.is_none());
    }

    #[tokio::test]
    async fn test_automod_update_and_validation() {
        let state = state(None);
        let (status, _) = call(
            &state,
            post(
                "/api/config/g1/automod",
                json!({ "antiLink": true, "spamMax": 4, "bannedWords": ["Spam", "spam "] }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let policy = state.store.get("g1").automod;
        assert!(policy.anti_link);
        assert!(policy.anti_invite);
        assert_eq!(policy.spam_max, 4);
        assert_eq!(policy.banned_words, vec!["spam".to_string()]);

        let (status, body) = call(&state, post("/api/config/g1/automod", json!({ "spamMax": 0 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("spamMax"));
        assert_eq!(state.store.get("g1").automod.spam_max, 4);
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(&Error::Validation("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&Error::PermissionDenied("x".into())), StatusCode::FORBIDDEN);
        assert_eq!(status_for(&Error::Persistence("x".into())), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
