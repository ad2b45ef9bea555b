//! Inbound event ingestion.
//!
//! The gateway shim posts every platform event it receives as one tagged
//! JSON object. Each request is dispatched inline, so events posted in
//! order for a community are processed in that order.

use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use warden_core::InboundEvent;

use crate::api::{core_error_response, unauthorized, ApiResponse};
use crate::state::AppState;

/// POST /api/events
pub async fn ingest_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(event): Json<InboundEvent>,
) -> Response {
    if !state.authorized(&headers) {
        return unauthorized();
    }

    let kind = event.kind();
    let community_id = event.community_id().to_string();
    match state.router.dispatch(event).await {
        Ok(()) => Json(ApiResponse {
            ok: true,
            data: Some(json!({ "kind": kind })),
            error: None,
        })
        .into_response(),
        Err(e) => {
            tracing::warn!(
                community_id = community_id.as_str(),
                kind = kind,
                error = %e,
                "Event handling failed"
            );
            core_error_response(&e)
        }
    }
}
