use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::{state::AppState, telemetry::TelemetryJob};

/// Name of the client-set tracking cookie carrying the opaque session id.
pub const SESSION_COOKIE: &str = "rfx_session";

/// Heartbeat payload sent by each open storefront tab roughly every 60 s
/// and on navigation.
#[derive(Debug, Deserialize)]
struct PingPayload {
    #[serde(rename = "pagePath")]
    page_path: Option<String>,
    #[serde(default)]
    referrer: Option<String>,
}

/// `POST /api/analytics/ping` — browser-tab heartbeat.
///
/// Always answers `200 {"success": true}`. Malformed JSON, an empty or
/// missing `pagePath`, and a missing session cookie are all accepted as
/// no-ops — telemetry must never break a page load, so there is no 4xx path
/// here at all.
///
/// A valid ping updates the in-memory session map synchronously and enqueues
/// the durable/Redis side effects on the bounded telemetry queue. The handler
/// itself never awaits DuckDB or Redis.
#[tracing::instrument(skip(state, headers, body))]
pub async fn ping(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    ingest(&state, &headers, &body).await;
    Json(json!({ "success": true }))
}

/// Returns whether the ping was usable; the response does not depend on it.
async fn ingest(state: &AppState, headers: &HeaderMap, body: &[u8]) -> bool {
    // Hand-rolled lenient parse: the Json extractor would reject malformed
    // bodies with 4xx, which this endpoint must never do.
    let payload: PingPayload = match serde_json::from_slice(body) {
        Ok(p) => p,
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring malformed ping body");
            return false;
        }
    };

    let Some(page_path) = payload.page_path.filter(|p| !p.is_empty()) else {
        tracing::debug!("Ignoring ping without pagePath");
        return false;
    };

    let Some(session_id) = session_cookie(headers) else {
        tracing::debug!("Ignoring ping without session cookie");
        return false;
    };

    if let Some(referrer) = &payload.referrer {
        tracing::debug!(referrer = %referrer, page = %page_path, "Ping");
    }

    let now = Utc::now();
    {
        let mut sessions = state.sessions.lock().await;
        sessions.record_ping(&session_id, &page_path, now);
    }

    state.enqueue_telemetry(TelemetryJob {
        session_id,
        day: now.date_naive(),
        at: now,
    });
    true
}

/// Extract the tracking cookie value from the `Cookie` header.
fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::COOKIE)
        .and_then(|h| h.to_str().ok())
        .and_then(|cookie_str| {
            cookie_str
                .split(';')
                .find_map(|c| {
                    c.trim()
                        .strip_prefix(SESSION_COOKIE)
                        .and_then(|rest| rest.strip_prefix('='))
                })
                .filter(|v| !v.is_empty())
                .map(|v| v.to_string())
        })
}
