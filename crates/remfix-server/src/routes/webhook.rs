use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde_json::json;

use crate::{error::AppError, state::AppState};

/// Header RemOnline is configured to send its shared secret in.
pub const SIGNATURE_HEADER: &str = "x-remonline-signature";

/// `POST /api/webhooks/remonline` — CRM webhook intake.
///
/// Verifies the shared secret from `REMFIX_WEBHOOK_SECRET` and stores the
/// raw delivery as a `crm_events` row. With no secret configured the
/// endpoint is disabled (`401` for everything). A storage failure returns
/// `500` so the CRM retries the delivery.
#[tracing::instrument(skip(state, headers, body))]
pub async fn remonline(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let Some(secret) = &state.config.webhook_secret else {
        return Err(AppError::Unauthorized);
    };

    let presented = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !crate::auth::signature_matches(presented, secret) {
        return Err(AppError::Unauthorized);
    }

    let payload = String::from_utf8_lossy(&body);
    let event_type = serde_json::from_str::<serde_json::Value>(&payload)
        .ok()
        .and_then(|v| v.get("event").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string());

    let id = state
        .db
        .insert_crm_event(&event_type, &payload, Utc::now())
        .await
        .map_err(AppError::Internal)?;

    tracing::info!(event_type = %event_type, id = %id, "Stored CRM webhook delivery");
    Ok(Json(json!({ "ok": true })))
}
