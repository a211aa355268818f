use std::sync::Arc;

use axum::{extract::State, response::IntoResponse, Json};
use chrono::Utc;
use serde_json::json;

use crate::redis::TOTAL_VISITORS_KEY;
use crate::state::AppState;

/// How many daily rows feed the dashboard trend chart.
const TREND_DAYS: i64 = 7;

/// How many pages the popular-pages list carries.
const POPULAR_PAGES_LIMIT: usize = 10;

/// `GET /api/admin/analytics/dashboard` — install-wide totals for the admin
/// dashboard. Behind the admin bearer-token middleware.
///
/// Composes three independent sources: the in-memory session map, the Redis
/// approximate counters, and the durable daily rows. A failed or unconfigured
/// source degrades its slice to `0`/`[]`; the response is always `200`.
#[tracing::instrument(skip(state))]
pub async fn get_dashboard(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let now = Utc::now();
    let today = now.date_naive();

    let (total_views, trend_data) = tokio::join!(
        state.db.total_views(),
        state.db.recent_stats(today, TREND_DAYS),
    );
    let total_views = total_views.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Total views read failed — serving 0");
        0
    });
    let trend_data = trend_data.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Trend data read failed — serving empty");
        Vec::new()
    });

    let (local_online, mut pages) = {
        let mut sessions = state.sessions.lock().await;
        (sessions.active_sessions(now) as i64, sessions.active_pages(now))
    };
    pages.truncate(POPULAR_PAGES_LIMIT);

    let (total_unique, recent) = match &state.redis {
        Some(redis) => {
            let window = state.config.session_window_secs;
            let (unique, recent) = tokio::join!(
                redis.pfcount(TOTAL_VISITORS_KEY),
                redis.recent_activity(now, window),
            );
            (
                unique.unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "Unique-visitor count unavailable — serving 0");
                    0
                }),
                recent.unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "Recent-activity count unavailable — serving 0");
                    0
                }),
            )
        }
        None => (0, 0),
    };

    // With replicas, the local map undercounts; the Redis recent set sees
    // every replica. Take whichever is larger.
    let online_count = local_online.max(recent);

    Json(json!({
        "onlineCount": online_count,
        "totalViews": total_views,
        "totalUniqueVisitors": total_unique,
        "popularPages": pages,
        "trendData": trend_data,
    }))
}
