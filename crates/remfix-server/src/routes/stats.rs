use std::sync::Arc;

use axum::{extract::State, response::IntoResponse, Json};
use chrono::Utc;
use serde_json::json;

use remfix_core::stats::DailyStats;

use crate::state::AppState;

/// `GET /api/admin/analytics/stats` — today-plus-week snapshot for the admin
/// panel. Behind the admin bearer-token middleware.
///
/// Each data source fails independently: a DuckDB error degrades its slice to
/// zeros with a logged error, and the response is still `200`. The live
/// sessions slice cannot fail.
#[tracing::instrument(skip(state))]
pub async fn get_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let now = Utc::now();
    let today = now.date_naive();

    let (today_row, weekly) = tokio::join!(
        state.db.stats_for_day(today),
        state.db.recent_stats(today, 7),
    );
    let today_row = today_row.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Daily stats read failed — serving zeros");
        DailyStats::empty(today)
    });
    let weekly = weekly.unwrap_or_else(|e| {
        tracing::error!(error = %e, "Weekly stats read failed — serving empty");
        Vec::new()
    });

    let (online_now, active_pages) = {
        let mut sessions = state.sessions.lock().await;
        (sessions.active_sessions(now), sessions.active_pages(now))
    };

    Json(json!({
        "today": {
            "date": today_row.day,
            "views": today_row.views,
            "uniqueVisitors": today_row.unique_visitors,
            "onlineNow": online_now,
        },
        "weekly": weekly,
        "activePages": active_pages,
    }))
}
