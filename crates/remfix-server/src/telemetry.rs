//! The asynchronous side of ping ingestion.
//!
//! The ping handler touches only the in-memory session map and then enqueues
//! one [`TelemetryJob`]; everything that talks to DuckDB or Redis happens
//! here, on a dedicated worker task. Every step is independent best-effort:
//! a failure is logged and the remaining steps still run. Nothing in this
//! module can surface an error to a browser.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use remfix_core::visitor::visitor_key;

use crate::redis::{daily_visitors_key, TOTAL_VISITORS_KEY};
use crate::state::AppState;

/// One valid ping's pending side effects.
///
/// Carries the raw session identifier — anonymization happens in the worker,
/// where the salt lookup can await DuckDB without holding up the handler.
/// The raw value never leaves the process.
#[derive(Debug)]
pub struct TelemetryJob {
    pub session_id: String,
    pub day: NaiveDate,
    pub at: DateTime<Utc>,
}

/// Drain the queue until every sender is dropped (process shutdown).
pub async fn run_worker(state: Arc<AppState>, mut rx: mpsc::Receiver<TelemetryJob>) {
    while let Some(job) = rx.recv().await {
        process_job(&state, job).await;
    }
    debug!("Telemetry queue closed — worker exiting");
}

async fn process_job(state: &AppState, job: TelemetryJob) {
    // Durable pageview counter first: it works even with Redis unconfigured.
    if let Err(e) = state.db.bump_views(job.day).await {
        warn!(error = %e, "Failed to bump daily view counter");
    }

    let Some(redis) = &state.redis else {
        return;
    };

    let visitor = match state.db.get_visitor_salt().await {
        Ok(salt) => visitor_key(&salt, &job.session_id),
        Err(e) => {
            warn!(error = %e, "Failed to read visitor salt — skipping Redis counters");
            return;
        }
    };

    let daily_key = daily_visitors_key(job.day);
    if let Err(e) = redis.pfadd(&daily_key, &visitor).await {
        warn!(error = %e, key = %daily_key, "PFADD failed");
    }
    if let Err(e) = redis.pfadd(TOTAL_VISITORS_KEY, &visitor).await {
        warn!(error = %e, "PFADD to total visitors failed");
    }
    if let Err(e) = redis.record_activity(&visitor, job.at).await {
        warn!(error = %e, "Recent-activity update failed");
    }

    // Sync today's estimate back into the durable row so the dashboard keeps
    // a last-known value through Redis outages.
    match redis.pfcount(&daily_key).await {
        Ok(estimate) => {
            if let Err(e) = state.db.set_unique_visitors(job.day, estimate).await {
                warn!(error = %e, "Failed to store unique-visitor estimate");
            }
        }
        Err(e) => warn!(error = %e, "PFCOUNT failed — keeping last stored estimate"),
    }
}
