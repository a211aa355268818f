use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, warn};

use remfix_core::{config::Config, session::SessionManager};
use remfix_duckdb::DuckDbBackend;

use crate::redis::RedisClient;
use crate::telemetry::TelemetryJob;

/// Shared application state injected into every Axum handler via
/// [`axum::extract::State`].
pub struct AppState {
    /// The DuckDB backend. Internally `Arc<tokio::sync::Mutex<Connection>>`,
    /// so it is async-safe and cheap to share.
    pub db: Arc<DuckDbBackend>,

    /// Parsed configuration, loaded once at startup from environment variables.
    pub config: Arc<Config>,

    /// In-memory session tracker — explicitly owned here and injected into
    /// handlers, never a module-level global. Process-local by design: a
    /// restart resets it, and each replica sees only its own sessions.
    pub sessions: Mutex<SessionManager>,

    /// Redis REST bridge, `None` when unconfigured. Every read through it
    /// degrades to zero on error or absence.
    pub redis: Option<RedisClient>,

    /// Producer side of the bounded telemetry queue. The consumer is the
    /// worker task spawned in `main.rs` (or by a test harness). `None` once
    /// [`AppState::close_telemetry`] has run at shutdown.
    telemetry_tx: std::sync::Mutex<Option<mpsc::Sender<TelemetryJob>>>,
}

impl AppState {
    /// Construct the state plus the receiving end of the telemetry queue.
    ///
    /// The receiver is handed back to the caller so process startup (and
    /// tests) decide where the worker runs.
    pub fn new(db: DuckDbBackend, config: Config) -> (Self, mpsc::Receiver<TelemetryJob>) {
        let redis = RedisClient::from_config(&config);
        let (telemetry_tx, telemetry_rx) = mpsc::channel(config.telemetry_queue_size);
        let state = Self {
            db: Arc::new(db),
            sessions: Mutex::new(SessionManager::new(config.session_window_secs)),
            config: Arc::new(config),
            redis,
            telemetry_tx: std::sync::Mutex::new(Some(telemetry_tx)),
        };
        (state, telemetry_rx)
    }

    /// Hand a job to the telemetry worker without blocking.
    ///
    /// A full queue drops the job with a warning — bounded, explicit loss
    /// instead of silently accumulating unawaited futures.
    pub fn enqueue_telemetry(&self, job: TelemetryJob) {
        let tx = match self.telemetry_tx.lock() {
            Ok(guard) => guard.clone(),
            Err(_) => return,
        };
        match tx {
            Some(tx) => {
                if let Err(e) = tx.try_send(job) {
                    warn!(error = %e, "Telemetry queue full — dropping ping side effects");
                }
            }
            None => warn!("Telemetry queue closed — dropping ping side effects"),
        }
    }

    /// Drop the queue's sender so the worker drains what is buffered and
    /// exits. Called once on shutdown, after the HTTP server has stopped.
    pub fn close_telemetry(&self) {
        if let Ok(mut guard) = self.telemetry_tx.lock() {
            guard.take();
        }
    }

    /// Background loop: rotate the visitor salt at midnight UTC.
    ///
    /// Calculates time until the next UTC midnight, sleeps until then,
    /// rotates, and repeats. A failed rotation is logged but does not crash
    /// the loop — visitor keys keep using the current salt.
    pub async fn run_salt_rotation_loop(self: Arc<Self>) {
        loop {
            let now = Utc::now();
            let tomorrow = now.date_naive() + chrono::Duration::days(1);
            let next_midnight = match tomorrow.and_hms_opt(0, 0, 0) {
                Some(t) => t.and_utc(),
                None => {
                    error!("Failed to compute next midnight — salt rotation disabled");
                    return;
                }
            };
            let secs_until = (next_midnight - now).num_seconds().max(1) as u64;
            tokio::time::sleep(std::time::Duration::from_secs(secs_until)).await;
            match self.db.rotate_visitor_salt().await {
                Ok(()) => info!("Visitor salt rotated at midnight UTC"),
                Err(e) => error!(error = %e, "Salt rotation failed — keeping current salt"),
            }
        }
    }
}
