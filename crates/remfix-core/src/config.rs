use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub data_dir: String,
    /// Bearer token expected on `/api/admin/*` routes. `None` means admin
    /// routes are disabled — every request gets 401.
    pub admin_token: Option<String>,
    /// Upstash-style Redis REST endpoint. `None` disables Redis counters;
    /// all approximate metrics degrade to zero.
    pub redis_url: Option<String>,
    pub redis_token: Option<String>,
    pub redis_timeout_ms: u64,
    /// Shared secret for the RemOnline webhook. `None` disables the endpoint.
    pub webhook_secret: Option<String>,
    /// A session not seen for this many seconds is no longer "online".
    pub session_window_secs: u64,
    /// Capacity of the bounded telemetry job queue.
    pub telemetry_queue_size: usize,
    pub duckdb_memory_limit: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Ok(Self {
            port: std::env::var("REMFIX_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|e| format!("invalid port: {e}"))?,
            data_dir: std::env::var("REMFIX_DATA_DIR").unwrap_or_else(|_| "./data".to_string()),
            admin_token: std::env::var("REMFIX_ADMIN_TOKEN")
                .ok()
                .filter(|t| !t.is_empty()),
            redis_url: std::env::var("REMFIX_REDIS_URL")
                .ok()
                .filter(|u| !u.is_empty()),
            redis_token: std::env::var("REMFIX_REDIS_TOKEN")
                .ok()
                .filter(|t| !t.is_empty()),
            redis_timeout_ms: std::env::var("REMFIX_REDIS_TIMEOUT_MS")
                .unwrap_or_else(|_| "2000".to_string())
                .parse()
                .unwrap_or(2000),
            webhook_secret: std::env::var("REMFIX_WEBHOOK_SECRET")
                .ok()
                .filter(|s| !s.is_empty()),
            session_window_secs: std::env::var("REMFIX_SESSION_WINDOW_SECS")
                .unwrap_or_else(|_| "120".to_string())
                .parse()
                .unwrap_or(120),
            telemetry_queue_size: std::env::var("REMFIX_TELEMETRY_QUEUE_SIZE")
                .unwrap_or_else(|_| "1024".to_string())
                .parse()
                .unwrap_or(1024),
            duckdb_memory_limit: std::env::var("REMFIX_DUCKDB_MEMORY")
                .unwrap_or_else(|_| "512MB".to_string()),
        })
    }

    pub fn redis_timeout(&self) -> Duration {
        Duration::from_millis(self.redis_timeout_ms)
    }
}
