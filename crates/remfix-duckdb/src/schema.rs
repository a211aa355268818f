/// DuckDB initialization SQL.
///
/// Executed once at database open time via `Connection::execute_batch`.
/// All statements use `IF NOT EXISTS` so they are safe to re-run on every
/// startup (idempotent).
///
/// `memory_limit` is passed at runtime from `Config.duckdb_memory_limit`
/// (env `REMFIX_DUCKDB_MEMORY`, default `"512MB"`). Always set an explicit
/// limit — the DuckDB default of 80% of system RAM is not acceptable for a
/// server process sharing a host with the storefront.
pub fn init_sql(memory_limit: &str) -> String {
    format!(
        r#"SET memory_limit = '{memory_limit}';
SET threads = 2;

-- ===========================================
-- SETTINGS
-- ===========================================
-- Keys stored in this table:
--   'visitor_salt' – 32-byte random hex for visitor-key hashing
--                    (rotated daily at midnight UTC)
--   'version'      – Database schema version (for migrations)
CREATE TABLE IF NOT EXISTS settings (
    key             VARCHAR PRIMARY KEY,
    value           VARCHAR NOT NULL
);

-- ===========================================
-- DAILY STATS (durable aggregates, one row per calendar day)
-- ===========================================
-- views           – exact pageview count, bumped by the telemetry worker
-- unique_visitors – last HyperLogLog estimate synced from Redis; approximate
CREATE TABLE IF NOT EXISTS daily_stats (
    day             DATE PRIMARY KEY,
    views           BIGINT NOT NULL DEFAULT 0,
    unique_visitors BIGINT NOT NULL DEFAULT 0
);

-- ===========================================
-- CRM EVENTS (raw RemOnline webhook deliveries)
-- ===========================================
CREATE TABLE IF NOT EXISTS crm_events (
    id              VARCHAR PRIMARY KEY,
    event_type      VARCHAR NOT NULL,
    payload         VARCHAR NOT NULL,
    received_at     TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_crm_events_type ON crm_events(event_type);
"#
    )
}
