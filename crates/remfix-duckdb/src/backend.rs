use std::sync::Arc;

use anyhow::Result;
use duckdb::Connection;
use tokio::sync::Mutex;
use tracing::info;

use crate::schema::init_sql;

/// Generate a cryptographically random hex string of `n` bytes (2n hex chars).
pub(crate) fn rand_hex(n: usize) -> String {
    use rand::RngCore;
    let mut buf = vec![0u8; n];
    rand::thread_rng().fill_bytes(&mut buf);
    hex::encode(buf)
}

/// The DuckDB backend for remfix.
///
/// DuckDB is single-writer: concurrent reads are fine, but concurrent writes
/// cause contention. We wrap the connection in `Arc<Mutex<_>>` so the async
/// runtime serialises all writes through the telemetry worker while still
/// allowing the struct to be cheaply shared across Axum handlers.
pub struct DuckDbBackend {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl DuckDbBackend {
    /// Open (or create) a DuckDB database file at `path`.
    ///
    /// `memory_limit` is a DuckDB size string such as `"512MB"` or `"1GB"`,
    /// read from `Config.duckdb_memory_limit` at the call site.
    pub fn open(path: &str, memory_limit: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(&init_sql(memory_limit))?;
        Self::seed_settings_sync(&conn)?;
        info!(
            "DuckDB opened at {} with memory_limit={}, threads=2",
            path, memory_limit
        );
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an **in-memory** DuckDB database.
    ///
    /// Intended for tests only — data is discarded when the struct is dropped.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(&init_sql("1GB"))?;
        Self::seed_settings_sync(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Seed the `settings` table with initial values if they don't already exist.
    ///
    /// Uses `INSERT OR IGNORE` so re-runs on every startup are safe.
    /// - `visitor_salt`: 32-byte random hex, used for visitor-key hashing
    /// - `version`:      schema version "1"
    fn seed_settings_sync(conn: &Connection) -> Result<()> {
        let salt = rand_hex(32);
        // Separate parameterized execute() calls — DuckDB does not support
        // multi-statement batches with parameters.
        conn.execute(
            "INSERT OR IGNORE INTO settings (key, value) VALUES ('visitor_salt', ?1)",
            duckdb::params![salt],
        )?;
        conn.execute(
            "INSERT OR IGNORE INTO settings (key, value) VALUES ('version', ?1)",
            duckdb::params!["1"],
        )?;
        Ok(())
    }

    /// Read the current `visitor_salt` from the `settings` table.
    pub async fn get_visitor_salt(&self) -> Result<String> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare("SELECT value FROM settings WHERE key = 'visitor_salt'")?;
        let salt: String = stmt.query_row([], |row| row.get(0))?;
        Ok(salt)
    }

    /// Rotate the visitor salt at midnight UTC.
    ///
    /// Visitor keys computed after rotation fall into the new day's
    /// HyperLogLog bucket, scoping unique-visitor counts to a calendar day.
    pub async fn rotate_visitor_salt(&self) -> Result<()> {
        let conn = self.conn.lock().await;
        let new_salt = rand_hex(32);
        conn.execute(
            "UPDATE settings SET value = ?1 WHERE key = 'visitor_salt'",
            duckdb::params![new_salt],
        )?;
        Ok(())
    }

    /// Cheap liveness probe used by `GET /health`.
    pub async fn ping(&self) -> Result<()> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare("SELECT 1")?;
        let _: i64 = stmt.query_row([], |row| row.get(0))?;
        Ok(())
    }

    /// Test-only escape hatch: borrow the raw connection for ad-hoc SQL.
    pub async fn conn_for_test(&self) -> tokio::sync::MutexGuard<'_, Connection> {
        self.conn.lock().await
    }
}
