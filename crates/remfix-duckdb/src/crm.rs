//! Raw RemOnline webhook deliveries, stored for later inspection.

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::DuckDbBackend;

impl DuckDbBackend {
    /// Store one webhook delivery verbatim.
    ///
    /// `payload` is the raw JSON body as a string; no shape validation happens
    /// here — the CRM's schema changes without notice and a lost row is worse
    /// than a loose one.
    pub async fn insert_crm_event(
        &self,
        event_type: &str,
        payload: &str,
        received_at: DateTime<Utc>,
    ) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO crm_events (id, event_type, payload, received_at)
             VALUES (?1, ?2, ?3, ?4)",
            duckdb::params![
                id,
                event_type,
                payload,
                received_at.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
            ],
        )?;
        Ok(id)
    }

    pub async fn crm_event_count(&self, event_type: &str) -> Result<i64> {
        let conn = self.conn.lock().await;
        let mut stmt =
            conn.prepare("SELECT COUNT(*) FROM crm_events WHERE event_type = ?1")?;
        let count: i64 = stmt.query_row(duckdb::params![event_type], |row| row.get(0))?;
        Ok(count)
    }
}
