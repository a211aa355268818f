//! Daily-stats rows: the durable slice of the analytics read path.

use anyhow::Result;
use chrono::NaiveDate;

use remfix_core::stats::DailyStats;

use crate::DuckDbBackend;

impl DuckDbBackend {
    /// Increment today's pageview counter, creating the row if absent.
    pub async fn bump_views(&self, day: NaiveDate) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO daily_stats (day, views, unique_visitors)
             VALUES (?1, 0, 0)
             ON CONFLICT (day) DO NOTHING",
            duckdb::params![day_str(&day)],
        )?;
        conn.execute(
            "UPDATE daily_stats SET views = views + 1 WHERE day = ?1",
            duckdb::params![day_str(&day)],
        )?;
        Ok(())
    }

    /// Overwrite the day's unique-visitor estimate with the latest PFCOUNT.
    ///
    /// Called by the telemetry worker after each PFADD; when Redis is down the
    /// row simply keeps its last value.
    pub async fn set_unique_visitors(&self, day: NaiveDate, count: i64) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO daily_stats (day, views, unique_visitors)
             VALUES (?1, 0, ?2)
             ON CONFLICT (day) DO UPDATE SET unique_visitors = excluded.unique_visitors",
            duckdb::params![day_str(&day), count],
        )?;
        Ok(())
    }

    /// The aggregate row for one day. A missing row reads as all-zero — the
    /// dashboard shows zeros, never an error, for days without traffic.
    pub async fn stats_for_day(&self, day: NaiveDate) -> Result<DailyStats> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT CAST(day AS VARCHAR), views, unique_visitors
             FROM daily_stats WHERE day = ?1",
        )?;
        let row = stmt.query_row(duckdb::params![day_str(&day)], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
            ))
        });
        match row {
            Ok((d, views, unique_visitors)) => Ok(DailyStats {
                day: parse_day(&d)?,
                views,
                unique_visitors,
            }),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(DailyStats::empty(day)),
            Err(e) => Err(e.into()),
        }
    }

    /// The last `days` daily rows up to and including `today`, ascending by
    /// day. Days with no traffic have no row and are simply absent.
    pub async fn recent_stats(&self, today: NaiveDate, days: i64) -> Result<Vec<DailyStats>> {
        let start = today - chrono::Duration::days(days - 1);
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT CAST(day AS VARCHAR), views, unique_visitors
             FROM daily_stats
             WHERE day >= ?1 AND day <= ?2
             ORDER BY day ASC",
        )?;
        let rows = stmt.query_map(duckdb::params![day_str(&start), day_str(&today)], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (d, views, unique_visitors) = row?;
            out.push(DailyStats {
                day: parse_day(&d)?,
                views,
                unique_visitors,
            });
        }
        Ok(out)
    }

    /// All-time pageview total across every daily row.
    pub async fn total_views(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare("SELECT CAST(COALESCE(SUM(views), 0) AS BIGINT) FROM daily_stats")?;
        let total: i64 = stmt.query_row([], |row| row.get(0))?;
        Ok(total)
    }
}

fn day_str(day: &NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

fn parse_day(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| anyhow::anyhow!("invalid day value {raw:?} in daily_stats: {e}"))
}
