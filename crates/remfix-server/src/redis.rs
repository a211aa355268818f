//! HTTP client wrapper for an Upstash-style REST-to-Redis bridge.
//!
//! Each Redis command is POSTed as a JSON array (`["PFADD", key, member]`)
//! with a bearer token; the bridge answers `{"result": ...}` on success or
//! `{"error": "..."}` on failure. The reply is parsed into an explicit
//! enum rather than trusting the shape at runtime.
//!
//! Everything here is best-effort telemetry plumbing: the client carries a
//! short request timeout so a slow backend never stalls page delivery, and
//! callers are expected to log-and-swallow every error.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use remfix_core::config::Config;

/// HyperLogLog of anonymized visitor keys across the whole install.
pub const TOTAL_VISITORS_KEY: &str = "analytics:visitors:total";

/// Sorted set of `visitor_key → last-seen unix timestamp`, trimmed to the
/// last few minutes. Gives the dashboard a cross-replica online estimate.
pub const RECENT_ACTIVITY_KEY: &str = "analytics:recent";

/// Entries older than this are trimmed from the recent-activity set.
pub const RECENT_ACTIVITY_RETENTION_SECS: i64 = 300;

/// Day-scoped HyperLogLog of anonymized visitor keys.
pub fn daily_visitors_key(day: NaiveDate) -> String {
    format!("analytics:visitors:{}", day.format("%Y-%m-%d"))
}

/// Raw bridge reply. Exactly one of the two shapes, never loose JSON.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CommandReply {
    Ok { result: Value },
    Err { error: String },
}

#[derive(Clone)]
pub struct RedisClient {
    client: Client,
    url: String,
    token: String,
}

impl RedisClient {
    /// Build a client from config, or `None` when the bridge is unconfigured.
    ///
    /// Missing credentials are a supported deployment mode, not an error:
    /// every approximate counter simply reads as zero. Logged once here so
    /// the degradation is visible without flooding per-request logs.
    pub fn from_config(config: &Config) -> Option<Self> {
        let (url, token) = match (&config.redis_url, &config.redis_token) {
            (Some(url), Some(token)) => (url.clone(), token.clone()),
            _ => {
                tracing::warn!(
                    "Redis bridge not configured (REMFIX_REDIS_URL / REMFIX_REDIS_TOKEN). \
                     Unique-visitor and recent-activity metrics degrade to 0."
                );
                return None;
            }
        };

        let client = match Client::builder().timeout(config.redis_timeout()).build() {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Failed to build Redis HTTP client");
                return None;
            }
        };

        Some(Self { client, url, token })
    }

    /// Issue one command and return the `result` value.
    async fn command(&self, cmd: &[&str]) -> Result<Value> {
        let resp = self
            .client
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(&cmd)
            .send()
            .await
            .context("Redis bridge request failed")?;

        let status = resp.status();
        let reply: CommandReply = resp
            .json()
            .await
            .with_context(|| format!("Redis bridge reply parse failed (HTTP {status})"))?;

        match reply {
            CommandReply::Ok { result } => Ok(result),
            CommandReply::Err { error } => bail!("Redis bridge error: {error}"),
        }
    }

    async fn command_i64(&self, cmd: &[&str]) -> Result<i64> {
        let result = self.command(cmd).await?;
        result
            .as_i64()
            .with_context(|| format!("Redis returned non-integer result: {result}"))
    }

    /// `PFADD` — returns `true` when the element changed the estimate.
    /// Adding the same visitor twice is a no-op, which is what makes the
    /// unique-visitor counter idempotent per visitor.
    pub async fn pfadd(&self, key: &str, member: &str) -> Result<bool> {
        Ok(self.command_i64(&["PFADD", key, member]).await? == 1)
    }

    /// `PFCOUNT` — approximate distinct count of a HyperLogLog key.
    pub async fn pfcount(&self, key: &str) -> Result<i64> {
        self.command_i64(&["PFCOUNT", key]).await
    }

    /// Record a visitor heartbeat in the recent-activity set and trim
    /// entries older than the retention window.
    pub async fn record_activity(&self, visitor: &str, at: DateTime<Utc>) -> Result<()> {
        let score = at.timestamp().to_string();
        self.command(&["ZADD", RECENT_ACTIVITY_KEY, &score, visitor])
            .await?;
        let horizon = (at.timestamp() - RECENT_ACTIVITY_RETENTION_SECS).to_string();
        self.command(&["ZREMRANGEBYSCORE", RECENT_ACTIVITY_KEY, "-inf", &horizon])
            .await?;
        Ok(())
    }

    /// Visitors seen within `window_secs` of `now`, per the recent set.
    pub async fn recent_activity(&self, now: DateTime<Utc>, window_secs: u64) -> Result<i64> {
        let min = (now.timestamp() - window_secs as i64).to_string();
        self.command_i64(&["ZCOUNT", RECENT_ACTIVITY_KEY, &min, "+inf"])
            .await
    }
}
