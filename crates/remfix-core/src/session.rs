use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::stats::PageActivity;

/// One active browser-tab heartbeat identity.
///
/// Unrelated to authentication sessions — the id is whatever opaque value the
/// client's tracking cookie holds.
#[derive(Debug, Clone)]
struct SessionEntry {
    current_page_path: String,
    last_seen_at: DateTime<Utc>,
}

/// In-memory tracker of currently active visitor sessions.
///
/// Owned by `AppState` behind a `tokio::sync::Mutex` — there is deliberately
/// no interior locking here so the expiry logic stays testable with plain
/// synchronous calls and injected clocks.
///
/// The session set is lossy, process-local telemetry: a restart resets it to
/// zero, and with multiple replicas each replica sees only its own sessions.
/// Both are accepted behaviour, not bugs.
pub struct SessionManager {
    sessions: HashMap<String, SessionEntry>,
    inactivity_window: Duration,
}

impl SessionManager {
    pub fn new(window_secs: u64) -> Self {
        Self {
            sessions: HashMap::new(),
            inactivity_window: Duration::seconds(window_secs as i64),
        }
    }

    /// Insert or refresh a session. Last write wins; never fails.
    pub fn record_ping(&mut self, session_id: &str, page_path: &str, now: DateTime<Utc>) {
        self.sessions.insert(
            session_id.to_string(),
            SessionEntry {
                current_page_path: page_path.to_string(),
                last_seen_at: now,
            },
        );
    }

    /// Count of sessions seen within the inactivity window.
    ///
    /// Stale entries are garbage-collected on this read — there is no
    /// hard-scheduled sweep timer.
    pub fn active_sessions(&mut self, now: DateTime<Utc>) -> usize {
        self.evict_stale(now);
        self.sessions.len()
    }

    /// Live `page path → active session count` view, sorted by count
    /// descending then path ascending so dashboard output is stable.
    pub fn active_pages(&mut self, now: DateTime<Utc>) -> Vec<PageActivity> {
        self.evict_stale(now);
        let mut counts: HashMap<&str, i64> = HashMap::new();
        for entry in self.sessions.values() {
            *counts.entry(entry.current_page_path.as_str()).or_default() += 1;
        }
        let mut pages: Vec<PageActivity> = counts
            .into_iter()
            .map(|(path, active_users)| PageActivity {
                path: path.to_string(),
                active_users,
            })
            .collect();
        pages.sort_by(|a, b| b.active_users.cmp(&a.active_users).then(a.path.cmp(&b.path)));
        pages
    }

    fn evict_stale(&mut self, now: DateTime<Utc>) {
        // Inclusive boundary: a session seen exactly `window` seconds ago is
        // still within the window.
        let cutoff = now - self.inactivity_window;
        self.sessions.retain(|_, e| e.last_seen_at >= cutoff);
    }
}
