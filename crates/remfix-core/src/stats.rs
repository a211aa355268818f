//! Wire-facing stats types shared by the storage layer and route handlers.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One durable daily aggregate row.
///
/// `views` is exact (bumped per pageview); `unique_visitors` is the last
/// HyperLogLog estimate synced back from Redis — approximate by design.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyStats {
    #[serde(rename = "date")]
    pub day: NaiveDate,
    pub views: i64,
    #[serde(rename = "uniqueVisitors")]
    pub unique_visitors: i64,
}

impl DailyStats {
    pub fn empty(day: NaiveDate) -> Self {
        Self {
            day,
            views: 0,
            unique_visitors: 0,
        }
    }
}

/// Active-session count for one page path, derived live from the session map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageActivity {
    pub path: String,
    #[serde(rename = "activeUsers")]
    pub active_users: i64,
}
