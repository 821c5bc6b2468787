//! Cache keys for the previous-month balance lookup

use chrono::{Datelike, NaiveDate};
use std::fmt;

const STORAGE_PREFIX: &str = "dashboard:monthly-balance";

/// `(user, calendar month)` a balance belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub user_id: String,
    pub year: i32,
    /// 1-12
    pub month: u32,
}

impl CacheKey {
    pub fn new(user_id: impl Into<String>, year: i32, month: u32) -> Self {
        Self {
            user_id: user_id.into(),
            year,
            month,
        }
    }

    /// Key for the calendar month preceding `today`
    pub fn previous_month(user_id: impl Into<String>, today: NaiveDate) -> Self {
        let (year, month) = if today.month() == 1 {
            (today.year() - 1, 12)
        } else {
            (today.year(), today.month() - 1)
        };
        Self::new(user_id, year, month)
    }

    /// Key under which the durable record is stored
    pub fn storage_key(&self) -> String {
        format!(
            "{}:{}:{}-{:02}",
            STORAGE_PREFIX, self.user_id, self.year, self.month
        )
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}-{:02}", self.user_id, self.year, self.month)
    }
}
