//! Transient, self-dismissing error notice.

use chrono::NaiveDate;
use web_time::Instant;

/// Message shown over the globe when the requested day cannot be loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorNotice {
    pub message: String,
    pub expires_at: Instant,
}

impl ErrorNotice {
    pub fn unavailable(date: NaiveDate, expires_at: Instant) -> Self {
        Self {
            message: format!("Data unavailable for {}", date),
            expires_at,
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}
