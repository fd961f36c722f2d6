use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A generated short code and the link it attributes scans to.
///
/// Rows are owned by the link management side; this service only reads them
/// and bumps `scan_count`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct ShortLink {
    /// The unique ID of the link
    pub id: Uuid,

    /// Immutable code embedded in the printed QR code
    pub short_code: String,

    /// Where the code was meant to send people (always http or https)
    pub target_url: String,

    /// Number of recorded scans, only ever incremented
    pub scan_count: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
impl ShortLink {
    pub fn new(short_code: impl Into<String>, target_url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            short_code: short_code.into(),
            target_url: target_url.into(),
            scan_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}
