use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

pub const UNKNOWN_USER_AGENT: &str = "Unknown";
pub const NO_REFERRER: &str = "No Referrer";

/// Request metadata captured at redirect time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientInfo {
    /// Normalized client address (no `::ffff:` prefix)
    pub ip: String,
    pub user_agent: String,
    pub referer: String,
}

impl ClientInfo {
    pub fn new(ip: impl Into<String>, user_agent: Option<&str>, referer: Option<&str>) -> Self {
        Self {
            ip: ip.into(),
            user_agent: non_empty_or(user_agent, UNKNOWN_USER_AGENT),
            referer: non_empty_or(referer, NO_REFERRER),
        }
    }
}

fn non_empty_or(value: Option<&str>, fallback: &str) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => fallback.to_string(),
    }
}

/// One scan waiting to be credited, handed from the redirect path to the
/// background workers.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanJob {
    pub short_code: String,
    pub client: ClientInfo,
    pub at: DateTime<Utc>,
}

/// Insert payload for the scan store
#[derive(Debug, Clone, PartialEq)]
pub struct NewScanEvent {
    pub short_link_id: Uuid,
    pub ip_address: String,
    pub user_agent: String,
    pub referer: String,
    pub created_at: DateTime<Utc>,
}

impl NewScanEvent {
    pub fn from_job(short_link_id: Uuid, job: &ScanJob) -> Self {
        Self {
            short_link_id,
            ip_address: job.client.ip.clone(),
            user_agent: job.client.user_agent.clone(),
            referer: job.client.referer.clone(),
            created_at: job.at,
        }
    }
}

/// A stored scan. Append-only, never updated.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct ScanEvent {
    pub id: i64,
    pub short_link_id: Uuid,
    pub ip_address: String,
    pub user_agent: String,
    pub referer: String,
    pub created_at: DateTime<Utc>,
}

/// Dashboard projection of a scan
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScanLogDto {
    pub id: i64,
    pub ip_address: String,
    pub user_agent: String,
    pub referer: String,
    pub created_at: DateTime<Utc>,
}

impl From<ScanEvent> for ScanLogDto {
    fn from(event: ScanEvent) -> Self {
        ScanLogDto {
            id: event.id,
            ip_address: event.ip_address,
            user_agent: event.user_agent,
            referer: event.referer,
            created_at: event.created_at,
        }
    }
}

/// Query string of `GET /scans`
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ScanQueryParams {
    #[validate(
        required(message = "qrCodeId is required"),
        length(min = 1, message = "qrCodeId is required")
    )]
    pub qr_code_id: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub has_more: bool,
}

/// One page of scans, newest first
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScanPage {
    pub scan_logs: Vec<ScanLogDto>,
    pub pagination: Pagination,
}
