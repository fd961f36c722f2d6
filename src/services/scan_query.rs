use std::sync::Arc;

use log::{debug, error};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{Pagination, ScanLogDto, ScanPage};
use crate::repositories::ScanEventRepositoryTrait;

type Result<T> = std::result::Result<T, AppError>;

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 10;

/// Read side of the scan log, used by dashboards.
pub struct ScanQueryService {
    store: Arc<dyn ScanEventRepositoryTrait>,
}

impl ScanQueryService {
    pub fn new(store: Arc<dyn ScanEventRepositoryTrait>) -> Self {
        Self { store }
    }

    /// Returns page `page` (1-based) of a link's scans, newest first.
    pub async fn list_scans(&self, link_id: &Uuid, page: i64, limit: i64) -> Result<ScanPage> {
        if page < 1 {
            return Err(AppError::InvalidPagination(format!(
                "page must be at least 1, got {}",
                page
            )));
        }
        if limit < 1 {
            return Err(AppError::InvalidPagination(format!(
                "limit must be at least 1, got {}",
                limit
            )));
        }

        let skip = (page - 1)
            .checked_mul(limit)
            .ok_or_else(|| AppError::InvalidPagination("page is out of range".to_string()))?;

        let (events, total) = self.store.query(link_id, skip, limit).await.map_err(|e| {
            error!("Failed to load scans for link {}: {}", link_id, e);
            AppError::from(e)
        })?;

        debug!(
            "Loaded {} of {} scans for link {} (page {}, limit {})",
            events.len(),
            total,
            link_id,
            page,
            limit
        );

        Ok(ScanPage {
            scan_logs: events.into_iter().map(ScanLogDto::from).collect(),
            pagination: Pagination {
                total,
                page,
                limit,
                has_more: total > skip.saturating_add(limit),
            },
        })
    }
}
