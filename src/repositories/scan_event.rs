use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::db::Database;
use crate::errors::RepositoryError;
use crate::models::{NewScanEvent, ScanEvent};

type Result<T> = std::result::Result<T, RepositoryError>;

/// Append-only scan log
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScanEventRepositoryTrait: Send + Sync {
    /// Appends one scan event and returns the stored row
    ///
    /// ### Errors
    /// * `RepositoryError::InvalidData` - If the owning link no longer exists
    /// * `RepositoryError::Database` - If a database error occurs
    async fn append(&self, event: &NewScanEvent) -> Result<ScanEvent>;

    /// Reads one window of a link's scans, newest first
    ///
    /// ### Arguments
    /// * `link_id` - The owning short link
    /// * `skip` - Rows to skip from the newest
    /// * `take` - Maximum rows to return
    ///
    /// ### Returns
    /// * `Result<(Vec<ScanEvent>, i64)>` - The page and the total count for the link
    async fn query(&self, link_id: &Uuid, skip: i64, take: i64) -> Result<(Vec<ScanEvent>, i64)>;
}

pub struct ScanEventRepository {
    pool: PgPool,
}

impl ScanEventRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.get_pool().clone(),
        }
    }

    // Count and page must come from the same snapshot
    async fn begin_read_only(&self) -> Result<Transaction<'_, Postgres>> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            log::error!("Failed to start database transaction: {}", e);
            RepositoryError::Database(e)
        })?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }
}

#[async_trait]
impl ScanEventRepositoryTrait for ScanEventRepository {
    async fn append(&self, event: &NewScanEvent) -> Result<ScanEvent> {
        sqlx::query_as::<_, ScanEvent>(
            r#"
            INSERT INTO scan_events (short_link_id, ip_address, user_agent, referer, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, short_link_id, ip_address, user_agent, referer, created_at
            "#,
        )
        .bind(event.short_link_id)
        .bind(&event.ip_address)
        .bind(&event.user_agent)
        .bind(&event.referer)
        .bind(event.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            log::error!("Failed to insert scan event: {}", e);
            RepositoryError::from(e)
        })
    }

    async fn query(&self, link_id: &Uuid, skip: i64, take: i64) -> Result<(Vec<ScanEvent>, i64)> {
        let mut tx = self.begin_read_only().await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM scan_events WHERE short_link_id = $1")
            .bind(link_id)
            .fetch_one(&mut *tx)
            .await?;

        let items = sqlx::query_as::<_, ScanEvent>(
            r#"
            SELECT id, short_link_id, ip_address, user_agent, referer, created_at
            FROM scan_events
            WHERE short_link_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(link_id)
        .bind(take)
        .bind(skip)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await.map_err(RepositoryError::Database)?;

        Ok((items, total))
    }
}
