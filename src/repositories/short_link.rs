use async_trait::async_trait;
use log::debug;
use sqlx::PgPool;

use crate::db::Database;
use crate::errors::RepositoryError;
use crate::models::ShortLink;

type Result<T> = std::result::Result<T, RepositoryError>;

const SHORT_LINK_COLUMNS: &str =
    "id, short_code, target_url, scan_count, created_at, updated_at";

/// Read/increment access to the code registry
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ShortLinkRepositoryTrait: Send + Sync {
    /// Finds a short link by its unique short code
    ///
    /// ### Returns
    /// * `Result<Option<ShortLink>>` - The link if found, or `None` if not found
    ///
    /// ### Errors
    /// * `RepositoryError::Database` - If a database error occurs
    #[allow(dead_code)]
    async fn find_by_code(&self, code: &str) -> Result<Option<ShortLink>>;

    /// Atomically adds one to `scan_count` and returns the updated link
    ///
    /// The increment happens in a single statement at the storage layer, so
    /// concurrent scans never lose updates.
    ///
    /// ### Returns
    /// * `Result<Option<ShortLink>>` - The updated link, or `None` if no link has this code
    ///
    /// ### Errors
    /// * `RepositoryError::Database` - If a database error occurs
    async fn increment_scan_count(&self, code: &str) -> Result<Option<ShortLink>>;
}

pub struct ShortLinkRepository {
    pool: PgPool,
}

impl ShortLinkRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.get_pool().clone(),
        }
    }
}

#[async_trait]
impl ShortLinkRepositoryTrait for ShortLinkRepository {
    async fn find_by_code(&self, code: &str) -> Result<Option<ShortLink>> {
        let query = format!(
            "SELECT {} FROM short_links WHERE short_code = $1",
            SHORT_LINK_COLUMNS
        );

        sqlx::query_as::<_, ShortLink>(&query)
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::Database)
    }

    async fn increment_scan_count(&self, code: &str) -> Result<Option<ShortLink>> {
        let query = format!(
            r#"
            UPDATE short_links
            SET scan_count = scan_count + 1, updated_at = NOW()
            WHERE short_code = $1
            RETURNING {}
            "#,
            SHORT_LINK_COLUMNS
        );

        let link = sqlx::query_as::<_, ShortLink>(&query)
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                log::error!("Failed to increment scan count for '{}': {}", code, e);
                RepositoryError::from(e)
            })?;

        if let Some(link) = &link {
            debug!("Scan count for '{}' is now {}", code, link.scan_count);
        }

        Ok(link)
    }
}
