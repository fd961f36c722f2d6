use std::sync::Arc;

use log::{debug, error, warn};

use crate::models::{NewScanEvent, ScanJob};
use crate::repositories::{ScanEventRepositoryTrait, ShortLinkRepositoryTrait};

/// What happened to one scan. Only used for logs and tests; by the time a
/// scan is recorded the HTTP exchange is already closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded,
    UnknownCode,
    Failed,
}

/// Credits a scan to its short link: bump the counter, then append the event.
#[derive(Clone)]
pub struct ScanRecorder {
    registry: Arc<dyn ShortLinkRepositoryTrait>,
    store: Arc<dyn ScanEventRepositoryTrait>,
}

impl ScanRecorder {
    pub fn new(
        registry: Arc<dyn ShortLinkRepositoryTrait>,
        store: Arc<dyn ScanEventRepositoryTrait>,
    ) -> Self {
        Self { registry, store }
    }

    /// Never fails: every error is logged and swallowed here.
    pub async fn record(&self, job: &ScanJob) -> RecordOutcome {
        let link = match self.registry.increment_scan_count(&job.short_code).await {
            Ok(Some(link)) => link,
            Ok(None) => {
                warn!(
                    "Scan for unknown short code '{}' from {} ignored",
                    job.short_code, job.client.ip
                );
                return RecordOutcome::UnknownCode;
            }
            Err(e) => {
                error!(
                    "Failed to increment scan count for '{}': {}",
                    job.short_code, e
                );
                return RecordOutcome::Failed;
            }
        };

        let event = NewScanEvent::from_job(link.id, job);
        match self.store.append(&event).await {
            Ok(stored) => {
                debug!(
                    "Recorded scan #{} for '{}' (scan_count={})",
                    stored.id, job.short_code, link.scan_count
                );
                RecordOutcome::Recorded
            }
            Err(e) => {
                error!(
                    "Scan count for '{}' incremented but event append failed: {}",
                    job.short_code, e
                );
                RecordOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use mockall::predicate::always;
    use uuid::Uuid;

    use super::*;
    use crate::errors::RepositoryError;
    use crate::models::{ClientInfo, ScanEvent, ShortLink};
    use crate::repositories::memory::{MemoryScanEventRepository, MemoryShortLinkRepository};
    use crate::repositories::{MockScanEventRepositoryTrait, MockShortLinkRepositoryTrait};

    fn job(code: &str) -> ScanJob {
        ScanJob {
            short_code: code.to_string(),
            client: ClientInfo::new("203.0.113.9", Some("Mozilla/5.0"), None),
            at: Utc::now(),
        }
    }

    fn link_with_count(code: &str, scan_count: i64) -> ShortLink {
        ShortLink {
            scan_count,
            ..ShortLink::new(code, "https://example.com/page")
        }
    }

    #[tokio::test]
    async fn test_unknown_code_skips_append() {
        let mut registry = MockShortLinkRepositoryTrait::new();
        registry
            .expect_increment_scan_count()
            .withf(|code| code == "abc123")
            .times(1)
            .returning(|_| Ok(None));

        let mut store = MockScanEventRepositoryTrait::new();
        store.expect_append().never();

        let recorder = ScanRecorder::new(Arc::new(registry), Arc::new(store));
        assert_eq!(recorder.record(&job("abc123")).await, RecordOutcome::UnknownCode);
    }

    #[tokio::test]
    async fn test_increment_failure_is_swallowed() {
        let mut registry = MockShortLinkRepositoryTrait::new();
        registry
            .expect_increment_scan_count()
            .returning(|_| Err(RepositoryError::Database(sqlx::Error::PoolTimedOut)));

        let mut store = MockScanEventRepositoryTrait::new();
        store.expect_append().never();

        let recorder = ScanRecorder::new(Arc::new(registry), Arc::new(store));
        assert_eq!(recorder.record(&job("abc123")).await, RecordOutcome::Failed);
    }

    #[tokio::test]
    async fn test_append_failure_is_swallowed() {
        let link = link_with_count("abc123", 1);
        let mut registry = MockShortLinkRepositoryTrait::new();
        registry
            .expect_increment_scan_count()
            .returning(move |_| Ok(Some(link.clone())));

        let mut store = MockScanEventRepositoryTrait::new();
        store
            .expect_append()
            .with(always())
            .times(1)
            .returning(|_| Err(RepositoryError::InvalidData("link deleted".into())));

        let recorder = ScanRecorder::new(Arc::new(registry), Arc::new(store));
        assert_eq!(recorder.record(&job("abc123")).await, RecordOutcome::Failed);
    }

    #[tokio::test]
    async fn test_event_references_incremented_link() {
        let link = link_with_count("abc123", 6);
        let link_id = link.id;
        let mut registry = MockShortLinkRepositoryTrait::new();
        registry
            .expect_increment_scan_count()
            .returning(move |_| Ok(Some(link.clone())));

        let scan = job("abc123");
        let expected_at = scan.at;
        let mut store = MockScanEventRepositoryTrait::new();
        store
            .expect_append()
            .withf(move |event| {
                event.short_link_id == link_id
                    && event.ip_address == "203.0.113.9"
                    && event.user_agent == "Mozilla/5.0"
                    && event.referer == "No Referrer"
                    && event.created_at == expected_at
            })
            .times(1)
            .returning(|event| {
                Ok(ScanEvent {
                    id: 1,
                    short_link_id: event.short_link_id,
                    ip_address: event.ip_address.clone(),
                    user_agent: event.user_agent.clone(),
                    referer: event.referer.clone(),
                    created_at: event.created_at,
                })
            });

        let recorder = ScanRecorder::new(Arc::new(registry), Arc::new(store));
        assert_eq!(recorder.record(&scan).await, RecordOutcome::Recorded);
    }

    #[tokio::test]
    async fn test_unknown_code_leaves_state_unchanged() {
        let registry = Arc::new(MemoryShortLinkRepository::with_links([link_with_count(
            "known", 3,
        )]));
        let store = Arc::new(MemoryScanEventRepository::default());
        let recorder = ScanRecorder::new(registry.clone(), store.clone());

        assert_eq!(recorder.record(&job("missing")).await, RecordOutcome::UnknownCode);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("known").unwrap().scan_count, 3);
        assert!(store.events().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_two_concurrent_scans_from_five() {
        let registry = Arc::new(MemoryShortLinkRepository::with_links([link_with_count(
            "abc123", 5,
        )]));
        let store = Arc::new(MemoryScanEventRepository::default());
        let recorder = ScanRecorder::new(registry.clone(), store.clone());

        let (a, b) = tokio::join!(
            tokio::spawn({
                let recorder = recorder.clone();
                async move { recorder.record(&job("abc123")).await }
            }),
            tokio::spawn({
                let recorder = recorder.clone();
                async move { recorder.record(&job("abc123")).await }
            }),
        );
        assert_eq!(a.unwrap(), RecordOutcome::Recorded);
        assert_eq!(b.unwrap(), RecordOutcome::Recorded);

        let link = registry.get("abc123").unwrap();
        assert_eq!(link.scan_count, 7);
        let events = store.events();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| e.short_link_id == link.id));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_n_concurrent_scans_are_all_counted() {
        const N: usize = 200;
        let link = link_with_count("hot", 0);
        let link_id = link.id;
        let registry = Arc::new(MemoryShortLinkRepository::with_links([link]));
        let store = Arc::new(MemoryScanEventRepository::default());
        let recorder = ScanRecorder::new(registry.clone(), store.clone());

        let handles: Vec<_> = (0..N)
            .map(|_| {
                let recorder = recorder.clone();
                tokio::spawn(async move { recorder.record(&job("hot")).await })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap(), RecordOutcome::Recorded);
        }

        assert_eq!(registry.get("hot").unwrap().scan_count, N as i64);
        let (_, total) = store.query(&link_id, 0, 1).await.unwrap();
        assert_eq!(total, N as i64);
        assert!(store.query(&Uuid::new_v4(), 0, 10).await.unwrap().0.is_empty());
    }
}
