//! In-process registry and scan store used by the service tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{ScanEventRepositoryTrait, ShortLinkRepositoryTrait};
use crate::errors::RepositoryError;
use crate::models::{NewScanEvent, ScanEvent, ShortLink};

type Result<T> = std::result::Result<T, RepositoryError>;

#[derive(Default)]
pub struct MemoryShortLinkRepository {
    links: Mutex<HashMap<String, ShortLink>>,
}

impl MemoryShortLinkRepository {
    pub fn with_links(links: impl IntoIterator<Item = ShortLink>) -> Self {
        let links = links
            .into_iter()
            .map(|link| (link.short_code.clone(), link))
            .collect();
        Self {
            links: Mutex::new(links),
        }
    }

    pub fn get(&self, code: &str) -> Option<ShortLink> {
        self.links.lock().unwrap().get(code).cloned()
    }

    pub fn len(&self) -> usize {
        self.links.lock().unwrap().len()
    }
}

#[async_trait]
impl ShortLinkRepositoryTrait for MemoryShortLinkRepository {
    async fn find_by_code(&self, code: &str) -> Result<Option<ShortLink>> {
        Ok(self.get(code))
    }

    async fn increment_scan_count(&self, code: &str) -> Result<Option<ShortLink>> {
        // Yield first so concurrent callers actually interleave
        tokio::task::yield_now().await;

        let mut links = self.links.lock().unwrap();
        Ok(links.get_mut(code).map(|link| {
            link.scan_count += 1;
            link.updated_at = Utc::now();
            link.clone()
        }))
    }
}

#[derive(Default)]
pub struct MemoryScanEventRepository {
    events: Mutex<Vec<ScanEvent>>,
}

impl MemoryScanEventRepository {
    pub fn events(&self) -> Vec<ScanEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl ScanEventRepositoryTrait for MemoryScanEventRepository {
    async fn append(&self, event: &NewScanEvent) -> Result<ScanEvent> {
        tokio::task::yield_now().await;

        let mut events = self.events.lock().unwrap();
        let stored = ScanEvent {
            id: events.len() as i64 + 1,
            short_link_id: event.short_link_id,
            ip_address: event.ip_address.clone(),
            user_agent: event.user_agent.clone(),
            referer: event.referer.clone(),
            created_at: event.created_at,
        };
        events.push(stored.clone());
        Ok(stored)
    }

    async fn query(&self, link_id: &Uuid, skip: i64, take: i64) -> Result<(Vec<ScanEvent>, i64)> {
        let mut matching: Vec<ScanEvent> = self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|event| &event.short_link_id == link_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = matching.len() as i64;
        let items = matching
            .into_iter()
            .skip(skip.max(0) as usize)
            .take(take.max(0) as usize)
            .collect();
        Ok((items, total))
    }
}
