use std::sync::Arc;

use actix_web::web;

pub mod rate_limiter;
mod redirect;
mod scan_query;
mod scan_queue;
mod scan_recorder;

pub use rate_limiter::SlidingWindowRateLimiter;
pub use redirect::RedirectService;
pub use scan_query::{ScanQueryService, DEFAULT_LIMIT, DEFAULT_PAGE};
pub use scan_queue::{spawn_scan_workers, ScanQueue};
pub use scan_recorder::ScanRecorder;

use crate::config::RedirectConfig;
use crate::repositories::ScanEventRepositoryTrait;

/// Service Register
///
/// Services are built once per server and shared by every actix worker.
#[derive(Clone)]
pub struct Services {
    redirect: web::Data<RedirectService>,
    scan_query: web::Data<ScanQueryService>,
}

impl Services {
    pub fn new(
        queue: ScanQueue,
        store: Arc<dyn ScanEventRepositoryTrait>,
        redirect: &RedirectConfig,
    ) -> Self {
        Self {
            redirect: web::Data::new(RedirectService::new(queue, redirect)),
            scan_query: web::Data::new(ScanQueryService::new(store)),
        }
    }

    pub fn register(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(self.redirect.clone());
        cfg.app_data(self.scan_query.clone());
    }
}
