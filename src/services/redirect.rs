use actix_web::http::header::HeaderValue;
use chrono::Utc;
use log::{debug, info, warn};

use super::scan_queue::ScanQueue;
use crate::config::RedirectConfig;
use crate::errors::AppError;
use crate::models::{ClientInfo, ScanJob};
use crate::validations::validate_target_url;

pub const MISSING_REDIRECT_PARAMS: &str = "Short ID or target URL missing";

/// Outcome of a successful resolve
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTarget {
    /// Ready to be sent as the `Location` header
    pub location: HeaderValue,
    /// `false` when the scan queue was full and the scan was dropped
    pub scan_scheduled: bool,
}

/// Turns `(short code, target)` into a redirect and hands the scan to the
/// background workers.
///
/// The target comes from the request itself; the short code is only used to
/// credit the scan and is never looked up here.
pub struct RedirectService {
    queue: ScanQueue,
    enforce_http_scheme: bool,
}

impl RedirectService {
    pub fn new(queue: ScanQueue, config: &RedirectConfig) -> Self {
        Self {
            queue,
            enforce_http_scheme: config.enforce_http_scheme,
        }
    }

    pub fn resolve(
        &self,
        short_code: Option<&str>,
        target_url: Option<&str>,
        client: ClientInfo,
    ) -> Result<RedirectTarget, AppError> {
        let (short_code, target_url) = match (present(short_code), present(target_url)) {
            (Some(code), Some(target)) => (code, target),
            _ => return Err(AppError::MissingParameter(MISSING_REDIRECT_PARAMS.to_string())),
        };

        if self.enforce_http_scheme {
            validate_target_url(target_url).map_err(|e| {
                AppError::Validation(
                    e.message
                        .map(|m| m.into_owned())
                        .unwrap_or_else(|| e.code.into_owned()),
                )
            })?;
        }

        // Control characters cannot go out in a header; reject before the scan is queued
        let location = HeaderValue::from_str(target_url).map_err(|_| {
            warn!("Refusing redirect for '{}': target is not a valid Location", short_code);
            AppError::Validation("targetUrl contains characters not allowed in a redirect".to_string())
        })?;

        let scan_scheduled = self.queue.enqueue(ScanJob {
            short_code: short_code.to_string(),
            client,
            at: Utc::now(),
        });
        if !scan_scheduled {
            debug!("Redirecting '{}' without recording the scan", short_code);
        }

        info!("Redirecting '{}' to '{}'", short_code, target_url);

        Ok(RedirectTarget {
            location,
            scan_scheduled,
        })
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
