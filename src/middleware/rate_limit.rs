use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use actix_web::body::EitherBody;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::Error;
use futures_util::future::{ok, LocalBoxFuture, Ready};
use log::warn;

use crate::errors::AppError;
use crate::services::rate_limiter::{Admission, SlidingWindowRateLimiter};
use crate::utils::client::client_key;

/// Rejects requests once the caller's sliding-window budget is spent.
pub struct RateLimit {
    limiter: Arc<SlidingWindowRateLimiter>,
}

impl RateLimit {
    pub fn new(limiter: Arc<SlidingWindowRateLimiter>) -> Self {
        Self { limiter }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimit
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RateLimitMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(RateLimitMiddleware {
            service: Rc::new(service),
            limiter: Arc::clone(&self.limiter),
        })
    }
}

pub struct RateLimitMiddleware<S> {
    service: Rc<S>,
    limiter: Arc<SlidingWindowRateLimiter>,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let key = client_key(req.headers());

        match self.limiter.check(&key, Instant::now()) {
            Admission::Allowed { .. } => {
                let fut = self.service.call(req);
                Box::pin(async move { fut.await.map(ServiceResponse::map_into_left_body) })
            }
            Admission::Limited { retry_after } => {
                warn!(
                    "Rate limit exceeded for client '{}' on {} {}",
                    key,
                    req.method(),
                    req.path()
                );
                let err = AppError::RateLimitExceeded {
                    retry_after_secs: retry_after_secs(retry_after),
                };
                let res = req.error_response(err).map_into_right_body();
                Box::pin(async move { Ok(res) })
            }
        }
    }
}

// Whole seconds, rounded up, never zero
fn retry_after_secs(retry_after: Duration) -> u64 {
    let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
    secs.max(1)
}

#[cfg(test)]
mod tests {
    use actix_web::http::{header::RETRY_AFTER, StatusCode};
    use actix_web::test::{self, TestRequest};
    use actix_web::{web, App, HttpResponse};

    use super::*;
    use crate::utils::client::X_FORWARDED_FOR;

    async fn ok_handler() -> HttpResponse {
        HttpResponse::Ok().finish()
    }

    #[test]
    fn test_retry_after_rounds_up() {
        assert_eq!(retry_after_secs(Duration::ZERO), 1);
        assert_eq!(retry_after_secs(Duration::from_millis(1)), 1);
        assert_eq!(retry_after_secs(Duration::from_secs(3)), 3);
        assert_eq!(retry_after_secs(Duration::from_millis(3001)), 4);
    }

    #[actix_web::test]
    async fn test_rejects_after_quota_with_429() {
        let limiter = Arc::new(SlidingWindowRateLimiter::new(2, Duration::from_secs(60)));
        let app = test::init_service(
            App::new()
                .wrap(RateLimit::new(limiter))
                .route("/", web::get().to(ok_handler)),
        )
        .await;

        for _ in 0..2 {
            let req = TestRequest::get()
                .uri("/")
                .insert_header((X_FORWARDED_FOR, "198.51.100.4"))
                .to_request();
            let res = test::call_service(&app, req).await;
            assert_eq!(res.status(), StatusCode::OK);
        }

        let req = TestRequest::get()
            .uri("/")
            .insert_header((X_FORWARDED_FOR, "198.51.100.4"))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(res.headers().contains_key(RETRY_AFTER));

        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["status_code"], 429);

        // Another client still has budget
        let req = TestRequest::get()
            .uri("/")
            .insert_header((X_FORWARDED_FOR, "198.51.100.5"))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_headerless_clients_share_one_bucket() {
        let limiter = Arc::new(SlidingWindowRateLimiter::new(1, Duration::from_secs(60)));
        let app = test::init_service(
            App::new()
                .wrap(RateLimit::new(limiter))
                .route("/", web::get().to(ok_handler)),
        )
        .await;

        let res = test::call_service(&app, TestRequest::get().uri("/").to_request()).await;
        assert_eq!(res.status(), StatusCode::OK);

        let res = test::call_service(&app, TestRequest::get().uri("/").to_request()).await;
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
