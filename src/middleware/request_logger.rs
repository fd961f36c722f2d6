use std::rc::Rc;
use std::time::Instant;

use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::Error;
use futures_util::future::{ok, LocalBoxFuture, Ready};
use log::{debug, warn};

use crate::utils::client::client_key;

/// Debug-level request tracing; a pass-through when disabled.
pub struct RequestLogger {
    enable_debug_logging: bool,
}

impl RequestLogger {
    pub fn new(enable_debug_logging: bool) -> Self {
        Self {
            enable_debug_logging,
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequestLogger
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = RequestLoggerMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(RequestLoggerMiddleware {
            service: Rc::new(service),
            enable_debug_logging: self.enable_debug_logging,
        })
    }
}

pub struct RequestLoggerMiddleware<S> {
    service: Rc<S>,
    enable_debug_logging: bool,
}

impl<S, B> Service<ServiceRequest> for RequestLoggerMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if !self.enable_debug_logging {
            return Box::pin(self.service.call(req));
        }

        let started = Instant::now();
        let path = req.path().to_owned();
        let method = req.method().clone();
        let client = client_key(req.headers());

        debug!("Processing request: {} {} from {}", method, path, client);

        let fut = self.service.call(req);
        Box::pin(async move {
            match fut.await {
                Ok(res) => {
                    debug!(
                        "Response: {} {} - status: {} in {:?}",
                        method,
                        path,
                        res.status(),
                        started.elapsed()
                    );
                    Ok(res)
                }
                Err(e) => {
                    warn!("Request {} {} failed after {:?}: {}", method, path, started.elapsed(), e);
                    Err(e)
                }
            }
        })
    }
}
