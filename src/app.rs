use std::sync::Arc;
use std::time::Instant;

use actix_cors::Cors;
use actix_web::{
    http::{header, Method},
    middleware::Logger,
    web, App, HttpServer,
};
use env_logger::Env;
use log::{debug, info};
use tokio::task::JoinHandle;

use crate::{
    config::{Config, CorsConfig, Environment},
    db::Database,
    errors::AppError,
    handlers::X_USER_ID,
    middleware::{RateLimit, RequestId, RequestLogger},
    repositories::{ScanEventRepository, ShortLinkRepository},
    routes,
    services::{spawn_scan_workers, ScanRecorder, Services, SlidingWindowRateLimiter},
    types::AppState,
};

// Custom result type for the application
pub type AppResult<T> = Result<T, AppError>;

// Setup logging with custom format and configuration
fn setup_logging(config: &Config) -> Result<(), AppError> {
    // Configure log level based on environment and config
    let log_level = match config.app.environment {
        Environment::Development => config.app.log_level.clone(),
        Environment::Testing => "debug,actix_web=info,sqlx=warn".to_string(),
        Environment::Production => "info,actix_web=warn,sqlx=warn".to_string(),
    };

    let env = Env::default()
        .filter_or("RUST_LOG", log_level)
        .write_style_or("RUST_LOG_STYLE", "always");

    env_logger::try_init_from_env(env)
        .map_err(|e| AppError::Logger(format!("Failed to initialize logger: {}", e)))
}

fn build_cors(environment: &Environment, config: &CorsConfig) -> Cors {
    if *environment == Environment::Development {
        return Cors::permissive();
    }

    let cors = Cors::default()
        .allowed_methods(vec![Method::GET])
        .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
        .allowed_header(X_USER_ID)
        .max_age(3600);

    match &config.allowed_origin {
        Some(origin) => cors.allowed_origin(origin),
        None => cors,
    }
}

// Access log line; the request id is read back from the response
fn access_log_format(environment: &Environment) -> &'static str {
    match environment {
        Environment::Production => "%a \"%r\" %s %b %T",
        Environment::Development | Environment::Testing => {
            "%a \"%r\" %s %b %T \"%{Referer}i\" \"%{User-Agent}i\" %{X-Request-ID}o"
        }
    }
}

// Periodically drop clients whose window has gone quiet
fn spawn_rate_limit_sweeper(
    limiter: Arc<SlidingWindowRateLimiter>,
    config: &Config,
) -> Option<JoinHandle<()>> {
    if !limiter.is_enabled() {
        return None;
    }

    let period = config.rate_limit.sweep_interval();
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // First tick fires immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = limiter.sweep(Instant::now());
            if removed > 0 {
                debug!(
                    "Rate limiter sweep removed {} idle clients, {} still tracked",
                    removed,
                    limiter.tracked_keys()
                );
            }
        }
    }))
}

pub async fn server() -> AppResult<()> {
    // Load application configuration
    let config = Config::load()?;

    // Setup enhanced logging based on configuration
    setup_logging(&config)?;

    // Capture start time for uptime calculation
    let start_time = Instant::now();

    // Log startup information
    info!("Starting {} v{}", config.app.name, config.app.version);
    info!("Environment: {:?}", config.app.environment);
    info!(
        "Binding to {}:{} with {} workers",
        config.server.host, config.server.port, config.server.workers
    );

    if config.app.environment == Environment::Development {
        debug!("Debug logging enabled");
        debug!("Full configuration: {:?}", config);
    }

    let db = Database::connect(&config.db).await?;

    // Repositories and background recording
    let registry = Arc::new(ShortLinkRepository::new(&db));
    let store = Arc::new(ScanEventRepository::new(&db));
    let recorder = ScanRecorder::new(registry, store.clone());
    let (queue, workers) = spawn_scan_workers(recorder, &config.scan_queue);
    let services = Services::new(queue, store, &config.redirect);

    let limiter = Arc::new(SlidingWindowRateLimiter::from_config(&config.rate_limit));
    if limiter.is_enabled() {
        info!(
            "Rate limiting to {} requests per {}s per client",
            limiter.max_requests(),
            config.rate_limit.window_seconds
        );
    } else {
        info!("Rate limiting disabled");
    }
    let sweeper = spawn_rate_limit_sweeper(limiter.clone(), &config);

    // Determine if we should enable more verbose logging
    let enable_debug_logging = config.app.environment != Environment::Production;

    // Create a cloned config for the closure
    let app_config = config.clone();
    let app_db = db.clone();

    let log_format = access_log_format(&config.app.environment);

    // Start the HTTP server
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(AppState {
                start_time,
                db: Some(app_db.clone()),
                version: app_config.app.version.clone(),
            }))
            .configure(|cfg| services.register(cfg))
            // Innermost first: the limiter runs before any handler work
            .wrap(RateLimit::new(limiter.clone()))
            .wrap(RequestLogger::new(enable_debug_logging))
            .wrap(build_cors(&app_config.app.environment, &app_config.cors))
            .wrap(RequestId)
            .wrap(Logger::new(log_format))
            .configure(routes::configure_routes)
    })
    .workers(config.server.workers)
    .bind((config.server.host.to_string(), config.server.port))?
    .run()
    .await?;

    info!("HTTP server stopped, shutting down background work");
    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    workers.shutdown(config.scan_queue.shutdown_timeout()).await;
    db.shutdown().await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_log_is_richer_outside_production() {
        let production = access_log_format(&Environment::Production);
        assert!(!production.contains("User-Agent"));

        for environment in [Environment::Development, Environment::Testing] {
            let format = access_log_format(&environment);
            assert!(format.starts_with(production));
            assert!(format.contains("%{User-Agent}i"));
            assert!(format.contains("%{X-Request-ID}o"));
        }
    }
}
