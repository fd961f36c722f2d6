use actix_web::{web, HttpResponse, Responder};

use crate::{
    db::DBHealthStatus,
    errors::AppError,
    handlers::{list_scans_handler, redirect_handler},
    types::{AppState, HealthStatus, ResponsePayload},
};

// Handler function for the root route "/"
async fn index() -> impl Responder {
    let welcome_message = ResponsePayload {
        status: 200,
        message: String::from("Welcome and have a great time!"),
    };

    HttpResponse::Ok().json(welcome_message)
}

// Handler function for the health check endpoint
async fn health_check(data: web::Data<AppState>) -> impl Responder {
    let uptime = data.start_time.elapsed().as_secs();

    let db_health = match &data.db {
        Some(db) => Some(db.health_check().await),
        None => None,
    };
    let healthy = db_health
        .as_ref()
        .map_or(true, |h| h.status == DBHealthStatus::Healthy);

    let status = HealthStatus {
        status: String::from(if healthy { "OK" } else { "DEGRADED" }),
        version: data.version.clone(),
        db_health,
        uptime_seconds: uptime,
    };

    if healthy {
        HttpResponse::Ok().json(status)
    } else {
        HttpResponse::ServiceUnavailable().json(status)
    }
}

// Configure all routes function
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    // Malformed query strings get the same JSON error shape as everything else
    cfg.app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| AppError::Validation(err.to_string()).into()),
    );

    cfg.route("/", web::get().to(index));
    cfg.route("/health", web::get().to(health_check));
    cfg.route("/redirect", web::get().to(redirect_handler));
    cfg.route("/scans", web::get().to(list_scans_handler));
}
