use actix_web::{http::header::HeaderName, web, HttpRequest, HttpResponse, Responder};
use log::debug;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    errors::AppError,
    models::ScanQueryParams,
    services::{ScanQueryService, DEFAULT_LIMIT, DEFAULT_PAGE},
    types::Result,
};

/// Set by the upstream auth layer once the caller is authenticated
pub const X_USER_ID: HeaderName = HeaderName::from_static("x-user-id");

fn caller_identity(req: &HttpRequest) -> Result<String> {
    req.headers()
        .get(X_USER_ID)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or(AppError::Unauthorized)
}

/// Paginated scan log route handler
pub async fn list_scans_handler(
    req: HttpRequest,
    query: web::Query<ScanQueryParams>,
    service: web::Data<ScanQueryService>,
) -> Result<impl Responder> {
    let caller = caller_identity(&req)?;
    query.validate()?;

    let raw_id = query.qr_code_id.as_deref().unwrap_or_default();
    let link_id = Uuid::parse_str(raw_id)
        .map_err(|_| AppError::Validation(format!("qrCodeId '{}' is not a valid id", raw_id)))?;

    debug!("User '{}' listing scans for link {}", caller, link_id);

    let page = service
        .list_scans(
            &link_id,
            query.page.unwrap_or(DEFAULT_PAGE),
            query.limit.unwrap_or(DEFAULT_LIMIT),
        )
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "data": page,
    })))
}
