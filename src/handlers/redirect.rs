use actix_web::{http::header::LOCATION, web, HttpRequest, HttpResponse, Responder};
use serde::Deserialize;

use crate::{services::RedirectService, types::Result, utils::client::client_info};

/// Query string of `GET /redirect`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectQuery {
    pub short_id: Option<String>,
    pub target_url: Option<String>,
}

/// Redirect route handler
///
/// Answers with a 302 right away; the scan is recorded in the background.
pub async fn redirect_handler(
    req: HttpRequest,
    query: web::Query<RedirectQuery>,
    service: web::Data<RedirectService>,
) -> Result<impl Responder> {
    let redirect = service.resolve(
        query.short_id.as_deref(),
        query.target_url.as_deref(),
        client_info(&req),
    )?;

    Ok(HttpResponse::Found()
        .insert_header((LOCATION, redirect.location))
        .finish())
}
