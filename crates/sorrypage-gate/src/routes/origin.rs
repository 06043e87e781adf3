use actix_web::{web, HttpRequest, HttpResponse};

use crate::error::GateError;
use crate::proxy::{forward, origin_url, read_body};
use crate::state::AppState;

/// Downstream service behind the gate: relays the request to `ORIGIN_URL`,
/// keeping the inbound path and query. The body is buffered and capped.
pub async fn forward_to_origin(
    req: HttpRequest,
    payload: web::Payload,
    state: web::Data<AppState>,
) -> Result<HttpResponse, GateError> {
    let target = origin_url(&state.config.origin_url, req.path(), req.uri().query());
    let body = read_body(payload).await?;
    let body = (!body.is_empty()).then(|| reqwest::Body::from(body));
    forward(&state.http_client, &req, &target, body).await
}
