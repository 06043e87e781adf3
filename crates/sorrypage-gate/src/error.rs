use actix_web::{HttpResponse, ResponseError};
use std::fmt;

/// Failures while serving a request through the gate.
#[derive(Debug)]
pub enum GateError {
    /// The redirect target (or origin) could not be reached or failed mid-response
    Upstream(String),
    /// Inbound body exceeds the forwarding limit
    PayloadTooLarge(usize),
    /// Inbound body could not be read
    RequestBody(String),
    /// Request cannot be expressed upstream (method, header, URL)
    InvalidRequest(String),
}

impl fmt::Display for GateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateError::Upstream(msg) => write!(f, "upstream error: {}", msg),
            GateError::PayloadTooLarge(max) => {
                write!(f, "request body too large (max {} bytes)", max)
            }
            GateError::RequestBody(msg) => write!(f, "failed to read request body: {}", msg),
            GateError::InvalidRequest(msg) => write!(f, "invalid request: {}", msg),
        }
    }
}

impl std::error::Error for GateError {}

impl ResponseError for GateError {
    fn error_response(&self) -> HttpResponse {
        match self {
            GateError::Upstream(msg) => {
                tracing::error!("Upstream error: {}", msg);
                HttpResponse::BadGateway().json(serde_json::json!({
                    "error": "bad_gateway",
                    "message": "Failed to reach upstream service"
                }))
            }
            GateError::PayloadTooLarge(max) => {
                HttpResponse::PayloadTooLarge().json(serde_json::json!({
                    "error": "payload_too_large",
                    "message": format!("Request body exceeds {} bytes", max)
                }))
            }
            GateError::RequestBody(msg) => HttpResponse::BadRequest().json(serde_json::json!({
                "error": "invalid_body",
                "message": msg
            })),
            GateError::InvalidRequest(msg) => HttpResponse::BadRequest().json(serde_json::json!({
                "error": "invalid_request",
                "message": msg
            })),
        }
    }
}
