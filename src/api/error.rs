use axum::{
    http::StatusCode as HttpStatus,
    response::{IntoResponse, Response},
    Json,
};
use bridge_error::{ErrorExt, StatusCode};

use super::types::ErrorResponse;
use crate::error::BridgeError;

/// Error returned by handlers: an HTTP status plus the JSON envelope.
#[derive(Debug)]
pub struct ApiError {
    pub status: HttpStatus,
    pub body: ErrorResponse,
}

impl ApiError {
    /// Status and `error` code derived from `code`.
    pub fn new(
        code: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status: HttpStatus::from_u16(code.http_status())
                .unwrap_or(HttpStatus::INTERNAL_SERVER_ERROR),
            body: ErrorResponse {
                error: code.error_code().to_string(),
                message: message.into(),
            },
        }
    }

    pub fn invalid_method() -> Self {
        Self::new(StatusCode::InvalidMethod, "Invalid method")
    }

    pub fn invalid_params() -> Self {
        Self::new(StatusCode::InvalidArgs, "Invalid parameters")
    }

    pub fn payload_too_large() -> Self {
        Self::new(StatusCode::SizeLimit, "Request body too large")
    }

    /// 503 whose `error` field carries the broker's error text.
    pub fn service_unavailable(reason: impl Into<String>) -> Self {
        Self {
            status: HttpStatus::SERVICE_UNAVAILABLE,
            body: ErrorResponse {
                error: reason.into(),
                message: "Error type no responders".to_string(),
            },
        }
    }
}

/// A request that reached the broker and failed is always a 503, whatever
/// the broker reported.
impl From<BridgeError> for ApiError {
    fn from(err: BridgeError) -> Self {
        Self::service_unavailable(err.client_message())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
