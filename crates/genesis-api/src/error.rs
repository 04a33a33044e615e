use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use genesis_domain::ErrorKind;
use serde_json::json;

/// Renders `{code, type, message}` from any crate-local error's `ErrorKind`,
/// generalizing this codebase's `{"error": message}` envelope to the fuller
/// shape §7 of the specification describes.
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        ApiError { kind, message: message.into() }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ApiError::new(ErrorKind::NotFound, msg)
    }

    pub fn auth_required(msg: impl Into<String>) -> Self {
        ApiError::new(ErrorKind::AuthRequired, msg)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.kind.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(json!({
            "code": self.kind.http_status(),
            "type": self.kind.type_name(),
            "message": self.message,
        }));
        (status, body).into_response()
    }
}

impl From<genesis_store::StoreError> for ApiError {
    fn from(e: genesis_store::StoreError) -> Self {
        ApiError::new(e.kind(), e.to_string())
    }
}

impl From<genesis_driver::DriverError> for ApiError {
    fn from(e: genesis_driver::DriverError) -> Self {
        ApiError::new(e.kind(), e.to_string())
    }
}

impl From<genesis_iam::IamError> for ApiError {
    fn from(e: genesis_iam::IamError) -> Self {
        ApiError::new(e.kind(), e.to_string())
    }
}
