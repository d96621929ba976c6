//! Maps the core error taxonomy onto HTTP status codes: request-shaped
//! failures (bad G-code, precondition violations) become 4xx, anything
//! upstream of the controller becomes 5xx, per spec.md §7's propagation
//! policy ("logs and reflects errors as 4xx/5xx").

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use grblevel_core::error::Error as CoreError;
use serde_json::json;

pub struct ApiError(pub CoreError);

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CoreError::Parse(_) | CoreError::Validate(_) | CoreError::StatePrecondition(_) => {
                StatusCode::BAD_REQUEST
            }
            CoreError::ProbeInvalid(_) | CoreError::NoProbeData(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CoreError::GrblAck(_) | CoreError::GrblReset(_) => StatusCode::BAD_GATEWAY,
            CoreError::TransportClosed(_) | CoreError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::error!(error = %self.0, %status, "request failed");
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}
