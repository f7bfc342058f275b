//! Error to HTTP response mapping

use crate::error::Error;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::warn;

impl Error {
    pub fn http_status(&self) -> StatusCode {
        match self {
            Error::RateLimitExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::from_u16(self.category().status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.http_status();
        if status.is_server_error() {
            warn!(error = %self, category = ?self.category(), "request failed");
        }
        let body = Json(json!({
            "error": self.code(),
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}
