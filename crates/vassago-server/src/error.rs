//! Mapping service errors onto HTTP responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use vassago_core::Error;

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
    #[serde(rename = "type")]
    error_type: &'static str,
}

/// An [`Error`] on its way out as JSON.
///
/// Client faults become 400, everything else 500.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl ApiError {
    /// Status code for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, kind = self.0.kind(), "Request failed");
        } else {
            tracing::debug!(error = %self.0, kind = self.0.kind(), "Request rejected");
        }

        let body = ErrorBody {
            detail: self.0.to_string(),
            error_type: self.0.kind(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError(Error::NotLoaded).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError(Error::model_load("m", "boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError(Error::UnsupportedFormat {
                extension: ".exe".into()
            })
            .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError(Error::retrieval("index gone")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
