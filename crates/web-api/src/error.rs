use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use fight_exposure_core::ExposureError;
use serde_json::json;

/// Maps engine errors onto HTTP responses with a JSON `{"error": ...}` body.
#[derive(Debug)]
pub struct ApiError(pub ExposureError);

impl ApiError {
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else if self.0.is_not_found() {
            StatusCode::NOT_FOUND
        } else if matches!(self.0, ExposureError::FightNotLive { .. }) {
            StatusCode::CONFLICT
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<ExposureError> for ApiError {
    fn from(err: ExposureError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        } else {
            tracing::debug!(error = %self.0, status = status.as_u16(), "request rejected");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}
