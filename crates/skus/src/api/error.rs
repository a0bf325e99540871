//! Converts the shared `skus_model::Error` taxonomy into an HTTP response,
//! the way `observe::metrics`'s handlers turn an internal result into a
//! status code plus body.

use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

pub struct ApiError(pub skus_model::Error);

impl From<skus_model::Error> for ApiError {
    fn from(err: skus_model::Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, self.0.to_string()).into_response();
        if let skus_model::Error::PendingSigning { retry_after_seconds } = self.0 {
            if let Ok(value) = HeaderValue::from_str(&retry_after_seconds.to_string()) {
                response.headers_mut().insert(axum::http::header::RETRY_AFTER, value);
            }
        }
        response
    }
}
