//! Mapping of core errors onto HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use job_sources::AggregationError;
use serde_json::json;
use thiserror::Error;

/// Error returned by API handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Aggregation(#[from] AggregationError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Aggregation(AggregationError::NotFound { .. }) => StatusCode::NOT_FOUND,
            ApiError::Aggregation(AggregationError::InvalidInput { .. }) => StatusCode::BAD_REQUEST,
            ApiError::Aggregation(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        let body = Json(json!({
            "success": false,
            "error": self.to_string(),
        }));
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::from(AggregationError::not_found("job", 1)).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(AggregationError::invalid("bad")).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(AggregationError::storage("disk full")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
