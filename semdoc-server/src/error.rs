//! Mapping from pipeline errors to HTTP responses.

use axum::{
    Json,
    extract::{
        FromRequest, FromRequestParts,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use semdoc_rag::RagError;
use serde::Serialize;
use tracing::error;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

/// A [`RagError`] on its way out of a handler.
#[derive(Debug)]
pub struct ApiError(pub RagError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            RagError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            RagError::NotFound(_) => StatusCode::NOT_FOUND,
            RagError::ProviderRejected { .. } => StatusCode::BAD_GATEWAY,
            RagError::ProviderUnavailable { .. } | RagError::IndexUnavailable { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            RagError::Config(_) | RagError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(RagError::InvalidInput(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self(RagError::InvalidInput(rejection.body_text()))
    }
}

/// [`axum::Json`] with malformed or mistyped bodies reported as `invalid_input`.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

/// [`axum::extract::Query`] with bad query strings reported as `invalid_input`.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct QueryString<T>(pub T);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, %status, "request failed");
        }
        let body = ErrorBody { error: self.0.kind(), message: self.0.to_string() };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        let cases = [
            (RagError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (RagError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (
                RagError::ProviderRejected { provider: "p".into(), message: "m".into() },
                StatusCode::BAD_GATEWAY,
            ),
            (
                RagError::ProviderUnavailable { provider: "p".into(), message: "m".into() },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                RagError::IndexUnavailable { backend: "b".into(), message: "m".into() },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (RagError::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).status(), status);
        }
    }
}
