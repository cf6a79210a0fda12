//! API error types and HTTP response conversion
//!
//! Mechanical pipeline failures become HTTP errors with a
//! `{ error, details, code }` body. Domain failures never get here: they
//! are 200 responses whose `data.success` is `false`.

use crate::{DispatchError, ExtractionError, ProviderError, ValidationError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error body returned to HTTP callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// Short summary of what went wrong
    pub error: String,
    /// The underlying error message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Stable identifier for programmatic handling
    pub code: String,
}

/// API result type
pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The body could not be read as a query request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The pipeline stopped before a handler ran
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Dispatch(err) => match err {
                DispatchError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                DispatchError::Provider(ProviderError::Timeout { .. }) => {
                    StatusCode::GATEWAY_TIMEOUT
                }
                DispatchError::Provider(_) | DispatchError::Extraction(_) => {
                    StatusCode::BAD_GATEWAY
                }
                DispatchError::UnsupportedAction(_) | DispatchError::Validation(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                DispatchError::InvalidStateTransition { .. } | DispatchError::Config(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Dispatch(err) => err.kind(),
        }
    }

    fn summary(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "Invalid request body",
            ApiError::Dispatch(err) => match err {
                DispatchError::InvalidRequest(_) => "Invalid request",
                DispatchError::Provider(ProviderError::Timeout { .. }) => {
                    "Upstream service timed out"
                }
                DispatchError::Provider(_) => "Upstream service failed",
                DispatchError::Extraction(ExtractionError::NoJsonFound) => {
                    "Model reply contained no JSON"
                }
                DispatchError::Extraction(ExtractionError::MalformedJson(_)) => {
                    "Model reply was not valid JSON"
                }
                DispatchError::UnsupportedAction(_) => "Unsupported action",
                DispatchError::Validation(ValidationError::MissingArgument { .. }) => {
                    "Missing required argument"
                }
                DispatchError::InvalidStateTransition { .. } | DispatchError::Config(_) => {
                    "Failed to process request"
                }
            },
        }
    }

    pub fn body(&self) -> ApiErrorResponse {
        ApiErrorResponse {
            error: self.summary().to_string(),
            details: Some(self.to_string()),
            code: self.code().to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = self.body();

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), code = %body.code, "API error");
        } else {
            tracing::warn!(status = status.as_u16(), code = %body.code, "API error");
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Collaborator;
    use std::time::Duration;

    fn status(err: DispatchError) -> StatusCode {
        ApiError::from(err).status_code()
    }

    #[test]
    fn test_status_policy() {
        assert_eq!(
            status(DispatchError::InvalidRequest("empty".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(ExtractionError::NoJsonFound.into()),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status(
                ProviderError::Unavailable {
                    collaborator: Collaborator::Model,
                    message: "down".into()
                }
                .into()
            ),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status(
                ProviderError::Timeout {
                    collaborator: Collaborator::Model,
                    after: Duration::from_secs(1)
                }
                .into()
            ),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status(DispatchError::UnsupportedAction("fly".into())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status(
                ValidationError::MissingArgument {
                    name: "summary".into(),
                    action: "create_event".into()
                }
                .into()
            ),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_body() {
        let err = ApiError::from(DispatchError::from(ValidationError::MissingArgument {
            name: "summary".into(),
            action: "create_event".into(),
        }));
        let body = err.body();
        assert_eq!(body.error, "Missing required argument");
        assert_eq!(body.code, "missing_argument");
        assert_eq!(
            body.details.as_deref(),
            Some("Missing required argument 'summary' for action 'create_event'")
        );
    }
}
