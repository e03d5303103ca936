//! JSON error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::engine::AllocationError;

/// Body of every non-2xx response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// Human-readable reason.
    pub message: String,
    /// Stable machine-readable code.
    pub code: String,
    pub status: u16,
    pub request_id: String,
    pub retryable: bool,
}

impl ErrorBody {
    fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: code.into(),
            status: status.as_u16(),
            request_id: "unknown".to_string(),
            retryable: false,
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: Box<ErrorBody>,
}

impl ApiError {
    fn with_status(
        status: StatusCode,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status,
            body: Box::new(ErrorBody::new(status, code, message)),
        }
    }

    pub fn bad_request(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::BAD_REQUEST, code, message)
    }

    pub fn not_found(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::NOT_FOUND, code, message)
    }

    pub fn conflict(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::CONFLICT, code, message)
    }

    pub fn internal(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_status(StatusCode::INTERNAL_SERVER_ERROR, code, message)
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.body.request_id = request_id.into();
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.body.retryable = retryable;
        self
    }

    /// Map an engine error onto the HTTP contract.
    ///
    /// Unknown roster ids are a 400 on the allocation endpoints; unknown
    /// allocation ids are a 404. Invariant violations are 409. Storage
    /// failures are logged here and surfaced as an opaque 500.
    pub fn from_allocation(err: AllocationError, request_id: &str) -> Self {
        let code = err.code();
        let message = err.to_string();
        let api_error = match &err {
            AllocationError::FacultyNotFound(_) | AllocationError::StudentNotFound(_) => {
                Self::bad_request(code, message)
            }
            AllocationError::AllocationNotFound(_) => Self::not_found(code, message),
            AllocationError::StudentAlreadyMentored { .. }
            | AllocationError::DuplicateAllocation { .. }
            | AllocationError::FacultyAtCapacity { .. }
            | AllocationError::NoCapacityAvailable
            | AllocationError::AllocationNotActive(_) => Self::conflict(code, message),
            AllocationError::ConcurrencyConflict => {
                Self::conflict(code, message).with_retryable(true)
            }
            AllocationError::StorageFailure(source) => {
                tracing::error!(error = %source, request_id = %request_id, "Storage failure");
                Self::internal("internal_error", "Storage is unavailable").with_retryable(true)
            }
        };
        api_error.with_request_id(request_id)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
