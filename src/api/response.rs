//! Response types for the gateway.
//!
//! This module defines the error response structures and the mapping from
//! [`AdminError`] to HTTP statuses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::error::AdminError;
use crate::models::{Batch, Notice};
use crate::wizard::ValidationErrors;

/// API error response structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Optional details about the error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Per-field messages for validation failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<ValidationErrors>,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            fields: None,
        }
    }

    /// Creates a new API error with details.
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            details: Some(details.into()),
            ..Self::new(code, message)
        }
    }

    /// Creates a malformed JSON error response.
    pub fn malformed_json(message: impl Into<String>) -> Self {
        Self::new("MALFORMED_JSON", message)
    }
}

/// Body of a successful `POST /wizards/:kind/validate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateResponse {
    /// The step that was checked.
    pub step: usize,
    /// Always true; invalid steps are reported as errors.
    pub valid: bool,
}

/// Body of `GET /lookup/batches`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOptions {
    /// The matching batches.
    pub batches: Vec<Batch>,
    /// Warnings raised while loading.
    pub notices: Vec<Notice>,
}

/// API error with HTTP status code.
#[derive(Debug)]
pub struct ApiErrorResponse {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The error body.
    pub error: ApiError,
}

impl ApiErrorResponse {
    /// A request without a usable role header.
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            error: ApiError::new("UNAUTHENTICATED", message),
        }
    }

    /// A request body that could not be read.
    pub fn bad_request(error: ApiError) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error,
        }
    }
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.error)).into_response()
    }
}

impl From<AdminError> for ApiErrorResponse {
    fn from(error: AdminError) -> Self {
        let message = error.notice().message;
        let (status, error) = match error {
            AdminError::ConfigNotFound { .. } | AdminError::ConfigParseError { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::with_details("CONFIG_ERROR", "Configuration error", message),
            ),
            AdminError::WizardNotFound { kind } => (
                StatusCode::NOT_FOUND,
                ApiError::with_details(
                    "WIZARD_NOT_FOUND",
                    message,
                    format!("No wizard is configured for '{kind}'"),
                ),
            ),
            AdminError::ValidationFailed { step, errors } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ApiError {
                    fields: Some(errors),
                    ..ApiError::with_details("VALIDATION_ERROR", message, format!("step {step}"))
                },
            ),
            AdminError::StepNotReachable { .. } => {
                (StatusCode::CONFLICT, ApiError::new("STEP_NOT_REACHABLE", message))
            }
            AdminError::AlreadySubmitted => {
                (StatusCode::CONFLICT, ApiError::new("ALREADY_SUBMITTED", message))
            }
            AdminError::Forbidden { .. } => {
                (StatusCode::FORBIDDEN, ApiError::new("FORBIDDEN", message))
            }
            AdminError::Backend { status: 404, .. } => {
                (StatusCode::NOT_FOUND, ApiError::new("NOT_FOUND", message))
            }
            AdminError::Backend { status, .. } => (
                StatusCode::BAD_GATEWAY,
                ApiError::with_details(
                    "BACKEND_ERROR",
                    message,
                    format!("backend status {status}"),
                ),
            ),
            AdminError::Transport { message: cause } => (
                StatusCode::SERVICE_UNAVAILABLE,
                ApiError::with_details("BACKEND_UNAVAILABLE", message, cause),
            ),
            AdminError::Decode { .. } => (
                StatusCode::BAD_GATEWAY,
                ApiError::new("BAD_BACKEND_RESPONSE", message),
            ),
            AdminError::UnknownQuestion { .. } => {
                (StatusCode::BAD_REQUEST, ApiError::new("UNKNOWN_QUESTION", message))
            }
            AdminError::NoGradeRecorded { .. } => {
                (StatusCode::BAD_REQUEST, ApiError::new("NO_GRADE_RECORDED", message))
            }
            AdminError::GradeBatchFailed { failed, .. } => (
                StatusCode::BAD_GATEWAY,
                ApiError::with_details(
                    "GRADE_BATCH_FAILED",
                    message,
                    format!("failed questions: {}", failed.join(", ")),
                ),
            ),
        };
        Self { status, error }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Role;

    #[test]
    fn test_api_error_serialization() {
        let error = ApiError::new("TEST_ERROR", "Test message");
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("\"code\":\"TEST_ERROR\""));
        assert!(json.contains("\"message\":\"Test message\""));
        assert!(!json.contains("details"));
        assert!(!json.contains("fields"));
    }

    #[test]
    fn test_validation_failure_carries_fields() {
        let mut errors = ValidationErrors::new();
        errors.insert("email", "Enter a valid email address");
        let response: ApiErrorResponse = AdminError::ValidationFailed { step: 1, errors }.into();

        assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(response.error.code, "VALIDATION_ERROR");
        let fields = response.error.fields.unwrap();
        assert_eq!(fields.get("email"), Some("Enter a valid email address"));
    }

    #[test]
    fn test_forbidden_maps_to_403() {
        let response: ApiErrorResponse = AdminError::Forbidden {
            role: Role::Moderator,
            action: "grade quiz attempts".to_string(),
        }
        .into();
        assert_eq!(response.status, StatusCode::FORBIDDEN);
        assert_eq!(
            response.error.message,
            "Role 'moderator' is not allowed to grade quiz attempts"
        );
    }

    #[test]
    fn test_backend_errors() {
        let not_found: ApiErrorResponse = AdminError::Backend {
            status: 404,
            message: "Quiz attempt not found".to_string(),
        }
        .into();
        assert_eq!(not_found.status, StatusCode::NOT_FOUND);

        let unavailable: ApiErrorResponse = AdminError::Transport {
            message: "connection refused".to_string(),
        }
        .into();
        assert_eq!(unavailable.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(unavailable.error.details.as_deref(), Some("connection refused"));
    }
}
