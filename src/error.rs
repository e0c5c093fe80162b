//! Error types for the administration client.
//!
//! This module provides strongly-typed errors using the `thiserror` crate
//! for every failure a wizard, the grading view or a backend call can hit.

use thiserror::Error;

use crate::context::Role;
use crate::models::Notice;
use crate::wizard::ValidationErrors;

/// The main error type for the administration client.
///
/// Nothing here is fatal to the process: every variant is caught at the
/// handler boundary and turned into a [`Notice`] via [`AdminError::notice`].
///
/// # Example
///
/// ```
/// use campus_admin::error::AdminError;
///
/// let error = AdminError::ConfigNotFound {
///     path: "/missing/client.yaml".to_string(),
/// };
/// assert_eq!(error.to_string(), "Configuration file not found: /missing/client.yaml");
/// ```
#[derive(Debug, Error)]
pub enum AdminError {
    /// Configuration file was not found at the specified path.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        /// The path that was not found.
        path: String,
    },

    /// Configuration file could not be parsed or is inconsistent.
    #[error("Failed to parse configuration file '{path}': {message}")]
    ConfigParseError {
        /// The path to the file that failed to parse.
        path: String,
        /// A description of the parse error.
        message: String,
    },

    /// No wizard is configured under the requested kind.
    #[error("Wizard not found: {kind}")]
    WizardNotFound {
        /// The wizard kind that was requested.
        kind: String,
    },

    /// A step's validator reported one or more field errors.
    #[error("Step {step} has {} invalid field(s)", errors.len())]
    ValidationFailed {
        /// The 1-based step that failed.
        step: usize,
        /// The field errors for that step.
        errors: ValidationErrors,
    },

    /// Navigation to a step that has not been completed yet.
    #[error("Step {step} is not reachable (completed up to step {completed})")]
    StepNotReachable {
        /// The requested step.
        step: usize,
        /// The highest completed step.
        completed: usize,
    },

    /// The form has already been submitted (or is being submitted).
    #[error("Form has already been submitted")]
    AlreadySubmitted,

    /// The session's role may not perform the action.
    #[error("Role '{role}' is not allowed to {action}")]
    Forbidden {
        /// The role of the acting user.
        role: Role,
        /// The action that was refused.
        action: String,
    },

    /// The backend answered with a non-success status.
    #[error("Backend returned {status}: {message}")]
    Backend {
        /// The HTTP status code.
        status: u16,
        /// The message reported by the backend.
        message: String,
    },

    /// The backend could not be reached or the request could not be built.
    #[error("Request failed: {message}")]
    Transport {
        /// A description of the transport failure.
        message: String,
    },

    /// A backend response did not have the expected shape.
    #[error("Unexpected response: {message}")]
    Decode {
        /// A description of the decode failure.
        message: String,
    },

    /// A grade was given for a question that is not part of the attempt.
    #[error("Question not found in attempt: {question_id}")]
    UnknownQuestion {
        /// The unknown question id.
        question_id: String,
    },

    /// A save was requested for a question with no recorded grade.
    #[error("No grade recorded for question: {question_id}")]
    NoGradeRecorded {
        /// The question id.
        question_id: String,
    },

    /// One or more saves in a bulk grade save failed.
    #[error("Failed to save {} of {attempted} grade(s)", failed.len())]
    GradeBatchFailed {
        /// The question ids whose save failed.
        failed: Vec<String>,
        /// The number of saves attempted.
        attempted: usize,
    },
}

impl AdminError {
    /// Converts the error into the toast shown to the user.
    pub fn notice(&self) -> Notice {
        match self {
            AdminError::ValidationFailed { step, .. } => {
                Notice::error(format!("Please fix the highlighted fields in step {step}"))
            }
            AdminError::Backend { message, .. } => Notice::error(message.clone()),
            AdminError::Transport { .. } => {
                Notice::error("Could not reach the server. Your changes have been kept.")
            }
            other => Notice::error(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for AdminError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            AdminError::Decode {
                message: error.to_string(),
            }
        } else {
            AdminError::Transport {
                message: error.to_string(),
            }
        }
    }
}

/// A type alias for Results that return AdminError.
pub type AdminResult<T> = Result<T, AdminError>;
