//! FormCheck Error Definitions
//!
//! Defines error types used throughout the pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::media::ValidationError;
use super::session::RecoveryAffordance;

/// Message shown when the user aborts an in-flight analysis
pub const CANCELLED_MESSAGE: &str = "Analysis cancelled by user";

/// Message shown when the analysis exceeds the request time bound
pub const TIMEOUT_MESSAGE: &str =
    "Analysis timeout - video too long. Try a shorter video (max 2 minutes)";

/// Core engine error types
#[derive(Error, Debug)]
pub enum CoreError {
    // =========================================================================
    // Acquisition Errors
    // =========================================================================
    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("Camera access denied or unavailable: {0}. Please check camera permissions.")]
    PermissionDenied(String),

    #[error("Invalid capture state: {0}")]
    InvalidState(String),

    // =========================================================================
    // Submission Errors
    // =========================================================================
    #[error("Network error: {0}")]
    Network(String),

    #[error("{}", TIMEOUT_MESSAGE)]
    Timeout,

    #[error("{}", CANCELLED_MESSAGE)]
    Cancelled,

    #[error("{message}")]
    Service { status: u16, message: String },

    #[error("Malformed analysis response: {0}")]
    MalformedResponse(String),

    // =========================================================================
    // Session Errors
    // =========================================================================
    #[error("{}", .0.message)]
    SessionIncomplete(RecoveryAffordance),

    // =========================================================================
    // General Errors
    // =========================================================================
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Core engine result type
pub type CoreResult<T> = Result<T, CoreError>;

/// Recovery offered to the user after a failed submission
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecoveryAction {
    /// Submit the same asset again
    RetrySameAsset,
    /// Discard the session and start from exercise selection
    RestartFlow,
}

const SUBMISSION_RECOVERY: &[RecoveryAction] =
    &[RecoveryAction::RetrySameAsset, RecoveryAction::RestartFlow];

impl CoreError {
    /// True for failures that end a submission and are surfaced with recovery actions
    pub fn is_submission_failure(&self) -> bool {
        matches!(
            self,
            CoreError::Network(_)
                | CoreError::Timeout
                | CoreError::Cancelled
                | CoreError::Service { .. }
                | CoreError::MalformedResponse(_)
        )
    }

    /// Recovery actions to offer alongside the message
    pub fn recovery_actions(&self) -> &'static [RecoveryAction] {
        if self.is_submission_failure() {
            SUBMISSION_RECOVERY
        } else {
            &[]
        }
    }

    /// Convert to a user-facing message
    pub fn to_user_message(&self) -> String {
        self.to_string()
    }
}
