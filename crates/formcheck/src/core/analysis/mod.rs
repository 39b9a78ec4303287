//! Analysis Module
//!
//! Submission of the active asset to the analysis service, cancellation and
//! timeout, and normalization of the service's answer.

pub mod abort;
pub mod normalizer;
pub mod result;
pub mod submitter;

pub use abort::*;
pub use normalizer::{normalize, normalize_body, parse_response, RemoteAnalysis};
pub use result::*;
pub use submitter::*;

use serde::{Deserialize, Serialize};

use crate::core::RecoveryAction;

// =============================================================================
// Submission State
// =============================================================================

/// Submission lifecycle
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SubmissionState {
    #[default]
    Idle,
    /// Request body being assembled
    Submitting,
    /// Request sent, waiting on the service
    AwaitingRemote,
    Succeeded,
    Failed,
    Cancelled,
}

impl SubmissionState {
    /// Whether the cancel affordance should be offered
    pub fn shows_cancel(&self) -> bool {
        matches!(
            self,
            SubmissionState::Submitting | SubmissionState::AwaitingRemote
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubmissionState::Succeeded | SubmissionState::Failed | SubmissionState::Cancelled
        )
    }
}

// =============================================================================
// Progress
// =============================================================================

/// Status of one analysis agent
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StageStatus {
    #[default]
    Waiting,
    Processing,
    Complete,
}

/// Milestones the percentage moves through.
///
/// These are fixed points in the submitter's own sequence, not a measure of
/// remote work.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProgressMilestone {
    Started = 10,
    BodyBuilt = 20,
    ResponseReceived = 60,
    Finished = 100,
}

/// Synthetic progress of a submission
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionProgress {
    /// 0..=100, monotonically non-decreasing within one submission
    pub percent: u8,
    /// Pose-analysis agent
    pub vision: StageStatus,
    /// Coaching agent
    pub coaching: StageStatus,
}

impl SubmissionProgress {
    pub fn initial() -> Self {
        Self::default()
    }

    /// Progress shown at `milestone`
    pub fn at(milestone: ProgressMilestone) -> Self {
        let (vision, coaching) = match milestone {
            ProgressMilestone::Started | ProgressMilestone::BodyBuilt => {
                (StageStatus::Processing, StageStatus::Waiting)
            }
            ProgressMilestone::ResponseReceived => {
                (StageStatus::Complete, StageStatus::Processing)
            }
            ProgressMilestone::Finished => (StageStatus::Complete, StageStatus::Complete),
        };
        Self {
            percent: milestone as u8,
            vision,
            coaching,
        }
    }
}

/// Events emitted by the submitter
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SubmissionEvent {
    Progress(SubmissionProgress),
    /// Terminal outcome; nothing follows for this submission
    Settled {
        state: SubmissionState,
        message: Option<String>,
        recovery: Vec<RecoveryAction>,
    },
}
