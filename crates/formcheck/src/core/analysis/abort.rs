//! Abort signal shared between the submitter, the cancel affordance and the
//! request timeout.
//!
//! The first of `abort` or `complete` wins; the reason is recorded before the
//! underlying token fires, so whoever observes the abort can tell a user
//! cancellation from a timeout.

use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::CoreError;

/// Why a request was aborted
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AbortReason {
    /// The user pressed cancel
    User,
    /// The request exceeded its time bound
    Timeout,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Settlement {
    Completed,
    Aborted(AbortReason),
}

/// Cancellation token tagged with a reason, settled exactly once
#[derive(Clone, Debug, Default)]
pub struct AbortSignal {
    token: CancellationToken,
    settlement: Arc<OnceLock<Settlement>>,
}

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Aborts with `reason`. Returns false if the signal was already settled.
    pub fn abort(&self, reason: AbortReason) -> bool {
        if self.settlement.set(Settlement::Aborted(reason)).is_err() {
            return false;
        }
        debug!("Abort signal fired: {:?}", reason);
        self.token.cancel();
        true
    }

    /// User-initiated cancel; a no-op once cancelled or finished
    pub fn cancel_by_user(&self) -> bool {
        self.abort(AbortReason::User)
    }

    /// Claims the terminal outcome for the request itself.
    ///
    /// Returns false if an abort got there first.
    pub fn complete(&self) -> bool {
        self.settlement.set(Settlement::Completed).is_ok()
    }

    /// The abort reason, if aborted
    pub fn reason(&self) -> Option<AbortReason> {
        match self.settlement.get() {
            Some(Settlement::Aborted(reason)) => Some(*reason),
            _ => None,
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.reason().is_some()
    }

    pub fn is_settled(&self) -> bool {
        self.settlement.get().is_some()
    }

    /// Resolves once the signal is aborted
    pub async fn aborted(&self) {
        self.token.cancelled().await
    }

    /// Error describing the abort, if aborted
    pub fn abort_error(&self) -> Option<CoreError> {
        self.reason().map(|reason| match reason {
            AbortReason::User => CoreError::Cancelled,
            AbortReason::Timeout => CoreError::Timeout,
        })
    }
}
