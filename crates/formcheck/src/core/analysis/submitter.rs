//! Analysis Submitter
//!
//! Sends the active asset to `POST /api/analyze` as multipart form data and
//! awaits the verdict. The request is bounded by a timeout and can be
//! cancelled by the user; both go through the same [`AbortSignal`], so the
//! first of completion, cancellation or timeout decides the outcome.

use std::time::Duration;

use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::abort::{AbortReason, AbortSignal};
use super::normalizer::normalize_body;
use super::result::AnalysisResult;
use super::{ProgressMilestone, SubmissionEvent, SubmissionProgress, SubmissionState};
use crate::core::exercises::ExerciseSelection;
use crate::core::media::MediaAsset;
use crate::core::resources::{ResourceManager, TimerKind};
use crate::core::settings::ClientSettings;
use crate::core::{CoreError, CoreResult, ObjectUrl};

// =============================================================================
// Constants
// =============================================================================

/// Path of the analysis endpoint under the base URL
pub const ANALYZE_PATH: &str = "/api/analyze";

/// Message when an error body is not JSON
pub const UNKNOWN_ERROR_MESSAGE: &str = "Unknown error";

/// Message when a JSON error body carries no usable message
pub const ANALYSIS_FAILED_MESSAGE: &str = "Analysis failed";

// =============================================================================
// Request / Outcome
// =============================================================================

/// Everything sent with one submission
#[derive(Debug, Clone, Copy)]
pub struct AnalysisRequest<'a> {
    pub asset: &'a MediaAsset,
    pub exercise: &'a ExerciseSelection,
    pub user_id: &'a str,
}

/// Successful submission
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutcome {
    pub result: AnalysisResult,
    /// Fresh playback URL for the submitted asset
    pub video_url: ObjectUrl,
}

// =============================================================================
// AnalysisSubmitter
// =============================================================================

/// Submits assets to the analysis service
pub struct AnalysisSubmitter {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    state: SubmissionState,
    progress: SubmissionProgress,
    event_tx: mpsc::UnboundedSender<SubmissionEvent>,
    event_rx: Option<mpsc::UnboundedReceiver<SubmissionEvent>>,
}

impl std::fmt::Debug for AnalysisSubmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisSubmitter")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("state", &self.state)
            .field("progress", &self.progress)
            .finish_non_exhaustive()
    }
}

impl AnalysisSubmitter {
    /// Create a submitter for the configured service
    pub fn new(settings: &ClientSettings) -> CoreResult<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| CoreError::Internal(format!("Failed to create HTTP client: {}", e)))?;
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Ok(Self {
            client,
            base_url: settings.api_url.trim_end_matches('/').to_string(),
            timeout: settings.request_timeout(),
            state: SubmissionState::Idle,
            progress: SubmissionProgress::initial(),
            event_tx,
            event_rx: Some(event_rx),
        })
    }

    /// Overrides the request time bound
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn analyze_url(&self) -> String {
        format!("{}{}", self.base_url, ANALYZE_PATH)
    }

    pub fn state(&self) -> SubmissionState {
        self.state
    }

    pub fn progress(&self) -> SubmissionProgress {
        self.progress
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether the cancel affordance applies right now
    pub fn is_cancellable(&self) -> bool {
        self.state.shows_cancel()
    }

    /// Returns to `idle` with no progress, for a new flow
    pub fn reset(&mut self) {
        self.state = SubmissionState::Idle;
        self.progress = SubmissionProgress::initial();
    }

    /// Take the event receiver (can only be called once)
    pub fn take_event_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<SubmissionEvent>> {
        self.event_rx.take()
    }

    /// Submits `request` and awaits the normalized result.
    ///
    /// `signal` must be fresh; keep a clone of it to cancel from elsewhere.
    /// On success a fresh object URL is derived for the asset. On any
    /// failure the progress resets and a `Settled` event carries the
    /// user-facing message and recovery actions.
    pub async fn submit(
        &mut self,
        request: AnalysisRequest<'_>,
        signal: &AbortSignal,
        resources: &mut ResourceManager,
    ) -> CoreResult<AnalysisOutcome> {
        if signal.is_settled() {
            return Err(CoreError::InvalidState(
                "abort signal already settled".to_string(),
            ));
        }

        self.state = SubmissionState::Submitting;
        self.progress = SubmissionProgress::initial();
        self.advance(ProgressMilestone::Started, signal);
        info!(
            "Submitting asset {} ({} bytes) as {:?} to {}",
            request.asset.id,
            request.asset.size(),
            request.exercise.as_str(),
            self.analyze_url()
        );

        let outcome = self.run(request, signal, resources).await;
        resources.clear_timer(TimerKind::RequestTimeout);

        match outcome {
            Ok(result) => {
                let video_url = resources.derive_object_url(request.asset);
                self.advance(ProgressMilestone::Finished, signal);
                self.state = SubmissionState::Succeeded;
                info!(
                    "Analysis of asset {} succeeded: score {:.1}, {} issues",
                    request.asset.id,
                    result.overall_score,
                    result.issues.len()
                );
                self.emit(SubmissionEvent::Settled {
                    state: self.state,
                    message: None,
                    recovery: Vec::new(),
                });
                Ok(AnalysisOutcome { result, video_url })
            }
            Err(e) => {
                self.state = match e {
                    CoreError::Cancelled => SubmissionState::Cancelled,
                    _ => SubmissionState::Failed,
                };
                self.progress = SubmissionProgress::initial();
                warn!("Analysis of asset {} ended {:?}: {}", request.asset.id, self.state, e);
                self.emit(SubmissionEvent::Settled {
                    state: self.state,
                    message: Some(e.to_user_message()),
                    recovery: e.recovery_actions().to_vec(),
                });
                Err(e)
            }
        }
    }

    async fn run(
        &mut self,
        request: AnalysisRequest<'_>,
        signal: &AbortSignal,
        resources: &mut ResourceManager,
    ) -> CoreResult<AnalysisResult> {
        let form = build_form(&request)?;
        self.advance(ProgressMilestone::BodyBuilt, signal);

        let deadline = signal.clone();
        let timeout = self.timeout;
        resources.start_timer(TimerKind::RequestTimeout, async move {
            tokio::time::sleep(timeout).await;
            if deadline.abort(AbortReason::Timeout) {
                warn!("Analysis request exceeded {:?}", timeout);
            }
        });
        self.state = SubmissionState::AwaitingRemote;

        let exchange = self.exchange(form, signal).await;

        // Whichever settles the signal first decides the outcome
        if !signal.complete() {
            return Err(aborted_error(signal));
        }
        let body = exchange?;
        self.advance(ProgressMilestone::ResponseReceived, signal);

        normalize_body(&body)
    }

    async fn exchange(&self, form: Form, signal: &AbortSignal) -> CoreResult<Bytes> {
        let send = self.client.post(self.analyze_url()).multipart(form).send();
        let response = tokio::select! {
            biased;
            _ = signal.aborted() => return Err(aborted_error(signal)),
            result = send => result.map_err(|e| CoreError::Network(e.to_string()))?,
        };

        let status = response.status();
        let body = tokio::select! {
            biased;
            _ = signal.aborted() => return Err(aborted_error(signal)),
            result = response.bytes() => result.map_err(|e| {
                CoreError::Network(format!("Failed to read response: {}", e))
            })?,
        };
        debug!("Analysis service answered {} ({} bytes)", status, body.len());

        if !status.is_success() {
            return Err(parse_service_error(status, &body));
        }
        Ok(body)
    }

    /// Moves progress to `milestone` unless the request was aborted
    fn advance(&mut self, milestone: ProgressMilestone, signal: &AbortSignal) {
        if signal.is_aborted() {
            return;
        }
        let next = SubmissionProgress::at(milestone);
        if next.percent <= self.progress.percent {
            return;
        }
        self.progress = next;
        self.emit(SubmissionEvent::Progress(next));
    }

    fn emit(&self, event: SubmissionEvent) {
        // The receiver may have been dropped by a caller that does not listen
        let _ = self.event_tx.send(event);
    }
}

fn aborted_error(signal: &AbortSignal) -> CoreError {
    signal.abort_error().unwrap_or(CoreError::Cancelled)
}

/// Builds the multipart body: `video`, `exercise_name`, `user_id`
fn build_form(request: &AnalysisRequest<'_>) -> CoreResult<Form> {
    let asset = request.asset;
    let video = Part::stream_with_length(reqwest::Body::from(asset.payload.clone()), asset.size())
        .file_name(asset.upload_filename().to_string())
        .mime_str(&asset.mime_type)
        .map_err(|e| CoreError::Internal(format!("Invalid MIME type {:?}: {}", asset.mime_type, e)))?;

    Ok(Form::new()
        .part("video", video)
        .text("exercise_name", request.exercise.as_str().to_string())
        .text("user_id", request.user_id.to_string()))
}

/// Maps a non-2xx answer to a service error.
///
/// The message is the payload's `error`, else `detail.error`, else a generic
/// failure; a body that is not JSON at all yields `Unknown error`.
pub fn parse_service_error(status: StatusCode, body: &[u8]) -> CoreError {
    let message = match serde_json::from_slice::<serde_json::Value>(body) {
        Err(_) => UNKNOWN_ERROR_MESSAGE.to_string(),
        Ok(value) => value
            .get("error")
            .and_then(non_empty_str)
            .or_else(|| value.pointer("/detail/error").and_then(non_empty_str))
            .unwrap_or(ANALYSIS_FAILED_MESSAGE)
            .to_string(),
    };
    CoreError::Service {
        status: status.as_u16(),
        message,
    }
}

fn non_empty_str(value: &serde_json::Value) -> Option<&str> {
    value.as_str().filter(|s| !s.trim().is_empty())
}
