//! FormCheck Flow
//!
//! Drives one user session through
//! `exercise-selection → upload → analyzing → results`, owning the acquirer,
//! the submitter, the resource manager and the handoff between stages.

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::core::analysis::{
    AbortSignal, AnalysisRequest, AnalysisResult, AnalysisSubmitter, SubmissionEvent,
    SubmissionProgress, SubmissionState,
};
use crate::core::capture::{CameraDevice, CaptureMode, MediaAcquirer};
use crate::core::exercises::ExerciseSelection;
use crate::core::media::{CandidateFile, IntakePath, MediaAsset};
use crate::core::resources::ResourceManager;
use crate::core::session::{AnalyzingContext, FlowStage, RecoveryAffordance, ResultsContext, SessionHandoff};
use crate::core::settings::ClientSettings;
use crate::core::{CoreError, CoreResult};

/// One end-to-end form check session
#[derive(Debug)]
pub struct FormCheckFlow {
    settings: ClientSettings,
    stage: FlowStage,
    exercise: ExerciseSelection,
    acquirer: MediaAcquirer,
    submitter: AnalysisSubmitter,
    resources: ResourceManager,
    handoff: SessionHandoff,
}

impl FormCheckFlow {
    pub fn new(settings: ClientSettings) -> CoreResult<Self> {
        let submitter = AnalysisSubmitter::new(&settings)?;
        Ok(Self {
            settings,
            stage: FlowStage::ExerciseSelection,
            exercise: ExerciseSelection::default(),
            acquirer: MediaAcquirer::new(),
            submitter,
            resources: ResourceManager::new(),
            handoff: SessionHandoff::default(),
        })
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    pub fn stage(&self) -> FlowStage {
        self.stage
    }

    pub fn exercise(&self) -> &ExerciseSelection {
        &self.exercise
    }

    pub fn acquirer(&self) -> &MediaAcquirer {
        &self.acquirer
    }

    pub fn resources(&self) -> &ResourceManager {
        &self.resources
    }

    /// Borrows the acquirer together with the resources it operates on
    pub fn acquirer_and_resources(&mut self) -> (&mut MediaAcquirer, &mut ResourceManager) {
        (&mut self.acquirer, &mut self.resources)
    }

    pub fn submission_state(&self) -> SubmissionState {
        self.submitter.state()
    }

    pub fn submission_progress(&self) -> SubmissionProgress {
        self.submitter.progress()
    }

    /// Take the submission event receiver (can only be called once)
    pub fn take_submission_events(&mut self) -> Option<mpsc::UnboundedReceiver<SubmissionEvent>> {
        self.submitter.take_event_receiver()
    }

    // =========================================================================
    // Exercise Selection
    // =========================================================================

    /// Records the exercise and moves to the upload stage
    pub fn select_exercise(&mut self, label: Option<&str>) -> &ExerciseSelection {
        self.exercise = ExerciseSelection::new(label);
        self.stage = FlowStage::Upload;
        info!("Exercise selected: {}", self.exercise);
        &self.exercise
    }

    // =========================================================================
    // Upload
    // =========================================================================

    pub fn select_mode(&mut self, mode: CaptureMode) {
        self.acquirer.select_mode(mode, &mut self.resources);
    }

    /// Validates and accepts a file. A new asset discards any prior handoff.
    pub fn accept_file(&mut self, candidate: CandidateFile, path: IntakePath) -> bool {
        let accepted = self.acquirer.accept_file(candidate, path, &mut self.resources);
        if accepted {
            self.discard_handoff();
        }
        accepted
    }

    pub async fn open_camera(&mut self, camera: &dyn CameraDevice) -> bool {
        self.acquirer.open_camera(camera, &mut self.resources).await
    }

    pub fn start_recording(&mut self) -> CoreResult<()> {
        self.acquirer.start_recording(&mut self.resources)
    }

    pub async fn next_chunk(&mut self) -> Option<usize> {
        self.acquirer.next_chunk().await
    }

    /// Finalizes the recording into the active asset, discarding any prior handoff
    pub fn stop_recording(&mut self) -> CoreResult<&MediaAsset> {
        self.acquirer.stop_recording(&mut self.resources)?;
        self.discard_handoff();
        self.acquirer
            .active_asset()
            .ok_or_else(|| CoreError::Internal("recording finalized without an asset".to_string()))
    }

    pub fn retake(&mut self) {
        self.acquirer.retake(&mut self.resources);
    }

    /// Leaves the upload stage with the active asset.
    ///
    /// Capture resources are released either way. Without an asset the
    /// analyzing stage cannot be entered and the affordance is returned.
    pub fn proceed_to_analysis(&mut self) -> Result<AnalyzingContext, RecoveryAffordance> {
        self.acquirer.teardown(&mut self.resources);
        self.handoff =
            SessionHandoff::for_analysis(self.exercise.clone(), self.acquirer.active_asset().cloned());

        let context = self.handoff.enter_analyzing()?;
        self.submitter.reset();
        self.stage = FlowStage::Analyzing;
        debug!("Entered analyzing with asset {}", context.video.id);
        Ok(context)
    }

    /// Drops results and submission state tied to the previous asset
    fn discard_handoff(&mut self) {
        if self.handoff.video.is_some() || self.handoff.results.is_some() {
            debug!("Active asset changed; discarding handoff from {:?}", self.stage);
        }
        self.handoff = SessionHandoff::default();
        self.submitter.reset();
        self.stage = FlowStage::Upload;
    }

    // =========================================================================
    // Analyzing
    // =========================================================================

    /// Submits the handed-off asset and, on success, moves to results.
    ///
    /// On failure the flow stays in `analyzing` so the same asset can be
    /// retried or the flow restarted.
    pub async fn run_analysis(&mut self, signal: &AbortSignal) -> CoreResult<&AnalysisResult> {
        if self.stage != FlowStage::Analyzing {
            return Err(CoreError::InvalidState(format!(
                "cannot analyze from stage {:?}",
                self.stage
            )));
        }
        let context = self
            .handoff
            .enter_analyzing()
            .map_err(CoreError::SessionIncomplete)?;

        let request = AnalysisRequest {
            asset: &context.video,
            exercise: &context.exercise,
            user_id: &self.settings.user_id,
        };
        let outcome = self
            .submitter
            .submit(request, signal, &mut self.resources)
            .await?;

        let handoff = std::mem::take(&mut self.handoff);
        self.handoff = handoff.with_results(outcome.result, outcome.video_url);
        self.stage = FlowStage::Results;

        self.handoff.results.as_ref().ok_or_else(|| {
            CoreError::Internal("results missing after handoff".to_string())
        })
    }

    /// Resubmits the same asset after a failed or cancelled attempt
    pub async fn retry_analysis(&mut self, signal: &AbortSignal) -> CoreResult<&AnalysisResult> {
        if !matches!(
            self.submitter.state(),
            SubmissionState::Failed | SubmissionState::Cancelled
        ) {
            return Err(CoreError::InvalidState(format!(
                "nothing to retry while {:?}",
                self.submitter.state()
            )));
        }
        info!("Retrying analysis with the same asset");
        self.run_analysis(signal).await
    }

    // =========================================================================
    // Results
    // =========================================================================

    pub fn results(&self) -> Result<ResultsContext, RecoveryAffordance> {
        self.handoff.enter_results()
    }

    /// Discards the whole session and returns to exercise selection
    pub fn restart(&mut self) {
        self.acquirer.teardown(&mut self.resources);
        self.resources.teardown();
        self.acquirer = MediaAcquirer::new();
        self.submitter.reset();
        self.handoff = SessionHandoff::default();
        self.exercise = ExerciseSelection::default();
        self.stage = FlowStage::ExerciseSelection;
        info!("Flow restarted");
    }
}

impl Drop for FormCheckFlow {
    fn drop(&mut self) {
        self.acquirer.teardown(&mut self.resources);
        self.resources.teardown();
    }
}
