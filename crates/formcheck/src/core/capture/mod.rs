//! Media Acquisition Module
//!
//! Obtains the active video asset from a validated file or a live camera
//! recording. Camera capture is an explicit state machine:
//!
//! `idle → requesting-permission → streaming → recording → finalizing → ready`
//!
//! Validation and permission failures are recorded as a user-visible error
//! and never escape the acquirer.

mod camera;
mod recording;

pub use camera::*;
pub use recording::*;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::media::{CandidateFile, IntakePath, MediaAsset, Validator, RECORDING_MIME_TYPE};
use crate::core::resources::{ResourceManager, TimerKind};
use crate::core::{format_clock, CoreError, CoreResult};

/// Acquisition mode, mutually exclusive per session
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CaptureMode {
    File,
    Camera,
}

/// Capture state machine states
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CaptureState {
    /// Nothing in progress
    #[default]
    Idle,
    /// Waiting for the camera grant
    RequestingPermission,
    /// Camera granted, not recording
    Streaming,
    /// Recorder running, chunks accumulating
    Recording,
    /// Recorder stopped, chunks being joined
    Finalizing,
    /// An asset is available
    Ready,
}

/// Acquires and holds the active media asset
#[derive(Debug, Default)]
pub struct MediaAcquirer {
    mode: Option<CaptureMode>,
    state: CaptureState,
    active: Option<MediaAsset>,
    recording: Option<RecordingSession>,
    recorded_secs: u64,
    last_error: Option<String>,
    validator: Validator,
    constraints: StreamConstraints,
}

impl MediaAcquirer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the camera constraints used by `open_camera`
    pub fn with_constraints(mut self, constraints: StreamConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn mode(&self) -> Option<CaptureMode> {
        self.mode
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// The accepted or finalized asset
    pub fn active_asset(&self) -> Option<&MediaAsset> {
        self.active.as_ref()
    }

    /// User-visible error from the last acquisition attempt
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.last_error = None;
    }

    /// Whether chunks are currently accumulating
    pub fn is_recording(&self) -> bool {
        self.state == CaptureState::Recording
    }

    /// Seconds recorded in the current or last recording
    pub fn elapsed_secs(&self) -> u64 {
        self.recording
            .as_ref()
            .map_or(self.recorded_secs, RecordingSession::elapsed_secs)
    }

    /// Elapsed time as `m:ss`
    pub fn elapsed_label(&self) -> String {
        format_clock(self.elapsed_secs())
    }

    /// Chunks accumulated by the in-progress recording
    pub fn recorded_chunks(&self) -> usize {
        self.recording.as_ref().map_or(0, RecordingSession::chunk_count)
    }

    // =========================================================================
    // Mode Selection
    // =========================================================================

    /// Switches acquisition mode, releasing the camera when leaving camera mode
    pub fn select_mode(&mut self, mode: CaptureMode, resources: &mut ResourceManager) {
        if self.mode == Some(mode) {
            return;
        }
        self.abandon_recording(resources);
        resources.release_stream();
        self.mode = Some(mode);
        self.state = CaptureState::Idle;
        debug!("Capture mode set to {:?}", mode);
    }

    // =========================================================================
    // File Mode
    // =========================================================================

    /// Validates a candidate and, on success, makes it the active asset.
    ///
    /// On rejection the error is recorded and the previous asset is kept.
    pub fn accept_file(
        &mut self,
        candidate: CandidateFile,
        path: IntakePath,
        resources: &mut ResourceManager,
    ) -> bool {
        self.last_error = None;

        if let Err(e) = self.validator.validate(&candidate, path) {
            warn!("Rejected {:?} candidate {:?}: {}", path, candidate.name, e);
            self.last_error = Some(e.to_string());
            return false;
        }

        self.abandon_recording(resources);
        resources.release_stream();

        let asset = MediaAsset::from_file(candidate);
        resources.object_url_for(&asset);
        info!(
            "Accepted file {} ({}, {} bytes)",
            asset.upload_filename(),
            asset.mime_type,
            asset.size()
        );

        self.active = Some(asset);
        self.mode = Some(CaptureMode::File);
        self.state = CaptureState::Ready;
        true
    }

    /// Drops the active file asset so another can be chosen
    pub fn clear_file(&mut self, resources: &mut ResourceManager) {
        if self.mode != Some(CaptureMode::File) {
            return;
        }
        if self.active.take().is_some() {
            resources.revoke_object_url();
        }
        self.state = CaptureState::Idle;
    }

    // =========================================================================
    // Camera Mode
    // =========================================================================

    /// Requests a live stream from `camera`.
    ///
    /// Returns false and records a descriptive error when access is denied.
    pub async fn open_camera(
        &mut self,
        camera: &dyn CameraDevice,
        resources: &mut ResourceManager,
    ) -> bool {
        if matches!(
            self.state,
            CaptureState::Recording | CaptureState::Finalizing
        ) {
            warn!("Ignoring camera request while {:?}", self.state);
            return false;
        }

        self.mode = Some(CaptureMode::Camera);
        self.last_error = None;
        self.state = CaptureState::RequestingPermission;

        match camera.open_stream(&self.constraints).await {
            Ok(stream) => {
                resources.attach_stream(stream);
                self.state = CaptureState::Streaming;
                true
            }
            Err(e) => {
                let error = match e {
                    CoreError::PermissionDenied(_) => e,
                    other => CoreError::PermissionDenied(other.to_string()),
                };
                warn!("Camera {} unavailable: {}", camera.name(), error);
                self.last_error = Some(error.to_string());
                self.state = CaptureState::Idle;
                false
            }
        }
    }

    /// Abandons camera mode after a permission failure
    pub fn fall_back_to_file(&mut self, resources: &mut ResourceManager) {
        self.last_error = None;
        self.abandon_recording(resources);
        resources.release_stream();
        self.mode = None;
        self.state = CaptureState::Idle;
    }

    /// Starts recording on the live stream and the elapsed-time clock
    pub fn start_recording(&mut self, resources: &mut ResourceManager) -> CoreResult<()> {
        if self.state != CaptureState::Streaming {
            return Err(CoreError::InvalidState(format!(
                "cannot start recording while {:?}",
                self.state
            )));
        }

        let stream = resources
            .stream_mut()
            .filter(|s| s.live_tracks() > 0)
            .ok_or_else(|| CoreError::InvalidState("no live camera stream".to_string()))?;
        let recorder = stream.start_recorder(RECORDING_MIME_TYPE)?;

        let session = RecordingSession::new(recorder);
        resources.start_timer(TimerKind::RecordingClock, session.clock());
        info!("Recording {} started", session.id());

        self.recording = Some(session);
        self.recorded_secs = 0;
        self.state = CaptureState::Recording;
        Ok(())
    }

    /// Awaits the next recorder data event.
    ///
    /// Returns the chunk count so far, or `None` when not recording or the
    /// recorder closed.
    pub async fn next_chunk(&mut self) -> Option<usize> {
        if self.state != CaptureState::Recording {
            return None;
        }
        self.recording.as_mut()?.next_chunk().await
    }

    /// Stops recording and finalizes the chunks into the active asset.
    ///
    /// Halts the recorder, stops every track, clears the clock, then joins
    /// the chunks in arrival order.
    pub fn stop_recording(&mut self, resources: &mut ResourceManager) -> CoreResult<&MediaAsset> {
        if self.state != CaptureState::Recording {
            return Err(CoreError::InvalidState(format!(
                "cannot stop recording while {:?}",
                self.state
            )));
        }
        self.state = CaptureState::Finalizing;

        if let Some(stream) = resources.stream_mut() {
            stream.stop_recorder();
        }
        resources.release_stream();
        resources.clear_timer(TimerKind::RecordingClock);

        let session = self.recording.take().ok_or_else(|| {
            CoreError::Internal("recording state without a session".to_string())
        })?;
        self.recorded_secs = session.elapsed_secs();
        let asset = session.finalize();
        resources.object_url_for(&asset);
        info!(
            "Recording finalized into asset {} ({} bytes, {})",
            asset.id,
            asset.size(),
            format_clock(self.recorded_secs)
        );

        self.state = CaptureState::Ready;
        let asset = self.active.insert(asset);
        Ok(&*asset)
    }

    /// Discards the recording session's chunks and counter.
    ///
    /// A previously finalized asset is left in place. Returns to `streaming`
    /// when the camera is still live, otherwise to `idle`.
    pub fn retake(&mut self, resources: &mut ResourceManager) {
        self.abandon_recording(resources);
        self.recorded_secs = 0;
        self.state = if resources.has_live_stream() {
            CaptureState::Streaming
        } else {
            CaptureState::Idle
        };
        debug!("Retake: capture state now {:?}", self.state);
    }

    /// Releases everything the capture view holds
    pub fn teardown(&mut self, resources: &mut ResourceManager) {
        self.abandon_recording(resources);
        resources.release_stream();
        resources.revoke_object_url();
        self.state = if self.active.is_some() {
            CaptureState::Ready
        } else {
            CaptureState::Idle
        };
    }

    fn abandon_recording(&mut self, resources: &mut ResourceManager) {
        if let Some(session) = self.recording.take() {
            if let Some(stream) = resources.stream_mut() {
                stream.stop_recorder();
            }
            debug!(
                "Discarded recording {} ({} chunks)",
                session.id(),
                session.chunk_count()
            );
        }
        resources.clear_timer(TimerKind::RecordingClock);
    }
}
