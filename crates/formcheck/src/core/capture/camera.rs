//! Camera seam
//!
//! A `CameraDevice` grants live video streams; a `LiveStream` records into a
//! channel of binary chunks delivered in arrival order.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::core::{CoreError, CoreResult, StreamId};

// =============================================================================
// Constraints
// =============================================================================

/// Which camera to prefer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FacingMode {
    /// Front-facing camera
    #[default]
    User,
    /// Rear camera
    Environment,
}

/// Requested stream properties
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamConstraints {
    pub width: u32,
    pub height: u32,
    pub facing_mode: FacingMode,
    /// Audio is never requested for form analysis
    pub audio: bool,
}

impl Default for StreamConstraints {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            facing_mode: FacingMode::User,
            audio: false,
        }
    }
}

// =============================================================================
// Traits
// =============================================================================

/// Source of live video streams
#[async_trait]
pub trait CameraDevice: Send + Sync {
    /// Returns the device name
    fn name(&self) -> &str;

    /// Requests a live stream. Resolves once permission is granted or denied.
    ///
    /// Denial or unavailability is reported as `CoreError::PermissionDenied`.
    async fn open_stream(&self, constraints: &StreamConstraints) -> CoreResult<Box<dyn LiveStream>>;
}

/// A granted camera stream
pub trait LiveStream: Send + std::fmt::Debug {
    /// Stream identifier
    fn id(&self) -> &str;

    /// Number of tracks still delivering media
    fn live_tracks(&self) -> usize;

    /// Starts a recorder on this stream. Data events arrive on the returned channel.
    fn start_recorder(&mut self, mime_type: &str) -> CoreResult<mpsc::UnboundedReceiver<Bytes>>;

    /// Halts the recorder. Any final data event is delivered before the channel closes.
    fn stop_recorder(&mut self);

    /// Stops every track, releasing the camera
    fn stop_tracks(&mut self);
}

// =============================================================================
// Replay Camera
// =============================================================================

/// Camera that serves pre-recorded takes, one per recorder start.
///
/// Every stream it grants draws from the same queue, so a stream that stays
/// live across a retake records the next take.
#[derive(Debug)]
pub struct ReplayCamera {
    name: String,
    takes: Arc<Mutex<VecDeque<Vec<Bytes>>>>,
    denial: Option<String>,
    live_tracks: Arc<AtomicUsize>,
}

impl ReplayCamera {
    /// Creates a camera whose successive recordings replay the given takes
    pub fn from_takes(takes: Vec<Vec<Bytes>>) -> Self {
        Self {
            name: "replay".to_string(),
            takes: Arc::new(Mutex::new(takes.into())),
            denial: None,
            live_tracks: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Creates a camera that replays a file split into `chunk_size` chunks
    pub fn from_file(path: &Path, chunk_size: usize) -> CoreResult<Self> {
        if chunk_size == 0 {
            return Err(CoreError::Config("Chunk size must be positive".to_string()));
        }
        let data = Bytes::from(std::fs::read(path)?);
        let chunks = (0..data.len())
            .step_by(chunk_size)
            .map(|start| data.slice(start..(start + chunk_size).min(data.len())))
            .collect();

        let mut camera = Self::from_takes(vec![chunks]);
        camera.name = path
            .file_name()
            .map(|n| format!("replay:{}", n.to_string_lossy()))
            .unwrap_or_else(|| "replay".to_string());
        Ok(camera)
    }

    /// Creates a camera that always denies access
    pub fn denied(reason: impl Into<String>) -> Self {
        let mut camera = Self::from_takes(Vec::new());
        camera.denial = Some(reason.into());
        camera
    }

    /// Tracks still live across every stream this camera granted
    pub fn live_tracks(&self) -> usize {
        self.live_tracks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CameraDevice for ReplayCamera {
    fn name(&self) -> &str {
        &self.name
    }

    async fn open_stream(&self, constraints: &StreamConstraints) -> CoreResult<Box<dyn LiveStream>> {
        if let Some(reason) = &self.denial {
            return Err(CoreError::PermissionDenied(reason.clone()));
        }

        self.live_tracks.fetch_add(1, Ordering::SeqCst);

        let stream = ReplayStream {
            id: ulid::Ulid::new().to_string(),
            takes: self.takes.clone(),
            recorder: None,
            final_chunk: None,
            tracks_live: true,
            live_tracks: self.live_tracks.clone(),
        };
        info!(
            "Camera {} granted stream {} ({}x{})",
            self.name, stream.id, constraints.width, constraints.height
        );
        Ok(Box::new(stream))
    }
}

#[derive(Debug)]
struct ReplayStream {
    id: StreamId,
    takes: Arc<Mutex<VecDeque<Vec<Bytes>>>>,
    recorder: Option<mpsc::UnboundedSender<Bytes>>,
    final_chunk: Option<Bytes>,
    tracks_live: bool,
    live_tracks: Arc<AtomicUsize>,
}

impl LiveStream for ReplayStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn live_tracks(&self) -> usize {
        usize::from(self.tracks_live)
    }

    fn start_recorder(&mut self, mime_type: &str) -> CoreResult<mpsc::UnboundedReceiver<Bytes>> {
        if !self.tracks_live {
            return Err(CoreError::InvalidState(format!(
                "stream {} has ended",
                self.id
            )));
        }

        let mut chunks = self
            .takes
            .lock()
            .map_err(|_| CoreError::Internal("replay take queue poisoned".to_string()))?
            .pop_front()
            .unwrap_or_default();
        let (tx, rx) = mpsc::unbounded_channel();
        // The last chunk is flushed when the recorder stops.
        self.final_chunk = chunks.pop();
        for chunk in chunks {
            let _ = tx.send(chunk);
        }
        self.recorder = Some(tx);
        debug!("Recorder started on stream {} ({})", self.id, mime_type);
        Ok(rx)
    }

    fn stop_recorder(&mut self) {
        if let Some(tx) = self.recorder.take() {
            if let Some(chunk) = self.final_chunk.take() {
                let _ = tx.send(chunk);
            }
            debug!("Recorder stopped on stream {}", self.id);
        }
    }

    fn stop_tracks(&mut self) {
        self.stop_recorder();
        if self.tracks_live {
            self.tracks_live = false;
            self.live_tracks.fetch_sub(1, Ordering::SeqCst);
            debug!("Stopped all tracks of stream {}", self.id);
        }
    }
}

impl Drop for ReplayStream {
    fn drop(&mut self) {
        self.stop_tracks();
    }
}
