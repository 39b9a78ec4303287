//! Media Module
//!
//! Video payloads selected from disk or produced by a camera recording.

mod validation;

pub use validation::*;

use std::path::Path;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::core::{AssetId, CoreResult};

/// MIME type of every recorder-produced asset
pub const RECORDING_MIME_TYPE: &str = "video/webm";

/// Filename attached to recorder-produced assets
pub const RECORDING_FILENAME: &str = "workout.webm";

/// MIME type used when the extension is unknown
pub const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// Where an asset came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AssetOrigin {
    /// Chosen via file picker or drag-drop
    File,
    /// Finalized from a camera recording
    Recording,
}

/// A video payload ready for submission
#[derive(Clone, Debug, PartialEq)]
pub struct MediaAsset {
    /// Unique asset ID
    pub id: AssetId,
    /// Binary payload
    pub payload: Bytes,
    /// MIME type
    pub mime_type: String,
    /// Declared filename, if any
    pub filename: Option<String>,
    /// Acquisition origin
    pub origin: AssetOrigin,
}

impl MediaAsset {
    /// Creates an asset from an accepted candidate file
    pub fn from_file(candidate: CandidateFile) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            payload: candidate.payload,
            mime_type: candidate.mime_type,
            filename: candidate.name,
            origin: AssetOrigin::File,
        }
    }

    /// Creates an asset from a finalized recording
    pub fn from_recording(payload: Bytes) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            payload,
            mime_type: RECORDING_MIME_TYPE.to_string(),
            filename: Some(RECORDING_FILENAME.to_string()),
            origin: AssetOrigin::Recording,
        }
    }

    /// Payload size in bytes
    pub fn size(&self) -> u64 {
        self.payload.len() as u64
    }

    /// Filename to send in the multipart body
    pub fn upload_filename(&self) -> &str {
        self.filename.as_deref().unwrap_or(RECORDING_FILENAME)
    }
}

/// A file offered for acceptance, not yet validated
#[derive(Clone, Debug, PartialEq)]
pub struct CandidateFile {
    /// Declared filename
    pub name: Option<String>,
    /// Declared MIME type
    pub mime_type: String,
    /// File contents
    pub payload: Bytes,
}

impl CandidateFile {
    pub fn new(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            mime_type: mime_type.into(),
            payload: payload.into(),
        }
    }

    /// Reads a file from disk, inferring its MIME type from the extension.
    ///
    /// Files over [`MAX_UPLOAD_BYTES`] are rejected from their metadata
    /// without being read.
    pub fn from_path(path: &Path) -> CoreResult<Self> {
        let size_bytes = std::fs::metadata(path)?.len();
        if size_bytes > MAX_UPLOAD_BYTES {
            return Err(ValidationError::TooLarge { size_bytes }.into());
        }
        let payload = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned());

        Ok(Self {
            name,
            mime_type: mime_type_for_path(path).to_string(),
            payload: Bytes::from(payload),
        })
    }

    /// Payload size in bytes
    pub fn size(&self) -> u64 {
        self.payload.len() as u64
    }
}

/// Infers a MIME type from a file extension
pub fn mime_type_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("avi") => "video/x-msvideo",
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        _ => FALLBACK_MIME_TYPE,
    }
}
