//! Acceptance checks applied to every file-mode candidate.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::CandidateFile;
use crate::core::bytes_to_mib;

/// Largest accepted payload (100 MiB)
pub const MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;

/// Smallest accepted payload on the picker path (1 KiB)
pub const MIN_UPLOAD_BYTES: u64 = 1024;

/// How a candidate file reached the acquirer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IntakePath {
    /// File picker dialog
    Picker,
    /// Drag-and-drop zone
    Drop,
}

impl IntakePath {
    fn verb(self) -> &'static str {
        match self {
            IntakePath::Picker => "select",
            IntakePath::Drop => "drop",
        }
    }
}

/// Rejection reasons for a candidate file
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Please {} a video file (MP4, MOV, AVI, WebM)", path.verb())]
    NotVideo { path: IntakePath },

    #[error("File too large: {:.1}MB (maximum 100MB)", bytes_to_mib(*size_bytes))]
    TooLarge { size_bytes: u64 },

    #[error("File is too small or corrupted (minimum 1KB)")]
    TooSmall,
}

/// Enforces type and size bounds before a file becomes the active asset
#[derive(Clone, Debug)]
pub struct Validator {
    max_bytes: u64,
    min_bytes: u64,
}

impl Default for Validator {
    fn default() -> Self {
        Self {
            max_bytes: MAX_UPLOAD_BYTES,
            min_bytes: MIN_UPLOAD_BYTES,
        }
    }
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks a candidate arriving through `path`.
    ///
    /// The minimum-size check only applies to the picker path; dropped files
    /// skip it.
    pub fn validate(
        &self,
        candidate: &CandidateFile,
        path: IntakePath,
    ) -> Result<(), ValidationError> {
        if !candidate.mime_type.starts_with("video/") {
            return Err(ValidationError::NotVideo { path });
        }

        let size = candidate.size();
        if size > self.max_bytes {
            return Err(ValidationError::TooLarge { size_bytes: size });
        }

        if path == IntakePath::Picker && size < self.min_bytes {
            return Err(ValidationError::TooSmall);
        }

        Ok(())
    }
}
