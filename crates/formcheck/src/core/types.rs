//! FormCheck Core Type Definitions
//!
//! Defines fundamental types shared across the pipeline.

use serde::{Deserialize, Serialize};

// =============================================================================
// ID Types
// =============================================================================

/// Media asset unique identifier (ULID)
pub type AssetId = String;

/// Recording session unique identifier (ULID)
pub type RecordingId = String;

/// Live stream unique identifier
pub type StreamId = String;

/// Frame index within the analyzed video
pub type Frame = u32;

// =============================================================================
// Object URL
// =============================================================================

/// Scheme prefix of every object URL issued by the resource registry
pub const OBJECT_URL_PREFIX: &str = "blob:formcheck/";

/// Opaque handle to an in-memory asset, borrowed by views for playback.
///
/// Only the resource registry creates and revokes these.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectUrl(String);

impl ObjectUrl {
    pub(crate) fn mint() -> Self {
        Self(format!("{}{}", OBJECT_URL_PREFIX, ulid::Ulid::new()))
    }

    /// Returns the URL as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ObjectUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Formatting Helpers
// =============================================================================

const BYTES_PER_MIB: f64 = 1024.0 * 1024.0;

/// Converts a byte count to mebibytes
pub fn bytes_to_mib(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MIB
}

/// Formats elapsed seconds as `m:ss`
pub fn format_clock(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
