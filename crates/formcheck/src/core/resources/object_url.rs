//! Object URL registry
//!
//! Issues at most one live object URL, bound to the active asset.

use bytes::Bytes;
use tracing::debug;

use crate::core::media::MediaAsset;
use crate::core::{AssetId, ObjectUrl};

#[derive(Debug)]
struct ObjectUrlEntry {
    url: ObjectUrl,
    asset_id: AssetId,
    payload: Bytes,
}

/// Tracks the single un-revoked object URL and lifetime counters
#[derive(Debug, Default)]
pub struct ObjectUrlRegistry {
    current: Option<ObjectUrlEntry>,
    issued: u64,
    revoked: u64,
}

impl ObjectUrlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Revokes any current URL and issues a fresh one for `asset`
    pub fn derive(&mut self, asset: &MediaAsset) -> ObjectUrl {
        self.revoke();

        let url = ObjectUrl::mint();
        self.issued += 1;
        debug!("Issued object URL {} for asset {}", url, asset.id);

        self.current = Some(ObjectUrlEntry {
            url: url.clone(),
            asset_id: asset.id.clone(),
            payload: asset.payload.clone(),
        });
        url
    }

    /// Returns the URL for `asset`, reusing the live one when it already belongs to it
    pub fn for_asset(&mut self, asset: &MediaAsset) -> ObjectUrl {
        match &self.current {
            Some(entry) if entry.asset_id == asset.id => entry.url.clone(),
            _ => self.derive(asset),
        }
    }

    /// Revokes the live URL, if any
    pub fn revoke(&mut self) -> bool {
        match self.current.take() {
            Some(entry) => {
                self.revoked += 1;
                debug!("Revoked object URL {}", entry.url);
                true
            }
            None => false,
        }
    }

    /// The live URL, if any
    pub fn current(&self) -> Option<&ObjectUrl> {
        self.current.as_ref().map(|e| &e.url)
    }

    /// Resolves a live URL to the asset bytes it points at
    pub fn resolve(&self, url: &ObjectUrl) -> Option<Bytes> {
        self.current
            .as_ref()
            .filter(|e| &e.url == url)
            .map(|e| e.payload.clone())
    }

    /// Number of issued URLs not yet revoked
    pub fn live_count(&self) -> u64 {
        self.issued - self.revoked
    }

    /// Total URLs issued over the registry lifetime
    pub fn issued_count(&self) -> u64 {
        self.issued
    }
}
