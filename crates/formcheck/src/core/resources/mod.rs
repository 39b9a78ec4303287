//! Resource Lifecycle Module
//!
//! Sole owner of the live camera stream, the active object URL and the
//! pipeline timers. Other components only borrow these for the duration of a
//! call. Every release operation is idempotent, and dropping the manager
//! releases everything.

mod object_url;
mod timers;

pub use object_url::*;
pub use timers::*;

use std::future::Future;

use bytes::Bytes;
use tracing::{debug, info};

use crate::core::capture::LiveStream;
use crate::core::media::MediaAsset;
use crate::core::ObjectUrl;

/// Owns transient capture and submission resources
#[derive(Debug, Default)]
pub struct ResourceManager {
    stream: Option<Box<dyn LiveStream>>,
    object_urls: ObjectUrlRegistry,
    timers: TimerRegistry,
}

impl ResourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Camera Stream
    // =========================================================================

    /// Takes ownership of a granted stream, releasing any previous one
    pub fn attach_stream(&mut self, stream: Box<dyn LiveStream>) {
        self.release_stream();
        debug!("Attached camera stream {}", stream.id());
        self.stream = Some(stream);
    }

    /// Borrows the live stream
    pub fn stream_mut(&mut self) -> Option<&mut (dyn LiveStream + 'static)> {
        self.stream.as_deref_mut()
    }

    /// Whether a stream with live tracks is held
    pub fn has_live_stream(&self) -> bool {
        self.stream.as_ref().is_some_and(|s| s.live_tracks() > 0)
    }

    /// Stops every track of the held stream and drops it
    pub fn release_stream(&mut self) -> bool {
        match self.stream.take() {
            Some(mut stream) => {
                stream.stop_tracks();
                info!("Released camera stream {}", stream.id());
                true
            }
            None => false,
        }
    }

    // =========================================================================
    // Object URLs
    // =========================================================================

    /// URL for the active asset, issuing one if the asset changed
    pub fn object_url_for(&mut self, asset: &MediaAsset) -> ObjectUrl {
        self.object_urls.for_asset(asset)
    }

    /// Always issues a fresh URL for `asset`, revoking the previous one
    pub fn derive_object_url(&mut self, asset: &MediaAsset) -> ObjectUrl {
        self.object_urls.derive(asset)
    }

    /// Revokes the live URL
    pub fn revoke_object_url(&mut self) -> bool {
        self.object_urls.revoke()
    }

    /// The live URL, if any
    pub fn current_object_url(&self) -> Option<&ObjectUrl> {
        self.object_urls.current()
    }

    /// Reads the bytes behind a live URL
    pub fn resolve_object_url(&self, url: &ObjectUrl) -> Option<Bytes> {
        self.object_urls.resolve(url)
    }

    /// Number of un-revoked URLs
    pub fn live_object_urls(&self) -> u64 {
        self.object_urls.live_count()
    }

    // =========================================================================
    // Timers
    // =========================================================================

    /// Starts the timer for `kind`, replacing a running one
    pub fn start_timer<F>(&mut self, kind: TimerKind, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.timers.start(kind, task);
    }

    /// Clears the timer for `kind`
    pub fn clear_timer(&mut self, kind: TimerKind) -> bool {
        self.timers.clear(kind)
    }

    /// Whether the timer for `kind` is still running
    pub fn has_timer(&self, kind: TimerKind) -> bool {
        self.timers.is_running(kind)
    }

    /// Number of registered timers
    pub fn active_timers(&self) -> usize {
        self.timers.len()
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Releases the stream, revokes the URL and clears every timer
    pub fn teardown(&mut self) {
        self.timers.clear_all();
        self.release_stream();
        self.revoke_object_url();
        debug!("Resource manager torn down");
    }
}

impl Drop for ResourceManager {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::capture::{CameraDevice, ReplayCamera, StreamConstraints};

    #[tokio::test]
    async fn test_attach_replaces_and_releases_previous_stream() {
        let camera = ReplayCamera::from_takes(vec![vec![], vec![]]);
        let mut resources = ResourceManager::new();

        let first = camera.open_stream(&StreamConstraints::default()).await.unwrap();
        resources.attach_stream(first);
        let second = camera.open_stream(&StreamConstraints::default()).await.unwrap();
        resources.attach_stream(second);

        assert_eq!(camera.live_tracks(), 1);
        assert!(resources.has_live_stream());

        assert!(resources.release_stream());
        assert!(!resources.release_stream());
        assert_eq!(camera.live_tracks(), 0);
    }

    #[tokio::test]
    async fn test_teardown_releases_everything() {
        let camera = ReplayCamera::from_takes(vec![vec![]]);
        let mut resources = ResourceManager::new();
        resources.attach_stream(camera.open_stream(&StreamConstraints::default()).await.unwrap());
        resources.object_url_for(&MediaAsset::from_recording(Bytes::from_static(b"v")));
        resources.start_timer(TimerKind::RecordingClock, std::future::pending());
        resources.start_timer(TimerKind::RequestTimeout, std::future::pending());

        resources.teardown();

        assert_eq!(camera.live_tracks(), 0);
        assert_eq!(resources.live_object_urls(), 0);
        assert_eq!(resources.active_timers(), 0);

        // Second teardown is a no-op
        resources.teardown();
    }

    #[tokio::test]
    async fn test_drop_releases_stream() {
        let camera = ReplayCamera::from_takes(vec![vec![]]);
        {
            let mut resources = ResourceManager::new();
            resources.attach_stream(camera.open_stream(&StreamConstraints::default()).await.unwrap());
            assert_eq!(camera.live_tracks(), 1);
        }
        assert_eq!(camera.live_tracks(), 0);
    }
}
