//! Recording session state during live capture.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::debug;

use crate::core::media::MediaAsset;
use crate::core::{format_clock, RecordingId};

/// Accumulated chunks and elapsed time of one recording
#[derive(Debug)]
pub struct RecordingSession {
    id: RecordingId,
    chunks: Vec<Bytes>,
    elapsed: Arc<AtomicU64>,
    recorder: Option<mpsc::UnboundedReceiver<Bytes>>,
    started_at: DateTime<Utc>,
}

impl RecordingSession {
    /// Starts a session fed by a recorder's data events
    pub fn new(recorder: mpsc::UnboundedReceiver<Bytes>) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            chunks: Vec::new(),
            elapsed: Arc::new(AtomicU64::new(0)),
            recorder: Some(recorder),
            started_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Appends a chunk. Empty chunks are ignored.
    pub fn append(&mut self, chunk: Bytes) -> bool {
        if chunk.is_empty() {
            return false;
        }
        self.chunks.push(chunk);
        true
    }

    /// Awaits the next recorder data event and appends it.
    ///
    /// Returns the chunk count, or `None` once the recorder has closed.
    pub async fn next_chunk(&mut self) -> Option<usize> {
        let chunk = self.recorder.as_mut()?.recv().await;
        match chunk {
            Some(chunk) => {
                self.append(chunk);
                Some(self.chunks.len())
            }
            None => {
                self.recorder = None;
                None
            }
        }
    }

    /// Appends every data event already delivered, then detaches the recorder
    pub fn drain_recorder(&mut self) {
        if let Some(mut rx) = self.recorder.take() {
            while let Ok(chunk) = rx.try_recv() {
                self.append(chunk);
            }
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn byte_len(&self) -> usize {
        self.chunks.iter().map(Bytes::len).sum()
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed.load(Ordering::SeqCst)
    }

    pub fn elapsed_label(&self) -> String {
        format_clock(self.elapsed_secs())
    }

    /// One-second clock that advances this session's elapsed counter
    pub fn clock(&self) -> impl Future<Output = ()> + Send + 'static {
        let elapsed = self.elapsed.clone();
        async move {
            let period = Duration::from_secs(1);
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            loop {
                interval.tick().await;
                elapsed.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    /// Concatenates the chunks, in arrival order, into one asset
    pub fn finalize(mut self) -> MediaAsset {
        self.drain_recorder();

        let mut payload = BytesMut::with_capacity(self.byte_len());
        for chunk in &self.chunks {
            payload.extend_from_slice(chunk);
        }
        debug!(
            "Finalized recording {} ({} chunks, {} bytes, {}s)",
            self.id,
            self.chunks.len(),
            payload.len(),
            self.elapsed_secs()
        );
        MediaAsset::from_recording(payload.freeze())
    }
}
