//! Timer registry
//!
//! Timers are tokio tasks keyed by purpose. Starting a timer of a kind that is
//! already running aborts the old one first.

use std::collections::HashMap;
use std::future::Future;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::debug;

/// Purpose of a registered timer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimerKind {
    /// One-second elapsed-time clock while recording
    RecordingClock,
    /// Upper bound on the remote analysis request
    RequestTimeout,
}

/// Owns running timer tasks
#[derive(Debug, Default)]
pub struct TimerRegistry {
    timers: HashMap<TimerKind, JoinHandle<()>>,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns `task` as the timer for `kind`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<F>(&mut self, kind: TimerKind, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.clear(kind);
        debug!("Starting {:?} timer", kind);
        self.timers.insert(kind, tokio::spawn(task));
    }

    /// Aborts the timer for `kind`. Returns true if one was registered.
    pub fn clear(&mut self, kind: TimerKind) -> bool {
        match self.timers.remove(&kind) {
            Some(handle) => {
                handle.abort();
                debug!("Cleared {:?} timer", kind);
                true
            }
            None => false,
        }
    }

    /// Whether a timer of `kind` is registered and still running
    pub fn is_running(&self, kind: TimerKind) -> bool {
        self.timers
            .get(&kind)
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Number of registered timers
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Aborts every registered timer
    pub fn clear_all(&mut self) {
        for (kind, handle) in self.timers.drain() {
            handle.abort();
            debug!("Cleared {:?} timer", kind);
        }
    }
}

impl Drop for TimerRegistry {
    fn drop(&mut self) {
        self.clear_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cleared_timer_never_fires() {
        let fired = Arc::new(AtomicBool::new(false));
        let mut registry = TimerRegistry::new();

        let flag = fired.clone();
        registry.start(TimerKind::RequestTimeout, async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            flag.store(true, Ordering::SeqCst);
        });
        assert!(registry.is_running(TimerKind::RequestTimeout));
        assert!(registry.clear(TimerKind::RequestTimeout));

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(!fired.load(Ordering::SeqCst));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_restarting_replaces_previous_timer() {
        let mut registry = TimerRegistry::new();
        registry.start(TimerKind::RecordingClock, std::future::pending());
        registry.start(TimerKind::RecordingClock, std::future::pending());
        assert_eq!(registry.len(), 1);

        registry.start(TimerKind::RequestTimeout, std::future::pending());
        assert_eq!(registry.len(), 2);

        registry.clear_all();
        assert!(registry.is_empty());
        assert!(!registry.clear(TimerKind::RecordingClock));
    }
}
