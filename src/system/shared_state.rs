//! Shared state between the caller-facing session and the matcher thread.
//!
//! The `SharedState` struct holds all data that needs to be accessed by
//! both sides, protected by appropriate synchronization primitives.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::tracking::{FrameMatches, MatcherState, TargetRegistry};

use super::messages::SessionEvent;

/// Shared state accessible by the session handle and the matcher thread.
pub struct SharedState {
    /// Targets eligible for matching.
    /// Protected by RwLock: the matcher reads snapshots, callers mutate.
    /// Teardown also takes the write lock so it is ordered against publishing.
    pub(crate) registry: RwLock<TargetRegistry>,

    /// Current `MatcherState`, stored as its discriminant.
    state: AtomicU8,

    /// Bumped on every stop/clear. A pass whose epoch is stale is discarded.
    epoch: AtomicU64,

    /// Whether frames handed to the caller are annotated.
    filter_enabled: AtomicBool,

    /// Last published match result.
    latest: RwLock<Option<Arc<FrameMatches>>>,

    subscribers: Mutex<Vec<Sender<SessionEvent>>>,

    /// Request the matcher thread to exit.
    shutdown_requested: AtomicBool,
}

impl SharedState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn state(&self) -> MatcherState {
        MatcherState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Set the state and notify subscribers if it changed.
    pub fn set_state(&self, state: MatcherState) {
        let prev = MatcherState::from_u8(self.state.swap(state as u8, Ordering::SeqCst));
        if prev != state {
            debug!("Matcher state {:?} -> {:?}", prev, state);
            self.emit(SessionEvent::StateChanged(state));
        }
    }

    /// Armed -> Matching on the first published frame.
    fn mark_matching(&self) {
        if self
            .state
            .compare_exchange(
                MatcherState::Armed as u8,
                MatcherState::Matching as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
        {
            debug!("Matcher state Armed -> Matching");
            self.emit(SessionEvent::StateChanged(MatcherState::Matching));
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Invalidate every pass started before this call.
    pub fn bump_epoch(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_filter_enabled(&self) -> bool {
        self.filter_enabled.load(Ordering::SeqCst)
    }

    pub fn set_filter_enabled(&self, value: bool) {
        self.filter_enabled.store(value, Ordering::SeqCst);
    }

    pub fn latest(&self) -> Option<Arc<FrameMatches>> {
        self.latest.read().clone()
    }

    pub fn clear_latest(&self) {
        *self.latest.write() = None;
    }

    /// Run `f` on the latest result if the filter is on and matching is
    /// active.
    ///
    /// Holds the registry read lock for the duration of `f`, so a teardown
    /// either completes before (and `f` is not called) or waits for `f`.
    pub fn with_annotation<R>(&self, f: impl FnOnce(&FrameMatches) -> R) -> Option<R> {
        let _registry = self.registry.read();
        if !self.is_filter_enabled() || !self.state().is_active() {
            return None;
        }
        let latest = self.latest.read();
        latest.as_deref().map(f)
    }

    /// Publish a finished pass if nothing invalidated it meanwhile.
    ///
    /// The registry read lock is held across the check and the publication,
    /// so a concurrent teardown either happens entirely before (and the
    /// result is dropped) or entirely after.
    pub fn publish(&self, result: Arc<FrameMatches>, epoch: u64) -> bool {
        let registry = self.registry.read();
        if self.epoch() != epoch
            || registry.generation() != result.generation
            || !self.state().is_active()
        {
            debug!("Discarding stale result for frame {}", result.frame_id);
            return false;
        }
        *self.latest.write() = Some(Arc::clone(&result));
        self.mark_matching();
        self.emit(SessionEvent::Matched(result));
        drop(registry);
        true
    }

    pub fn subscribe(&self) -> Receiver<SessionEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Send to every live subscriber, forgetting the disconnected ones.
    pub fn emit(&self, event: SessionEvent) {
        self.subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Request shutdown of the matcher thread.
    pub fn request_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::SeqCst);
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self {
            registry: RwLock::new(TargetRegistry::new()),
            state: AtomicU8::new(MatcherState::Idle as u8),
            epoch: AtomicU64::new(0),
            filter_enabled: AtomicBool::new(false),
            latest: RwLock::new(None),
            subscribers: Mutex::new(Vec::new()),
            shutdown_requested: AtomicBool::new(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_change_events() {
        let shared = SharedState::new();
        let rx = shared.subscribe();
        shared.set_state(MatcherState::Armed);
        shared.set_state(MatcherState::Armed);
        shared.set_state(MatcherState::Idle);
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                SessionEvent::StateChanged(MatcherState::Armed),
                SessionEvent::StateChanged(MatcherState::Idle)
            ]
        );
    }

    #[test]
    fn test_stale_epoch_not_published() {
        let shared = SharedState::new();
        shared.set_state(MatcherState::Armed);
        let epoch = shared.epoch();
        shared.bump_epoch();
        let result = Arc::new(FrameMatches::empty(1, 0));
        assert!(!shared.publish(result.clone(), epoch));
        assert!(shared.latest().is_none());

        assert!(shared.publish(result, shared.epoch()));
        assert!(shared.latest().is_some());
        assert_eq!(shared.state(), MatcherState::Matching);
    }

    #[test]
    fn test_annotation_needs_filter_and_active_state() {
        let shared = SharedState::new();
        shared.set_state(MatcherState::Armed);
        assert!(shared.publish(Arc::new(FrameMatches::empty(4, 0)), shared.epoch()));
        assert!(shared.with_annotation(|m| m.frame_id).is_none());

        shared.set_filter_enabled(true);
        assert_eq!(shared.with_annotation(|m| m.frame_id), Some(4));

        shared.set_state(MatcherState::Idle);
        assert!(shared.with_annotation(|m| m.frame_id).is_none());
    }

    #[test]
    fn test_idle_session_not_published() {
        let shared = SharedState::new();
        let result = Arc::new(FrameMatches::empty(1, 0));
        assert!(!shared.publish(result, shared.epoch()));
    }

    #[test]
    fn test_dropped_subscriber_forgotten() {
        let shared = SharedState::new();
        let rx = shared.subscribe();
        drop(rx);
        shared.set_state(MatcherState::Armed);
        assert!(shared.subscribers.lock().is_empty());
    }
}
