//! Vision session - entry point and matcher thread orchestration.
//!
//! The `VisionSession` is the top-level struct callers interact with. It owns
//! the shared state and spawns the matcher thread. Frames are handed over
//! without blocking; a frame that arrives while a pass is still running is
//! dropped.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use tracing::{debug, info, warn};

use crate::config::TrackerConfig;
use crate::error::TrackerError;
use crate::io::Frame;
use crate::tracking::{FrameMatches, MatcherState, Target, Tracker};

use super::guard::TrackingGuard;
use super::messages::{SessionEvent, SkipReason};
use super::shared_state::SharedState;

/// Top-level session: target registry, matcher thread and annotation state.
pub struct VisionSession {
    /// Shared state (registry, flags, latest result) accessible by all threads.
    shared: Arc<SharedState>,

    /// Extractor, builder and matcher, shared with the matcher thread.
    tracker: Arc<Tracker>,

    config: TrackerConfig,

    /// Channel sender for frames (caller -> matcher thread).
    frame_sender: Option<Sender<Frame>>,

    /// Handle to the matcher thread.
    matcher_handle: Option<JoinHandle<()>>,
}

impl VisionSession {
    /// Create a session and spawn its matcher thread.
    pub fn new(config: TrackerConfig) -> Result<Self> {
        let shared = SharedState::new();
        let tracker = Arc::new(Tracker::new(&config));

        let (frame_sender, frame_receiver) = bounded::<Frame>(config.session.frame_queue.max(1));
        let poll = Duration::from_millis(config.session.poll_interval_ms.max(1));
        let matcher_handle =
            Self::spawn_matcher(Arc::clone(&shared), Arc::clone(&tracker), frame_receiver, poll)?;

        info!("Vision session started");
        Ok(Self {
            shared,
            tracker,
            config,
            frame_sender: Some(frame_sender),
            matcher_handle: Some(matcher_handle),
        })
    }

    fn spawn_matcher(
        shared: Arc<SharedState>,
        tracker: Arc<Tracker>,
        frame_receiver: Receiver<Frame>,
        poll: Duration,
    ) -> Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("matcher".into())
            .spawn(move || run_matcher(shared, tracker, frame_receiver, poll))
            .context("Failed to spawn matcher thread")
    }

    /// Extractor + target builder + live matcher facade.
    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub(crate) fn shared(&self) -> &SharedState {
        &self.shared
    }

    /// Register (or replace) a target. Fails on targets without descriptors.
    pub fn add_target(&self, target: impl Into<Arc<Target>>) -> crate::error::Result<()> {
        self.shared.registry.write().add_target(target.into())
    }

    /// No-op if absent. Removing the last target stops the matcher.
    pub fn remove_target(&self, name: &str) {
        let mut registry = self.shared.registry.write();
        if registry.remove_target(name) && registry.is_empty() && self.shared.state().is_active() {
            self.shared.bump_epoch();
            self.shared.clear_latest();
            self.shared.set_state(MatcherState::Idle);
        }
    }

    /// Drop every target and stop matching. The filter flag is kept.
    pub fn clear_targets(&self) {
        let mut registry = self.shared.registry.write();
        registry.clear();
        self.shared.bump_epoch();
        self.shared.clear_latest();
        self.shared.set_state(MatcherState::Idle);
    }

    pub fn target_names(&self) -> std::collections::BTreeSet<String> {
        self.shared.registry.read().list_names()
    }

    /// Idle -> Armed. Already running sessions stay as they are.
    pub fn start_tracker(&self) -> crate::error::Result<()> {
        let registry = self.shared.registry.read();
        if registry.is_empty() {
            return Err(TrackerError::NoTargets);
        }
        if !self.shared.state().is_active() {
            info!("Tracking {} targets", registry.len());
            self.shared.set_state(MatcherState::Armed);
        }
        Ok(())
    }

    /// Any state -> Idle. Registered targets are kept; in-flight results are
    /// discarded.
    pub fn end_tracker(&self) {
        let _registry = self.shared.registry.write();
        self.shared.bump_epoch();
        self.shared.clear_latest();
        self.shared.set_state(MatcherState::Idle);
    }

    pub fn add_tracker_filter(&self) {
        self.shared.set_filter_enabled(true);
    }

    pub fn end_tracker_filter(&self) {
        self.shared.set_filter_enabled(false);
    }

    pub fn is_filter_enabled(&self) -> bool {
        self.shared.is_filter_enabled()
    }

    /// End filter, stop and clear as one step.
    ///
    /// Safe to call with no pass in flight. Once this returns no result
    /// computed before it is ever published.
    pub fn tracker_end_stop_clear(&self) {
        let mut registry = self.shared.registry.write();
        self.shared.set_filter_enabled(false);
        registry.clear();
        self.shared.bump_epoch();
        self.shared.clear_latest();
        self.shared.set_state(MatcherState::Idle);
        debug!("Tracker ended, stopped and cleared");
    }

    /// Scoped tracking: `tracker_end_stop_clear` runs when the guard drops.
    pub fn guard(&self) -> TrackingGuard<'_> {
        TrackingGuard::new(self)
    }

    /// Hand a frame to the matcher thread without waiting.
    ///
    /// Returns `false` if the frame was not queued: the session is idle, the
    /// matcher is still busy, or the session is closed.
    pub fn submit_frame(&self, frame: Frame) -> bool {
        if !self.shared.state().is_active() {
            return false;
        }
        let Some(sender) = &self.frame_sender else {
            return false;
        };
        match sender.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(frame)) => {
                debug!("Matcher busy, dropping frame {}", frame.id);
                self.shared.emit(SessionEvent::FrameSkipped {
                    frame_id: frame.id,
                    reason: SkipReason::Busy,
                });
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Run one pass on the calling thread and publish it like the matcher
    /// thread would.
    pub fn match_now(&self, frame: &Frame) -> Option<Arc<FrameMatches>> {
        run_pass(&self.shared, &self.tracker, frame)
    }

    /// Last completed, still valid result.
    pub fn latest_result(&self) -> Option<Arc<FrameMatches>> {
        self.shared.latest()
    }

    pub fn subscribe(&self) -> Receiver<SessionEvent> {
        self.shared.subscribe()
    }

    pub fn state(&self) -> MatcherState {
        self.shared.state()
    }

    /// Tear down, stop the matcher thread and wait for it.
    pub fn close(&mut self) {
        if self.matcher_handle.is_none() {
            return;
        }
        self.tracker_end_stop_clear();
        self.shared.request_shutdown();
        // Dropping the sender wakes the thread if it is blocked on recv.
        self.frame_sender = None;
        if let Some(handle) = self.matcher_handle.take() {
            if handle.join().is_err() {
                warn!("Matcher thread panicked");
            }
        }
        info!("Vision session closed");
    }
}

impl Drop for VisionSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Matcher thread loop: receive frames and match them.
///
/// This runs until shutdown is requested or the channel is closed.
fn run_matcher(
    shared: Arc<SharedState>,
    tracker: Arc<Tracker>,
    frame_receiver: Receiver<Frame>,
    poll: Duration,
) {
    debug!("Matcher thread running");
    loop {
        if shared.is_shutdown_requested() {
            break;
        }
        match frame_receiver.recv_timeout(poll) {
            Ok(frame) => {
                run_pass(&shared, &tracker, &frame);
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!("Matcher thread exiting");
}

/// Match one frame against a registry snapshot and publish the result if
/// the session was not stopped or modified meanwhile.
fn run_pass(shared: &SharedState, tracker: &Tracker, frame: &Frame) -> Option<Arc<FrameMatches>> {
    let (snapshot, epoch) = {
        let registry = shared.registry.read();
        (registry.snapshot(), shared.epoch())
    };
    if !shared.state().is_active() || snapshot.targets.is_empty() {
        return None;
    }

    let gray = match frame.to_gray() {
        Ok(gray) => gray,
        Err(e) => {
            warn!("Skipping frame: {}", e);
            shared.emit(SessionEvent::FrameSkipped {
                frame_id: frame.id,
                reason: SkipReason::Corrupt,
            });
            return None;
        }
    };

    let result = Arc::new(tracker.matcher().process_frame(
        frame.id,
        &gray,
        &snapshot.targets,
        snapshot.generation,
    ));
    shared
        .publish(Arc::clone(&result), epoch)
        .then_some(result)
}
