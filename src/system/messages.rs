//! Events published by a running session.
//!
//! Subscribers receive these over unbounded channels, in the order the
//! session produced them.

use std::sync::Arc;

use crate::tracking::{FrameMatches, MatcherState};

/// Why a frame was not matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A pass was still running and the frame queue was full.
    Busy,
    /// The frame could not be decoded.
    Corrupt,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A pass finished and its result is now `latest_result`.
    Matched(Arc<FrameMatches>),
    FrameSkipped { frame_id: u64, reason: SkipReason },
    StateChanged(MatcherState),
}
