//! Live matcher state machine.

/// State of the matching session.
///
/// `start` moves Idle to Armed, the first processed frame moves Armed to
/// Matching, and stop or clear returns to Idle from anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum MatcherState {
    /// No targets armed, frames are not consumed.
    #[default]
    Idle = 0,
    /// Targets armed, waiting for the first processed frame.
    Armed = 1,
    /// Steady state: every frame is matched against the registry.
    Matching = 2,
}

impl MatcherState {
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Armed,
            2 => Self::Matching,
            _ => Self::Idle,
        }
    }

    pub fn is_active(self) -> bool {
        self != Self::Idle
    }
}
