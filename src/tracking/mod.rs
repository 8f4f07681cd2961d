//! Tracking: turns image regions into targets and finds them in live frames.
//!
//! - Frame processing (FAST + steered BRIEF extraction)
//! - Target building and the target registry
//! - Descriptor matching and homography verification
//! - Live matcher state machine

pub mod frame;
pub mod matching;
pub mod registry;
pub mod result;
pub mod state;
pub mod target;
pub mod tracker;

pub use registry::{RegistrySnapshot, TargetRegistry};
pub use result::{FrameMatches, TargetMatch};
pub use state::MatcherState;
pub use target::{Sample, Target, TargetBuilder, CANDIDATE_KEY};
pub use tracker::{LiveMatcher, Tracker};
