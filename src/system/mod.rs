//! Session orchestration and thread management.
//!
//! This module contains the top-level `VisionSession` that spawns and
//! coordinates the matcher thread, along with shared state, published
//! events, scoped teardown and the annotated frame stream.

pub mod filtered_stream;
pub mod guard;
pub mod messages;
pub mod shared_state;
mod session;

pub use filtered_stream::FilteredStream;
pub use guard::TrackingGuard;
pub use messages::{SessionEvent, SkipReason};
pub use shared_state::SharedState;
pub use session::VisionSession;
