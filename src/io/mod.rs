//! Frame input: raw frames, in-memory sources and recorded sequences.

pub mod frame;
pub mod sequence;

pub use frame::{Frame, FrameSource, VecSource};
pub use sequence::ImageSequence;
