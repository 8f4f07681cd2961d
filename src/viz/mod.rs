//! Frame annotation.

pub mod overlay;

pub use overlay::draw_matches;
