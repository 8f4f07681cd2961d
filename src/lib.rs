pub mod config;
pub mod error;
pub mod geometry;
pub mod io;
pub mod objects;
pub mod system;
pub mod tracking;
pub mod viz;
pub mod wizard;

pub use config::TrackerConfig;
pub use error::{Result, TrackerError};
