//! Error taxonomy for the tracker core.
//!
//! Glue code (IO, the binary) uses `anyhow`; everything a caller may want to
//! branch on is a `TrackerError`.

use thiserror::Error;

use crate::geometry::Rect;

#[derive(Debug, Error)]
pub enum TrackerError {
    /// A target with zero descriptors (or without a name) was offered to the
    /// registry or the object store.
    #[error("invalid target {name:?}: {reason}")]
    InvalidTarget { name: Option<String>, reason: String },

    /// The matcher was started with an empty registry.
    #[error("cannot start tracking: no targets registered")]
    NoTargets,

    /// An object with this name already exists in the store.
    #[error("an object named {0:?} already exists")]
    DuplicateName(String),

    /// The requested object or target is unknown.
    #[error("{0:?} not found")]
    NotFound(String),

    /// A region does not satisfy its geometric constraints.
    #[error("invalid rect {rect:?}: {reason}")]
    InvalidRect { rect: Rect, reason: String },

    /// A frame could not be decoded into pixels.
    #[error("corrupt frame {id}: {reason}")]
    CorruptFrame { id: u64, reason: String },

    #[error("config error: {0}")]
    Config(String),
}

impl TrackerError {
    pub fn invalid_target(name: Option<&str>, reason: impl Into<String>) -> Self {
        TrackerError::InvalidTarget {
            name: name.map(str::to_owned),
            reason: reason.into(),
        }
    }

    pub fn invalid_rect(rect: Rect, reason: impl Into<String>) -> Self {
        TrackerError::InvalidRect {
            rect,
            reason: reason.into(),
        }
    }

    pub fn corrupt_frame(id: u64, reason: impl Into<String>) -> Self {
        TrackerError::CorruptFrame {
            id,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TrackerError>;
