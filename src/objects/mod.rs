//! Trackable objects and the store that keeps them.

pub mod store;
pub mod trackable;

pub use store::{InMemoryObjectStore, ObjectStore};
pub use trackable::TrackableObject;
