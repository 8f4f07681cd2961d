//! Object store: the collection of saved trackable objects.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::error::{Result, TrackerError};
use crate::tracking::Target;

use super::trackable::TrackableObject;

/// Persistence boundary for trackable objects.
///
/// Implementations decide the storage format; callers only rely on these
/// operations.
pub trait ObjectStore: Send + Sync {
    /// Names of all saved objects, sorted.
    fn object_ids(&self) -> Vec<String>;

    fn get_object(&self, name: &str) -> Option<TrackableObject>;

    /// Save an object under a new name. Fails with `DuplicateName` if the
    /// name is taken; empty objects are rejected.
    fn save_new_object(&self, object: TrackableObject) -> Result<()>;

    /// Idempotent.
    fn delete_object(&self, name: &str);

    /// Append a sample to an existing object.
    fn add_sample(&self, name: &str, target: Target) -> Result<()>;
}

#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: RwLock<BTreeMap<String, TrackableObject>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn object_ids(&self) -> Vec<String> {
        self.objects.read().keys().cloned().collect()
    }

    fn get_object(&self, name: &str) -> Option<TrackableObject> {
        self.objects.read().get(name).cloned()
    }

    fn save_new_object(&self, object: TrackableObject) -> Result<()> {
        if object.is_empty() {
            return Err(TrackerError::invalid_target(
                Some(&object.name),
                "object has no samples",
            ));
        }
        let mut objects = self.objects.write();
        if objects.contains_key(&object.name) {
            warn!("Refusing to overwrite object {:?}", object.name);
            return Err(TrackerError::DuplicateName(object.name));
        }
        info!(
            "Saved object {:?} ({} samples)",
            object.name,
            object.samples().len()
        );
        objects.insert(object.name.clone(), object);
        Ok(())
    }

    fn delete_object(&self, name: &str) {
        if self.objects.write().remove(name).is_some() {
            info!("Deleted object {:?}", name);
        }
    }

    fn add_sample(&self, name: &str, target: Target) -> Result<()> {
        let mut objects = self.objects.write();
        let object = objects
            .get_mut(name)
            .ok_or_else(|| TrackerError::NotFound(name.to_owned()))?;
        object.add_sample(target)?;
        info!(
            "Added sample to {:?} ({} samples)",
            name,
            object.samples().len()
        );
        Ok(())
    }
}
