//! Set of targets eligible for live matching.
//!
//! Every mutation bumps a generation counter so a matching pass can tell
//! whether the set it matched against is still current.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{Result, TrackerError};
use crate::tracking::target::Target;

/// Consistent view of the registry taken at one instant.
#[derive(Debug, Clone, Default)]
pub struct RegistrySnapshot {
    pub targets: Vec<Arc<Target>>,
    pub generation: u64,
}

#[derive(Debug, Default)]
pub struct TargetRegistry {
    targets: BTreeMap<String, Arc<Target>>,
    generation: u64,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace by name. Anonymous targets use the candidate key.
    pub fn add_target(&mut self, target: Arc<Target>) -> Result<()> {
        if !target.is_valid() {
            return Err(TrackerError::invalid_target(
                target.name(),
                "target has no descriptors",
            ));
        }
        let key = target.registry_key().to_owned();
        let replaced = self.targets.insert(key.clone(), target).is_some();
        self.generation += 1;
        if replaced {
            debug!("Replaced target {:?}", key);
        } else {
            debug!("Registered target {:?} ({} total)", key, self.targets.len());
        }
        Ok(())
    }

    /// No-op if absent.
    pub fn remove_target(&mut self, name: &str) -> bool {
        let removed = self.targets.remove(name).is_some();
        if removed {
            self.generation += 1;
            debug!("Removed target {:?}", name);
        }
        removed
    }

    pub fn clear(&mut self) {
        if !self.targets.is_empty() {
            info!("Clearing {} targets", self.targets.len());
        }
        self.targets.clear();
        self.generation += 1;
    }

    pub fn list_names(&self) -> BTreeSet<String> {
        self.targets.keys().cloned().collect()
    }

    pub fn get(&self, name: &str) -> Option<Arc<Target>> {
        self.targets.get(name).cloned()
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            targets: self.targets.values().cloned().collect(),
            generation: self.generation,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
