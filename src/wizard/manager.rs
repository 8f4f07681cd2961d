//! Object manager model: list, inspect, track and delete saved objects.

use std::sync::Arc;

use crossbeam_channel::Receiver;
use image::RgbImage;
use tracing::{info, warn};

use crate::error::{Result, TrackerError};
use crate::geometry::Rect;
use crate::objects::ObjectStore;
use crate::system::VisionSession;

use super::object_wizard::{ObjectWizard, WizardEvent, WizardOutcome};

const ICON_MAX_HEIGHT: u32 = 150;
const ICON_MAX_WIDTH: u32 = 350;

/// What the manager shows for the selected object.
#[derive(Debug, Clone)]
pub struct ObjectSummary {
    pub name: String,
    pub average_points: usize,
    pub num_samples: usize,
    pub icon: Option<RgbImage>,
}

impl ObjectSummary {
    pub fn description(&self) -> String {
        format!(
            "Name:\n\t{}\n\n# of Points: \n{}\n\nSamples:\n\t{}",
            self.name, self.average_points, self.num_samples
        )
    }
}

pub struct ObjectManager<'a> {
    session: &'a VisionSession,
    store: &'a dyn ObjectStore,
    ids: Vec<String>,
    selected: Option<String>,
    summary: Option<ObjectSummary>,
}

impl<'a> ObjectManager<'a> {
    pub fn new(session: &'a VisionSession, store: &'a dyn ObjectStore) -> Self {
        let mut manager = Self {
            session,
            store,
            ids: Vec::new(),
            selected: None,
            summary: None,
        };
        manager.refresh(None);
        manager
    }

    pub fn object_ids(&self) -> &[String] {
        &self.ids
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Description and icon of the selected object.
    pub fn summary(&self) -> Option<&ObjectSummary> {
        self.summary.as_ref()
    }

    /// Reload the sorted object list and stop any tracking.
    ///
    /// If `select` still exists it is selected again, which restarts
    /// tracking of its samples.
    pub fn refresh(&mut self, select: Option<&str>) -> Option<&ObjectSummary> {
        let mut ids = self.store.object_ids();
        ids.sort();
        self.session.tracker_end_stop_clear();
        self.ids = ids;
        self.selected = None;
        self.summary = None;

        if let Some(name) = select.filter(|name| self.ids.iter().any(|id| id.as_str() == *name)) {
            if let Err(e) = self.select(name) {
                warn!("Could not reselect {:?}: {}", name, e);
            }
        }
        self.summary.as_ref()
    }

    /// Select an object and start tracking all of its samples.
    ///
    /// Sample 0 is registered under the object name, sample `i > 0` as
    /// `"<name>#<i>"`. Unknown objects stop tracking and clear the selection.
    pub fn select(&mut self, name: &str) -> Result<ObjectSummary> {
        let Some(object) = self.store.get_object(name) else {
            warn!("Object {:?} not found", name);
            self.session.tracker_end_stop_clear();
            self.selected = None;
            self.summary = None;
            return Err(TrackerError::NotFound(name.to_owned()));
        };
        if object.is_empty() {
            warn!("Object {:?} has no samples", name);
            self.session.tracker_end_stop_clear();
            self.selected = None;
            self.summary = None;
            return Err(TrackerError::invalid_target(Some(name), "object has no samples"));
        }

        self.session.clear_targets();
        for (i, sample) in object.samples().iter().enumerate() {
            let target = if i == 0 {
                sample.clone()
            } else {
                sample.renamed(format!("{}#{}", name, i))
            };
            self.session.add_target(target)?;
        }
        self.session.start_tracker()?;
        self.session.add_tracker_filter();
        self.selected = Some(name.to_owned());

        let summary = ObjectSummary {
            name: object.name.clone(),
            average_points: object.average_points(),
            num_samples: object.samples().len(),
            icon: object.icon(ICON_MAX_HEIGHT, ICON_MAX_WIDTH),
        };
        self.summary = Some(summary.clone());
        Ok(summary)
    }

    /// Delete the selected object if the user confirmed, then refresh.
    pub fn delete_selected(&mut self, confirmed: bool) {
        let Some(name) = self.selected.clone() else {
            warn!("Delete requested with no object selected");
            return;
        };
        if confirmed {
            self.store.delete_object(&name);
            info!("Deleted {:?}", name);
        }
        self.refresh(None);
    }

    /// Append a new sample to an existing object.
    pub fn add_sample(
        &mut self,
        name: &str,
        frame: Arc<RgbImage>,
        rect: Rect,
        pickup_rect: Option<Rect>,
    ) -> Result<()> {
        let target = self
            .session
            .tracker()
            .get_target(frame, rect, Some(name), pickup_rect)?;
        self.store.add_sample(name, target)?;
        self.refresh(Some(name));
        Ok(())
    }

    /// Run the object wizard; a created object ends up selected in the list.
    pub fn open_wizard(&mut self, events: &Receiver<WizardEvent>) -> WizardOutcome {
        info!("Opening object wizard");
        let outcome = ObjectWizard::new(self.session, self.store).run(events);
        match &outcome {
            WizardOutcome::Created(name) => {
                self.refresh(Some(name.as_str()));
            }
            WizardOutcome::Cancelled => {
                self.refresh(None);
            }
        }
        outcome
    }

    /// Stop tracking before the manager goes away.
    pub fn close(&mut self) {
        self.session.tracker_end_stop_clear();
    }
}
