//! Headless object creation flow.
//!
//! Pages:
//!     Naming        - pick a unique, valid name
//!     SelectObject  - select the object in a camera frame; it is tracked live
//!     SelectPickup  - select the pickup area inside the object crop
//!     Done          - ready to save
//!
//! The wizard is driven by `WizardEvent`s and holds a `TrackingGuard`, so the
//! session is torn down however the flow ends.

use std::sync::Arc;

use crossbeam_channel::Receiver;
use image::RgbImage;
use tracing::{debug, info, warn};

use crate::error::TrackerError;
use crate::geometry::Rect;
use crate::objects::{ObjectStore, TrackableObject};
use crate::system::{TrackingGuard, VisionSession};
use crate::tracking::Target;

use super::naming::validate_name;

pub const NO_POINTS_MESSAGE: &str =
    "No points could be found on the selected area. Please select the object again.";
pub const WEAK_TARGET_HINT: &str =
    "Your selected object is not very detailed, or is too small. Tracking may not be very accurate.";
pub const DONE_MESSAGE: &str = "Congratulations, you've created a new object!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardPage {
    Naming,
    SelectObject,
    SelectPickup,
    Done,
}

#[derive(Debug, Clone)]
pub enum WizardEvent {
    NameEntered(String),
    /// A region selected on a camera frame.
    ObjectSelected { frame: Arc<RgbImage>, rect: Rect },
    /// Discard the current selection on this page.
    TryAgain,
    /// Accept the tracked candidate and move on.
    Next,
    /// Pickup area, relative to the object crop.
    PickupSelected { rect: Rect },
    Finish,
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardOutcome {
    Created(String),
    Cancelled,
}

pub struct ObjectWizard<'a> {
    guard: TrackingGuard<'a>,
    store: &'a dyn ObjectStore,
    forbidden: Vec<String>,
    hint_points: usize,

    page: WizardPage,
    name: Option<String>,
    candidate: Option<Arc<Target>>,
    /// In image coordinates.
    pickup_rect: Option<Rect>,
    message: String,
    hint: String,
}

impl<'a> ObjectWizard<'a> {
    pub fn new(session: &'a VisionSession, store: &'a dyn ObjectStore) -> Self {
        session.tracker_end_stop_clear();
        Self {
            guard: session.guard(),
            store,
            forbidden: store.object_ids(),
            hint_points: session.config().session.hint_points,
            page: WizardPage::Naming,
            name: None,
            candidate: None,
            pickup_rect: None,
            message: String::new(),
            hint: String::new(),
        }
    }

    pub fn page(&self) -> WizardPage {
        self.page
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn candidate(&self) -> Option<&Arc<Target>> {
        self.candidate.as_ref()
    }

    pub fn pickup_rect(&self) -> Option<Rect> {
        self.pickup_rect
    }

    /// Error or status text for the current page.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Trackability hint for the selected object.
    pub fn hint(&self) -> &str {
        &self.hint
    }

    /// Apply one event. Returns the outcome once the flow has ended.
    pub fn handle(&mut self, event: WizardEvent) -> Option<WizardOutcome> {
        match (self.page, event) {
            (_, WizardEvent::Cancel) => {
                info!("Object wizard cancelled");
                return Some(WizardOutcome::Cancelled);
            }
            (WizardPage::Naming, WizardEvent::NameEntered(raw)) => self.enter_name(&raw),
            (WizardPage::SelectObject, WizardEvent::ObjectSelected { frame, rect }) => {
                self.select_object(frame, rect)
            }
            (WizardPage::SelectObject, WizardEvent::TryAgain) => self.reset_selection(),
            (WizardPage::SelectObject, WizardEvent::Next) => {
                if self.candidate.is_some() {
                    self.pickup_rect = None;
                    self.message.clear();
                    self.page = WizardPage::SelectPickup;
                }
            }
            (WizardPage::SelectPickup | WizardPage::Done, WizardEvent::TryAgain) => {
                self.pickup_rect = None;
                self.message.clear();
                self.page = WizardPage::SelectPickup;
            }
            (WizardPage::SelectPickup, WizardEvent::PickupSelected { rect }) => {
                self.select_pickup(rect)
            }
            (WizardPage::Done, WizardEvent::Finish) => {
                if let Some(name) = self.finish() {
                    return Some(WizardOutcome::Created(name));
                }
            }
            (page, _) => debug!("Ignoring event on page {:?}", page),
        }
        None
    }

    /// Consume events until the flow ends. A closed channel counts as cancel.
    pub fn run(mut self, events: &Receiver<WizardEvent>) -> WizardOutcome {
        for event in events.iter() {
            if let Some(outcome) = self.handle(event) {
                return outcome;
            }
        }
        WizardOutcome::Cancelled
    }

    fn enter_name(&mut self, raw: &str) {
        match validate_name(raw, &self.forbidden) {
            Ok(name) => {
                self.name = Some(name);
                self.message.clear();
                self.page = WizardPage::SelectObject;
            }
            Err(e) => self.message = e.to_string(),
        }
    }

    fn select_object(&mut self, frame: Arc<RgbImage>, rect: Rect) {
        let target = match self.guard.tracker().get_target(frame, rect, None, None) {
            Ok(t) => t,
            Err(e) => {
                self.message = e.to_string();
                return;
            }
        };
        if !target.is_valid() {
            self.message = NO_POINTS_MESSAGE.to_string();
            return;
        }

        let points = target.num_points();
        self.hint = if points < self.hint_points {
            WEAK_TARGET_HINT.to_string()
        } else {
            format!("Tracking {} Points", points)
        };
        self.message = format!("Your selected object has {} points to describe it.", points);

        let target = Arc::new(target);
        self.guard.clear_targets();
        let armed = self
            .guard
            .add_target(Arc::clone(&target))
            .and_then(|()| self.guard.start_tracker());
        if let Err(e) = armed {
            warn!("Could not track candidate: {}", e);
        }
        self.guard.add_tracker_filter();
        self.candidate = Some(target);
    }

    fn reset_selection(&mut self) {
        self.candidate = None;
        self.hint.clear();
        self.message.clear();
        self.guard.tracker_end_stop_clear();
    }

    fn select_pickup(&mut self, rect: Rect) {
        let Some(candidate) = &self.candidate else {
            return;
        };
        let object_rect = candidate.rect();
        if !rect.fits_within(object_rect.width(), object_rect.height()) {
            self.message = format!("The pickup area must lie inside the object ({})", rect);
            return;
        }
        self.pickup_rect = Some(rect.translate(object_rect.x1, object_rect.y1));
        self.message = DONE_MESSAGE.to_string();
        self.page = WizardPage::Done;
    }

    /// Build the named target and save the object. On failure the user is
    /// sent back to the step that can fix it.
    fn finish(&mut self) -> Option<String> {
        let name = self.name.clone()?;
        let candidate = self.candidate.clone()?;

        let built = self.guard.tracker().get_target(
            Arc::clone(candidate.image()),
            candidate.rect(),
            Some(&name),
            self.pickup_rect,
        );
        let saved = built.and_then(|target| {
            let mut object = TrackableObject::new(name.clone());
            object.add_sample(target)?;
            self.store.save_new_object(object)
        });

        match saved {
            Ok(()) => {
                info!("Created object {:?}", name);
                Some(name)
            }
            Err(TrackerError::DuplicateName(taken)) => {
                self.message = format!("There is already an object named {}!", taken);
                self.forbidden.push(taken);
                self.name = None;
                self.page = WizardPage::Naming;
                None
            }
            Err(e) => {
                self.message = e.to_string();
                self.reset_selection();
                self.page = WizardPage::SelectObject;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackerConfig;
    use crate::objects::InMemoryObjectStore;
    use crate::tracking::frame::test_images::{noise_image, textured_image, to_rgb};
    use crate::tracking::{MatcherState, CANDIDATE_KEY};
    use image::Rgb;

    fn session() -> VisionSession {
        VisionSession::new(TrackerConfig::default()).unwrap()
    }

    fn rich_frame() -> Arc<RgbImage> {
        Arc::new(to_rgb(&noise_image(240, 240, 21)))
    }

    fn object_rect() -> Rect {
        Rect::new(20, 20, 220, 220).unwrap()
    }

    #[test]
    fn test_full_flow_creates_object() {
        let s = session();
        let store = InMemoryObjectStore::new();
        let mut wizard = ObjectWizard::new(&s, &store);

        assert!(wizard.handle(WizardEvent::NameEntered("red_box".into())).is_none());
        assert_eq!(wizard.page(), WizardPage::SelectObject);
        assert_eq!(wizard.name(), Some("Red box"));

        wizard.handle(WizardEvent::ObjectSelected {
            frame: rich_frame(),
            rect: object_rect(),
        });
        let points = wizard.candidate().unwrap().num_points();
        assert!(points >= 150);
        assert_eq!(wizard.hint(), format!("Tracking {} Points", points));
        assert_eq!(s.state(), MatcherState::Armed);
        assert!(s.is_filter_enabled());
        assert!(s.target_names().contains(CANDIDATE_KEY));

        wizard.handle(WizardEvent::Next);
        assert_eq!(wizard.page(), WizardPage::SelectPickup);
        wizard.handle(WizardEvent::PickupSelected {
            rect: Rect::new(80, 80, 120, 120).unwrap(),
        });
        assert_eq!(wizard.page(), WizardPage::Done);
        assert_eq!(wizard.pickup_rect(), Some(Rect::new(100, 100, 140, 140).unwrap()));

        let outcome = wizard.handle(WizardEvent::Finish);
        assert_eq!(outcome, Some(WizardOutcome::Created("Red box".into())));
        drop(wizard);

        let saved = store.get_object("Red box").unwrap();
        assert_eq!(saved.samples().len(), 1);
        assert_eq!(saved.samples()[0].name(), Some("Red box"));
        assert_eq!(
            saved.samples()[0].pickup_rect(),
            Some(Rect::new(100, 100, 140, 140).unwrap())
        );
        assert_eq!(s.state(), MatcherState::Idle);
        assert!(s.target_names().is_empty());
    }

    #[test]
    fn test_blank_selection_stays_on_page() {
        let s = session();
        let store = InMemoryObjectStore::new();
        let mut wizard = ObjectWizard::new(&s, &store);
        wizard.handle(WizardEvent::NameEntered("Box".into()));
        wizard.handle(WizardEvent::ObjectSelected {
            frame: Arc::new(RgbImage::from_pixel(240, 240, Rgb([90, 90, 90]))),
            rect: object_rect(),
        });
        assert_eq!(wizard.page(), WizardPage::SelectObject);
        assert!(wizard.candidate().is_none());
        assert_eq!(wizard.message(), NO_POINTS_MESSAGE);
        assert_eq!(s.state(), MatcherState::Idle);

        // Next does nothing without a candidate.
        wizard.handle(WizardEvent::Next);
        assert_eq!(wizard.page(), WizardPage::SelectObject);
    }

    #[test]
    fn test_weak_target_hint() {
        let s = session();
        let store = InMemoryObjectStore::new();
        let mut wizard = ObjectWizard::new(&s, &store);
        wizard.handle(WizardEvent::NameEntered("Box".into()));
        // A few dozen points at most.
        wizard.handle(WizardEvent::ObjectSelected {
            frame: Arc::new(to_rgb(&textured_image(240, 240, 4))),
            rect: Rect::new(20, 20, 60, 60).unwrap(),
        });
        let candidate = wizard.candidate().unwrap();
        assert!(candidate.num_points() < 150);
        assert_eq!(wizard.hint(), WEAK_TARGET_HINT);
    }

    #[test]
    fn test_invalid_name_and_try_again() {
        let s = session();
        let store = InMemoryObjectStore::new();
        let mut wizard = ObjectWizard::new(&s, &store);
        wizard.handle(WizardEvent::NameEntered("bad/name".into()));
        assert_eq!(wizard.page(), WizardPage::Naming);
        assert!(wizard.message().contains('/'));

        wizard.handle(WizardEvent::NameEntered("Box".into()));
        wizard.handle(WizardEvent::ObjectSelected {
            frame: rich_frame(),
            rect: object_rect(),
        });
        wizard.handle(WizardEvent::TryAgain);
        assert!(wizard.candidate().is_none());
        assert!(wizard.hint().is_empty());
        assert_eq!(s.state(), MatcherState::Idle);
    }

    #[test]
    fn test_pickup_outside_object_rejected() {
        let s = session();
        let store = InMemoryObjectStore::new();
        let mut wizard = ObjectWizard::new(&s, &store);
        wizard.handle(WizardEvent::NameEntered("Box".into()));
        wizard.handle(WizardEvent::ObjectSelected {
            frame: rich_frame(),
            rect: object_rect(),
        });
        wizard.handle(WizardEvent::Next);
        wizard.handle(WizardEvent::PickupSelected {
            rect: Rect::new(150, 150, 210, 210).unwrap(),
        });
        assert_eq!(wizard.page(), WizardPage::SelectPickup);
        assert!(wizard.pickup_rect().is_none());
    }

    #[test]
    fn test_duplicate_name_returns_to_naming() {
        let s = session();
        let store = InMemoryObjectStore::new();
        let mut wizard = ObjectWizard::new(&s, &store);
        wizard.handle(WizardEvent::NameEntered("Box".into()));
        wizard.handle(WizardEvent::ObjectSelected {
            frame: rich_frame(),
            rect: object_rect(),
        });
        wizard.handle(WizardEvent::Next);
        wizard.handle(WizardEvent::PickupSelected {
            rect: Rect::new(10, 10, 50, 50).unwrap(),
        });

        // Someone else saves "Box" meanwhile.
        let other = s
            .tracker()
            .get_target(rich_frame(), object_rect(), Some("Box"), None)
            .unwrap();
        let mut existing = TrackableObject::new("Box");
        existing.add_sample(other).unwrap();
        store.save_new_object(existing).unwrap();

        assert!(wizard.handle(WizardEvent::Finish).is_none());
        assert_eq!(wizard.page(), WizardPage::Naming);
        assert_eq!(store.object_ids().len(), 1);
        wizard.handle(WizardEvent::NameEntered("Box".into()));
        assert_eq!(wizard.page(), WizardPage::Naming);
    }

    #[test]
    fn test_run_over_channel_and_cancel() {
        let s = session();
        let store = InMemoryObjectStore::new();
        let (tx, rx) = crossbeam_channel::unbounded();
        tx.send(WizardEvent::NameEntered("Box".into())).unwrap();
        tx.send(WizardEvent::ObjectSelected {
            frame: rich_frame(),
            rect: object_rect(),
        })
        .unwrap();
        tx.send(WizardEvent::Cancel).unwrap();
        let outcome = ObjectWizard::new(&s, &store).run(&rx);
        assert_eq!(outcome, WizardOutcome::Cancelled);
        assert!(store.is_empty());
        assert_eq!(s.state(), MatcherState::Idle);
        assert!(!s.is_filter_enabled());

        drop(tx);
        assert_eq!(ObjectWizard::new(&s, &store).run(&rx), WizardOutcome::Cancelled);
    }
}
