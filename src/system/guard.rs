//! Scoped tracking acquisition.

use std::ops::Deref;

use super::session::VisionSession;

/// Borrow of a session that tears tracking down when dropped.
///
/// Every exit path of a dialog-like flow (finish, cancel, error, panic
/// unwinding) ends with `tracker_end_stop_clear`.
pub struct TrackingGuard<'a> {
    session: &'a VisionSession,
}

impl<'a> TrackingGuard<'a> {
    pub(crate) fn new(session: &'a VisionSession) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &'a VisionSession {
        self.session
    }
}

impl Deref for TrackingGuard<'_> {
    type Target = VisionSession;

    fn deref(&self) -> &VisionSession {
        self.session
    }
}

impl Drop for TrackingGuard<'_> {
    fn drop(&mut self) {
        self.session.tracker_end_stop_clear();
    }
}
