//! Frame stream that hands out annotated frames without waiting on matching.

use image::RgbImage;
use tracing::warn;

use crate::io::FrameSource;
use crate::viz::draw_matches;

use super::session::VisionSession;

/// Wraps a frame source: every frame is submitted to the session and
/// returned immediately, annotated with the last completed result when the
/// filter is on and tracking is active.
pub struct FilteredStream<'a, S: FrameSource> {
    source: S,
    session: &'a VisionSession,
}

impl<'a, S: FrameSource> FilteredStream<'a, S> {
    pub fn new(source: S, session: &'a VisionSession) -> Self {
        Self { source, session }
    }

    /// Next `(frame, id)` pair; `None` once the source is exhausted.
    /// Corrupt frames are skipped.
    pub fn get_filtered_with_id(&mut self) -> Option<(RgbImage, u64)> {
        loop {
            let frame = self.source.next_frame()?;
            let id = frame.id;
            let mut image = match frame.to_rgb() {
                Ok(image) => image,
                Err(e) => {
                    warn!("Dropping frame from stream: {}", e);
                    continue;
                }
            };
            self.session.submit_frame(frame);

            self.session
                .shared()
                .with_annotation(|latest| draw_matches(&mut image, latest));
            return Some((image, id));
        }
    }
}

impl<S: FrameSource> Iterator for FilteredStream<'_, S> {
    type Item = (RgbImage, u64);

    fn next(&mut self) -> Option<Self::Item> {
        self.get_filtered_with_id()
    }
}
