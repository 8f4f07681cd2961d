use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use planar_tracker::geometry::Rect;
use planar_tracker::io::ImageSequence;
use planar_tracker::system::{FilteredStream, SessionEvent, VisionSession};
use planar_tracker::TrackerConfig;

const USAGE: &str = "usage: planar-tracker <sequence_dir> <sample_image> <x1,y1,x2,y2> [config.yaml]";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 3 {
        bail!(USAGE);
    }
    let sequence_path = &args[0];
    let sample_path = &args[1];
    let rect: Rect = args[2]
        .parse()
        .with_context(|| format!("Bad rect {:?}", args[2]))?;
    let config = match args.get(3) {
        Some(path) => TrackerConfig::from_yaml_file(path)?,
        None => TrackerConfig::default(),
    };

    info!("Loading sequence from: {}", sequence_path);
    let sequence = ImageSequence::new(sequence_path)?;
    info!("Loaded {} frames", sequence.len());

    let sample = image::open(sample_path)
        .with_context(|| format!("Failed to read sample image {}", sample_path))?
        .to_rgb8();

    let session = VisionSession::new(config)?;
    let target = session
        .tracker()
        .get_target(Arc::new(sample), rect, Some("Target"), None)?;
    if !target.is_valid() {
        bail!("No features found inside {}; pick a more detailed region", rect);
    }
    info!("Target has {} points", target.num_points());
    if target.num_points() < session.config().session.hint_points {
        warn!("Target is not very detailed, or is too small. Tracking may not be very accurate.");
    }

    session.add_target(target)?;
    session.start_tracker()?;
    session.add_tracker_filter();
    let events = session.subscribe();

    let mut n_frames = 0usize;
    let mut n_found = 0usize;
    for (_image, id) in FilteredStream::new(sequence, &session) {
        n_frames += 1;
        // Give the matcher a moment so recorded sequences are not drained
        // faster than they can be matched.
        if let Ok(event) = events.recv_timeout(Duration::from_millis(200)) {
            log_event(&event, &mut n_found);
        }
        for event in events.try_iter() {
            log_event(&event, &mut n_found);
        }
        if id % 100 == 0 {
            info!("Frame {}", id);
        }
    }

    session.tracker_end_stop_clear();
    info!("Done! Streamed {} frames, target found in {}", n_frames, n_found);
    Ok(())
}

fn log_event(event: &SessionEvent, n_found: &mut usize) {
    match event {
        SessionEvent::Matched(result) => {
            for m in result.results.values() {
                if m.found {
                    *n_found += 1;
                    if let Some(quad) = &m.quad {
                        let c = quad.center();
                        info!(
                            "Frame {}: {} found ({} inliers) at ({:.1}, {:.1})",
                            result.frame_id, m.name, m.inliers, c.x, c.y
                        );
                    }
                } else {
                    info!(
                        "Frame {}: {} not found ({} matches)",
                        result.frame_id, m.name, m.matches
                    );
                }
            }
        }
        SessionEvent::FrameSkipped { frame_id, reason } => {
            info!("Frame {} skipped: {:?}", frame_id, reason);
        }
        SessionEvent::StateChanged(state) => info!("Matcher {:?}", state),
    }
}
