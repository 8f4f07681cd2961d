//! Recorded image sequences.
//!
//! Layout:
//!
//! ```text
//! <root>/data.csv     # timestamp_ns,filename  ('#' lines are comments)
//! <root>/data/<filename>
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use csv::ReaderBuilder;
use tracing::warn;

use super::frame::{Frame, FrameSource};

#[derive(Debug, Clone)]
pub struct ImageEntry {
    pub timestamp_ns: u64,
    pub filename: String,
}

#[derive(Debug)]
pub struct ImageSequence {
    root: PathBuf,
    pub entries: Vec<ImageEntry>,
    cursor: usize,
}

impl ImageSequence {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let entries = load_image_list(root.join("data.csv"))?;
        Ok(Self {
            root,
            entries,
            cursor: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decode frame `idx`. Undecodable files give an empty (corrupt) frame.
    pub fn frame(&self, idx: usize) -> Option<Frame> {
        let entry = self.entries.get(idx)?;
        let path = self.root.join("data").join(&entry.filename);
        let id = idx as u64;
        match image::open(&path) {
            Ok(img) => Some(Frame::from_rgb(id, entry.timestamp_ns, img.to_rgb8())),
            Err(e) => {
                warn!("Failed to decode {}: {}", path.display(), e);
                Some(Frame::corrupt(id, entry.timestamp_ns))
            }
        }
    }
}

impl FrameSource for ImageSequence {
    fn next_frame(&mut self) -> Option<Frame> {
        let frame = self.frame(self.cursor)?;
        self.cursor += 1;
        Some(frame)
    }
}

fn load_image_list(csv_path: PathBuf) -> Result<Vec<ImageEntry>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'#'))
        .from_path(&csv_path)
        .with_context(|| format!("Failed to open {}", csv_path.display()))?;

    let mut entries = Vec::new();
    for rec in rdr.records() {
        let rec = rec?;
        if rec.len() < 2 {
            continue;
        }
        let ts: u64 = rec[0]
            .trim()
            .parse()
            .with_context(|| format!("Bad timestamp {:?} in {}", &rec[0], csv_path.display()))?;
        entries.push(ImageEntry {
            timestamp_ns: ts,
            filename: rec[1].trim().to_string(),
        });
    }
    Ok(entries)
}
