//! Raw camera frames and the sources that deliver them.

use std::collections::VecDeque;
use std::sync::Arc;

use image::{imageops, GrayImage, RgbImage};

use crate::error::{Result, TrackerError};

/// One RGB8 frame as delivered by a camera or a recorded sequence.
///
/// Pixel data is shared, so cloning a frame is cheap.
#[derive(Debug, Clone)]
pub struct Frame {
    pub id: u64,
    pub timestamp_ns: u64,
    pub width: u32,
    pub height: u32,
    pub data: Arc<Vec<u8>>,
}

impl Frame {
    pub fn new(id: u64, timestamp_ns: u64, width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            id,
            timestamp_ns,
            width,
            height,
            data: Arc::new(data),
        }
    }

    pub fn from_rgb(id: u64, timestamp_ns: u64, image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self::new(id, timestamp_ns, width, height, image.into_raw())
    }

    /// A frame without pixels (e.g. a file that failed to decode).
    pub fn corrupt(id: u64, timestamp_ns: u64) -> Self {
        Self::new(id, timestamp_ns, 0, 0, Vec::new())
    }

    pub fn to_rgb(&self) -> Result<RgbImage> {
        if self.width == 0 || self.height == 0 {
            return Err(TrackerError::corrupt_frame(self.id, "zero-sized frame"));
        }
        let expected = self.width as usize * self.height as usize * 3;
        if self.data.len() != expected {
            return Err(TrackerError::corrupt_frame(
                self.id,
                format!("expected {} bytes, got {}", expected, self.data.len()),
            ));
        }
        RgbImage::from_raw(self.width, self.height, self.data.as_ref().clone())
            .ok_or_else(|| TrackerError::corrupt_frame(self.id, "buffer does not match size"))
    }

    pub fn to_gray(&self) -> Result<GrayImage> {
        Ok(imageops::grayscale(&self.to_rgb()?))
    }
}

/// Anything that yields frames one at a time. `None` means the source is
/// exhausted.
pub trait FrameSource {
    fn next_frame(&mut self) -> Option<Frame>;
}

/// In-memory frame list.
#[derive(Debug, Default)]
pub struct VecSource {
    frames: VecDeque<Frame>,
}

impl VecSource {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames: frames.into(),
        }
    }

    /// Number the images consecutively from zero.
    pub fn from_images(images: Vec<RgbImage>) -> Self {
        Self::new(
            images
                .into_iter()
                .enumerate()
                .map(|(i, img)| Frame::from_rgb(i as u64, i as u64, img))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FrameSource for VecSource {
    fn next_frame(&mut self) -> Option<Frame> {
        self.frames.pop_front()
    }
}
