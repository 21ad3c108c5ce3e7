//! Frame container.
//!
//! - `Frame`: one RGB24 image sample with its source-relative index.
//!
//! A frame belongs to the loop tick that pulled it. The pixel buffer is private
//! and validated at construction, so every `Frame` in the pipeline satisfies
//! `pixels().len() == width * height * 3`.

use anyhow::{anyhow, Result};
use image::RgbImage;
use std::time::Duration;

/// Bytes per pixel in the RGB24 layout used throughout the pipeline.
pub const CHANNELS: usize = 3;

/// One sampled image from a frame source.
///
/// Cloning copies the pixel buffer; the renderer relies on that to leave the
/// source frame untouched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Row-major RGB24 pixels. Never exposed mutably.
    data: Vec<u8>,
    width: u32,
    height: u32,
    /// Zero-based, monotonic within one source.
    index: u64,
    /// Nominal presentation time derived from the source frame rate.
    timestamp: Option<Duration>,
}

impl Frame {
    /// Build a frame from row-major RGB24 pixels.
    pub fn new(data: Vec<u8>, width: u32, height: u32, index: u64) -> Result<Self> {
        let expected = expected_len(width, height)?;
        if data.len() != expected {
            return Err(anyhow!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            index,
            timestamp: None,
        })
    }

    /// Attach the nominal timestamp for a source running at `fps`.
    pub fn with_nominal_rate(mut self, fps: f64) -> Self {
        self.timestamp = nominal_timestamp(self.index, fps);
        self
    }

    /// Build a frame from an `image` buffer, keeping the index and timestamp of `like`.
    pub(crate) fn from_image_like(image: RgbImage, like: &Frame) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            data: image.into_raw(),
            index: like.index,
            timestamp: like.timestamp,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn timestamp(&self) -> Option<Duration> {
        self.timestamp
    }

    /// Read-only pixel access for detectors, displays and writers.
    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// Copy the pixels into an `image` buffer for drawing or encoding.
    pub fn to_rgb_image(&self) -> RgbImage {
        // Length is validated in `new`, so the buffer always fits.
        RgbImage::from_raw(self.width, self.height, self.data.clone())
            .unwrap_or_else(|| RgbImage::new(self.width, self.height))
    }

    /// RGB value at `(x, y)`, or `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * CHANNELS;
        Some([
            self.data[offset],
            self.data[offset + 1],
            self.data[offset + 2],
        ])
    }
}

pub(crate) fn expected_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(CHANNELS))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}

fn nominal_timestamp(index: u64, fps: f64) -> Option<Duration> {
    if !fps.is_finite() || fps <= 0.0 {
        return None;
    }
    Some(Duration::from_secs_f64(index as f64 / fps))
}
