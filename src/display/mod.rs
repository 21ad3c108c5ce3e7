//! Presentation of annotated frames.
//!
//! With the `display-opencv` feature, `window::open_window` shows frames in
//! an OpenCV HighGUI window and reads pause/quit keys from it. Without it (or
//! with `--headless`), `PreviewDisplay` keeps a JPEG of the most recent
//! annotated frame on disk for any image viewer that reloads on change, and
//! `HeadlessDisplay` drops frames for batch runs.

use anyhow::Context;
use image::codecs::jpeg::JpegEncoder;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::error::PipelineError;
use crate::frame::Frame;

#[cfg(feature = "display-opencv")]
pub mod window;

const PREVIEW_QUALITY: u8 = 85;

pub trait Display {
    fn show(&mut self, frame: &Frame) -> Result<(), PipelineError>;
}

/// Discards frames.
#[derive(Default)]
pub struct HeadlessDisplay {
    shown: u64,
}

impl HeadlessDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_shown(&self) -> u64 {
        self.shown
    }
}

impl Display for HeadlessDisplay {
    fn show(&mut self, frame: &Frame) -> Result<(), PipelineError> {
        self.shown += 1;
        log::trace!("frame {} ready (headless)", frame.index());
        Ok(())
    }
}

/// Writes each frame to `path` as JPEG, replacing the previous one atomically.
pub struct PreviewDisplay {
    path: PathBuf,
    staging: PathBuf,
}

impl PreviewDisplay {
    pub fn new(path: &Path) -> Result<Self, PipelineError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create preview directory {}", parent.display()))
                .map_err(PipelineError::Display)?;
        }
        let mut staging = path.as_os_str().to_owned();
        staging.push(".tmp");
        Ok(Self {
            path: path.to_path_buf(),
            staging: PathBuf::from(staging),
        })
    }

    fn write_preview(&self, frame: &Frame) -> anyhow::Result<()> {
        let file = File::create(&self.staging)
            .with_context(|| format!("create {}", self.staging.display()))?;
        let mut encoder = JpegEncoder::new_with_quality(BufWriter::new(file), PREVIEW_QUALITY);
        encoder
            .encode(
                frame.pixels(),
                frame.width(),
                frame.height(),
                image::ExtendedColorType::Rgb8,
            )
            .context("encode preview jpeg")?;
        drop(encoder);
        std::fs::rename(&self.staging, &self.path)
            .with_context(|| format!("replace {}", self.path.display()))?;
        Ok(())
    }
}

impl Display for PreviewDisplay {
    fn show(&mut self, frame: &Frame) -> Result<(), PipelineError> {
        self.write_preview(frame).map_err(PipelineError::Display)
    }
}
