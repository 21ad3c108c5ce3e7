//! Frame sources.
//!
//! This module provides the sources the playback loop pulls frames from:
//! - Local video files (feature: ingest-file-ffmpeg)
//! - V4L2 capture devices (feature: ingest-v4l2)
//! - Synthetic `stub://` sources (demos and tests)
//!
//! Every source yields RGB24 `Frame`s with zero-based, monotonic indices and
//! reports its dimensions and nominal frame rate up front. A source that
//! cannot be opened fails with `PipelineError::SourceUnavailable`. Read
//! failures after that are logged and end the stream; there is no retry.

pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;
#[cfg(feature = "ingest-v4l2")]
mod normalize;
pub mod synthetic;
#[cfg(feature = "ingest-v4l2")]
pub mod v4l2;

pub use file::FileSource;
pub use synthetic::SyntheticSource;
#[cfg(feature = "ingest-v4l2")]
pub use v4l2::V4l2Source;

use crate::config::SourceDescriptor;
use crate::error::PipelineError;
use crate::frame::Frame;

/// Frame rate assumed when a container does not report one.
pub const FALLBACK_FPS: f64 = 25.0;

/// Static properties of an opened source.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceInfo {
    pub width: u32,
    pub height: u32,
    /// Nominal frames per second.
    pub fps: f64,
    pub description: String,
}

/// A lazily pulled sequence of frames.
///
/// `next_frame` returns `None` at end of stream, including after a read
/// failure. Sources are not restartable.
pub trait FrameSource {
    fn info(&self) -> &SourceInfo;

    fn next_frame(&mut self) -> Option<Frame>;

    /// Release the underlying device or file. Called once at shutdown.
    fn close(&mut self) {}
}

/// Open the source named by `descriptor`.
pub fn open_source(descriptor: &SourceDescriptor) -> Result<Box<dyn FrameSource>, PipelineError> {
    let unavailable = |err: anyhow::Error| PipelineError::SourceUnavailable {
        descriptor: descriptor.to_string(),
        reason: format!("{:#}", err),
    };
    let source: Box<dyn FrameSource> = match descriptor {
        SourceDescriptor::Synthetic(url) => Box::new(SyntheticSource::open(url).map_err(unavailable)?),
        SourceDescriptor::File(path) => Box::new(FileSource::open(path).map_err(unavailable)?),
        SourceDescriptor::Device(device) => open_device(device).map_err(unavailable)?,
    };
    let info = source.info();
    if info.width == 0 || info.height == 0 {
        return Err(PipelineError::SourceUnavailable {
            descriptor: descriptor.to_string(),
            reason: format!("source reported empty dimensions {}x{}", info.width, info.height),
        });
    }
    log::info!(
        "opened {} ({}x{} @ {:.2} fps)",
        info.description,
        info.width,
        info.height,
        info.fps
    );
    Ok(source)
}

#[cfg(feature = "ingest-v4l2")]
fn open_device(device: &str) -> anyhow::Result<Box<dyn FrameSource>> {
    Ok(Box::new(V4l2Source::open(v4l2::V4l2Config {
        device: device.to_string(),
        ..v4l2::V4l2Config::default()
    })?))
}

#[cfg(not(feature = "ingest-v4l2"))]
fn open_device(device: &str) -> anyhow::Result<Box<dyn FrameSource>> {
    Err(anyhow::anyhow!(
        "capture from {} requires the ingest-v4l2 feature",
        device
    ))
}

/// Sanitize a container-reported frame rate.
pub(crate) fn nominal_fps(reported: f64) -> f64 {
    if reported.is_finite() && reported > 0.0 {
        reported
    } else {
        FALLBACK_FPS
    }
}
