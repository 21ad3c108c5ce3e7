//! Output streams for annotated frames.
//!
//! An `OutputSink` is opened once at startup with the source's dimensions and
//! nominal rate, receives one frame per processed tick, and is finished
//! exactly once by the playback loop.
//!
//! `open_output` picks the sink from the path: `.y4m` always gets the
//! uncompressed `Y4mWriter`; any other extension is encoded by `FfmpegWriter`
//! when the crate is built with `encode-ffmpeg`.

#[cfg(feature = "encode-ffmpeg")]
mod ffmpeg;
mod y4m;

#[cfg(feature = "encode-ffmpeg")]
pub use ffmpeg::FfmpegWriter;
pub use y4m::Y4mWriter;

use std::path::Path;

use crate::error::PipelineError;
use crate::frame::Frame;
use crate::ingest::SourceInfo;

/// Write-only sink for annotated frames.
pub trait OutputSink {
    /// Append one frame. Frames must match the dimensions the sink was opened with.
    fn write(&mut self, frame: &Frame) -> Result<(), PipelineError>;

    /// Flush and close. Called once at shutdown.
    fn finish(&mut self) -> Result<(), PipelineError>;

    /// Frames written so far.
    fn frames_written(&self) -> u64;
}

/// Open the sink for `path`, sized from the source.
pub fn open_output(path: &Path, info: &SourceInfo) -> Result<Box<dyn OutputSink>, PipelineError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("y4m") => Ok(Box::new(Y4mWriter::create(
            path,
            info.width,
            info.height,
            info.fps,
        )?)),
        _ => open_encoded(path, info),
    }
}

#[cfg(feature = "encode-ffmpeg")]
fn open_encoded(path: &Path, info: &SourceInfo) -> Result<Box<dyn OutputSink>, PipelineError> {
    Ok(Box::new(FfmpegWriter::create(
        path,
        info.width,
        info.height,
        info.fps,
    )?))
}

#[cfg(not(feature = "encode-ffmpeg"))]
fn open_encoded(path: &Path, _info: &SourceInfo) -> Result<Box<dyn OutputSink>, PipelineError> {
    Err(PipelineError::OutputUnavailable {
        path: path.display().to_string(),
        reason: "encoded output needs the encode-ffmpeg feature; use a .y4m path".to_string(),
    })
}

fn check_dimensions(frame: &Frame, width: u32, height: u32) -> Result<(), PipelineError> {
    if frame.width() == width && frame.height() == height {
        return Ok(());
    }
    Err(PipelineError::DimensionMismatch {
        frame_index: frame.index(),
        expected_width: width,
        expected_height: height,
        actual_width: frame.width(),
        actual_height: frame.height(),
    })
}

/// Express `fps` as an integer ratio with millihertz precision.
fn frame_rate_ratio(fps: f64) -> (u64, u64) {
    let milli = (fps * 1000.0).round() as u64;
    if milli == 0 {
        return (25, 1);
    }
    let divisor = gcd(milli, 1000);
    (milli / divisor, 1000 / divisor)
}

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn info() -> SourceInfo {
        SourceInfo {
            width: 4,
            height: 2,
            fps: 25.0,
            description: "test".to_string(),
        }
    }

    #[test]
    fn y4m_extension_gets_the_raw_writer() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("out.Y4M");
        let mut sink = open_output(&path, &info())?;
        sink.finish()?;
        assert!(std::fs::read(&path)?.starts_with(b"YUV4MPEG2 W4 H2 F25:1"));
        Ok(())
    }

    #[cfg(not(feature = "encode-ffmpeg"))]
    #[test]
    fn encoded_output_without_ffmpeg_is_refused_before_creating_a_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("out.mp4");
        let err = open_output(&path, &info()).err().expect("mp4 needs encode-ffmpeg");
        assert!(matches!(err, PipelineError::OutputUnavailable { .. }));
        assert!(err.to_string().contains(".y4m"));
        assert!(!path.exists());
        Ok(())
    }

    #[test]
    fn frame_rate_ratio_reduces() {
        assert_eq!(frame_rate_ratio(25.0), (25, 1));
        assert_eq!(frame_rate_ratio(29.97), (2997, 100));
        assert_eq!(frame_rate_ratio(12.5), (25, 2));
        assert_eq!(frame_rate_ratio(0.0), (25, 1));
    }
}
