//! YUV4MPEG2 writer.
//!
//! Uncompressed 4:4:4 planes, readable by ffmpeg, mpv and most players:
//!
//! ```text
//! YUV4MPEG2 W<width> H<height> F<num>:<den> Ip A1:1 C444\n
//! FRAME\n<Y plane><Cb plane><Cr plane>
//! ```

use anyhow::Context;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::{check_dimensions, frame_rate_ratio, OutputSink};
use crate::error::PipelineError;
use crate::frame::Frame;

pub struct Y4mWriter {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    width: u32,
    height: u32,
    frames_written: u64,
}

impl Y4mWriter {
    /// Create `path` (and its parent directory) and write the stream header.
    pub fn create(path: &Path, width: u32, height: u32, fps: f64) -> Result<Self, PipelineError> {
        let unavailable = |reason: String| PipelineError::OutputUnavailable {
            path: path.display().to_string(),
            reason,
        };
        if width == 0 || height == 0 {
            return Err(unavailable(format!("invalid dimensions {}x{}", width, height)));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| unavailable(e.to_string()))?;
        }
        let file = File::create(path).map_err(|e| unavailable(e.to_string()))?;
        let mut writer = BufWriter::new(file);

        let (num, den) = frame_rate_ratio(fps);
        writeln!(
            writer,
            "YUV4MPEG2 W{} H{} F{}:{} Ip A1:1 C444",
            width, height, num, den
        )
        .map_err(|e| unavailable(e.to_string()))?;

        log::info!(
            "writing {}x{} @ {}:{} to {}",
            width,
            height,
            num,
            den,
            path.display()
        );
        Ok(Self {
            path: path.to_path_buf(),
            writer: Some(writer),
            width,
            height,
            frames_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OutputSink for Y4mWriter {
    fn write(&mut self, frame: &Frame) -> Result<(), PipelineError> {
        check_dimensions(frame, self.width, self.height)?;
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| PipelineError::Output(anyhow::anyhow!("output already finished")))?;

        let planes = rgb_to_ycbcr_planes(frame.pixels());
        writer
            .write_all(b"FRAME\n")
            .and_then(|_| writer.write_all(&planes))
            .with_context(|| format!("write frame {} to {}", frame.index(), self.path.display()))
            .map_err(PipelineError::Output)?;
        self.frames_written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), PipelineError> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };
        writer
            .flush()
            .with_context(|| format!("flush {}", self.path.display()))
            .map_err(PipelineError::Output)?;
        log::info!(
            "closed {} ({} frames)",
            self.path.display(),
            self.frames_written
        );
        Ok(())
    }

    fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

/// BT.601 full-range RGB24 to planar Y, Cb, Cr.
fn rgb_to_ycbcr_planes(rgb: &[u8]) -> Vec<u8> {
    let n = rgb.len() / 3;
    let mut out = vec![0u8; n * 3];
    for (i, px) in rgb.chunks_exact(3).enumerate() {
        let (r, g, b) = (px[0] as f32, px[1] as f32, px[2] as f32);
        let y = 0.299 * r + 0.587 * g + 0.114 * b;
        let cb = 128.0 - 0.168_736 * r - 0.331_264 * g + 0.5 * b;
        let cr = 128.0 + 0.5 * r - 0.418_688 * g - 0.081_312 * b;
        out[i] = clamp_to_u8(y);
        out[n + i] = clamp_to_u8(cb);
        out[2 * n + i] = clamp_to_u8(cr);
    }
    out
}

fn clamp_to_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
