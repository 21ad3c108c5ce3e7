//! Local video file source.
//!
//! Decoding is delegated to FFmpeg (feature: ingest-file-ffmpeg). Without the
//! feature, opening a file fails cleanly at startup instead of mid-run.

use anyhow::{anyhow, Result};
use std::path::Path;

#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use super::{FrameSource, SourceInfo};
use crate::frame::Frame;

/// Local file frame source.
pub struct FileSource {
    backend: FileBackend,
}

enum FileBackend {
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
}

impl FileSource {
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(anyhow!("no such file: {}", path.display()));
        }
        #[cfg(feature = "ingest-file-ffmpeg")]
        {
            Ok(Self {
                backend: FileBackend::Ffmpeg(FfmpegFileSource::open(path)?),
            })
        }
        #[cfg(not(feature = "ingest-file-ffmpeg"))]
        {
            Err(anyhow!(
                "decoding {} requires the ingest-file-ffmpeg feature",
                path.display()
            ))
        }
    }
}

impl FrameSource for FileSource {
    fn info(&self) -> &SourceInfo {
        match self.backend {
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(ref source) => source.info(),
        }
    }

    fn next_frame(&mut self) -> Option<Frame> {
        match self.backend {
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(ref mut source) => match source.read_frame() {
                Ok(frame) => frame,
                Err(err) => {
                    log::warn!(
                        "{}: read failed, ending stream: {:#}",
                        source.info().description,
                        err
                    );
                    None
                }
            },
        }
    }

    fn close(&mut self) {
        match self.backend {
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(ref mut source) => source.close(),
        }
    }
}
