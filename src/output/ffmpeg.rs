//! Encoded video output using FFmpeg.
//!
//! The container follows the file extension (`.mp4`, `.mkv`, `.avi`, ...).
//! Frames are converted from RGB24 to YUV420P and encoded with H.264 when the
//! FFmpeg build has an encoder for it, MPEG-4 Part 2 otherwise. YUV420P needs
//! even dimensions, so an odd width or height is scaled down by one pixel.

use anyhow::{Context, Result};
use ffmpeg_next as ffmpeg;
use std::path::{Path, PathBuf};

use super::{check_dimensions, frame_rate_ratio, OutputSink};
use crate::error::PipelineError;
use crate::frame::Frame;

pub struct FfmpegWriter {
    path: PathBuf,
    output: ffmpeg::format::context::Output,
    encoder: ffmpeg::encoder::Video,
    scaler: ffmpeg::software::scaling::Context,
    stream_index: usize,
    encoder_time_base: ffmpeg::Rational,
    stream_time_base: ffmpeg::Rational,
    width: u32,
    height: u32,
    frames_written: u64,
    finished: bool,
}

impl FfmpegWriter {
    /// Create `path` (and its parent directory), open the encoder and write
    /// the container header.
    pub fn create(path: &Path, width: u32, height: u32, fps: f64) -> Result<Self, PipelineError> {
        Self::open(path, width, height, fps).map_err(|err| PipelineError::OutputUnavailable {
            path: path.display().to_string(),
            reason: format!("{:#}", err),
        })
    }

    fn open(path: &Path, width: u32, height: u32, fps: f64) -> Result<Self> {
        if width < 2 || height < 2 {
            anyhow::bail!("invalid dimensions {}x{}", width, height);
        }
        ffmpeg::init().context("initialize ffmpeg")?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }

        let mut output = ffmpeg::format::output(&path)
            .with_context(|| format!("no muxer for '{}'", path.display()))?;
        let global_header = output
            .format()
            .flags()
            .contains(ffmpeg::format::Flags::GLOBAL_HEADER);

        let codec = ffmpeg::encoder::find(ffmpeg::codec::Id::H264)
            .or_else(|| ffmpeg::encoder::find(ffmpeg::codec::Id::MPEG4))
            .ok_or_else(|| anyhow::anyhow!("ffmpeg has neither an H.264 nor an MPEG-4 encoder"))?;

        let (encoded_width, encoded_height) = (width & !1, height & !1);
        let (num, den) = frame_rate_ratio(fps);
        let frame_rate = ffmpeg::Rational::new(num as i32, den as i32);
        let encoder_time_base = frame_rate.invert();

        let mut stream = output.add_stream(codec).context("add video stream")?;
        let stream_index = stream.index();
        let mut video = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .context("load encoder parameters")?
            .encoder()
            .video()
            .context("create video encoder")?;
        video.set_width(encoded_width);
        video.set_height(encoded_height);
        video.set_format(ffmpeg::format::Pixel::YUV420P);
        video.set_time_base(encoder_time_base);
        video.set_frame_rate(Some(frame_rate));
        if global_header {
            video.set_flags(ffmpeg::codec::Flags::GLOBAL_HEADER);
        }
        let encoder = video
            .open_as(codec)
            .with_context(|| format!("open {} encoder", codec.name()))?;
        stream.set_parameters(&encoder);
        stream.set_time_base(encoder_time_base);

        output
            .write_header()
            .with_context(|| format!("write header to {}", path.display()))?;
        // The muxer may pick its own stream time base while writing the header.
        let stream_time_base = output
            .stream(stream_index)
            .map(|stream| stream.time_base())
            .unwrap_or(encoder_time_base);

        let scaler = ffmpeg::software::scaling::context::Context::get(
            ffmpeg::format::Pixel::RGB24,
            width,
            height,
            ffmpeg::format::Pixel::YUV420P,
            encoded_width,
            encoded_height,
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("create ffmpeg scaler")?;

        log::info!(
            "encoding {}x{} @ {}:{} with {} to {}",
            encoded_width,
            encoded_height,
            num,
            den,
            codec.name(),
            path.display()
        );
        Ok(Self {
            path: path.to_path_buf(),
            output,
            encoder,
            scaler,
            stream_index,
            encoder_time_base,
            stream_time_base,
            width,
            height,
            frames_written: 0,
            finished: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn encode(&mut self, frame: &Frame) -> Result<()> {
        let mut rgb = ffmpeg::frame::Video::new(ffmpeg::format::Pixel::RGB24, self.width, self.height);
        let row_bytes = self.width as usize * 3;
        let stride = rgb.stride(0);
        let plane = rgb.data_mut(0);
        for (row, pixels) in frame.pixels().chunks_exact(row_bytes).enumerate() {
            let start = row * stride;
            plane[start..start + row_bytes].copy_from_slice(pixels);
        }

        let mut yuv = ffmpeg::frame::Video::empty();
        self.scaler
            .run(&rgb, &mut yuv)
            .context("scale frame to YUV420P")?;
        yuv.set_pts(Some(self.frames_written as i64));
        self.encoder
            .send_frame(&yuv)
            .context("send frame to encoder")?;
        self.write_packets()
    }

    /// Mux every packet the encoder has ready.
    fn write_packets(&mut self) -> Result<()> {
        let mut packet = ffmpeg::Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.stream_index);
            packet.rescale_ts(self.encoder_time_base, self.stream_time_base);
            packet
                .write_interleaved(&mut self.output)
                .context("write packet")?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.encoder.send_eof().context("flush encoder")?;
        self.write_packets()?;
        self.output.write_trailer().context("write trailer")?;
        Ok(())
    }
}

impl OutputSink for FfmpegWriter {
    fn write(&mut self, frame: &Frame) -> Result<(), PipelineError> {
        check_dimensions(frame, self.width, self.height)?;
        if self.finished {
            return Err(PipelineError::Output(anyhow::anyhow!("output already finished")));
        }
        self.encode(frame)
            .with_context(|| format!("encode frame {} to {}", frame.index(), self.path.display()))
            .map_err(PipelineError::Output)?;
        self.frames_written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), PipelineError> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.close()
            .with_context(|| format!("finish {}", self.path.display()))
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

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(width: u32, height: u32, index: u64) -> Frame {
        let shade = (index * 40) as u8;
        Frame::new(vec![shade; (width * height * 3) as usize], width, height, index)
            .expect("frame")
    }

    #[test]
    fn encodes_a_playable_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("clips").join("out.mp4");
        let mut writer = FfmpegWriter::create(&path, 32, 24, 10.0)?;
        for index in 0..5 {
            writer.write(&frame(32, 24, index))?;
        }
        writer.finish()?;
        writer.finish()?;
        assert_eq!(writer.frames_written(), 5);

        let input = ffmpeg::format::input(&path)?;
        let stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .context("video stream")?;
        let decoder = ffmpeg::codec::context::Context::from_parameters(stream.parameters())?
            .decoder()
            .video()?;
        assert_eq!((decoder.width(), decoder.height()), (32, 24));
        Ok(())
    }

    #[test]
    fn rejects_frames_with_other_dimensions() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut writer = FfmpegWriter::create(&dir.path().join("out.mkv"), 32, 24, 25.0)?;
        let err = writer.write(&frame(16, 24, 3)).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::DimensionMismatch { frame_index: 3, .. }
        ));
        writer.finish()?;
        Ok(())
    }

    #[test]
    fn unknown_container_is_unavailable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = FfmpegWriter::create(&dir.path().join("out.notacontainer"), 32, 24, 25.0)
            .err()
            .expect("no muxer");
        assert!(matches!(err, PipelineError::OutputUnavailable { .. }));
    }
}
