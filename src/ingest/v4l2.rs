//! V4L2 frame source.
//!
//! This module provides `V4l2Source` for capturing frames from local V4L2
//! devices (e.g. `/dev/video0`). RGB24 is requested; when the driver
//! negotiates YUYV or NV12 instead, frames are converted in memory.
//!
//! The negotiated resolution is what `info()` reports, so an output stream
//! opened from it matches the frames actually delivered.

use anyhow::{anyhow, Context, Result};
use ouroboros::self_referencing;

use super::normalize::{normalize_to_rgb, PixelFormat};
use super::{FrameSource, SourceInfo};
use crate::frame::Frame;

/// Configuration for a V4L2 source.
#[derive(Clone, Debug)]
pub struct V4l2Config {
    /// Device path (e.g., "/dev/video0")
    pub device: String,
    /// Requested frame rate. Drivers may ignore it.
    pub target_fps: u32,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
}

impl Default for V4l2Config {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            target_fps: 30,
            width: 640,
            height: 480,
        }
    }
}

#[self_referencing]
struct DeviceState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

/// Live capture source backed by libv4l memory-mapped buffers.
pub struct V4l2Source {
    info: SourceInfo,
    format: PixelFormat,
    state: Option<DeviceState>,
    next_index: u64,
}

impl V4l2Source {
    /// Open and configure the device. Failure here is a startup error.
    pub fn open(config: V4l2Config) -> Result<Self> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let device = v4l::Device::with_path(&config.device)
            .with_context(|| format!("open v4l2 device {}", config.device))?;
        let mut format = device.format().context("read v4l2 format")?;
        format.width = config.width;
        format.height = config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "V4l2Source: failed to set format on {}: {}",
                    config.device,
                    err
                );
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };

        let pixel_format = PixelFormat::from_fourcc(&format.fourcc.repr).ok_or_else(|| {
            anyhow!(
                "{} negotiated unsupported pixel format {}",
                config.device,
                format.fourcc
            )
        })?;

        let mut fps = config.target_fps as f64;
        if config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(config.target_fps);
            match device.set_params(&params) {
                Ok(applied) => {
                    let interval = applied.interval;
                    if interval.numerator > 0 {
                        fps = interval.denominator as f64 / interval.numerator as f64;
                    }
                }
                Err(err) => {
                    log::warn!("V4l2Source: failed to set fps on {}: {}", config.device, err);
                }
            }
        }

        let state = DeviceStateTryBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()?;

        let info = SourceInfo {
            width: format.width,
            height: format.height,
            fps: super::nominal_fps(fps),
            description: format!("{} (v4l2 {:?})", config.device, pixel_format),
        };

        Ok(Self {
            info,
            format: pixel_format,
            state: Some(state),
            next_index: 0,
        })
    }

    fn capture(&mut self) -> Result<Frame> {
        use v4l::io::traits::CaptureStream;

        let state = self.state.as_mut().context("v4l2 device closed")?;
        let (width, height, format) = (self.info.width, self.info.height, self.format);
        let pixels = state.with_stream_mut(|stream| -> Result<Vec<u8>> {
            let (buf, _meta) = stream.next().context("capture v4l2 frame")?;
            normalize_to_rgb(buf, width, height, format)
        })?;

        let frame = Frame::new(pixels, width, height, self.next_index)?
            .with_nominal_rate(self.info.fps);
        self.next_index += 1;
        Ok(frame)
    }
}

impl FrameSource for V4l2Source {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn next_frame(&mut self) -> Option<Frame> {
        match self.capture() {
            Ok(frame) => Some(frame),
            Err(err) => {
                log::warn!(
                    "{}: capture failed, ending stream: {:#}",
                    self.info.description,
                    err
                );
                None
            }
        }
    }

    fn close(&mut self) {
        // Dropping the state unmaps buffers and closes the device node.
        if self.state.take().is_some() {
            log::info!(
                "{}: closed after {} frames",
                self.info.description,
                self.next_index
            );
        }
    }
}
