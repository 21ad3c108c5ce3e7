//! Synthetic frame source (`stub://`).
//!
//! Generates deterministic gradient frames without touching the filesystem.
//! Query parameters: `frames` (finite length, default unbounded), `width`,
//! `height`, `fps`. Example: `stub://street?frames=30&width=320&height=240`.

use anyhow::{anyhow, Result};

use super::{FrameSource, SourceInfo};
use crate::frame::Frame;

const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;
const DEFAULT_FPS: f64 = 10.0;

/// Configuration for a synthetic source.
#[derive(Clone, Debug, PartialEq)]
pub struct SyntheticConfig {
    pub name: String,
    pub frames: Option<u64>,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

impl SyntheticConfig {
    pub fn parse(url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix("stub://")
            .ok_or_else(|| anyhow!("synthetic sources must start with stub://"))?;
        let (name, query) = rest.split_once('?').unwrap_or((rest, ""));
        let mut config = Self {
            name: name.to_string(),
            frames: None,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            fps: DEFAULT_FPS,
        };
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("malformed stub parameter '{}'", pair))?;
            let invalid = || anyhow!("invalid value '{}' for stub parameter '{}'", value, key);
            match key {
                "frames" => config.frames = Some(value.parse().map_err(|_| invalid())?),
                "width" => config.width = value.parse().map_err(|_| invalid())?,
                "height" => config.height = value.parse().map_err(|_| invalid())?,
                "fps" => config.fps = value.parse().map_err(|_| invalid())?,
                other => return Err(anyhow!("unknown stub parameter '{}'", other)),
            }
        }
        Ok(config)
    }
}

/// Deterministic generated frames.
pub struct SyntheticSource {
    config: SyntheticConfig,
    info: SourceInfo,
    next_index: u64,
}

impl SyntheticSource {
    pub fn open(url: &str) -> Result<Self> {
        Ok(Self::new(SyntheticConfig::parse(url)?))
    }

    pub fn new(config: SyntheticConfig) -> Self {
        let info = SourceInfo {
            width: config.width,
            height: config.height,
            fps: super::nominal_fps(config.fps),
            description: format!("stub://{} (synthetic)", config.name),
        };
        Self {
            config,
            info,
            next_index: 0,
        }
    }

    /// Number of frames produced so far.
    pub fn frames_produced(&self) -> u64 {
        self.next_index
    }

    fn generate_pixels(&self, index: u64) -> Vec<u8> {
        let width = self.config.width as u64;
        let height = self.config.height as u64;
        let mut pixels = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                // Horizontal gradient that scrolls one column per frame.
                pixels.push(((x + index) % 256) as u8);
                pixels.push(((y * 255) / height.max(1)) as u8);
                pixels.push(((index * 8) % 256) as u8);
            }
        }
        pixels
    }
}

impl FrameSource for SyntheticSource {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn next_frame(&mut self) -> Option<Frame> {
        if self.config.frames.is_some_and(|limit| self.next_index >= limit) {
            return None;
        }
        let index = self.next_index;
        let pixels = self.generate_pixels(index);
        match Frame::new(pixels, self.config.width, self.config.height, index) {
            Ok(frame) => {
                self.next_index += 1;
                Some(frame.with_nominal_rate(self.info.fps))
            }
            Err(err) => {
                log::warn!("{}: frame {} unreadable: {:#}", self.info.description, index, err);
                None
            }
        }
    }

    fn close(&mut self) {
        log::debug!(
            "{}: closed after {} frames",
            self.info.description,
            self.next_index
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_query_parameters() -> Result<()> {
        let cfg = SyntheticConfig::parse("stub://cam?frames=3&width=32&height=16&fps=5")?;
        assert_eq!(cfg.name, "cam");
        assert_eq!(cfg.frames, Some(3));
        assert_eq!((cfg.width, cfg.height), (32, 16));
        assert_eq!(cfg.fps, 5.0);

        assert!(SyntheticConfig::parse("stub://cam?bogus=1").is_err());
        assert!(SyntheticConfig::parse("stub://cam?frames=x").is_err());
        assert!(SyntheticConfig::parse("file.mp4").is_err());
        Ok(())
    }

    #[test]
    fn finite_source_ends_after_frame_limit() -> Result<()> {
        let mut source = SyntheticSource::open("stub://t?frames=3&width=8&height=4")?;
        let indices: Vec<u64> = std::iter::from_fn(|| source.next_frame())
            .map(|f| f.index())
            .collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert!(source.next_frame().is_none());
        assert_eq!(source.frames_produced(), 3);
        Ok(())
    }

    #[test]
    fn frames_are_deterministic_and_timestamped() -> Result<()> {
        let mut a = SyntheticSource::open("stub://a?width=8&height=4&fps=4")?;
        let mut b = SyntheticSource::open("stub://b?width=8&height=4&fps=4")?;
        let fa = a.next_frame().expect("frame");
        let fb = b.next_frame().expect("frame");
        assert_eq!(fa.pixels(), fb.pixels());

        let second = a.next_frame().expect("frame");
        assert_ne!(second.pixels(), fa.pixels());
        assert_eq!(second.timestamp(), Some(std::time::Duration::from_millis(250)));
        Ok(())
    }
}
