use std::collections::HashMap;

use anyhow::{anyhow, Result};

use crate::config::Threshold;
use crate::detect::backend::DetectorBackend;
use crate::detect::result::Detection;
use crate::frame::Frame;

/// Backend that replays pre-programmed detections keyed by frame index.
///
/// The threshold is ignored on purpose: whatever was scripted comes back, so
/// the caller's own filtering is what decides what gets rendered.
#[derive(Default)]
pub struct ScriptedBackend {
    script: HashMap<u64, Vec<Detection>>,
    fail_on: Option<u64>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `detections` when asked about frame `index`.
    pub fn with_frame(mut self, index: u64, detections: Vec<Detection>) -> Self {
        self.script.insert(index, detections);
        self
    }

    /// Fail when asked about frame `index`.
    pub fn failing_on(mut self, index: u64) -> Self {
        self.fail_on = Some(index);
        self
    }
}

impl DetectorBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(&mut self, frame: &Frame, _threshold: Threshold) -> Result<Vec<Detection>> {
        if self.fail_on == Some(frame.index()) {
            return Err(anyhow!("scripted failure on frame {}", frame.index()));
        }
        Ok(self.script.get(&frame.index()).cloned().unwrap_or_default())
    }
}
