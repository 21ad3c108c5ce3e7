use anyhow::Result;

use crate::config::Threshold;
use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BoundingBox, Detection};
use crate::frame::Frame;

/// Confidence schedule the stub cycles through, one entry per frame.
const CONFIDENCE_CYCLE: [f32; 5] = [0.25, 0.45, 0.65, 0.85, 0.55];

/// Stub backend for demos and pipeline checks without a model.
///
/// Emits one "person" box per frame that drifts left to right, with a
/// confidence taken from a fixed cycle so threshold changes are visible.
#[derive(Clone, Copy, Debug, Default)]
pub struct StubBackend;

impl StubBackend {
    pub fn new() -> Self {
        Self
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, frame: &Frame, threshold: Threshold) -> Result<Vec<Detection>> {
        let width = frame.width() as f32;
        let height = frame.height() as f32;
        let box_w = (width / 4.0).max(1.0);
        let box_h = (height / 3.0).max(1.0);
        let travel = (width - box_w).max(0.0);
        let step = (frame.index() % 60) as f32 / 60.0;
        let x1 = travel * step;
        let y1 = (height - box_h) / 2.0;

        let confidence = CONFIDENCE_CYCLE[(frame.index() % CONFIDENCE_CYCLE.len() as u64) as usize];
        if !threshold.admits(confidence) {
            return Ok(Vec::new());
        }

        Ok(vec![Detection::new(
            0,
            confidence,
            BoundingBox::new(x1, y1, x1 + box_w, y1 + box_h),
        )])
    }
}
