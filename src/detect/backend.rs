use anyhow::Result;

use crate::config::Threshold;
use crate::detect::result::Detection;
use crate::frame::Frame;

/// Detector backend trait: the detection capability the playback loop consumes.
///
/// Implementations may apply `threshold` loosely or not at all; callers run
/// `filter_detections` on whatever comes back. Errors are treated as fatal by
/// the playback loop, so backends should not paper over failures with an
/// empty result.
pub trait DetectorBackend {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on one frame.
    ///
    /// The frame is borrowed for the duration of the call only.
    fn detect(&mut self, frame: &Frame, threshold: Threshold) -> Result<Vec<Detection>>;

    /// Optional warm-up hook, run once before the first frame.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Keep only detections at or above `threshold`, preserving backend order.
pub fn filter_detections(detections: Vec<Detection>, threshold: Threshold) -> Vec<Detection> {
    let before = detections.len();
    let kept: Vec<Detection> = detections
        .into_iter()
        .filter(|d| threshold.admits(d.confidence()))
        .collect();
    if kept.len() != before {
        log::trace!(
            "dropped {} detection(s) below threshold {}",
            before - kept.len(),
            threshold
        );
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::result::BoundingBox;

    fn det(confidence: f32) -> Detection {
        Detection::new(0, confidence, BoundingBox::new(0.0, 0.0, 4.0, 4.0))
    }

    fn sample() -> Vec<Detection> {
        [0.05, 0.2, 0.35, 0.5, 0.6, 0.75, 0.9, 1.0, f32::NAN]
            .into_iter()
            .map(det)
            .collect()
    }

    #[test]
    fn boundary_confidence_is_kept() -> Result<()> {
        let kept = filter_detections(vec![det(0.6), det(0.5999)], Threshold::new(0.6)?);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].confidence(), 0.6);
        Ok(())
    }

    #[test]
    fn higher_threshold_yields_subset() -> Result<()> {
        let steps = [0.0, 0.1, 0.35, 0.5, 0.6, 0.9, 1.0];
        for pair in steps.windows(2) {
            let low = filter_detections(sample(), Threshold::new(pair[0])?);
            let high = filter_detections(sample(), Threshold::new(pair[1])?);
            assert!(high.len() <= low.len());
            for d in &high {
                assert!(low.contains(d), "{:?} missing at lower threshold", d);
            }
        }
        Ok(())
    }

    #[test]
    fn nan_confidence_never_passes() -> Result<()> {
        let kept = filter_detections(vec![det(f32::NAN)], Threshold::new(0.0)?);
        assert!(kept.is_empty());
        Ok(())
    }

    #[test]
    fn order_is_preserved() -> Result<()> {
        let input = vec![det(0.9), det(0.1), det(0.7)];
        let kept = filter_detections(input, Threshold::new(0.5)?);
        let confs: Vec<f32> = kept.iter().map(|d| d.confidence()).collect();
        assert_eq!(confs, vec![0.9, 0.7]);
        Ok(())
    }
}
