#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::FilterType;
use tract_onnx::prelude::*;

use crate::config::Threshold;
use crate::detect::backend::DetectorBackend;
use crate::detect::labels::COCO_LABELS;
use crate::detect::result::{BoundingBox, Detection};
use crate::frame::Frame;

/// Default square input edge for YOLOv8 exports.
pub const DEFAULT_INPUT_SIZE: u32 = 640;

/// Tract-based backend for YOLOv8-style ONNX detectors.
///
/// Frames are resized to the model input, the `[1, 4 + classes, anchors]`
/// output is decoded, thresholded, suppressed with IoU NMS, and boxes are
/// scaled back to frame pixels. No network I/O; the model is loaded once.
pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    input_width: u32,
    input_height: u32,
    iou_threshold: f32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, input_width: u32, input_height: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, input_height as usize, input_width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            input_width,
            input_height,
            iou_threshold: 0.45,
        })
    }

    /// Override the default NMS IoU threshold.
    pub fn with_iou(mut self, iou: f32) -> Self {
        self.iou_threshold = iou;
        self
    }

    fn build_input(&self, frame: &Frame) -> Tensor {
        let resized = image::imageops::resize(
            &frame.to_rgb_image(),
            self.input_width,
            self.input_height,
            FilterType::Triangle,
        );
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, self.input_height as usize, self.input_width as usize),
            |(_, channel, y, x)| resized.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0,
        );
        input.into_tensor()
    }

    fn decode(
        &self,
        outputs: TVec<TValue>,
        threshold: Threshold,
        frame: &Frame,
    ) -> Result<Vec<Detection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let shape = view.shape().to_vec();
        if shape.len() != 3 || shape[0] != 1 || shape[1] < 5 {
            return Err(anyhow!("unexpected detector output shape {:?}", shape));
        }
        let classes = shape[1] - 4;
        let anchors = shape[2];

        let sx = frame.width() as f32 / self.input_width as f32;
        let sy = frame.height() as f32 / self.input_height as f32;

        let mut candidates = Vec::new();
        for a in 0..anchors {
            let (class_id, score) = (0..classes)
                .map(|c| (c, view[[0, 4 + c, a]]))
                .fold((0, f32::NEG_INFINITY), |best, cur| {
                    if cur.1 > best.1 {
                        cur
                    } else {
                        best
                    }
                });
            if !threshold.admits(score) {
                continue;
            }
            let bbox = BoundingBox::from_center(
                view[[0, 0, a]],
                view[[0, 1, a]],
                view[[0, 2, a]],
                view[[0, 3, a]],
            )
            .scaled(sx, sy);
            candidates.push(Detection::new(class_id as u32, score.min(1.0), bbox));
        }

        Ok(non_max_suppression(candidates, self.iou_threshold))
    }
}

/// Class-aware greedy NMS, highest confidence first.
pub(crate) fn non_max_suppression(mut candidates: Vec<Detection>, iou: f32) -> Vec<Detection> {
    candidates.sort_by(|a, b| b.confidence().total_cmp(&a.confidence()));
    let mut kept: Vec<Detection> = Vec::new();
    for cand in candidates {
        let suppressed = kept.iter().any(|k| {
            k.class_id() == cand.class_id() && k.bbox().iou(&cand.bbox()) > iou
        });
        if !suppressed {
            kept.push(cand);
        }
    }
    kept
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, frame: &Frame, threshold: Threshold) -> Result<Vec<Detection>> {
        let input = self.build_input(frame);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.decode(outputs, threshold, frame)
    }

    fn warm_up(&mut self) -> Result<()> {
        let blank = Frame::new(
            vec![0u8; (self.input_width * self.input_height * 3) as usize],
            self.input_width,
            self.input_height,
            0,
        )?;
        self.detect(&blank, Threshold::new(1.0)?)?;
        log::debug!(
            "tract backend warmed up ({}x{}, {} known labels)",
            self.input_width,
            self.input_height,
            COCO_LABELS.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nms_keeps_best_box_per_overlapping_cluster() {
        let a = Detection::new(0, 0.9, BoundingBox::new(0.0, 0.0, 10.0, 10.0));
        let b = Detection::new(0, 0.8, BoundingBox::new(1.0, 1.0, 11.0, 11.0));
        let c = Detection::new(2, 0.7, BoundingBox::new(1.0, 1.0, 11.0, 11.0));
        let kept = non_max_suppression(vec![b, a.clone(), c.clone()], 0.45);
        assert_eq!(kept, vec![a, c]);
    }
}
