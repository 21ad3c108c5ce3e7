//! Overlay rendering.
//!
//! `Renderer::render` is a pure function of its inputs: it copies the frame,
//! draws one box and one label per detection in the order given, and returns
//! the copy. The input frame is never touched.

mod font;

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use crate::detect::Detection;
use crate::frame::Frame;

pub use font::{text_width, GLYPH_HEIGHT};

/// Box colors, indexed by class id modulo the palette length.
const PALETTE: [[u8; 3]; 12] = [
    [255, 56, 56],
    [255, 157, 151],
    [255, 112, 31],
    [255, 178, 29],
    [207, 210, 49],
    [72, 249, 10],
    [26, 147, 52],
    [0, 212, 187],
    [44, 153, 168],
    [0, 194, 255],
    [52, 69, 147],
    [203, 56, 255],
];

const LABEL_PADDING: u32 = 2;

/// Box color for a class id.
pub fn class_color(class_id: u32) -> [u8; 3] {
    PALETTE[class_id as usize % PALETTE.len()]
}

/// Label drawn next to a box: class name, then confidence as a whole percent.
pub fn label_text(detection: &Detection) -> String {
    let percent = (detection.confidence().clamp(0.0, 1.0) * 100.0).round() as u32;
    format!("{} {}%", detection.label(), percent)
}

/// Annotated copy of a frame plus what happened while drawing it.
#[derive(Clone, Debug)]
pub struct Annotated {
    pub frame: Frame,
    pub boxes_drawn: usize,
    /// Detections dropped because their box was unusable.
    pub skipped: usize,
}

/// Pixel-space rectangle after clamping to the frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Draw style. Cheap to copy; holds no per-frame state.
#[derive(Clone, Copy, Debug)]
pub struct Renderer {
    line_thickness: u32,
    label_scale: u32,
}

impl Default for Renderer {
    fn default() -> Self {
        Self {
            line_thickness: 2,
            label_scale: 2,
        }
    }
}

impl Renderer {
    pub fn new(line_thickness: u32, label_scale: u32) -> Self {
        Self {
            line_thickness: line_thickness.max(1),
            label_scale: label_scale.max(1),
        }
    }

    pub fn render(&self, frame: &Frame, detections: &[Detection]) -> Annotated {
        let mut image = frame.to_rgb_image();
        let mut boxes_drawn = 0;
        let mut skipped = 0;

        for detection in detections {
            match clamp_box(detection, frame.width(), frame.height()) {
                Some(pixel_box) => {
                    self.draw_detection(&mut image, detection, pixel_box);
                    boxes_drawn += 1;
                }
                None => {
                    log::debug!(
                        "frame {}: skipping malformed box {:?} ({})",
                        frame.index(),
                        detection.bbox(),
                        detection.label()
                    );
                    skipped += 1;
                }
            }
        }

        Annotated {
            frame: Frame::from_image_like(image, frame),
            boxes_drawn,
            skipped,
        }
    }

    fn draw_detection(&self, image: &mut RgbImage, detection: &Detection, b: PixelBox) {
        let color = Rgb(class_color(detection.class_id()));

        for inset in 0..self.line_thickness {
            if b.width <= 2 * inset || b.height <= 2 * inset {
                break;
            }
            let rect = Rect::at((b.x + inset) as i32, (b.y + inset) as i32)
                .of_size(b.width - 2 * inset, b.height - 2 * inset);
            draw_hollow_rect_mut(image, rect, color);
        }

        let text = label_text(detection);
        let bg_width = text_width(&text, self.label_scale) + 2 * LABEL_PADDING;
        let bg_height = GLYPH_HEIGHT * self.label_scale + 2 * LABEL_PADDING;

        // Above the box when there is room, otherwise inside its top edge.
        let label_y = if b.y >= bg_height { b.y - bg_height } else { b.y };
        let label_x = if b.x + bg_width > image.width() {
            image.width().saturating_sub(bg_width)
        } else {
            b.x
        };

        draw_filled_rect_mut(
            image,
            Rect::at(label_x as i32, label_y as i32).of_size(bg_width, bg_height),
            color,
        );

        let ink = Rgb(text_ink(color.0));
        let origin_x = label_x + LABEL_PADDING;
        let origin_y = label_y + LABEL_PADDING;
        for (dx, dy) in font::lit_pixels(&text, self.label_scale) {
            let (x, y) = (origin_x + dx, origin_y + dy);
            if x < image.width() && y < image.height() {
                image.put_pixel(x, y, ink);
            }
        }
    }
}

/// Clamp a detection's box to the frame. `None` when nothing drawable is left.
pub fn clamp_box(detection: &Detection, width: u32, height: u32) -> Option<PixelBox> {
    let b = detection.bbox();
    if !b.is_finite() || b.x2 <= b.x1 || b.y2 <= b.y1 || width == 0 || height == 0 {
        return None;
    }
    let x1 = b.x1.clamp(0.0, width as f32).floor() as u32;
    let y1 = b.y1.clamp(0.0, height as f32).floor() as u32;
    let x2 = (b.x2.clamp(0.0, width as f32).ceil() as u32).min(width);
    let y2 = (b.y2.clamp(0.0, height as f32).ceil() as u32).min(height);
    if x2 <= x1 || y2 <= y1 {
        return None;
    }
    Some(PixelBox {
        x: x1,
        y: y1,
        width: x2 - x1,
        height: y2 - y1,
    })
}

fn text_ink(background: [u8; 3]) -> [u8; 3] {
    let [r, g, b] = background.map(u32::from);
    let luma = (299 * r + 587 * g + 114 * b) / 1000;
    if luma > 140 {
        [0, 0, 0]
    } else {
        [255, 255, 255]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;

    fn gray_frame() -> Frame {
        Frame::new(vec![40u8; 120 * 80 * 3], 120, 80, 3).expect("frame")
    }

    fn det(class_id: u32, confidence: f32, bbox: BoundingBox) -> Detection {
        Detection::new(class_id, confidence, bbox)
    }

    #[test]
    fn label_uses_whole_percent() {
        let d = det(2, 0.876, BoundingBox::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(label_text(&d), "car 88%");
        let d = det(0, 1.0, BoundingBox::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(label_text(&d), "person 100%");
    }

    #[test]
    fn render_is_deterministic_and_leaves_input_untouched() {
        let frame = gray_frame();
        let before = frame.pixels().to_vec();
        let dets = vec![
            det(0, 0.9, BoundingBox::new(10.0, 30.0, 60.0, 70.0)),
            det(5, 0.4, BoundingBox::new(50.0, 20.0, 110.0, 60.0)),
        ];
        let renderer = Renderer::default();

        let first = renderer.render(&frame, &dets);
        let second = renderer.render(&frame, &dets);

        assert_eq!(first.frame, second.frame);
        assert_eq!(frame.pixels(), before.as_slice());
        assert_ne!(first.frame.pixels(), before.as_slice());
        assert_eq!(first.boxes_drawn, 2);
        assert_eq!(first.frame.index(), frame.index());
    }

    #[test]
    fn box_outline_is_drawn_at_detection_coordinates() {
        let frame = gray_frame();
        let d = det(0, 0.7, BoundingBox::new(20.0, 40.0, 70.0, 75.0));
        let out = Renderer::default().render(&frame, &[d]);
        let color = class_color(0);

        assert_eq!(out.frame.pixel(20, 60), Some(color));
        assert_eq!(out.frame.pixel(69, 60), Some(color));
        assert_eq!(out.frame.pixel(45, 74), Some(color));
        // Interior stays untouched.
        assert_eq!(out.frame.pixel(45, 60), Some([40, 40, 40]));
    }

    #[test]
    fn empty_detection_list_returns_identical_copy() {
        let frame = gray_frame();
        let out = Renderer::default().render(&frame, &[]);
        assert_eq!(out.frame, frame);
        assert_eq!(out.boxes_drawn, 0);
    }

    #[test]
    fn malformed_boxes_are_skipped_individually() {
        let frame = gray_frame();
        let dets = vec![
            det(0, 0.9, BoundingBox::new(f32::NAN, 0.0, 10.0, 10.0)),
            det(0, 0.9, BoundingBox::new(30.0, 30.0, 10.0, 10.0)),
            det(0, 0.9, BoundingBox::new(500.0, 500.0, 600.0, 600.0)),
            det(1, 0.9, BoundingBox::new(10.0, 10.0, 40.0, 40.0)),
        ];
        let out = Renderer::default().render(&frame, &dets);
        assert_eq!(out.boxes_drawn, 1);
        assert_eq!(out.skipped, 3);
    }

    #[test]
    fn partially_outside_boxes_are_clamped() {
        let d = det(0, 0.9, BoundingBox::new(-15.0, 70.0, 30.5, 200.0));
        let b = clamp_box(&d, 120, 80).expect("clamped box");
        assert_eq!(
            b,
            PixelBox {
                x: 0,
                y: 70,
                width: 31,
                height: 10
            }
        );
    }

    #[test]
    fn label_near_right_edge_stays_in_frame() {
        let frame = gray_frame();
        let d = det(9, 0.5, BoundingBox::new(110.0, 5.0, 119.0, 20.0));
        let out = Renderer::default().render(&frame, &[d]);
        assert_eq!(out.boxes_drawn, 1);
        assert_eq!(out.frame.width(), 120);
    }
}
