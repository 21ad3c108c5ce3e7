//! OpenCV HighGUI window (feature `display-opencv`).
//!
//! `open_window` returns both halves of one window: a `Display` that shows
//! annotated frames and an `InputSource` that reads single key presses from
//! it. Both halves pump the HighGUI event loop with `wait_key`, so the window
//! keeps redrawing and taking keys while playback is paused.

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{Context, Result};
use opencv::core::{Mat, Scalar, CV_8UC3};
use opencv::highgui;
use opencv::prelude::*;

use super::Display;
use crate::error::PipelineError;
use crate::frame::Frame;
use crate::input::{key_event, InputEvent, InputSource};

/// Milliseconds HighGUI may block per pump.
const KEY_WAIT_MS: i32 = 1;

/// Key codes read by either half, drained by `WindowKeys::poll`.
type KeyQueue = Rc<RefCell<Vec<i32>>>;

/// Open a window titled `title`.
pub fn open_window(title: &str) -> Result<(WindowDisplay, WindowKeys), PipelineError> {
    highgui::named_window(title, highgui::WINDOW_AUTOSIZE)
        .with_context(|| format!("open window '{}'", title))
        .map_err(PipelineError::Display)?;
    log::info!("showing frames in window '{}' (space/p pause, q quit)", title);

    let keys = KeyQueue::default();
    let display = WindowDisplay {
        title: title.to_string(),
        canvas: Mat::default(),
        keys: keys.clone(),
    };
    Ok((display, WindowKeys { keys }))
}

fn pump(keys: &KeyQueue) -> opencv::Result<()> {
    let code = highgui::wait_key(KEY_WAIT_MS)?;
    if code >= 0 {
        keys.borrow_mut().push(code);
    }
    Ok(())
}

pub struct WindowDisplay {
    title: String,
    /// BGR copy of the last frame, reused while dimensions hold.
    canvas: Mat,
    keys: KeyQueue,
}

impl WindowDisplay {
    fn present(&mut self, frame: &Frame) -> Result<()> {
        let rows = i32::try_from(frame.height()).context("frame height")?;
        let cols = i32::try_from(frame.width()).context("frame width")?;
        if self.canvas.rows() != rows || self.canvas.cols() != cols {
            self.canvas = Mat::new_rows_cols_with_default(rows, cols, CV_8UC3, Scalar::all(0.0))
                .context("allocate window canvas")?;
        }
        let bgr = self
            .canvas
            .data_bytes_mut()
            .context("window canvas buffer")?;
        rgb_to_bgr(frame.pixels(), bgr);

        highgui::imshow(&self.title, &self.canvas).context("imshow")?;
        pump(&self.keys).context("window event loop")?;
        Ok(())
    }
}

impl Display for WindowDisplay {
    fn show(&mut self, frame: &Frame) -> Result<(), PipelineError> {
        self.present(frame).map_err(PipelineError::Display)
    }
}

impl Drop for WindowDisplay {
    fn drop(&mut self) {
        if let Err(err) = highgui::destroy_window(&self.title) {
            log::debug!("closing window '{}': {}", self.title, err);
        }
    }
}

/// Key presses from the window opened alongside it.
pub struct WindowKeys {
    keys: KeyQueue,
}

impl InputSource for WindowKeys {
    fn poll(&mut self) -> Vec<InputEvent> {
        if let Err(err) = pump(&self.keys) {
            log::warn!("window key poll failed: {}", err);
        }
        self.keys
            .borrow_mut()
            .drain(..)
            .filter_map(key_event)
            .collect()
    }
}

/// OpenCV wants BGR.
fn rgb_to_bgr(rgb: &[u8], bgr: &mut [u8]) {
    for (src, dst) in rgb.chunks_exact(3).zip(bgr.chunks_exact_mut(3)) {
        dst[0] = src[2];
        dst[1] = src[1];
        dst[2] = src[0];
    }
}
