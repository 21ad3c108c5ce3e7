//! Detect-annotate
//!
//! Runs an object detector over every frame of a video file or camera and
//! draws the results (box, class label, confidence) back onto the frame for
//! display and optional saving. Built for eyeballing detector behavior at
//! different confidence thresholds, not for serving inference.
//!
//! # Module Structure
//!
//! - `ingest`: frame sources (files, V4L2 devices, synthetic `stub://`)
//! - `detect`: the detector backend trait, registry, and backends
//! - `render`: pure overlay rendering
//! - `playback`: the tick loop and its Running/Paused/Stopped state machine
//! - `output`, `display`, `input`: what the loop pushes to and polls from
//!   (optionally an FFmpeg encoder and an OpenCV window)
//! - `config`: the immutable run configuration

pub mod config;
pub mod detect;
pub mod display;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod input;
pub mod output;
pub mod pipeline;
pub mod playback;
pub mod render;
pub mod tally;
pub mod ui;

pub use config::{AnnotateConfig, ConfigOverrides, SourceDescriptor, Threshold};
pub use detect::{
    filter_detections, BackendRegistry, BoundingBox, Detection, DetectorBackend, ScriptedBackend,
    StubBackend,
};
pub use display::{Display, HeadlessDisplay, PreviewDisplay};
pub use error::PipelineError;
pub use frame::Frame;
pub use ingest::{open_source, FrameSource, SourceInfo, SyntheticSource};
pub use input::{key_event, InputEvent, InputSource, ScriptedInput, TerminalInput};
#[cfg(feature = "encode-ffmpeg")]
pub use output::FfmpegWriter;
pub use output::{open_output, OutputSink, Y4mWriter};
pub use pipeline::{build_controller, build_controller_from_source, build_detector};
pub use playback::{
    PlaybackController, PlaybackState, RunStats, RunSummary, StopReason, TickOutcome,
};
pub use render::{Annotated, Renderer};
pub use tally::DetectionTally;
