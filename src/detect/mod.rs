//! Detection capability consumed by the playback loop.
//!
//! Backends turn one frame into a list of detections. The loop never trusts a
//! backend to honor the threshold and always re-filters with
//! `filter_detections`.

mod backend;
pub mod backends;
mod labels;
mod registry;
mod result;

pub use backend::{filter_detections, DetectorBackend};
pub use backends::{ScriptedBackend, StubBackend};
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use labels::{label_for, COCO_LABELS};
pub use registry::BackendRegistry;
pub use result::{BoundingBox, Detection};
