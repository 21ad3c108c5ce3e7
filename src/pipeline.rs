//! Wiring from an `AnnotateConfig` to a ready-to-run `PlaybackController`.

use crate::config::AnnotateConfig;
use crate::detect::{BackendRegistry, DetectorBackend, StubBackend};
use crate::display::{Display, HeadlessDisplay, PreviewDisplay};
use crate::error::PipelineError;
use crate::ingest::{open_source, FrameSource, SourceInfo};
use crate::input::InputSource;
use crate::output::{open_output, OutputSink};
use crate::playback::PlaybackController;

#[cfg(feature = "display-opencv")]
const WINDOW_TITLE: &str = "Detection";

/// Register every backend this build supports and pick one.
///
/// Without an explicit choice, `tract` is preferred when compiled in and the
/// model file exists; otherwise the stub backend is used.
pub fn build_detector(config: &AnnotateConfig) -> Result<Box<dyn DetectorBackend>, PipelineError> {
    let mut registry = BackendRegistry::new();
    registry.register(StubBackend::new());
    let preferred = register_model_backends(&mut registry, config)?;

    if preferred.is_none() && config.backend().is_none() {
        log::warn!(
            "no detector model available ({}); using the stub backend",
            config.model().display()
        );
    }

    let name = config.backend().or(preferred);
    let detector = registry
        .select(name)
        .map_err(|e| PipelineError::InvalidConfig(format!("{:#}", e)))?;
    start_detector(detector)
}

/// Warm the detector up before the first frame.
fn start_detector(
    mut detector: Box<dyn DetectorBackend>,
) -> Result<Box<dyn DetectorBackend>, PipelineError> {
    if let Err(cause) = detector.warm_up() {
        return Err(PipelineError::DetectorStartup {
            backend: detector.name().to_string(),
            cause,
        });
    }
    log::info!("detector backend: {}", detector.name());
    Ok(detector)
}

#[cfg(feature = "backend-tract")]
fn register_model_backends(
    registry: &mut BackendRegistry,
    config: &AnnotateConfig,
) -> Result<Option<&'static str>, PipelineError> {
    use crate::detect::backends::tract::{TractBackend, DEFAULT_INPUT_SIZE};

    if config.backend() != Some("tract") && !config.model().is_file() {
        return Ok(None);
    }
    let backend = TractBackend::new(config.model(), DEFAULT_INPUT_SIZE, DEFAULT_INPUT_SIZE)
        .map_err(|e| PipelineError::InvalidConfig(format!("{:#}", e)))?
        .with_iou(config.iou());
    registry.register(backend);
    Ok(Some("tract"))
}

#[cfg(not(feature = "backend-tract"))]
fn register_model_backends(
    _registry: &mut BackendRegistry,
    _config: &AnnotateConfig,
) -> Result<Option<&'static str>, PipelineError> {
    Ok(None)
}

/// Open the source, build the detector, open the display and (when saving)
/// the output stream, and assemble the controller.
///
/// Window keys are attached when a window is opened; callers add their own
/// input with `add_input`.
pub fn build_controller(config: &AnnotateConfig) -> Result<PlaybackController, PipelineError> {
    let source = open_source(config.source())?;
    build_controller_from_source(config, source)
}

/// Like `build_controller`, around a source that is already open.
///
/// If anything after the source fails to start, the source is closed before
/// the error is returned.
pub fn build_controller_from_source(
    config: &AnnotateConfig,
    mut source: Box<dyn FrameSource>,
) -> Result<PlaybackController, PipelineError> {
    let parts = match open_parts(config, source.info()) {
        Ok(parts) => parts,
        Err(err) => {
            source.close();
            return Err(err);
        }
    };

    let mut controller =
        PlaybackController::new(config, source, parts.detector).with_display(parts.display);
    if let Some(keys) = parts.keys {
        controller = controller.add_input(keys);
    }
    if let Some(output) = parts.output {
        controller = controller.with_output(output);
    }
    Ok(controller)
}

/// Everything the controller needs besides the source.
struct Parts {
    detector: Box<dyn DetectorBackend>,
    display: Box<dyn Display>,
    keys: Option<Box<dyn InputSource>>,
    output: Option<Box<dyn OutputSink>>,
}

fn open_parts(config: &AnnotateConfig, info: &SourceInfo) -> Result<Parts, PipelineError> {
    let detector = build_detector(config)?;
    let (display, keys) = open_display(config)?;
    let output = match config.output() {
        Some(path) => Some(open_output(path, info)?),
        None => None,
    };
    Ok(Parts {
        detector,
        display,
        keys,
        output,
    })
}

type DisplayParts = (Box<dyn Display>, Option<Box<dyn InputSource>>);

/// A preview path always wins; otherwise a window unless headless.
fn open_display(config: &AnnotateConfig) -> Result<DisplayParts, PipelineError> {
    if let Some(path) = config.preview() {
        return Ok((Box::new(PreviewDisplay::new(path)?), None));
    }
    if config.headless() {
        return Ok((Box::new(HeadlessDisplay::new()), None));
    }
    open_window()
}

#[cfg(feature = "display-opencv")]
fn open_window() -> Result<DisplayParts, PipelineError> {
    let (display, keys) = crate::display::window::open_window(WINDOW_TITLE)?;
    Ok((Box::new(display), Some(Box::new(keys))))
}

#[cfg(not(feature = "display-opencv"))]
fn open_window() -> Result<DisplayParts, PipelineError> {
    log::info!("built without display-opencv; running headless (use --preview to watch)");
    Ok((Box::new(HeadlessDisplay::new()), None))
}
