use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Mutex;

use detect_annotate::{
    build_controller, build_controller_from_source, build_detector, AnnotateConfig,
    ConfigOverrides, Frame, FrameSource, InputEvent, PipelineError, ScriptedInput, SourceInfo,
    StopReason,
};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "ANNOTATE_CONFIG",
        "ANNOTATE_SOURCE",
        "ANNOTATE_CONF",
        "ANNOTATE_IOU",
        "ANNOTATE_MODEL",
        "ANNOTATE_OUTPUT",
        "ANNOTATE_HEADLESS",
    ] {
        std::env::remove_var(key);
    }
}

fn stub_config(source: &str, output: Option<PathBuf>, preview: Option<PathBuf>) -> AnnotateConfig {
    clear_env();
    AnnotateConfig::load(ConfigOverrides {
        source: Some(source.to_string()),
        backend: Some("stub".to_string()),
        confidence: Some(0.5),
        save: output.is_some(),
        output,
        preview,
        headless: true,
        ..ConfigOverrides::default()
    })
    .expect("config")
}

#[test]
fn synthetic_run_writes_y4m_and_tallies_detections() {
    let _guard = ENV_LOCK.lock().unwrap();
    let dir = tempfile::tempdir().expect("tempdir");
    let output = dir.path().join("outputs").join("annotated.y4m");
    let preview = dir.path().join("preview.jpg");
    let config = stub_config(
        "stub://street?frames=5&width=32&height=24&fps=8",
        Some(output.clone()),
        Some(preview.clone()),
    );

    let summary = build_controller(&config)
        .expect("controller")
        .run()
        .expect("run");

    assert_eq!(summary.reason, StopReason::EndOfStream);
    assert_eq!(summary.stats.frames_processed, 5);
    assert_eq!(summary.stats.frames_written, 5);
    // The stub's confidence cycle clears 0.5 on frames 2, 3 and 4.
    assert_eq!(summary.tally.get("person"), 3);
    assert_eq!(summary.stats.boxes_drawn, 3);

    let bytes = std::fs::read(&output).expect("read output");
    let header = b"YUV4MPEG2 W32 H24 F8:1 Ip A1:1 C444\n";
    assert!(bytes.starts_with(header));
    let frame_len = b"FRAME\n".len() + 32 * 24 * 3;
    assert_eq!(bytes.len(), header.len() + 5 * frame_len);

    let jpeg = std::fs::read(&preview).expect("read preview");
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
}

#[test]
fn quit_event_stops_a_live_like_source() {
    let _guard = ENV_LOCK.lock().unwrap();
    let dir = tempfile::tempdir().expect("tempdir");
    let output = dir.path().join("quit.y4m");
    // No frame count: the source never ends on its own.
    let config = stub_config("stub://live?width=16&height=16", Some(output.clone()), None);

    let summary = build_controller(&config)
        .expect("controller")
        .with_input(Box::new(ScriptedInput::new().at(3, InputEvent::Quit)))
        .run()
        .expect("run");

    assert_eq!(summary.reason, StopReason::Quit);
    assert_eq!(summary.stats.frames_written, 3);
    let bytes = std::fs::read(&output).expect("read output");
    let frame_len = b"FRAME\n".len() + 16 * 16 * 3;
    let header_len = bytes.len() - 3 * frame_len;
    assert!(bytes[..header_len].starts_with(b"YUV4MPEG2 W16 H16"));
}

#[test]
fn missing_video_file_is_a_startup_error() {
    let _guard = ENV_LOCK.lock().unwrap();
    let dir = tempfile::tempdir().expect("tempdir");
    let output = dir.path().join("never.y4m");
    let missing = dir.path().join("missing.mp4");
    let config = stub_config(
        missing.to_str().expect("utf-8 path"),
        Some(output.clone()),
        None,
    );

    match build_controller(&config) {
        Err(PipelineError::SourceUnavailable { .. }) => {}
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("missing file must not open"),
    }
    // The output stream is only opened once the source is known to work.
    assert!(!output.exists());
}

#[test]
fn unknown_backend_is_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();
    let config = AnnotateConfig::load(ConfigOverrides {
        source: Some("stub://x?frames=1".to_string()),
        backend: Some("does-not-exist".to_string()),
        ..ConfigOverrides::default()
    })
    .expect("config");

    assert!(matches!(
        build_detector(&config),
        Err(PipelineError::InvalidConfig(_))
    ));
}

/// Source that only counts how often it is closed.
struct ClosingSource {
    info: SourceInfo,
    closed: Rc<Cell<u32>>,
}

impl ClosingSource {
    fn new(closed: &Rc<Cell<u32>>) -> Box<Self> {
        Box::new(Self {
            info: SourceInfo {
                width: 16,
                height: 16,
                fps: 10.0,
                description: "closing".to_string(),
            },
            closed: closed.clone(),
        })
    }
}

impl FrameSource for ClosingSource {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn next_frame(&mut self) -> Option<Frame> {
        None
    }

    fn close(&mut self) {
        self.closed.set(self.closed.get() + 1);
    }
}

#[test]
fn source_is_closed_when_the_detector_fails_to_build() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();
    let config = AnnotateConfig::load(ConfigOverrides {
        source: Some("stub://x?frames=1".to_string()),
        backend: Some("does-not-exist".to_string()),
        headless: true,
        ..ConfigOverrides::default()
    })
    .expect("config");

    let closed = Rc::new(Cell::new(0));
    match build_controller_from_source(&config, ClosingSource::new(&closed)) {
        Err(PipelineError::InvalidConfig(_)) => {}
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("unknown backend must not build"),
    }
    assert_eq!(closed.get(), 1);
}

#[test]
fn source_is_closed_when_the_output_cannot_open() {
    let _guard = ENV_LOCK.lock().unwrap();
    let dir = tempfile::tempdir().expect("tempdir");
    // A regular file where the output directory should be.
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"not a directory").expect("write blocker");
    let config = stub_config(
        "stub://x?frames=1",
        Some(blocker.join("out.y4m")),
        None,
    );

    let closed = Rc::new(Cell::new(0));
    match build_controller_from_source(&config, ClosingSource::new(&closed)) {
        Err(PipelineError::OutputUnavailable { .. }) => {}
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("output under a file must not open"),
    }
    assert_eq!(closed.get(), 1);
}

#[test]
fn source_stays_open_for_the_controller_on_success() {
    let _guard = ENV_LOCK.lock().unwrap();
    let config = stub_config("stub://x?frames=1", None, None);

    let closed = Rc::new(Cell::new(0));
    let controller =
        build_controller_from_source(&config, ClosingSource::new(&closed)).expect("controller");
    assert_eq!(closed.get(), 0);

    let summary = controller.run().expect("run");
    assert_eq!(summary.reason, StopReason::EndOfStream);
    assert_eq!(closed.get(), 1);
}
