//! annotate - draw object detections onto a video file or camera feed
//!
//! Built with `display-opencv`, frames are shown in a window where space or
//! `p` pauses/resumes and `q` quits. The terminal always works too (type,
//! then Enter): `p`, space or an empty line pauses/resumes, `q` quits. Ctrl-C
//! also quits; the output file is closed cleanly either way.

use anyhow::Result;
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

use detect_annotate::ui::Ui;
use detect_annotate::{
    build_controller, AnnotateConfig, ConfigOverrides, PlaybackState, StopReason, TerminalInput,
};

/// Sleep between polls while paused.
const PAUSED_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Object detection on video/webcam with box, label and score overlays (p=pause/resume, q=quit)"
)]
struct Args {
    /// Video path (e.g. data/input.mp4), webcam index (e.g. 0), or stub://name?frames=N.
    #[arg(long)]
    source: Option<String>,

    /// Confidence threshold (0 to 1). Higher = fewer detections.
    #[arg(long)]
    conf: Option<f32>,

    /// IoU threshold for non-max suppression (0 to 1).
    #[arg(long)]
    iou: Option<f32>,

    /// ONNX model weights (YOLOv8 export).
    #[arg(long)]
    model: Option<PathBuf>,

    /// Detector backend (stub, or tract when built with backend-tract).
    #[arg(long)]
    backend: Option<String>,

    /// Save the annotated video.
    #[arg(long)]
    save: bool,

    /// Output path used with --save: .y4m, or any container FFmpeg can mux when built with encode-ffmpeg.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Keep the latest annotated frame as a JPEG at this path instead of a window.
    #[arg(long)]
    preview: Option<PathBuf>,

    /// Never open a window.
    #[arg(long)]
    headless: bool,

    /// JSON config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Progress output: auto, plain, or pretty.
    #[arg(long)]
    ui: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let ui = Ui::from_args(args.ui.as_deref(), std::io::stderr().is_terminal());

    let config = {
        let _step = ui.step("load configuration");
        AnnotateConfig::load(ConfigOverrides {
            config_path: args.config,
            source: args.source,
            backend: args.backend,
            model: args.model,
            confidence: args.conf,
            iou: args.iou,
            save: args.save,
            output: args.output,
            preview: args.preview,
            headless: args.headless,
        })?
    };
    log::info!(
        "source={} threshold={} save={}",
        config.source(),
        config.threshold(),
        config.output().is_some()
    );

    let controller = {
        let _step = ui.step("open source + detector");
        build_controller(&config)?
    };
    let input = TerminalInput::spawn()?;
    let mut controller = controller
        .add_input(Box::new(input))
        .with_idle_delay(PAUSED_POLL_INTERVAL);

    eprintln!("Press p or space to pause/resume, q to quit (Enter after each in the terminal).");
    let mut progress = ui.playback();
    while controller.state() != PlaybackState::Stopped {
        controller.tick()?;
        progress.update(controller.state(), controller.stats());
    }
    progress.finish(controller.stats());
    let summary = controller.into_summary()?;

    let stats = &summary.stats;
    log::info!(
        "{} after {} ticks: {} frames processed, {} paused ticks, {} boxes drawn, {} skipped",
        match summary.reason {
            StopReason::Quit => "quit",
            StopReason::EndOfStream => "end of stream",
        },
        stats.ticks,
        stats.frames_processed,
        stats.paused_ticks,
        stats.boxes_drawn,
        stats.boxes_skipped
    );

    println!("\n{}", summary.tally.summary());
    if let Some(path) = config.output() {
        println!(
            "\nSaved annotated video to: {} ({} frames)",
            path.display(),
            stats.frames_written
        );
    }
    Ok(())
}
