//! Terminal progress on stderr: startup steps, then a live playback line.
//!
//! Pretty output (spinners) needs a TTY; `--ui plain` or a redirected stderr
//! falls back to plain lines.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

use crate::playback::{PlaybackState, RunStats};

const SPINNER_TICK: Duration = Duration::from_millis(120);
/// Plain mode prints a progress line every this many processed frames.
const PLAIN_REPORT_EVERY: u64 = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

impl UiMode {
    /// Unknown values fall back to `Auto`.
    pub fn parse(flag: Option<&str>) -> Self {
        match flag.map(str::trim) {
            Some("plain") => Self::Plain,
            Some("pretty") => Self::Pretty,
            _ => Self::Auto,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Ui {
    pretty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool) -> Self {
        Self {
            pretty: is_tty && mode != UiMode::Plain,
        }
    }

    pub fn from_args(flag: Option<&str>, is_tty: bool) -> Self {
        Self::new(UiMode::parse(flag), is_tty)
    }

    fn spinner(&self, template: &str) -> Option<ProgressBar> {
        if !self.pretty {
            return None;
        }
        let bar = ProgressBar::new_spinner();
        bar.set_draw_target(ProgressDrawTarget::stderr());
        bar.set_style(
            ProgressStyle::with_template(template)
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.enable_steady_tick(SPINNER_TICK);
        Some(bar)
    }

    /// Start a named startup step. It reports done (with elapsed time) when dropped.
    pub fn step(&self, name: &str) -> Step {
        let bar = self.spinner("{spinner} {msg}");
        match &bar {
            Some(bar) => bar.set_message(format!("{name}...")),
            None => eprintln!("==> {name}"),
        }
        Step {
            name: name.to_string(),
            started: Instant::now(),
            bar,
        }
    }

    /// Live status for the playback loop.
    pub fn playback(&self) -> PlaybackProgress {
        PlaybackProgress {
            bar: self.spinner("{spinner} [{elapsed_precise}] {msg}"),
            last_reported: 0,
            last_state: PlaybackState::Running,
        }
    }
}

pub struct Step {
    name: String,
    started: Instant,
    bar: Option<ProgressBar>,
}

impl Drop for Step {
    fn drop(&mut self) {
        let done = format!("done: {} ({})", self.name, format_elapsed(self.started.elapsed()));
        match &self.bar {
            Some(bar) => bar.finish_with_message(done),
            None => eprintln!("{done}"),
        }
    }
}

pub struct PlaybackProgress {
    bar: Option<ProgressBar>,
    last_reported: u64,
    last_state: PlaybackState,
}

impl PlaybackProgress {
    /// Refresh after a tick.
    pub fn update(&mut self, state: PlaybackState, stats: &RunStats) {
        let line = status_line(state, stats);
        match &self.bar {
            Some(bar) => bar.set_message(line),
            None => {
                let due = stats.frames_processed >= self.last_reported + PLAIN_REPORT_EVERY;
                if due || state != self.last_state {
                    eprintln!("{line}");
                    self.last_reported = stats.frames_processed;
                }
            }
        }
        self.last_state = state;
    }

    pub fn finish(self, stats: &RunStats) {
        if let Some(bar) = self.bar {
            bar.finish_with_message(status_line(PlaybackState::Stopped, stats));
        }
    }
}

fn status_line(state: PlaybackState, stats: &RunStats) -> String {
    let state = match state {
        PlaybackState::Running => "running",
        PlaybackState::Paused => "paused",
        PlaybackState::Stopped => "stopped",
    };
    format!(
        "{state}: {} frames, {} boxes",
        stats.frames_processed, stats.boxes_drawn
    )
}

fn format_elapsed(elapsed: Duration) -> String {
    match elapsed.as_secs() {
        0 => format!("{}ms", elapsed.as_millis()),
        _ => format!("{:.2}s", elapsed.as_secs_f64()),
    }
}
