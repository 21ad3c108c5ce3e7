//! Playback controller.
//!
//! One control thread runs ticks strictly in order:
//! 1. Drain input (non-blocking). Quit wins from any state; toggle flips
//!    Running and Paused.
//! 2. Paused ticks stop here: no frame is pulled.
//! 3. Running ticks pull a frame; end of stream stops the loop.
//! 4. Detect, re-filter against the threshold, render, display, and append
//!    to the output stream when one is configured.
//!
//! Resources are released once, output first then source, on every exit
//! path: normal stop, fatal error, or the controller being dropped mid-run.

use std::time::Duration;

use crate::config::{AnnotateConfig, Threshold};
use crate::detect::{filter_detections, DetectorBackend};
use crate::display::{Display, HeadlessDisplay};
use crate::error::PipelineError;
use crate::frame::Frame;
use crate::ingest::FrameSource;
use crate::input::{InputEvent, InputSource};
use crate::output::OutputSink;
use crate::render::Renderer;
use crate::tally::DetectionTally;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    Running,
    Paused,
    Stopped,
}

impl PlaybackState {
    /// Next state after a user event.
    pub fn on_event(self, event: InputEvent) -> Self {
        match (self, event) {
            (Self::Stopped, _) => Self::Stopped,
            (_, InputEvent::Quit) => Self::Stopped,
            (Self::Running, InputEvent::TogglePause) => Self::Paused,
            (Self::Paused, InputEvent::TogglePause) => Self::Running,
        }
    }

    /// Next state when the source runs dry. Only a running loop pulls frames.
    pub fn on_end_of_stream(self) -> Self {
        match self {
            Self::Running => Self::Stopped,
            other => other,
        }
    }
}

/// What one tick did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    Processed { frame_index: u64, boxes_drawn: usize },
    Paused,
    EndOfStream,
    /// The loop is stopped; nothing was pulled.
    Stopped,
}

/// Why the loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    Quit,
    EndOfStream,
}

/// Counters reported after a run.
#[derive(Clone, Debug, Default)]
pub struct RunStats {
    pub ticks: u64,
    pub paused_ticks: u64,
    pub frames_processed: u64,
    pub frames_written: u64,
    pub boxes_drawn: u64,
    pub boxes_skipped: u64,
}

#[derive(Clone, Debug)]
pub struct RunSummary {
    pub stats: RunStats,
    pub tally: DetectionTally,
    pub reason: StopReason,
}

pub struct PlaybackController {
    threshold: Threshold,
    source: Option<Box<dyn FrameSource>>,
    detector: Box<dyn DetectorBackend>,
    renderer: Renderer,
    display: Box<dyn Display>,
    output: Option<Box<dyn OutputSink>>,
    inputs: Vec<Box<dyn InputSource>>,
    state: PlaybackState,
    stop_reason: Option<StopReason>,
    idle_delay: Duration,
    stats: RunStats,
    tally: DetectionTally,
}

impl PlaybackController {
    /// Controller for `source` and `detector`, using the run's threshold.
    ///
    /// Defaults: headless display, no output stream, no user input.
    pub fn new(
        config: &AnnotateConfig,
        source: Box<dyn FrameSource>,
        detector: Box<dyn DetectorBackend>,
    ) -> Self {
        Self {
            threshold: config.threshold(),
            source: Some(source),
            detector,
            renderer: Renderer::default(),
            display: Box::new(HeadlessDisplay::new()),
            output: None,
            inputs: Vec::new(),
            state: PlaybackState::Running,
            stop_reason: None,
            idle_delay: Duration::ZERO,
            stats: RunStats::default(),
            tally: DetectionTally::new(),
        }
    }

    pub fn with_output(mut self, output: Box<dyn OutputSink>) -> Self {
        self.output = Some(output);
        self
    }

    pub fn with_display(mut self, display: Box<dyn Display>) -> Self {
        self.display = display;
        self
    }

    /// Replace every input source with `input`.
    pub fn with_input(mut self, input: Box<dyn InputSource>) -> Self {
        self.inputs = vec![input];
        self
    }

    /// Poll `input` as well as the sources already attached, e.g. window
    /// keys alongside the terminal.
    pub fn add_input(mut self, input: Box<dyn InputSource>) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn with_renderer(mut self, renderer: Renderer) -> Self {
        self.renderer = renderer;
        self
    }

    /// Sleep applied on paused ticks so waiting for input does not spin.
    pub fn with_idle_delay(mut self, delay: Duration) -> Self {
        self.idle_delay = delay;
        self
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn tally(&self) -> &DetectionTally {
        &self.tally
    }

    /// Run one tick. A fatal error stops the loop and releases resources
    /// before it is returned.
    pub fn tick(&mut self) -> Result<TickOutcome, PipelineError> {
        match self.step() {
            Ok(outcome) => {
                if self.state == PlaybackState::Stopped {
                    self.shutdown()?;
                }
                Ok(outcome)
            }
            Err(err) => {
                log::error!("playback aborted: {}", err);
                self.state = PlaybackState::Stopped;
                if let Err(release_err) = self.shutdown() {
                    log::error!("release after failure also failed: {}", release_err);
                }
                Err(err)
            }
        }
    }

    /// Tick until stopped.
    pub fn run(mut self) -> Result<RunSummary, PipelineError> {
        while self.state != PlaybackState::Stopped {
            self.tick()?;
        }
        self.into_summary()
    }

    /// Release anything still open and report the run. Callers driving
    /// `tick` themselves finish with this.
    pub fn into_summary(mut self) -> Result<RunSummary, PipelineError> {
        self.state = PlaybackState::Stopped;
        self.shutdown()?;
        Ok(RunSummary {
            stats: self.stats.clone(),
            tally: self.tally.clone(),
            reason: self.stop_reason.unwrap_or(StopReason::Quit),
        })
    }

    fn step(&mut self) -> Result<TickOutcome, PipelineError> {
        if self.state == PlaybackState::Stopped {
            return Ok(TickOutcome::Stopped);
        }
        self.stats.ticks += 1;

        let events: Vec<InputEvent> = self
            .inputs
            .iter_mut()
            .flat_map(|input| input.poll())
            .collect();
        for event in events {
            let next = self.state.on_event(event);
            if next != self.state {
                log::info!("playback {:?} -> {:?} ({:?})", self.state, next, event);
                if next == PlaybackState::Stopped {
                    self.stop_reason = Some(StopReason::Quit);
                }
                self.state = next;
            }
        }

        match self.state {
            PlaybackState::Stopped => return Ok(TickOutcome::Stopped),
            PlaybackState::Paused => {
                self.stats.paused_ticks += 1;
                if !self.idle_delay.is_zero() {
                    std::thread::sleep(self.idle_delay);
                }
                return Ok(TickOutcome::Paused);
            }
            PlaybackState::Running => {}
        }

        let next = self.source.as_mut().and_then(|source| source.next_frame());
        let Some(frame) = next else {
            log::info!(
                "end of stream after {} frames",
                self.stats.frames_processed
            );
            self.state = self.state.on_end_of_stream();
            self.stop_reason = Some(StopReason::EndOfStream);
            return Ok(TickOutcome::EndOfStream);
        };

        self.process(frame)
    }

    fn process(&mut self, frame: Frame) -> Result<TickOutcome, PipelineError> {
        let raw = self
            .detector
            .detect(&frame, self.threshold)
            .map_err(|cause| PipelineError::OracleFailure {
                backend: self.detector.name().to_string(),
                frame_index: frame.index(),
                cause,
            })?;
        let detections = filter_detections(raw, self.threshold);

        let annotated = self.renderer.render(&frame, &detections);
        self.display.show(&annotated.frame)?;
        if let Some(output) = self.output.as_mut() {
            output.write(&annotated.frame)?;
            self.stats.frames_written = output.frames_written();
        }

        self.tally.record(&detections);
        self.stats.frames_processed += 1;
        self.stats.boxes_drawn += annotated.boxes_drawn as u64;
        self.stats.boxes_skipped += annotated.skipped as u64;
        log::debug!(
            "frame {}: {} detection(s), {} drawn, {} skipped",
            frame.index(),
            detections.len(),
            annotated.boxes_drawn,
            annotated.skipped
        );

        Ok(TickOutcome::Processed {
            frame_index: frame.index(),
            boxes_drawn: annotated.boxes_drawn,
        })
    }

    /// Release output then source. Each is released at most once; later
    /// calls are no-ops.
    fn shutdown(&mut self) -> Result<(), PipelineError> {
        let finished = match self.output.take() {
            Some(mut output) => output.finish(),
            None => Ok(()),
        };
        if let Some(mut source) = self.source.take() {
            source.close();
        }
        finished
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            log::error!("release on drop failed: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_table() {
        use InputEvent::*;
        use PlaybackState::*;

        assert_eq!(Running.on_event(Quit), Stopped);
        assert_eq!(Running.on_event(TogglePause), Paused);
        assert_eq!(Running.on_end_of_stream(), Stopped);
        assert_eq!(Paused.on_event(Quit), Stopped);
        assert_eq!(Paused.on_event(TogglePause), Running);
        assert_eq!(Paused.on_end_of_stream(), Paused);
        assert_eq!(Stopped.on_event(Quit), Stopped);
        assert_eq!(Stopped.on_event(TogglePause), Stopped);
        assert_eq!(Stopped.on_end_of_stream(), Stopped);
    }
}
