//! Non-blocking user input for the playback loop.
//!
//! The loop calls `InputSource::poll` once per tick and never waits on it.
//! `TerminalInput` maps lines typed on stdin and Ctrl-C to events;
//! `ScriptedInput` replays events at fixed ticks for tests and demos.
//! Single key presses from the preview window (feature `display-opencv`)
//! go through `key_event`.

use std::collections::BTreeMap;
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;

use anyhow::{Context, Result};

/// User requests the playback loop reacts to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputEvent {
    TogglePause,
    Quit,
}

/// Source of input events, polled once per tick.
pub trait InputSource {
    /// Events observed since the previous poll, oldest first. Must not block.
    fn poll(&mut self) -> Vec<InputEvent>;
}

/// Map one line typed on the terminal to an event.
///
/// `q` quits; an empty line, a space, or `p` toggles pause.
pub fn parse_command(line: &str) -> Option<InputEvent> {
    let trimmed = line.trim_end_matches(['\r', '\n']);
    match trimmed.trim() {
        "q" | "Q" | "quit" => Some(InputEvent::Quit),
        "" | "p" | "P" | "pause" => Some(InputEvent::TogglePause),
        _ => None,
    }
}

/// Escape.
const KEY_ESC: u8 = 27;

/// Map a key code from a GUI key poll (`-1` when nothing was pressed) to an
/// event. Space or `p` toggles pause; `q` or Escape quits.
pub fn key_event(code: i32) -> Option<InputEvent> {
    if code < 0 {
        return None;
    }
    // HighGUI may report modifier bits above the low byte.
    match (code & 0xFF) as u8 {
        b' ' | b'p' | b'P' => Some(InputEvent::TogglePause),
        b'q' | b'Q' | KEY_ESC => Some(InputEvent::Quit),
        _ => None,
    }
}

/// Keyboard input from the controlling terminal.
///
/// Stdin is line-buffered, so a helper thread does the blocking reads and
/// hands parsed events over a channel; the loop only ever drains the channel.
pub struct TerminalInput {
    events: Receiver<InputEvent>,
    interrupted: Arc<AtomicBool>,
    interrupt_seen: bool,
}

impl TerminalInput {
    pub fn spawn() -> Result<Self> {
        let interrupted = Arc::new(AtomicBool::new(false));
        let flag = interrupted.clone();
        ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
            .context("install Ctrl-C handler")?;

        let (tx, rx) = mpsc::channel();
        std::thread::Builder::new()
            .name("stdin-input".to_string())
            .spawn(move || {
                let stdin = std::io::stdin();
                for line in stdin.lock().lines() {
                    let Ok(line) = line else { break };
                    if let Some(event) = parse_command(&line) {
                        if tx.send(event).is_err() {
                            break;
                        }
                    }
                }
            })
            .context("spawn stdin reader")?;

        Ok(Self {
            events: rx,
            interrupted,
            interrupt_seen: false,
        })
    }
}

impl InputSource for TerminalInput {
    fn poll(&mut self) -> Vec<InputEvent> {
        let mut events = Vec::new();
        loop {
            match self.events.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        if !self.interrupt_seen && self.interrupted.load(Ordering::SeqCst) {
            self.interrupt_seen = true;
            events.push(InputEvent::Quit);
        }
        events
    }
}

/// Replays events keyed by the tick during which they were delivered.
///
/// Ticks are numbered from 1. An event delivered during tick `n` is seen by
/// the poll that opens tick `n + 1`, the way a key pressed while frame `n` is
/// on screen is handled before the next frame. Tick 0 means "pending before
/// the first tick".
#[derive(Default)]
pub struct ScriptedInput {
    script: BTreeMap<u64, Vec<InputEvent>>,
    tick: u64,
}

impl ScriptedInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `event` during tick `tick`.
    pub fn at(mut self, tick: u64, event: InputEvent) -> Self {
        self.script.entry(tick).or_default().push(event);
        self
    }

    /// Ticks polled so far.
    pub fn ticks(&self) -> u64 {
        self.tick
    }
}

impl InputSource for ScriptedInput {
    fn poll(&mut self) -> Vec<InputEvent> {
        let delivered_during = self.tick;
        self.tick += 1;
        self.script.remove(&delivered_during).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_commands_map_to_events() {
        assert_eq!(parse_command("q\n"), Some(InputEvent::Quit));
        assert_eq!(parse_command("\n"), Some(InputEvent::TogglePause));
        assert_eq!(parse_command(" "), Some(InputEvent::TogglePause));
        assert_eq!(parse_command("p"), Some(InputEvent::TogglePause));
        assert_eq!(parse_command("hello"), None);
    }

    #[test]
    fn window_keys_map_to_events() {
        assert_eq!(key_event(-1), None);
        assert_eq!(key_event(' ' as i32), Some(InputEvent::TogglePause));
        assert_eq!(key_event('p' as i32), Some(InputEvent::TogglePause));
        assert_eq!(key_event('q' as i32), Some(InputEvent::Quit));
        assert_eq!(key_event(27), Some(InputEvent::Quit));
        assert_eq!(key_event(0x10_0000 | 'q' as i32), Some(InputEvent::Quit));
        assert_eq!(key_event('x' as i32), None);
    }

    #[test]
    fn scripted_input_replays_by_tick() {
        let mut input = ScriptedInput::new()
            .at(2, InputEvent::TogglePause)
            .at(2, InputEvent::Quit);
        assert!(input.poll().is_empty());
        assert!(input.poll().is_empty());
        assert_eq!(
            input.poll(),
            vec![InputEvent::TogglePause, InputEvent::Quit]
        );
        assert!(input.poll().is_empty());
        assert_eq!(input.ticks(), 4);
    }
}
