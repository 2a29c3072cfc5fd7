//! Macro recording.
//!
//! `q<reg>` starts capturing key events into a named register, a bare `q`
//! seals it, `@<reg>` replays. Capture happens at the top of the session's
//! key dispatch so consumed keys are recorded too; the sealing `q` is the
//! one event that slips into the buffer before the recorder learns about
//! it, so `stop` trims it from the tail.

use std::collections::HashMap;

use crossterm::event::KeyEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecorderState {
    #[default]
    Idle,
    Recording(char),
}

#[derive(Debug, Default)]
pub struct MacroRecorder {
    state: RecorderState,
    registers: HashMap<char, Vec<KeyEvent>>,
}

impl MacroRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn recording_register(&self) -> Option<char> {
        match self.state {
            RecorderState::Recording(reg) => Some(reg),
            RecorderState::Idle => None,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recording_register().is_some()
    }

    /// Begin recording into `reg`, overwriting any previous contents.
    pub fn start(&mut self, reg: char) {
        self.registers.insert(reg, Vec::new());
        self.state = RecorderState::Recording(reg);
    }

    /// Seal the active register, trimming the captured stop keystroke.
    pub fn stop(&mut self) {
        if let RecorderState::Recording(reg) = self.state {
            if let Some(events) = self.registers.get_mut(&reg) {
                events.pop();
            }
            self.state = RecorderState::Idle;
        }
    }

    /// Discard an in-progress recording, register included. Used when the
    /// session is reset underneath us (focus change).
    pub fn abort(&mut self) {
        if let RecorderState::Recording(reg) = self.state {
            self.registers.remove(&reg);
            self.state = RecorderState::Idle;
        }
    }

    /// Append one live event to the active register.
    pub fn capture(&mut self, key: KeyEvent) {
        if let RecorderState::Recording(reg) = self.state {
            if let Some(events) = self.registers.get_mut(&reg) {
                events.push(key);
            }
        }
    }

    pub fn events(&self, reg: char) -> Option<&[KeyEvent]> {
        self.registers.get(&reg).map(Vec::as_slice)
    }

    pub fn clear(&mut self) {
        self.state = RecorderState::Idle;
        self.registers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyModifiers};

    fn key(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
    }

    #[test]
    fn test_record_and_seal() {
        let mut rec = MacroRecorder::new();
        rec.start('a');
        assert!(rec.is_recording());
        rec.capture(key('d'));
        rec.capture(key('w'));
        rec.capture(key('q')); // the stop keystroke itself
        rec.stop();
        assert!(!rec.is_recording());
        assert_eq!(rec.events('a').unwrap(), &[key('d'), key('w')]);
    }

    #[test]
    fn test_restart_overwrites() {
        let mut rec = MacroRecorder::new();
        rec.start('a');
        rec.capture(key('x'));
        rec.capture(key('q'));
        rec.stop();
        rec.start('a');
        rec.capture(key('q'));
        rec.stop();
        assert_eq!(rec.events('a').unwrap(), &[] as &[KeyEvent]);
    }

    #[test]
    fn test_unknown_register() {
        let rec = MacroRecorder::new();
        assert!(rec.events('z').is_none());
    }
}
