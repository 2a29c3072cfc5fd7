//! Dot-repeat state.
//!
//! Two pieces survive each change: the command text that produced it (the
//! pending string as dispatched, counts included) and, when the change went
//! through insert mode, the raw key events typed during that insert
//! session. `.` replays the command text through the grammar; if that
//! re-enters insert mode, the session plays the stored insert events back
//! and exits insert on its own.

use crossterm::event::KeyEvent;

#[derive(Debug, Default)]
pub struct DotRepeat {
    last_change: Option<String>,
    insert_events: Vec<KeyEvent>,
    capture: Option<Vec<KeyEvent>>,
}

impl DotRepeat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_change(&self) -> Option<&str> {
        self.last_change.as_deref()
    }

    /// Remember a change-producing command. Replays of `.` itself never
    /// land here, which is what keeps the repeat from chasing its tail.
    pub fn set_last_change(&mut self, command: &str) {
        self.last_change = Some(command.to_string());
    }

    /// An insert session is starting; key events will be captured until
    /// [`Self::end_insert_capture`].
    pub fn begin_insert_capture(&mut self) {
        self.capture = Some(Vec::new());
    }

    pub fn capture_insert(&mut self, key: KeyEvent) {
        if let Some(events) = self.capture.as_mut() {
            events.push(key);
        }
    }

    /// Commit the captured session as the new insert buffer.
    pub fn end_insert_capture(&mut self) {
        if let Some(events) = self.capture.take() {
            self.insert_events = events;
        }
    }

    /// Drop an in-progress capture without committing (focus loss, reset).
    pub fn abort_insert_capture(&mut self) {
        self.capture = None;
    }

    pub fn insert_events(&self) -> &[KeyEvent] {
        &self.insert_events
    }

    pub fn clear(&mut self) {
        self.last_change = None;
        self.insert_events.clear();
        self.capture = None;
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
    fn test_capture_commits_on_end() {
        let mut dot = DotRepeat::new();
        dot.begin_insert_capture();
        dot.capture_insert(key('h'));
        dot.capture_insert(key('i'));
        assert!(dot.insert_events().is_empty());
        dot.end_insert_capture();
        assert_eq!(dot.insert_events(), &[key('h'), key('i')]);
    }

    #[test]
    fn test_new_capture_replaces_old() {
        let mut dot = DotRepeat::new();
        dot.begin_insert_capture();
        dot.capture_insert(key('a'));
        dot.end_insert_capture();
        dot.begin_insert_capture();
        dot.capture_insert(key('b'));
        dot.end_insert_capture();
        assert_eq!(dot.insert_events(), &[key('b')]);
    }

    #[test]
    fn test_capture_ignored_when_not_active() {
        let mut dot = DotRepeat::new();
        dot.capture_insert(key('x'));
        assert!(dot.insert_events().is_empty());
        dot.abort_insert_capture();
        assert!(dot.last_change().is_none());
    }
}
