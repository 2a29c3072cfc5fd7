//! Commandline mode: the `:`/`/` minibuffer and its command table.
//!
//! This is the single canonical table; when the host palette is used
//! instead of the internal commandline, submitted text is routed back
//! through [`execute`] so the two paths cannot diverge.

use crate::host::{HostEditor, Position, clamp_position};
use crate::motion;
use crate::session::EditorSession;

/// Live minibuffer state. `text` always starts with the seeding `:` or
/// `/`; `cursor` is a byte offset into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandlineState {
    pub text: String,
    pub cursor: usize,
}

impl CommandlineState {
    pub fn new(seed: char) -> Self {
        Self {
            text: seed.to_string(),
            cursor: seed.len_utf8(),
        }
    }

    pub fn insert_char(&mut self, c: char) {
        self.text.insert(self.cursor, c);
        self.cursor += c.len_utf8();
    }

    /// Remove the char before the cursor. Returns `false` once the buffer
    /// is empty, which cancels commandline mode.
    pub fn backspace(&mut self) -> bool {
        if self.cursor > 0 {
            let prev = motion::prev_boundary(&self.text, self.cursor);
            self.text.replace_range(prev..self.cursor, "");
            self.cursor = prev;
        }
        !self.text.is_empty()
    }

    pub fn move_left(&mut self) {
        self.cursor = motion::prev_boundary(&self.text, self.cursor);
    }

    pub fn move_right(&mut self) {
        self.cursor = motion::next_boundary(&self.text, self.cursor);
    }

    pub fn move_home(&mut self) {
        // Keep the seed character to the left of the cursor.
        self.cursor = self
            .text
            .chars()
            .next()
            .map(char::len_utf8)
            .unwrap_or(0)
            .min(self.text.len());
    }

    pub fn move_end(&mut self) {
        self.cursor = self.text.len();
    }
}

/// Run a submitted commandline. The session is already back in Command
/// mode; errors surface as one-line status messages.
pub(crate) fn execute(s: &mut EditorSession, host: &mut dyn HostEditor, text: &str) {
    if let Some(pattern) = text.strip_prefix('/') {
        submit_search(s, host, pattern);
    } else if let Some(cmd) = text.strip_prefix(':') {
        submit_colon(s, host, cmd.trim());
    }
}

fn submit_search(s: &mut EditorSession, host: &mut dyn HostEditor, pattern: &str) {
    // A bare `/` repeats the previous search.
    let pattern = if pattern.is_empty() {
        match s.last_search.clone() {
            Some(p) => p,
            None => return,
        }
    } else {
        pattern.to_string()
    };
    match motion::search_forward(&*host, host.cursor(), &pattern) {
        Some(pos) => {
            let pos = clamp_position(host, pos, false);
            host.set_cursor(pos);
            s.last_search = Some(pattern);
        }
        None => {
            s.message = Some(format!("pattern not found: {pattern}"));
        }
    }
}

fn submit_colon(s: &mut EditorSession, host: &mut dyn HostEditor, cmd: &str) {
    if cmd.is_empty() {
        return;
    }
    // `:<n>` jumps to line n.
    if let Ok(n) = cmd.parse::<usize>() {
        let line = n.saturating_sub(1).min(host.line_count().saturating_sub(1));
        let text = host.line(line).unwrap_or_default();
        host.set_cursor(Position::new(line, motion::first_non_blank(&text)));
        return;
    }

    let mut parts = cmd.split_whitespace();
    let name = parts.next().unwrap_or_default();
    match name {
        "w" | "write" => save(s, host),
        "q" | "quit" => host.request_quit(),
        "wq" | "x" => {
            save(s, host);
            host.request_quit();
        }
        "set" => match (parts.next(), parts.next()) {
            (Some(key), Some(value)) => {
                host.set_setting(key, value);
                s.setting_changed(host, key);
            }
            (Some(key), None) => {
                let value = host.setting(key).unwrap_or_else(|| "<unset>".to_string());
                s.message = Some(format!("{key}={value}"));
            }
            _ => {
                s.message = Some("usage: set <name> [value]".to_string());
            }
        },
        "nohl" | "nohlsearch" => {
            s.last_search = None;
        }
        other => {
            log::debug!("rejected commandline input {other:?}");
            s.message = Some(format!("not an editor command: {other}"));
        }
    }
}

fn save(s: &mut EditorSession, host: &mut dyn HostEditor) {
    if let Err(err) = host.save() {
        log::warn!("save failed: {err}");
        s.message = Some(format!("write failed: {err}"));
    } else {
        s.message = Some("written".to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_editing() {
        let mut st = CommandlineState::new(':');
        st.insert_char('w');
        st.insert_char('q');
        assert_eq!(st.text, ":wq");
        assert_eq!(st.cursor, 3);
        st.move_left();
        assert_eq!(st.cursor, 2);
        st.insert_char('a');
        assert_eq!(st.text, ":waq");
        assert!(st.backspace());
        assert_eq!(st.text, ":wq");
    }

    #[test]
    fn test_backspace_to_empty_cancels() {
        let mut st = CommandlineState::new(':');
        assert!(!st.backspace());
        assert!(st.text.is_empty());
    }

    #[test]
    fn test_home_keeps_seed() {
        let mut st = CommandlineState::new('/');
        st.insert_char('a');
        st.insert_char('b');
        st.move_home();
        assert_eq!(st.cursor, 1);
        st.move_end();
        assert_eq!(st.cursor, 3);
    }
}
