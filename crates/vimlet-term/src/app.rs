//! The application: tabs of text buffers behind the engine's host
//! adapter.
//!
//! `App` implements [`HostEditor`] over the active tab and owns the
//! surrounding state the engine expects a host to have: settings, status
//! line, cursor styling, the system clipboard, and a command palette used
//! when the internal commandline is disabled. Tab switches requested
//! mid-dispatch (`gt`, `:q`) are deferred until the key event has fully
//! unwound, then applied together with the session reset that a focus
//! change requires.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use vimlet_core::{
    BufferRead, BuiltinCommand, CursorShape, EditorSession, HostEditor, HostError, Position, Range,
};

use crate::buffer::TextBuffer;
use crate::clipboard::SystemClipboard;
use crate::config::Config;

pub struct EditorTab {
    pub name: String,
    pub path: Option<PathBuf>,
    pub buffer: TextBuffer,
    pub cursor: Position,
}

impl EditorTab {
    pub fn scratch() -> Self {
        Self {
            name: "[scratch]".to_string(),
            path: None,
            buffer: TextBuffer::new(),
            cursor: Position::default(),
        }
    }

    pub fn from_file(path: PathBuf) -> anyhow::Result<Self> {
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            // A fresh name is fine; the file appears on `:w`.
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(err) => return Err(err.into()),
        };
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self {
            name,
            path: Some(path),
            buffer: TextBuffer::from_text(text.trim_end_matches('\n')),
            cursor: Position::default(),
        })
    }
}

/// Minibuffer state for the host-side command palette.
pub struct Palette {
    pub text: String,
    pub cursor: usize,
}

pub struct App {
    pub tabs: Vec<EditorTab>,
    pub active: usize,
    pub session: EditorSession,
    pub config: Config,
    settings: HashMap<String, String>,
    clipboard: SystemClipboard,
    pub status: String,
    pub shape: CursorShape,
    pub cursor_visible: bool,
    pub selection: Option<(Range, bool)>,
    pub palette: Option<Palette>,
    pub should_quit: bool,
    tab_delta: i32,
    close_requested: bool,
    palette_requested: bool,
}

impl App {
    pub fn new(config: Config, mut tabs: Vec<EditorTab>) -> Self {
        if tabs.is_empty() {
            tabs.push(EditorTab::scratch());
        }
        let settings = config.as_settings();
        Self {
            tabs,
            active: 0,
            session: EditorSession::new(),
            config,
            settings,
            clipboard: SystemClipboard::new(),
            status: String::new(),
            shape: CursorShape::Block,
            cursor_visible: true,
            selection: None,
            palette: None,
            should_quit: false,
            tab_delta: 0,
            close_requested: false,
            palette_requested: false,
        }
    }

    pub fn active_tab(&self) -> &EditorTab {
        &self.tabs[self.active]
    }

    fn active_tab_mut(&mut self) -> &mut EditorTab {
        &mut self.tabs[self.active]
    }

    pub fn handle_event(&mut self, event: Event) {
        if let Event::Key(key) = event {
            if key.kind == KeyEventKind::Release {
                return;
            }
            if self.palette.is_some() {
                self.handle_palette_key(key);
                return;
            }
            // Thread the session through the dispatch without aliasing
            // the host borrow.
            let mut session = std::mem::take(&mut self.session);
            let handled = session.handle_key(self, key);
            self.session = session;
            if !handled {
                self.handle_app_key(key);
            }
            self.after_dispatch();
        }
    }

    /// Host-level bindings for keys the engine passed through.
    fn handle_app_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Char('q') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
        }
    }

    /// Apply side effects a dispatch requested: tab switches, tab closes,
    /// the palette. All of them are focus changes for the session.
    fn after_dispatch(&mut self) {
        if self.close_requested {
            self.close_requested = false;
            self.tabs.remove(self.active);
            if self.tabs.is_empty() {
                self.should_quit = true;
                return;
            }
            if self.active >= self.tabs.len() {
                self.active = self.tabs.len() - 1;
            }
            self.reset_session();
        }
        if self.tab_delta != 0 && self.tabs.len() > 1 {
            let len = self.tabs.len() as i32;
            let next = (self.active as i32 + self.tab_delta).rem_euclid(len) as usize;
            self.tab_delta = 0;
            if next != self.active {
                self.reset_session();
                self.active = next;
            }
        } else {
            self.tab_delta = 0;
        }
        if self.palette_requested {
            self.palette_requested = false;
            self.palette = Some(Palette {
                text: ":".to_string(),
                cursor: 1,
            });
        }
    }

    fn reset_session(&mut self) {
        let mut session = std::mem::take(&mut self.session);
        session.reset(self);
        self.session = session;
    }

    fn handle_palette_key(&mut self, key: KeyEvent) {
        let Some(palette) = self.palette.as_mut() else {
            return;
        };
        match key.code {
            KeyCode::Esc => {
                self.palette = None;
            }
            KeyCode::Enter => {
                let text = palette.text.clone();
                self.palette = None;
                let mut session = std::mem::take(&mut self.session);
                session.submit_command(self, &text);
                self.session = session;
                self.after_dispatch();
            }
            KeyCode::Backspace => {
                if palette.cursor > 0 {
                    let prev = palette.text[..palette.cursor]
                        .char_indices()
                        .next_back()
                        .map(|(i, _)| i)
                        .unwrap_or(0);
                    palette.text.replace_range(prev..palette.cursor, "");
                    palette.cursor = prev;
                }
                if palette.text.is_empty() {
                    self.palette = None;
                }
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                palette.text.insert(palette.cursor, c);
                palette.cursor += c.len_utf8();
            }
            _ => {}
        }
    }
}

impl BufferRead for App {
    fn line(&self, index: usize) -> Option<String> {
        self.active_tab().buffer.line(index).map(str::to_string)
    }

    fn line_count(&self) -> usize {
        self.active_tab().buffer.line_count()
    }
}

impl HostEditor for App {
    fn cursor(&self) -> Position {
        self.active_tab().cursor
    }

    fn set_cursor(&mut self, pos: Position) {
        let clamped = self.active_tab().buffer.clamp(pos);
        self.active_tab_mut().cursor = clamped;
    }

    fn set_line(&mut self, index: usize, text: &str) {
        let tab = self.active_tab_mut();
        tab.buffer.set_line(index, text);
        tab.cursor = tab.buffer.clamp(tab.cursor);
    }

    fn insert_line(&mut self, index: usize, text: &str) {
        self.active_tab_mut().buffer.insert_line(index, text);
    }

    fn remove_line(&mut self, index: usize) -> String {
        let tab = self.active_tab_mut();
        let removed = tab.buffer.remove_line(index);
        tab.cursor = tab.buffer.clamp(tab.cursor);
        removed
    }

    fn insert_at_cursor(&mut self, text: &str) {
        let tab = self.active_tab_mut();
        tab.cursor = tab.buffer.insert_at(tab.cursor, text);
    }

    fn set_selection(&mut self, range: Range, cursor_at_start: bool) {
        self.selection = Some((range, cursor_at_start));
    }

    fn clear_selection(&mut self) {
        self.selection = None;
    }

    fn run_command(&mut self, cmd: BuiltinCommand) -> Result<(), HostError> {
        match cmd {
            BuiltinCommand::Cut | BuiltinCommand::Copy => {
                let (range, _) = self
                    .selection
                    .ok_or_else(|| HostError::Io("no selection".to_string()))?;
                let text = self.active_tab().buffer.slice(range);
                self.clipboard.set(&text);
                if cmd == BuiltinCommand::Cut {
                    let tab = self.active_tab_mut();
                    tab.cursor = tab.buffer.delete(range);
                }
            }
            BuiltinCommand::Undo => {
                let tab = self.active_tab_mut();
                if let Some(cursor) = tab.buffer.undo(tab.cursor) {
                    tab.cursor = cursor;
                }
            }
            BuiltinCommand::Redo => {
                let tab = self.active_tab_mut();
                if let Some(cursor) = tab.buffer.redo(tab.cursor) {
                    tab.cursor = cursor;
                }
            }
            BuiltinCommand::IndentLine => {
                let indent = " ".repeat(self.config.indent_width);
                let tab = self.active_tab_mut();
                let line = tab.cursor.line;
                if let Some(text) = tab.buffer.line(line).map(str::to_string) {
                    tab.buffer.set_line(line, &format!("{indent}{text}"));
                }
            }
            BuiltinCommand::UnindentLine => {
                let width = self.config.indent_width;
                let tab = self.active_tab_mut();
                let line = tab.cursor.line;
                if let Some(text) = tab.buffer.line(line).map(str::to_string) {
                    let leading = text.len() - text.trim_start_matches(' ').len();
                    let strip = leading.min(width);
                    tab.buffer.set_line(line, &text[strip..]);
                    tab.cursor = tab.buffer.clamp(tab.cursor);
                }
            }
            BuiltinCommand::ToggleComment => {
                let prefix = self.config.comment_prefix.clone();
                let tab = self.active_tab_mut();
                let line = tab.cursor.line;
                if let Some(text) = tab.buffer.line(line).map(str::to_string) {
                    let indent_len = text.len() - text.trim_start().len();
                    let (indent, body) = text.split_at(indent_len);
                    let toggled = match body.strip_prefix(&prefix) {
                        Some(rest) => format!("{indent}{rest}"),
                        None if body.is_empty() => text.clone(),
                        None => format!("{indent}{prefix}{body}"),
                    };
                    tab.buffer.set_line(line, &toggled);
                    tab.cursor = tab.buffer.clamp(tab.cursor);
                }
            }
            BuiltinCommand::NextTab => self.tab_delta += 1,
            BuiltinCommand::PrevTab => self.tab_delta -= 1,
        }
        Ok(())
    }

    fn begin_undo_group(&mut self) {
        let tab = self.active_tab_mut();
        let cursor = tab.cursor;
        tab.buffer.begin_group(cursor);
    }

    fn end_undo_group(&mut self) {
        self.active_tab_mut().buffer.end_group();
    }

    fn clipboard_text(&mut self) -> String {
        self.clipboard.get()
    }

    fn set_clipboard_text(&mut self, text: &str) {
        self.clipboard.set(text);
    }

    fn setting(&self, name: &str) -> Option<String> {
        self.settings.get(name).cloned()
    }

    fn set_setting(&mut self, name: &str, value: &str) {
        self.settings.insert(name.to_string(), value.to_string());
        self.config.apply(name, value);
        if let Err(err) = self.config.save() {
            log::warn!("could not persist config: {err:#}");
        }
    }

    fn set_status(&mut self, text: &str) {
        self.status = text.to_string();
    }

    fn set_cursor_shape(&mut self, shape: CursorShape) {
        self.shape = shape;
    }

    fn set_cursor_visible(&mut self, visible: bool) {
        self.cursor_visible = visible;
    }

    fn open_command_palette(&mut self) {
        self.palette_requested = true;
    }

    fn save(&mut self) -> Result<(), HostError> {
        let tab = self.active_tab_mut();
        let Some(path) = tab.path.clone() else {
            return Err(HostError::Io("buffer has no file name".to_string()));
        };
        let mut text = tab.buffer.text();
        text.push('\n');
        fs::write(&path, text).map_err(|err| HostError::Io(err.to_string()))?;
        tab.buffer.dirty = false;
        Ok(())
    }

    fn request_quit(&mut self) {
        self.close_requested = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(c: char) -> Event {
        Event::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE))
    }

    fn esc() -> Event {
        Event::Key(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE))
    }

    fn enter() -> Event {
        Event::Key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE))
    }

    fn tab_with(text: &str, name: &str) -> EditorTab {
        EditorTab {
            name: name.to_string(),
            path: None,
            buffer: TextBuffer::from_text(text),
            cursor: Position::default(),
        }
    }

    fn app_with(text: &str) -> App {
        App::new(Config::default(), vec![tab_with(text, "one")])
    }

    fn feed(app: &mut App, input: &str) {
        for c in input.chars() {
            app.handle_event(key(c));
        }
    }

    #[test]
    fn test_modal_editing_end_to_end() {
        let mut app = app_with("hello world");
        feed(&mut app, "dw");
        assert_eq!(app.active_tab().buffer.text(), "world");
        feed(&mut app, "iback ");
        app.handle_event(esc());
        assert_eq!(app.active_tab().buffer.text(), "back world");
    }

    #[test]
    fn test_yank_paste_through_clipboard() {
        let mut app = app_with("one\ntwo");
        feed(&mut app, "yyp");
        assert_eq!(app.active_tab().buffer.text(), "one\none\ntwo");
    }

    #[test]
    fn test_tab_switch_resets_session() {
        let mut app = App::new(
            Config::default(),
            vec![tab_with("first", "a"), tab_with("second", "b")],
        );
        feed(&mut app, "2d");
        assert_eq!(app.session.pending(), "2d");
        app.handle_event(esc());
        feed(&mut app, "gt");
        // The focus change resets the session; nothing may linger.
        assert_eq!(app.active, 1);
        assert!(app.session.pending().is_empty());
        feed(&mut app, "x");
        assert_eq!(app.active_tab().buffer.text(), "econd");
        feed(&mut app, "gT");
        assert_eq!(app.active, 0);
        assert_eq!(app.active_tab().buffer.text(), "first");
    }

    #[test]
    fn test_quit_command_closes_tab_then_app() {
        let mut app = App::new(
            Config::default(),
            vec![tab_with("first", "a"), tab_with("second", "b")],
        );
        feed(&mut app, ":q");
        app.handle_event(enter());
        assert_eq!(app.tabs.len(), 1);
        assert!(!app.should_quit);
        feed(&mut app, ":q");
        app.handle_event(enter());
        assert!(app.should_quit);
    }

    #[test]
    fn test_palette_round_trip_when_commandline_disabled() {
        let mut config = Config::default();
        config.commandline_mode = false;
        let mut app = App::new(config, vec![tab_with("one\ntwo\nthree", "a")]);
        feed(&mut app, ":");
        assert!(app.palette.is_some());
        // The palette feeds the same command table as the internal
        // commandline.
        feed(&mut app, "3");
        app.handle_event(enter());
        assert!(app.palette.is_none());
        assert_eq!(app.active_tab().cursor.line, 2);
    }

    #[test]
    fn test_indent_uses_configured_width() {
        let mut config = Config::default();
        config.indent_width = 2;
        let mut app = App::new(config, vec![tab_with("line", "a")]);
        feed(&mut app, ">>");
        assert_eq!(app.active_tab().buffer.text(), "  line");
        feed(&mut app, "<<");
        assert_eq!(app.active_tab().buffer.text(), "line");
    }

    #[test]
    fn test_comment_toggle_respects_indent() {
        let mut app = app_with("    body();");
        feed(&mut app, "gcc");
        assert_eq!(app.active_tab().buffer.text(), "    // body();");
        feed(&mut app, "gcc");
        assert_eq!(app.active_tab().buffer.text(), "    body();");
    }

    #[test]
    fn test_undo_after_operator() {
        let mut app = app_with("hello world");
        feed(&mut app, "dw");
        assert_eq!(app.active_tab().buffer.text(), "world");
        feed(&mut app, "u");
        assert_eq!(app.active_tab().buffer.text(), "hello world");
    }

    #[test]
    fn test_save_without_path_reports_error() {
        let mut app = app_with("text");
        feed(&mut app, ":w");
        app.handle_event(enter());
        assert!(app.status.contains("write failed"));
    }
}
