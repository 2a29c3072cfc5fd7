//! In-memory host used by the engine's own tests.
//!
//! Implements the full adapter contract over a `Vec<String>` buffer with a
//! string clipboard and undo-group accounting, so session tests can assert
//! the things the engine promises: balanced undo groups, clipboard
//! contents, cursor placement, status output.

use std::collections::HashMap;

use crate::host::{
    BufferRead, BuiltinCommand, CursorShape, HostEditor, HostError, Position, Range,
};

#[derive(Clone)]
struct Snapshot {
    lines: Vec<String>,
    cursor: Position,
}

pub(crate) struct TestHost {
    pub lines: Vec<String>,
    pub cursor: Position,
    pub selection: Option<(Range, bool)>,
    pub clipboard: String,
    pub settings: HashMap<String, String>,
    pub status: String,
    pub shape: CursorShape,
    pub cursor_visible: bool,
    pub palette_opens: usize,
    pub saved: usize,
    pub quit_requested: bool,
    pub tab_moves: i32,
    /// Current undo-group nesting; must be back at zero when idle.
    pub group_depth: i32,
    /// Set if `end_undo_group` ever ran without a matching begin.
    pub unbalanced: bool,
    pending_snapshot: Option<Snapshot>,
    undo_stack: Vec<Snapshot>,
    redo_stack: Vec<Snapshot>,
}

impl TestHost {
    pub fn new(text: &str) -> Self {
        let lines = if text.is_empty() {
            vec![String::new()]
        } else {
            text.split('\n').map(String::from).collect()
        };
        Self {
            lines,
            cursor: Position::default(),
            selection: None,
            clipboard: String::new(),
            settings: HashMap::new(),
            status: String::new(),
            shape: CursorShape::Block,
            cursor_visible: true,
            palette_opens: 0,
            saved: 0,
            quit_requested: false,
            tab_moves: 0,
            group_depth: 0,
            unbalanced: false,
            pending_snapshot: None,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
        }
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            lines: self.lines.clone(),
            cursor: self.cursor,
        }
    }

    fn restore(&mut self, snap: Snapshot) {
        self.lines = snap.lines;
        self.cursor = snap.cursor;
    }

    fn selected_text(&self, r: Range) -> String {
        let mut out = String::new();
        let mut line = r.start.line;
        while line <= r.end.line && line < self.lines.len() {
            let text = &self.lines[line];
            let from = if line == r.start.line {
                r.start.col.min(text.len())
            } else {
                0
            };
            let to = if line == r.end.line {
                r.end.col.min(text.len())
            } else {
                text.len()
            };
            if from < to {
                out.push_str(&text[from..to]);
            }
            if line < r.end.line {
                out.push('\n');
            }
            line += 1;
        }
        out
    }

    fn delete_range(&mut self, r: Range) {
        let len = self.lines.len();
        let start_line = r.start.line.min(len - 1);
        let from = r.start.col.min(self.lines[start_line].len());
        if r.end.line >= len {
            // The range runs past the last real newline.
            self.lines.truncate(start_line + 1);
            if from == 0 && start_line > 0 {
                self.lines.remove(start_line);
            } else {
                self.lines[start_line].truncate(from);
            }
        } else if r.start.line == r.end.line {
            let to = r.end.col.min(self.lines[start_line].len());
            if from < to {
                self.lines[start_line].replace_range(from..to, "");
            }
        } else {
            let to = r.end.col.min(self.lines[r.end.line].len());
            let tail = self.lines[r.end.line][to..].to_string();
            self.lines[start_line].truncate(from);
            self.lines[start_line].push_str(&tail);
            self.lines.drain(start_line + 1..=r.end.line);
        }
        if self.lines.is_empty() {
            self.lines.push(String::new());
        }
        self.cursor = Position::new(
            start_line.min(self.lines.len() - 1),
            from.min(self.lines[start_line.min(self.lines.len() - 1)].len()),
        );
    }

    fn clamp(&self, pos: Position) -> Position {
        let line = pos.line.min(self.lines.len() - 1);
        Position::new(line, pos.col.min(self.lines[line].len()))
    }
}

impl BufferRead for TestHost {
    fn line(&self, index: usize) -> Option<String> {
        self.lines.get(index).cloned()
    }

    fn line_count(&self) -> usize {
        self.lines.len()
    }
}

impl HostEditor for TestHost {
    fn cursor(&self) -> Position {
        self.cursor
    }

    fn set_cursor(&mut self, pos: Position) {
        self.cursor = self.clamp(pos);
    }

    fn set_line(&mut self, index: usize, text: &str) {
        if let Some(line) = self.lines.get_mut(index) {
            *line = text.to_string();
        }
        self.cursor = self.clamp(self.cursor);
    }

    fn insert_line(&mut self, index: usize, text: &str) {
        let at = index.min(self.lines.len());
        self.lines.insert(at, text.to_string());
    }

    fn remove_line(&mut self, index: usize) -> String {
        if index >= self.lines.len() {
            return String::new();
        }
        let removed = self.lines.remove(index);
        if self.lines.is_empty() {
            self.lines.push(String::new());
        }
        self.cursor = self.clamp(self.cursor);
        removed
    }

    fn insert_at_cursor(&mut self, text: &str) {
        let pos = self.clamp(self.cursor);
        let line = self.lines[pos.line].clone();
        let (before, after) = line.split_at(pos.col);
        let mut parts = text.split('\n');
        let first = parts.next().unwrap_or_default();
        let rest: Vec<&str> = parts.collect();
        if rest.is_empty() {
            self.lines[pos.line] = format!("{before}{first}{after}");
            self.cursor = Position::new(pos.line, pos.col + first.len());
        } else {
            self.lines[pos.line] = format!("{before}{first}");
            let mut at = pos.line + 1;
            for (i, seg) in rest.iter().enumerate() {
                if i == rest.len() - 1 {
                    self.lines.insert(at, format!("{seg}{after}"));
                    self.cursor = Position::new(at, seg.len());
                } else {
                    self.lines.insert(at, seg.to_string());
                }
                at += 1;
            }
        }
    }

    fn set_selection(&mut self, range: Range, cursor_at_start: bool) {
        self.selection = Some((range, cursor_at_start));
    }

    fn clear_selection(&mut self) {
        self.selection = None;
    }

    fn run_command(&mut self, cmd: BuiltinCommand) -> Result<(), HostError> {
        match cmd {
            BuiltinCommand::Cut => {
                let (range, _) = self
                    .selection
                    .ok_or_else(|| HostError::Io("cut without selection".to_string()))?;
                self.clipboard = self.selected_text(range);
                self.delete_range(range);
            }
            BuiltinCommand::Copy => {
                let (range, _) = self
                    .selection
                    .ok_or_else(|| HostError::Io("copy without selection".to_string()))?;
                self.clipboard = self.selected_text(range);
            }
            BuiltinCommand::Undo => {
                if let Some(snap) = self.undo_stack.pop() {
                    let current = self.snapshot();
                    self.redo_stack.push(current);
                    self.restore(snap);
                }
            }
            BuiltinCommand::Redo => {
                if let Some(snap) = self.redo_stack.pop() {
                    let current = self.snapshot();
                    self.undo_stack.push(current);
                    self.restore(snap);
                }
            }
            BuiltinCommand::IndentLine => {
                let line = self.cursor.line;
                let text = self.lines[line].clone();
                self.lines[line] = format!("    {text}");
            }
            BuiltinCommand::UnindentLine => {
                let line = self.cursor.line;
                let text = self.lines[line].clone();
                let strip = text.len() - text.trim_start_matches(' ').len();
                self.lines[line] = text[strip.min(4)..].to_string();
            }
            BuiltinCommand::ToggleComment => {
                let line = self.cursor.line;
                let text = self.lines[line].clone();
                self.lines[line] = match text.strip_prefix("// ") {
                    Some(rest) => rest.to_string(),
                    None => format!("// {text}"),
                };
            }
            BuiltinCommand::NextTab => self.tab_moves += 1,
            BuiltinCommand::PrevTab => self.tab_moves -= 1,
        }
        Ok(())
    }

    fn begin_undo_group(&mut self) {
        if self.group_depth == 0 {
            self.pending_snapshot = Some(self.snapshot());
        }
        self.group_depth += 1;
    }

    fn end_undo_group(&mut self) {
        if self.group_depth == 0 {
            self.unbalanced = true;
            return;
        }
        self.group_depth -= 1;
        if self.group_depth == 0 {
            if let Some(snap) = self.pending_snapshot.take() {
                if snap.lines != self.lines {
                    self.undo_stack.push(snap);
                    self.redo_stack.clear();
                }
            }
        }
    }

    fn clipboard_text(&mut self) -> String {
        self.clipboard.clone()
    }

    fn set_clipboard_text(&mut self, text: &str) {
        self.clipboard = text.to_string();
    }

    fn setting(&self, name: &str) -> Option<String> {
        self.settings.get(name).cloned()
    }

    fn set_setting(&mut self, name: &str, value: &str) {
        self.settings.insert(name.to_string(), value.to_string());
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
        self.palette_opens += 1;
    }

    fn save(&mut self) -> Result<(), HostError> {
        self.saved += 1;
        Ok(())
    }

    fn request_quit(&mut self) {
        self.quit_requested = true;
    }
}
