//! A multi-line text buffer with grouped snapshot undo.
//!
//! Lines are stored as `Vec<String>`, one entry per line without trailing
//! newlines; the buffer never holds zero lines. Positions follow the
//! engine's convention: byte-offset columns, and a virtual newline at the
//! end of every line so a range ending at `(line + 1, 0)` covers the
//! newline of `line`.
//!
//! Undo works on whole-buffer snapshots taken at the outermost
//! `begin_group`; nested groups collapse into one undo step, which is what
//! turns an operator plus its motion (or an entire macro playback) into a
//! single revert.

use vimlet_core::{Position, Range};

#[derive(Debug, Clone)]
pub struct Snapshot {
    pub lines: Vec<String>,
    pub cursor: Position,
}

#[derive(Debug)]
pub struct TextBuffer {
    pub lines: Vec<String>,
    pub dirty: bool,
    group_depth: u32,
    pending: Option<Snapshot>,
    undo_stack: Vec<Snapshot>,
    redo_stack: Vec<Snapshot>,
    max_history: usize,
}

impl TextBuffer {
    pub fn new() -> Self {
        Self::from_text("")
    }

    pub fn from_text(text: &str) -> Self {
        let lines: Vec<String> = if text.is_empty() {
            vec![String::new()]
        } else {
            text.split('\n').map(String::from).collect()
        };
        Self {
            lines,
            dirty: false,
            group_depth: 0,
            pending: None,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_history: 1000,
        }
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn line(&self, index: usize) -> Option<&str> {
        self.lines.get(index).map(String::as_str)
    }

    /// Clamp a position to the buffer, columns capped at line length.
    pub fn clamp(&self, pos: Position) -> Position {
        let line = pos.line.min(self.lines.len() - 1);
        Position::new(line, pos.col.min(self.lines[line].len()))
    }

    // ── Edits ────────────────────────────────────────────────────────

    pub fn set_line(&mut self, index: usize, text: &str) {
        if let Some(line) = self.lines.get_mut(index) {
            *line = text.to_string();
            self.dirty = true;
        }
    }

    pub fn insert_line(&mut self, index: usize, text: &str) {
        let at = index.min(self.lines.len());
        self.lines.insert(at, text.to_string());
        self.dirty = true;
    }

    pub fn remove_line(&mut self, index: usize) -> String {
        if index >= self.lines.len() {
            return String::new();
        }
        let removed = self.lines.remove(index);
        if self.lines.is_empty() {
            self.lines.push(String::new());
        }
        self.dirty = true;
        removed
    }

    /// Insert text at `pos`, splitting at embedded newlines. Returns the
    /// position just past the inserted text.
    pub fn insert_at(&mut self, pos: Position, text: &str) -> Position {
        let pos = self.clamp(pos);
        let line = self.lines[pos.line].clone();
        let (before, after) = line.split_at(pos.col);
        let mut parts = text.split('\n');
        let first = parts.next().unwrap_or_default();
        let rest: Vec<&str> = parts.collect();
        self.dirty = true;
        if rest.is_empty() {
            self.lines[pos.line] = format!("{before}{first}{after}");
            return Position::new(pos.line, pos.col + first.len());
        }
        self.lines[pos.line] = format!("{before}{first}");
        let mut at = pos.line + 1;
        let mut end = pos;
        for (i, seg) in rest.iter().enumerate() {
            if i == rest.len() - 1 {
                self.lines.insert(at, format!("{seg}{after}"));
                end = Position::new(at, seg.len());
            } else {
                self.lines.insert(at, seg.to_string());
            }
            at += 1;
        }
        end
    }

    /// Text covered by a half-open range, virtual newlines included.
    pub fn slice(&self, r: Range) -> String {
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

    /// Remove a half-open range. Returns where the cursor should land.
    ///
    /// A range running past the final newline (end line beyond the buffer)
    /// drops the covered lines entirely when it starts at column 0, which
    /// is what makes a line-wise delete of the last line behave like one.
    pub fn delete(&mut self, r: Range) -> Position {
        let len = self.lines.len();
        let start_line = r.start.line.min(len - 1);
        let from = r.start.col.min(self.lines[start_line].len());
        self.dirty = true;
        if r.end.line >= len {
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
        self.clamp(Position::new(start_line, from))
    }

    // ── Undo groups ──────────────────────────────────────────────────

    pub fn begin_group(&mut self, cursor: Position) {
        if self.group_depth == 0 {
            self.pending = Some(Snapshot {
                lines: self.lines.clone(),
                cursor,
            });
        }
        self.group_depth += 1;
    }

    pub fn end_group(&mut self) {
        if self.group_depth == 0 {
            log::warn!("undo group closed without a matching open");
            return;
        }
        self.group_depth -= 1;
        if self.group_depth == 0 {
            if let Some(snap) = self.pending.take() {
                if snap.lines != self.lines {
                    self.undo_stack.push(snap);
                    if self.undo_stack.len() > self.max_history {
                        self.undo_stack.remove(0);
                    }
                    self.redo_stack.clear();
                }
            }
        }
    }

    pub fn undo(&mut self, cursor: Position) -> Option<Position> {
        let snap = self.undo_stack.pop()?;
        self.redo_stack.push(Snapshot {
            lines: std::mem::replace(&mut self.lines, snap.lines),
            cursor,
        });
        self.dirty = true;
        Some(self.clamp(snap.cursor))
    }

    pub fn redo(&mut self, cursor: Position) -> Option<Position> {
        let snap = self.redo_stack.pop()?;
        self.undo_stack.push(Snapshot {
            lines: std::mem::replace(&mut self.lines, snap.lines),
            cursor,
        });
        self.dirty = true;
        Some(self.clamp(snap.cursor))
    }
}

impl Default for TextBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(line: usize, col: usize) -> Position {
        Position::new(line, col)
    }

    #[test]
    fn test_from_text_and_back() {
        let buf = TextBuffer::from_text("hello\nworld");
        assert_eq!(buf.lines, vec!["hello", "world"]);
        assert_eq!(buf.text(), "hello\nworld");
        assert_eq!(TextBuffer::from_text("").lines, vec![""]);
    }

    #[test]
    fn test_insert_at_plain() {
        let mut buf = TextBuffer::from_text("held");
        let end = buf.insert_at(pos(0, 3), "lo wor");
        assert_eq!(buf.text(), "hello world");
        assert_eq!(end, pos(0, 9));
        assert!(buf.dirty);
    }

    #[test]
    fn test_insert_at_with_newlines() {
        let mut buf = TextBuffer::from_text("ab");
        let end = buf.insert_at(pos(0, 1), "1\n2\n3");
        assert_eq!(buf.text(), "a1\n2\n3b");
        assert_eq!(end, pos(2, 1));
    }

    #[test]
    fn test_slice_includes_virtual_newline() {
        let buf = TextBuffer::from_text("one\ntwo");
        assert_eq!(buf.slice(Range::new(pos(0, 0), pos(1, 0))), "one\n");
        assert_eq!(buf.slice(Range::new(pos(0, 1), pos(1, 2))), "ne\ntw");
        assert_eq!(buf.slice(Range::new(pos(1, 0), pos(2, 0))), "two\n");
    }

    #[test]
    fn test_delete_within_line() {
        let mut buf = TextBuffer::from_text("hello world");
        let cur = buf.delete(Range::new(pos(0, 0), pos(0, 6)));
        assert_eq!(buf.text(), "world");
        assert_eq!(cur, pos(0, 0));
    }

    #[test]
    fn test_delete_across_lines() {
        let mut buf = TextBuffer::from_text("one\ntwo\nthree");
        buf.delete(Range::new(pos(0, 1), pos(2, 3)));
        assert_eq!(buf.text(), "oee");
    }

    #[test]
    fn test_delete_whole_first_line() {
        let mut buf = TextBuffer::from_text("one\ntwo");
        buf.delete(Range::new(pos(0, 0), pos(1, 0)));
        assert_eq!(buf.text(), "two");
    }

    #[test]
    fn test_delete_whole_last_line_drops_it() {
        let mut buf = TextBuffer::from_text("one\ntwo");
        buf.delete(Range::new(pos(1, 0), pos(2, 0)));
        assert_eq!(buf.text(), "one");
    }

    #[test]
    fn test_delete_only_line_keeps_empty_buffer() {
        let mut buf = TextBuffer::from_text("only");
        buf.delete(Range::new(pos(0, 0), pos(1, 0)));
        assert_eq!(buf.lines, vec![""]);
    }

    #[test]
    fn test_grouped_edits_undo_as_one() {
        let mut buf = TextBuffer::from_text("start");
        buf.begin_group(pos(0, 0));
        buf.set_line(0, "first");
        buf.begin_group(pos(0, 0));
        buf.set_line(0, "second");
        buf.end_group();
        buf.set_line(0, "third");
        buf.end_group();
        assert_eq!(buf.text(), "third");

        let cur = buf.undo(pos(0, 2)).unwrap();
        assert_eq!(buf.text(), "start");
        assert_eq!(cur, pos(0, 0));

        buf.redo(pos(0, 0)).unwrap();
        assert_eq!(buf.text(), "third");
    }

    #[test]
    fn test_unchanged_group_records_nothing() {
        let mut buf = TextBuffer::from_text("same");
        buf.begin_group(pos(0, 0));
        buf.end_group();
        assert!(buf.undo(pos(0, 0)).is_none());
    }

    #[test]
    fn test_new_edit_clears_redo() {
        let mut buf = TextBuffer::from_text("a");
        buf.begin_group(pos(0, 0));
        buf.set_line(0, "b");
        buf.end_group();
        buf.undo(pos(0, 0));
        assert!(!buf.redo_stack.is_empty());
        buf.begin_group(pos(0, 0));
        buf.set_line(0, "c");
        buf.end_group();
        assert!(buf.redo(pos(0, 0)).is_none());
    }
}
