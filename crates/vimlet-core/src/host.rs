//! The host editor adapter.
//!
//! The engine never owns text. Everything it does goes through these traits:
//! the host provides line access, cursor and selection control, named
//! built-in commands, undo grouping, settings, and the system clipboard.
//! `vimlet-term` carries the reference implementation; tests use an
//! in-memory one.

use thiserror::Error;

/// A zero-indexed buffer position. `col` is a byte offset into the line,
/// always kept on a char boundary by the code that computes it.
///
/// Ordering is (line, col), which matches document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Position {
    pub line: usize,
    pub col: usize,
}

impl Position {
    pub fn new(line: usize, col: usize) -> Self {
        Self { line, col }
    }
}

/// A half-open span of buffer text: `start` is included, `end` is not.
///
/// Every line contributes a virtual trailing newline, so a range ending at
/// `(line + 1, 0)` includes the newline of `line`. Whole-line ranges are
/// expressed that way, which is what gives cut/copied lines their trailing
/// `\n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Build a range from two endpoints in either order.
    pub fn ordered(a: Position, b: Position) -> Self {
        if a <= b {
            Self { start: a, end: b }
        } else {
            Self { start: b, end: a }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// How the host should render the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorShape {
    #[default]
    Block,
    Bar,
    HalfBlock,
}

/// Built-in editor commands the engine invokes by name rather than
/// reimplementing. `Cut`/`Copy` act on the current selection, the line
/// commands on the cursor line, the tab commands on the host's tab strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinCommand {
    Cut,
    Copy,
    Undo,
    Redo,
    IndentLine,
    UnindentLine,
    ToggleComment,
    NextTab,
    PrevTab,
}

/// Errors surfaced by the host. All of them are recoverable from the
/// engine's point of view; callers log and carry on.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("line {0} is out of bounds")]
    LineOutOfBounds(usize),
    #[error("clipboard unavailable: {0}")]
    Clipboard(String),
    #[error("{0:?} is not supported by this host")]
    Unsupported(BuiltinCommand),
    #[error("{0}")]
    Io(String),
}

/// Read-only view of the host buffer. Motions and text objects only need
/// this much.
pub trait BufferRead {
    /// Text of the line at `index`, without its newline. `None` past the end.
    fn line(&self, index: usize) -> Option<String>;
    fn line_count(&self) -> usize;
}

/// Full adapter surface the session drives.
///
/// Contract notes:
/// - `set_cursor`/`set_line` and friends clamp out-of-range input rather
///   than fail; the engine recomputes positions from the live buffer on
///   every event and never persists them.
/// - `set_selection` carries `cursor_at_start` so the host can place its
///   shadow cursor at either end of the range.
/// - Undo groups nest; each `begin_undo_group` must be matched by one
///   `end_undo_group`, and a user-level undo reverts the outermost group.
/// - `clipboard_text` degrades to `""` on platform failure instead of
///   erroring; `run_command(Cut | Copy)` replaces the clipboard contents
///   with the selection.
pub trait HostEditor: BufferRead {
    fn cursor(&self) -> Position;
    fn set_cursor(&mut self, pos: Position);

    fn set_line(&mut self, index: usize, text: &str);
    fn insert_line(&mut self, index: usize, text: &str);
    fn remove_line(&mut self, index: usize) -> String;
    /// Insert text at the cursor, splitting lines at embedded newlines.
    /// Leaves the cursor just past the inserted text.
    fn insert_at_cursor(&mut self, text: &str);

    fn set_selection(&mut self, range: Range, cursor_at_start: bool);
    fn clear_selection(&mut self);

    fn run_command(&mut self, cmd: BuiltinCommand) -> Result<(), HostError>;

    fn begin_undo_group(&mut self);
    fn end_undo_group(&mut self);

    fn clipboard_text(&mut self) -> String;
    fn set_clipboard_text(&mut self, text: &str);

    fn setting(&self, name: &str) -> Option<String>;
    fn set_setting(&mut self, name: &str, value: &str);

    fn set_status(&mut self, text: &str);
    fn set_cursor_shape(&mut self, shape: CursorShape);
    fn set_cursor_visible(&mut self, visible: bool);

    /// Open the host's own command palette. Used when the internal
    /// commandline is disabled by setting; the host is expected to feed
    /// the submitted text back through [`crate::session::EditorSession::submit_command`].
    fn open_command_palette(&mut self);

    /// Persist the current buffer (`:w`).
    fn save(&mut self) -> Result<(), HostError> {
        Ok(())
    }

    /// Ask the host to close the current view (`:q`).
    fn request_quit(&mut self) {}
}

/// Clamp a position against the live buffer. `allow_past_end` permits the
/// insert-mode column one past the last character.
pub fn clamp_position<B: BufferRead + ?Sized>(
    buf: &B,
    pos: Position,
    allow_past_end: bool,
) -> Position {
    let line_count = buf.line_count().max(1);
    let line = pos.line.min(line_count - 1);
    let text = buf.line(line).unwrap_or_default();
    let max = if allow_past_end || text.is_empty() {
        text.len()
    } else {
        // Start of the last character.
        text.char_indices().next_back().map(|(i, _)| i).unwrap_or(0)
    };
    Position::new(line, pos.col.min(max))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_ordering() {
        assert!(Position::new(0, 5) < Position::new(1, 0));
        assert!(Position::new(2, 1) < Position::new(2, 3));
        assert_eq!(Position::new(1, 1), Position::new(1, 1));
    }

    #[test]
    fn test_range_ordered() {
        let a = Position::new(3, 0);
        let b = Position::new(1, 2);
        let r = Range::ordered(a, b);
        assert_eq!(r.start, b);
        assert_eq!(r.end, a);
        assert!(!r.is_empty());
        assert!(Range::new(a, a).is_empty());
    }
}
