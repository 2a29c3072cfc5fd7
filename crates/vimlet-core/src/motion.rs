//! Motion resolution.
//!
//! Pure functions that compute where a motion lands given the buffer and a
//! starting position. Nothing here moves the cursor or edits text; callers
//! decide what to do with the target. A motion that cannot find its target
//! returns `None`, which is distinct from landing on the current position;
//! operators use that to abort cleanly without touching the buffer.

use crate::host::{BufferRead, Position};

/// Character classes for word motions. A word is a run of alphanumerics and
/// underscores or a run of other non-whitespace; token motions collapse the
/// last two classes into one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharClass {
    Whitespace,
    Word,
    Punctuation,
}

pub fn char_class(c: char) -> CharClass {
    if c.is_whitespace() {
        CharClass::Whitespace
    } else if c.is_alphanumeric() || c == '_' {
        CharClass::Word
    } else {
        CharClass::Punctuation
    }
}

/// Class function for token motions (`W`/`B`/`E`): whitespace or not.
fn token_class(c: char) -> CharClass {
    if c.is_whitespace() {
        CharClass::Whitespace
    } else {
        CharClass::Word
    }
}

/// A remembered `f`/`F`/`t`/`T` search, replayed by `;` and `,`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharSearch {
    pub target: char,
    pub forward: bool,
    pub till: bool,
}

impl CharSearch {
    pub fn reversed(self) -> Self {
        Self {
            forward: !self.forward,
            ..self
        }
    }
}

/// The motion vocabulary the grammar can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motion {
    Left,
    Right,
    Up,
    Down,
    WordForward,
    WordBackward,
    WordEnd,
    TokenForward,
    TokenBackward,
    TokenEnd,
    LineStart,
    LineEnd,
    FirstNonBlank,
    ParagraphForward,
    ParagraphBackward,
    DocumentStart,
    DocumentEnd,
    /// Absolute jump produced by `<n>G` / `<n>gg`.
    GotoLine(usize),
    Find(CharSearch),
    RepeatFind,
    RepeatFindReverse,
    SearchNext,
    SearchPrev,
}

impl Motion {
    /// Line motions make the operators they feed act on whole lines.
    pub fn is_linewise(self) -> bool {
        matches!(
            self,
            Motion::Up
                | Motion::Down
                | Motion::DocumentStart
                | Motion::DocumentEnd
                | Motion::GotoLine(_)
        )
    }

    /// Inclusive motions: the character under the target is part of the
    /// operated range (`e`, `f`, `t` and friends).
    pub fn is_inclusive(self) -> bool {
        matches!(self, Motion::WordEnd | Motion::TokenEnd)
            || matches!(self, Motion::Find(cs) if cs.forward)
    }
}

/// Session state a motion may need beyond the buffer: the sticky column for
/// vertical movement, the last character search, the last `/` pattern.
#[derive(Debug, Default)]
pub struct MotionContext<'a> {
    pub desired_col: usize,
    pub last_find: Option<CharSearch>,
    pub last_search: Option<&'a str>,
}

/// Resolve a single application of `motion` from `pos`. `None` means the
/// target does not exist (failed char search, no last search to repeat);
/// motions that merely hit a buffer edge return the clamped position
/// instead.
pub fn resolve<B: BufferRead + ?Sized>(
    buf: &B,
    pos: Position,
    motion: Motion,
    ctx: &MotionContext,
) -> Option<Position> {
    let line = buf.line(pos.line).unwrap_or_default();
    match motion {
        Motion::Left => Some(Position::new(pos.line, prev_boundary(&line, pos.col))),
        Motion::Right => Some(Position::new(pos.line, next_boundary(&line, pos.col))),
        Motion::Up => {
            if pos.line == 0 {
                return Some(pos);
            }
            let target = buf.line(pos.line - 1).unwrap_or_default();
            Some(Position::new(
                pos.line - 1,
                snap_to_boundary(&target, ctx.desired_col),
            ))
        }
        Motion::Down => {
            if pos.line + 1 >= buf.line_count() {
                return Some(pos);
            }
            let target = buf.line(pos.line + 1).unwrap_or_default();
            Some(Position::new(
                pos.line + 1,
                snap_to_boundary(&target, ctx.desired_col),
            ))
        }
        Motion::WordForward => Some(word_forward(buf, pos, char_class)),
        Motion::WordBackward => Some(word_backward(buf, pos, char_class)),
        Motion::WordEnd => Some(word_end(buf, pos, char_class)),
        Motion::TokenForward => Some(word_forward(buf, pos, token_class)),
        Motion::TokenBackward => Some(word_backward(buf, pos, token_class)),
        Motion::TokenEnd => Some(word_end(buf, pos, token_class)),
        Motion::LineStart => Some(Position::new(pos.line, 0)),
        Motion::LineEnd => Some(Position::new(pos.line, line.len())),
        Motion::FirstNonBlank => Some(Position::new(pos.line, first_non_blank(&line))),
        Motion::ParagraphForward => Some(paragraph_forward(buf, pos)),
        Motion::ParagraphBackward => Some(paragraph_backward(buf, pos)),
        Motion::DocumentStart => Some(Position::new(0, 0)),
        Motion::DocumentEnd => {
            let last = buf.line_count().saturating_sub(1);
            Some(Position::new(last, 0))
        }
        Motion::GotoLine(n) => {
            let last = buf.line_count().saturating_sub(1);
            Some(Position::new(n.min(last), 0))
        }
        Motion::Find(cs) => find_in_line(&line, pos.col, cs).map(|col| Position::new(pos.line, col)),
        Motion::RepeatFind => {
            let cs = ctx.last_find?;
            find_in_line(&line, pos.col, cs).map(|col| Position::new(pos.line, col))
        }
        Motion::RepeatFindReverse => {
            let cs = ctx.last_find?.reversed();
            find_in_line(&line, pos.col, cs).map(|col| Position::new(pos.line, col))
        }
        Motion::SearchNext => search_forward(buf, pos, ctx.last_search?),
        Motion::SearchPrev => search_backward(buf, pos, ctx.last_search?),
    }
}

// ── Line-local helpers ───────────────────────────────────────────────

/// Byte offset of the char boundary before `col` (0 if already at start).
pub fn prev_boundary(line: &str, col: usize) -> usize {
    line[..col.min(line.len())]
        .char_indices()
        .next_back()
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Byte offset of the char boundary after `col`, capped at line length.
pub fn next_boundary(line: &str, col: usize) -> usize {
    if col >= line.len() {
        return line.len();
    }
    line[col..]
        .char_indices()
        .nth(1)
        .map(|(i, _)| col + i)
        .unwrap_or(line.len())
}

/// Snap a byte offset onto a char boundary at or before `target`.
pub fn snap_to_boundary(line: &str, target: usize) -> usize {
    if target >= line.len() {
        return line.len();
    }
    line.char_indices()
        .take_while(|(i, _)| *i <= target)
        .last()
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Column of the first non-whitespace character (line length if blank).
pub fn first_non_blank(line: &str) -> usize {
    line.char_indices()
        .find(|(_, c)| !c.is_whitespace())
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Resolve an `f`/`F`/`t`/`T` search on one line. Returns the target column
/// or `None` when the character does not occur on the expected side.
pub fn find_in_line(line: &str, col: usize, cs: CharSearch) -> Option<usize> {
    let chars: Vec<(usize, char)> = line.char_indices().collect();
    if cs.forward {
        let from = chars.iter().position(|(i, _)| *i > col)?;
        let hit = chars[from..].iter().position(|(_, c)| *c == cs.target)?;
        let idx = from + hit;
        if cs.till {
            // Land one character short, but never before the starting column.
            let prev = idx.checked_sub(1)?;
            if chars[prev].0 > col {
                Some(chars[prev].0)
            } else {
                Some(chars[idx].0)
            }
        } else {
            Some(chars[idx].0)
        }
    } else {
        let end = chars
            .iter()
            .position(|(i, _)| *i >= col)
            .unwrap_or(chars.len());
        let hit = chars[..end].iter().rposition(|(_, c)| *c == cs.target)?;
        if cs.till {
            let next = hit + 1;
            if next < chars.len() && chars[next].0 < col {
                Some(chars[next].0)
            } else {
                Some(chars[hit].0)
            }
        } else {
            Some(chars[hit].0)
        }
    }
}

// ── Word motions ─────────────────────────────────────────────────────

fn line_chars<B: BufferRead + ?Sized>(buf: &B, line: usize) -> Vec<(usize, char)> {
    buf.line(line).unwrap_or_default().char_indices().collect()
}

fn word_forward<B: BufferRead + ?Sized>(
    buf: &B,
    pos: Position,
    class: fn(char) -> CharClass,
) -> Position {
    let chars = line_chars(buf, pos.line);
    let mut idx = chars
        .iter()
        .position(|(i, _)| *i >= pos.col)
        .unwrap_or(chars.len());

    if idx < chars.len() {
        let start = class(chars[idx].1);
        if start != CharClass::Whitespace {
            while idx < chars.len() && class(chars[idx].1) == start {
                idx += 1;
            }
        }
        while idx < chars.len() && class(chars[idx].1) == CharClass::Whitespace {
            idx += 1;
        }
        if idx < chars.len() {
            return Position::new(pos.line, chars[idx].0);
        }
    }

    // Wrap to the first word of a following line.
    let mut line = pos.line + 1;
    while line < buf.line_count() {
        let chars = line_chars(buf, line);
        if chars.is_empty() {
            return Position::new(line, 0);
        }
        if let Some(&(col, _)) = chars.iter().find(|(_, c)| !c.is_whitespace()) {
            return Position::new(line, col);
        }
        line += 1;
    }
    let last = buf.line_count().saturating_sub(1);
    Position::new(last, buf.line(last).map(|l| l.len()).unwrap_or(0))
}

fn word_backward<B: BufferRead + ?Sized>(
    buf: &B,
    pos: Position,
    class: fn(char) -> CharClass,
) -> Position {
    let chars = line_chars(buf, pos.line);
    let mut idx = chars
        .iter()
        .position(|(i, _)| *i >= pos.col)
        .unwrap_or(chars.len());

    if idx > 0 {
        idx -= 1;
        while idx > 0 && class(chars[idx].1) == CharClass::Whitespace {
            idx -= 1;
        }
        if class(chars[idx].1) != CharClass::Whitespace {
            let cls = class(chars[idx].1);
            while idx > 0 && class(chars[idx - 1].1) == cls {
                idx -= 1;
            }
            return Position::new(pos.line, chars[idx].0);
        }
    }

    // Wrap to the last word of a preceding line.
    let mut line = pos.line;
    while line > 0 {
        line -= 1;
        let chars = line_chars(buf, line);
        if chars.is_empty() {
            return Position::new(line, 0);
        }
        let mut idx = chars.len() - 1;
        while idx > 0 && class(chars[idx].1) == CharClass::Whitespace {
            idx -= 1;
        }
        if class(chars[idx].1) == CharClass::Whitespace {
            continue;
        }
        let cls = class(chars[idx].1);
        while idx > 0 && class(chars[idx - 1].1) == cls {
            idx -= 1;
        }
        return Position::new(line, chars[idx].0);
    }
    Position::new(0, 0)
}

fn word_end<B: BufferRead + ?Sized>(
    buf: &B,
    pos: Position,
    class: fn(char) -> CharClass,
) -> Position {
    let chars = line_chars(buf, pos.line);
    let mut idx = chars
        .iter()
        .position(|(i, _)| *i >= pos.col)
        .map(|i| i + 1)
        .unwrap_or(chars.len());

    while idx < chars.len() && class(chars[idx].1) == CharClass::Whitespace {
        idx += 1;
    }
    if idx < chars.len() {
        let cls = class(chars[idx].1);
        while idx + 1 < chars.len() && class(chars[idx + 1].1) == cls {
            idx += 1;
        }
        return Position::new(pos.line, chars[idx].0);
    }

    let mut line = pos.line + 1;
    while line < buf.line_count() {
        let chars = line_chars(buf, line);
        let mut idx = 0;
        while idx < chars.len() && class(chars[idx].1) == CharClass::Whitespace {
            idx += 1;
        }
        if idx < chars.len() {
            let cls = class(chars[idx].1);
            while idx + 1 < chars.len() && class(chars[idx + 1].1) == cls {
                idx += 1;
            }
            return Position::new(line, chars[idx].0);
        }
        line += 1;
    }
    let last = buf.line_count().saturating_sub(1);
    let text = buf.line(last).unwrap_or_default();
    Position::new(last, prev_boundary(&text, text.len()))
}

// ── Paragraph motions ────────────────────────────────────────────────

fn is_blank<B: BufferRead + ?Sized>(buf: &B, line: usize) -> bool {
    buf.line(line)
        .map(|l| l.trim().is_empty())
        .unwrap_or(true)
}

/// Next paragraph boundary: skip the current block, land on the blank line
/// that ends it (or the last line of the buffer).
fn paragraph_forward<B: BufferRead + ?Sized>(buf: &B, pos: Position) -> Position {
    let count = buf.line_count();
    let mut line = pos.line;
    // Leave any blank run we are standing in first.
    while line < count && is_blank(buf, line) {
        line += 1;
    }
    while line < count && !is_blank(buf, line) {
        line += 1;
    }
    Position::new(line.min(count.saturating_sub(1)), 0)
}

/// Previous paragraph boundary: skip the blank run above the cursor, then
/// the paragraph itself, landing on the blank line before it (or line 0).
fn paragraph_backward<B: BufferRead + ?Sized>(buf: &B, pos: Position) -> Position {
    if pos.line == 0 {
        return Position::new(0, 0);
    }
    let mut line = pos.line - 1;
    while line > 0 && is_blank(buf, line) {
        line -= 1;
    }
    while line > 0 && !is_blank(buf, line) {
        line -= 1;
    }
    Position::new(line, 0)
}

// ── Buffer search (`/`, `n`, `N`) ────────────────────────────────────

/// Find the next occurrence of `pattern` strictly after `pos`, wrapping at
/// the end of the buffer.
pub fn search_forward<B: BufferRead + ?Sized>(
    buf: &B,
    pos: Position,
    pattern: &str,
) -> Option<Position> {
    if pattern.is_empty() {
        return None;
    }
    let count = buf.line_count();
    for step in 0..=count {
        let line = (pos.line + step) % count.max(1);
        let text = buf.line(line)?;
        let from = if step == 0 {
            next_boundary(&text, pos.col).min(text.len())
        } else {
            0
        };
        if from <= text.len() {
            if let Some(off) = text[from..].find(pattern) {
                return Some(Position::new(line, from + off));
            }
        }
    }
    None
}

/// Find the previous occurrence of `pattern` strictly before `pos`,
/// wrapping at the start of the buffer.
pub fn search_backward<B: BufferRead + ?Sized>(
    buf: &B,
    pos: Position,
    pattern: &str,
) -> Option<Position> {
    if pattern.is_empty() {
        return None;
    }
    let count = buf.line_count();
    for step in 0..=count {
        let line = (pos.line + count - (step % count.max(1))) % count.max(1);
        let text = buf.line(line)?;
        let end = if step == 0 { pos.col.min(text.len()) } else { text.len() };
        if let Some(off) = text[..end].rfind(pattern) {
            return Some(Position::new(line, off));
        }
    }
    None
}
