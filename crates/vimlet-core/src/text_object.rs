//! Text objects: the structural units `i`/`a` commands select.
//!
//! Resolution is read-only; each function yields a half-open [`Range`] (or
//! `None` when the object does not exist around the cursor) plus whether
//! the range should be treated linewise by operators.

use crate::host::{BufferRead, Position, Range};
use crate::motion::{CharClass, char_class};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Word,
    Paragraph,
    /// Keyed by the opening bracket; closers are normalized by the grammar.
    Bracket(char),
    Quote(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextObject {
    pub kind: ObjectKind,
    pub around: bool,
}

/// A resolved object: the span plus its wise-ness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectRange {
    pub range: Range,
    pub linewise: bool,
}

pub fn matching_bracket(open: char) -> Option<char> {
    match open {
        '(' => Some(')'),
        '[' => Some(']'),
        '{' => Some('}'),
        '<' => Some('>'),
        _ => None,
    }
}

pub fn resolve<B: BufferRead + ?Sized>(
    buf: &B,
    pos: Position,
    obj: TextObject,
) -> Option<ObjectRange> {
    match obj.kind {
        ObjectKind::Word => word_object(buf, pos, obj.around),
        ObjectKind::Paragraph => paragraph_object(buf, pos, obj.around),
        ObjectKind::Bracket(open) => bracket_object(buf, pos, open, obj.around),
        ObjectKind::Quote(quote) => quote_object(buf, pos, quote, obj.around),
    }
}

// ── Words ────────────────────────────────────────────────────────────

fn word_object<B: BufferRead + ?Sized>(
    buf: &B,
    pos: Position,
    around: bool,
) -> Option<ObjectRange> {
    let line = buf.line(pos.line)?;
    if line.is_empty() {
        return None;
    }
    let chars: Vec<(usize, char)> = line.char_indices().collect();
    let idx = chars
        .iter()
        .position(|(i, _)| *i >= pos.col)
        .unwrap_or(chars.len() - 1);
    let cls = char_class(chars[idx].1);

    let mut start = idx;
    while start > 0 && char_class(chars[start - 1].1) == cls {
        start -= 1;
    }
    let mut end = idx;
    while end + 1 < chars.len() && char_class(chars[end + 1].1) == cls {
        end += 1;
    }

    let start_col = chars[start].0;
    let end_col = col_after(&line, &chars, end);

    if !around {
        return Some(charwise(pos.line, start_col, pos.line, end_col));
    }

    // Around: absorb trailing whitespace, or leading if there is none.
    let mut trail = end + 1;
    while trail < chars.len() && char_class(chars[trail].1) == CharClass::Whitespace {
        trail += 1;
    }
    let trail_col = if trail < chars.len() {
        chars[trail].0
    } else {
        line.len()
    };
    if trail_col > end_col {
        return Some(charwise(pos.line, start_col, pos.line, trail_col));
    }
    let mut lead = start;
    while lead > 0 && char_class(chars[lead - 1].1) == CharClass::Whitespace {
        lead -= 1;
    }
    Some(charwise(pos.line, chars[lead].0, pos.line, end_col))
}

// ── Paragraphs ───────────────────────────────────────────────────────

fn paragraph_object<B: BufferRead + ?Sized>(
    buf: &B,
    pos: Position,
    around: bool,
) -> Option<ObjectRange> {
    let blank = |idx: usize| {
        buf.line(idx)
            .map(|l| l.trim().is_empty())
            .unwrap_or(true)
    };
    let count = buf.line_count();
    if count == 0 {
        return None;
    }

    // A paragraph is the run of lines sharing the cursor line's blank-ness,
    // so a cursor on a blank run selects that run.
    let on_blank = blank(pos.line);
    let mut start = pos.line;
    while start > 0 && blank(start - 1) == on_blank {
        start -= 1;
    }
    let mut end = pos.line;
    while end + 1 < count && blank(end + 1) == on_blank {
        end += 1;
    }

    if around && !on_blank {
        // Absorb the trailing blank run.
        while end + 1 < count && blank(end + 1) {
            end += 1;
        }
    }

    Some(ObjectRange {
        range: Range::new(Position::new(start, 0), Position::new(end + 1, 0)),
        linewise: true,
    })
}

// ── Brackets ─────────────────────────────────────────────────────────

fn bracket_object<B: BufferRead + ?Sized>(
    buf: &B,
    pos: Position,
    open: char,
    around: bool,
) -> Option<ObjectRange> {
    let close = matching_bracket(open)?;

    // A cursor sitting on an opening bracket uses that bracket directly.
    let line = buf.line(pos.line)?;
    let under = line[pos.col.min(line.len())..].chars().next();
    let open_pos = if under == Some(open) {
        pos
    } else {
        scan_back(buf, pos, open, close)?
    };
    let close_pos = scan_forward(buf, open_pos, open, close)?;

    if around {
        let line = buf.line(close_pos.line)?;
        let after = Position::new(
            close_pos.line,
            crate::motion::next_boundary(&line, close_pos.col),
        );
        return Some(ObjectRange {
            range: Range::new(open_pos, after),
            linewise: false,
        });
    }

    // Inner span, between the pair.
    let open_line = buf.line(open_pos.line)?;
    let mut start = Position::new(
        open_pos.line,
        crate::motion::next_boundary(&open_line, open_pos.col),
    );
    let mut end = close_pos;
    if start >= end {
        return None;
    }
    // Trim delimiter-hugging newlines: an opener at end of line starts the
    // span on the next line, a closer at column 0 ends it on the previous.
    if start.col >= open_line.len() && start.line + 1 <= end.line {
        start = Position::new(start.line + 1, 0);
    }
    if end.col == 0 && end.line > start.line {
        let prev = buf.line(end.line - 1)?;
        end = Position::new(end.line - 1, prev.len());
    }
    if start >= end {
        return None;
    }
    Some(ObjectRange {
        range: Range::new(start, end),
        linewise: false,
    })
}

/// Walk backward from the cursor looking for the unbalanced opener.
fn scan_back<B: BufferRead + ?Sized>(
    buf: &B,
    pos: Position,
    open: char,
    close: char,
) -> Option<Position> {
    let mut depth = 0i32;
    let mut line_idx = pos.line;
    loop {
        let line = buf.line(line_idx)?;
        let limit = if line_idx == pos.line {
            pos.col.min(line.len())
        } else {
            line.len()
        };
        for (i, c) in line[..limit].char_indices().rev() {
            if c == close {
                depth += 1;
            } else if c == open {
                if depth == 0 {
                    return Some(Position::new(line_idx, i));
                }
                depth -= 1;
            }
        }
        if line_idx == 0 {
            return None;
        }
        line_idx -= 1;
    }
}

/// Walk forward from just past the opener looking for its partner.
fn scan_forward<B: BufferRead + ?Sized>(
    buf: &B,
    open_pos: Position,
    open: char,
    close: char,
) -> Option<Position> {
    let mut depth = 0i32;
    let mut line_idx = open_pos.line;
    while line_idx < buf.line_count() {
        let line = buf.line(line_idx)?;
        let from = if line_idx == open_pos.line {
            crate::motion::next_boundary(&line, open_pos.col)
        } else {
            0
        };
        for (i, c) in line[from..].char_indices() {
            if c == open {
                depth += 1;
            } else if c == close {
                if depth == 0 {
                    return Some(Position::new(line_idx, from + i));
                }
                depth -= 1;
            }
        }
        line_idx += 1;
    }
    None
}

// ── Quotes ───────────────────────────────────────────────────────────

fn quote_object<B: BufferRead + ?Sized>(
    buf: &B,
    pos: Position,
    quote: char,
    around: bool,
) -> Option<ObjectRange> {
    let line = buf.line(pos.line)?;
    let spans = quote_spans(&line, quote);
    // Nearest span containing or following the cursor column.
    let (open, close) = spans.iter().copied().find(|&(_, c)| pos.col <= c)?;
    let chars: Vec<(usize, char)> = line.char_indices().collect();

    if !around {
        let start = crate::motion::next_boundary(&line, open);
        if start >= close {
            return None; // empty pair
        }
        return Some(charwise(pos.line, start, pos.line, close));
    }

    let after_close = crate::motion::next_boundary(&line, close);
    // Around absorbs trailing whitespace, or leading if there is none.
    let close_idx = chars.iter().position(|(i, _)| *i == close)?;
    let mut trail = close_idx + 1;
    while trail < chars.len() && chars[trail].1.is_whitespace() {
        trail += 1;
    }
    let trail_col = if trail < chars.len() {
        chars[trail].0
    } else {
        line.len()
    };
    if trail_col > after_close {
        return Some(charwise(pos.line, open, pos.line, trail_col));
    }
    let open_idx = chars.iter().position(|(i, _)| *i == open)?;
    let mut lead = open_idx;
    while lead > 0 && chars[lead - 1].1.is_whitespace() {
        lead -= 1;
    }
    Some(charwise(pos.line, chars[lead].0, pos.line, after_close))
}

/// Pair up unescaped quote characters on a line. A backslash escapes the
/// following quote, so `\"` never opens or closes a span.
fn quote_spans(line: &str, quote: char) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut open: Option<usize> = None;
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        if c == '\\' {
            escaped = true;
            continue;
        }
        if c == quote {
            match open.take() {
                Some(o) => spans.push((o, i)),
                None => open = Some(i),
            }
        }
    }
    spans
}

// ── Helpers ──────────────────────────────────────────────────────────

fn col_after(line: &str, chars: &[(usize, char)], idx: usize) -> usize {
    if idx + 1 < chars.len() {
        chars[idx + 1].0
    } else {
        line.len()
    }
}

fn charwise(sl: usize, sc: usize, el: usize, ec: usize) -> ObjectRange {
    ObjectRange {
        range: Range::new(Position::new(sl, sc), Position::new(el, ec)),
        linewise: false,
    }
}
