//! Operator execution.
//!
//! Commands that change text land here. The common shape: derive a
//! half-open range from the cursor plus a motion, object, or selection,
//! express it as a host selection, and let the host's `Cut`/`Copy`
//! built-ins do the mutation and clipboard work. Every mutating path is
//! wrapped in one undo group; aborted resolutions (motion or object not
//! found) return before any group is opened.

use crossterm::event::KeyEvent;

use crate::host::{BuiltinCommand, HostEditor, Position, Range, clamp_position};
use crate::motion::{self, Motion, MotionContext};
use crate::parser::{InsertKind, Target, Verb};
use crate::session::EditorSession;
use crate::text_object;

/// Whole-line range covering `start..=end` (inclusive line indices).
fn line_range(start: usize, end: usize) -> Range {
    Range::new(Position::new(start, 0), Position::new(end + 1, 0))
}

/// Last line index a range touches.
pub(crate) fn last_line(range: Range) -> usize {
    if range.end.col == 0 && range.end.line > range.start.line {
        range.end.line - 1
    } else {
        range.end.line
    }
}

pub(crate) fn apply_operator(
    s: &mut EditorSession,
    host: &mut dyn HostEditor,
    verb: Verb,
    target: Target,
    count: usize,
) {
    let cursor = host.cursor();
    let resolved = match target {
        Target::Line => {
            let last = host.line_count().saturating_sub(1);
            let start = cursor.line.min(last);
            let end = (start + count.max(1) - 1).min(last);
            Some((line_range(start, end), true))
        }
        Target::Motion(m) => resolve_motion_range(s, host, m, count),
        Target::Object(obj) => {
            text_object::resolve(&*host, cursor, obj).map(|o| (o.range, o.linewise))
        }
        Target::Selection => s.selection_range(host),
    };
    // A target that does not exist aborts the operator: no edit, no undo
    // group, pending already cleared by the caller.
    let Some((range, linewise)) = resolved else {
        return;
    };
    if range.is_empty() {
        return;
    }

    match verb {
        Verb::Yank => {
            host.set_selection(range, false);
            if let Err(err) = host.run_command(BuiltinCommand::Copy) {
                log::warn!("copy failed: {err}");
            }
            host.clear_selection();
            let target = if linewise {
                Position::new(range.start.line, cursor.col)
            } else {
                range.start
            };
            host.set_cursor(clamp_position(host, target, false));
        }
        Verb::Delete | Verb::Change => {
            // When the range swallows every line, the host leaves its
            // placeholder empty line behind and change types into that.
            let whole_buffer =
                linewise && range.start.line == 0 && range.end.line >= host.line_count();
            host.begin_undo_group();
            s.open_groups += 1;
            host.set_selection(range, false);
            if let Err(err) = host.run_command(BuiltinCommand::Cut) {
                log::warn!("cut failed: {err}");
            }
            host.clear_selection();
            if verb == Verb::Change {
                if linewise {
                    if whole_buffer {
                        host.set_cursor(Position::new(0, 0));
                    } else {
                        // The cut removed whole lines; reopen a blank one
                        // to type into.
                        let at = range.start.line.min(host.line_count());
                        host.insert_line(at, "");
                        host.set_cursor(Position::new(at, 0));
                    }
                } else {
                    host.set_cursor(clamp_position(host, range.start, true));
                }
                s.begin_insert_session(host);
            } else {
                let col = if linewise { 0 } else { range.start.col };
                host.set_cursor(clamp_position(
                    host,
                    Position::new(range.start.line, col),
                    false,
                ));
                host.end_undo_group();
                s.open_groups -= 1;
            }
        }
        Verb::Indent | Verb::Unindent => {
            let cmd = if verb == Verb::Indent {
                BuiltinCommand::IndentLine
            } else {
                BuiltinCommand::UnindentLine
            };
            host.begin_undo_group();
            s.open_groups += 1;
            for line in range.start.line..=last_line(range).min(host.line_count() - 1) {
                host.set_cursor(Position::new(line, 0));
                if let Err(err) = host.run_command(cmd) {
                    log::warn!("indent failed: {err}");
                    break;
                }
            }
            if target == Target::Selection {
                // Keep the cursor on its line so the visual extent
                // survives the shift.
                host.set_cursor(clamp_position(host, cursor, false));
            } else {
                let text = host.line(range.start.line).unwrap_or_default();
                host.set_cursor(Position::new(
                    range.start.line,
                    motion::first_non_blank(&text),
                ));
            }
            host.end_undo_group();
            s.open_groups -= 1;
        }
    }
}

/// Turn `count` applications of a motion into an operable range. `None`
/// aborts the operator (target not found or no movement at all).
fn resolve_motion_range(
    s: &mut EditorSession,
    host: &mut dyn HostEditor,
    m: Motion,
    count: usize,
) -> Option<(Range, bool)> {
    let start = host.cursor();
    let mut pos = start;
    for _ in 0..count.max(1) {
        let ctx = MotionContext {
            desired_col: s.desired_col,
            last_find: s.last_find,
            last_search: s.last_search.as_deref(),
        };
        let next = motion::resolve(&*host, pos, m, &ctx)?;
        if next == pos {
            break;
        }
        pos = next;
    }
    if let Motion::Find(cs) = m {
        if pos != start {
            s.last_find = Some(cs);
        }
    }
    if m.is_linewise() {
        let top = start.line.min(pos.line);
        let bottom = start.line.max(pos.line);
        return Some((line_range(top, bottom), true));
    }
    if pos == start {
        return None;
    }
    let (a, mut b) = if start <= pos { (start, pos) } else { (pos, start) };
    if m.is_inclusive() {
        let line = host.line(b.line).unwrap_or_default();
        b = Position::new(b.line, motion::next_boundary(&line, b.col));
    }
    Some((Range::new(a, b), false))
}

// ── Insert entries ───────────────────────────────────────────────────

pub(crate) fn enter_insert(
    s: &mut EditorSession,
    host: &mut dyn HostEditor,
    kind: InsertKind,
    count: usize,
) {
    host.begin_undo_group();
    s.open_groups += 1;
    let pos = host.cursor();
    let line = host.line(pos.line).unwrap_or_default();
    match kind {
        InsertKind::Before | InsertKind::Overwrite => {}
        InsertKind::After => {
            host.set_cursor(Position::new(pos.line, motion::next_boundary(&line, pos.col)));
        }
        InsertKind::AtFirstNonBlank => {
            host.set_cursor(Position::new(pos.line, motion::first_non_blank(&line)));
        }
        InsertKind::AtLineEnd => {
            host.set_cursor(Position::new(pos.line, line.len()));
        }
        InsertKind::LineBelow => {
            host.insert_line(pos.line + 1, "");
            host.set_cursor(Position::new(pos.line + 1, 0));
        }
        InsertKind::LineAbove => {
            host.insert_line(pos.line, "");
            host.set_cursor(Position::new(pos.line, 0));
        }
        InsertKind::Substitute => {
            let end = advance_chars(&line, pos.col, count.max(1));
            if end > pos.col {
                let mut text = line.clone();
                text.replace_range(pos.col..end, "");
                host.set_line(pos.line, &text);
            }
        }
    }
    s.begin_insert_session(host);
}

/// Byte offset after stepping `count` chars right from `col`, capped.
fn advance_chars(line: &str, col: usize, count: usize) -> usize {
    let mut end = col.min(line.len());
    for _ in 0..count {
        let next = motion::next_boundary(line, end);
        if next == end {
            break;
        }
        end = next;
    }
    end
}

// ── Standalone edits ─────────────────────────────────────────────────

/// `x`: cut `count` characters under and after the cursor, same line.
pub(crate) fn delete_chars(s: &mut EditorSession, host: &mut dyn HostEditor, count: usize) {
    let pos = host.cursor();
    let line = host.line(pos.line).unwrap_or_default();
    let end = advance_chars(&line, pos.col, count.max(1));
    if end <= pos.col {
        return;
    }
    host.begin_undo_group();
    s.open_groups += 1;
    host.set_selection(Range::new(pos, Position::new(pos.line, end)), false);
    if let Err(err) = host.run_command(BuiltinCommand::Cut) {
        log::warn!("cut failed: {err}");
    }
    host.clear_selection();
    host.set_cursor(clamp_position(host, pos, false));
    host.end_undo_group();
    s.open_groups -= 1;
}

/// `r`: overwrite `count` characters with `ch`. Aborts when the line is
/// too short, leaving the buffer untouched.
pub(crate) fn replace_chars(
    s: &mut EditorSession,
    host: &mut dyn HostEditor,
    ch: char,
    count: usize,
) {
    if ch == '\n' || ch == '\r' {
        return;
    }
    let pos = host.cursor();
    let line = host.line(pos.line).unwrap_or_default();
    let count = count.max(1);
    let end = advance_chars(&line, pos.col, count);
    if line[pos.col.min(line.len())..end].chars().count() < count {
        return;
    }
    host.begin_undo_group();
    s.open_groups += 1;
    let mut text = line.clone();
    let replacement: String = std::iter::repeat(ch).take(count).collect();
    text.replace_range(pos.col..end, &replacement);
    host.set_line(pos.line, &text);
    // Cursor lands on the last replaced character.
    let last = pos.col + ch.len_utf8() * (count - 1);
    host.set_cursor(Position::new(pos.line, last));
    host.end_undo_group();
    s.open_groups -= 1;
}

/// `p`/`P`: insert the clipboard. Text ending in a newline pastes
/// linewise below/above the cursor line; anything else splices in at the
/// cursor.
pub(crate) fn paste(s: &mut EditorSession, host: &mut dyn HostEditor, after: bool, count: usize) {
    let text = host.clipboard_text();
    if text.is_empty() {
        return;
    }
    host.begin_undo_group();
    s.open_groups += 1;
    let pos = host.cursor();
    if let Some(body) = text.strip_suffix('\n') {
        let lines: Vec<&str> = body.split('\n').collect();
        let at = if after { pos.line + 1 } else { pos.line };
        let mut insert_at = at;
        for _ in 0..count.max(1) {
            for l in &lines {
                host.insert_line(insert_at, l);
                insert_at += 1;
            }
        }
        let first = host.line(at).unwrap_or_default();
        host.set_cursor(Position::new(at, motion::first_non_blank(&first)));
    } else {
        let line = host.line(pos.line).unwrap_or_default();
        let col = if after && !line.is_empty() {
            motion::next_boundary(&line, pos.col)
        } else {
            pos.col
        };
        host.set_cursor(Position::new(pos.line, col));
        for _ in 0..count.max(1) {
            host.insert_at_cursor(&text);
        }
        // Back onto the last pasted character.
        let end = host.cursor();
        let line = host.line(end.line).unwrap_or_default();
        host.set_cursor(Position::new(end.line, motion::prev_boundary(&line, end.col)));
    }
    host.end_undo_group();
    s.open_groups -= 1;
}

/// `J`: join lines, collapsing the next line's leading whitespace into a
/// single separating space.
pub(crate) fn join_lines(s: &mut EditorSession, host: &mut dyn HostEditor, joins: usize) {
    let pos = host.cursor();
    if pos.line + 1 >= host.line_count() {
        return;
    }
    host.begin_undo_group();
    s.open_groups += 1;
    let mut join_col = 0;
    for _ in 0..joins.max(1) {
        if pos.line + 1 >= host.line_count() {
            break;
        }
        let current = host.line(pos.line).unwrap_or_default();
        let next = host.remove_line(pos.line + 1);
        let trimmed = next.trim_start();
        join_col = current.len();
        let mut joined = current;
        if !joined.is_empty() && !trimmed.is_empty() {
            joined.push(' ');
        }
        joined.push_str(trimmed);
        host.set_line(pos.line, &joined);
    }
    host.set_cursor(clamp_position(host, Position::new(pos.line, join_col), false));
    host.end_undo_group();
    s.open_groups -= 1;
}

/// `gcc`: toggle the comment prefix on `count` lines via the host command.
pub(crate) fn toggle_comment(s: &mut EditorSession, host: &mut dyn HostEditor, count: usize) {
    let pos = host.cursor();
    let last = host.line_count().saturating_sub(1);
    let end = (pos.line + count.max(1) - 1).min(last);
    host.begin_undo_group();
    s.open_groups += 1;
    for line in pos.line..=end {
        host.set_cursor(Position::new(line, 0));
        if let Err(err) = host.run_command(BuiltinCommand::ToggleComment) {
            log::warn!("toggle comment failed: {err}");
            break;
        }
    }
    host.set_cursor(clamp_position(host, pos, false));
    host.end_undo_group();
    s.open_groups -= 1;
}

// ── Insert-mode primitives ───────────────────────────────────────────

pub(crate) fn backspace(host: &mut dyn HostEditor) {
    let pos = host.cursor();
    if pos.col > 0 {
        let line = host.line(pos.line).unwrap_or_default();
        let prev = motion::prev_boundary(&line, pos.col);
        let mut text = line;
        text.replace_range(prev..pos.col, "");
        host.set_line(pos.line, &text);
        host.set_cursor(Position::new(pos.line, prev));
    } else if pos.line > 0 {
        let removed = host.remove_line(pos.line);
        let prev = host.line(pos.line - 1).unwrap_or_default();
        let col = prev.len();
        host.set_line(pos.line - 1, &format!("{prev}{removed}"));
        host.set_cursor(Position::new(pos.line - 1, col));
    }
}

pub(crate) fn delete_forward(host: &mut dyn HostEditor) {
    let pos = host.cursor();
    let line = host.line(pos.line).unwrap_or_default();
    if pos.col < line.len() {
        let next = motion::next_boundary(&line, pos.col);
        let mut text = line;
        text.replace_range(pos.col..next, "");
        host.set_line(pos.line, &text);
    } else if pos.line + 1 < host.line_count() {
        let next = host.remove_line(pos.line + 1);
        host.set_line(pos.line, &format!("{line}{next}"));
    }
}

/// Replay a sequence of recorded key events through the live dispatch
/// path. Used by macro playback.
pub(crate) fn replay_events(
    s: &mut EditorSession,
    host: &mut dyn HostEditor,
    events: &[KeyEvent],
) {
    for &ev in events {
        s.handle_key(host, ev);
    }
}
