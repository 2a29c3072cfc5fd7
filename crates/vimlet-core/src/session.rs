//! The mode state machine.
//!
//! [`EditorSession`] owns every piece of interpreter state (mode, pending
//! command, visual anchor, marks, macro registers, dot-repeat buffers)
//! and is handed a `&mut dyn HostEditor` per event. Nothing here is
//! global; a host can run one session per buffer.
//!
//! Replay (macro playback, dot-repeat) goes back through [`Self::handle_key`]
//! with `replay_depth` raised, so replayed input takes the exact path live
//! input does while staying detectable: live-only concerns (macro capture,
//! insert capture, stray undo-group cleanup) check the depth.

use std::collections::HashMap;

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::commandline::{self, CommandlineState};
use crate::edit;
use crate::host::{CursorShape, HostEditor, Position, Range, clamp_position};
use crate::motion::{self, CharSearch, Motion, MotionContext};
use crate::parser::{self, Command, ParseContext, ParseResult, Target, Verb};
use crate::record::MacroRecorder;
use crate::repeat::DotRepeat;
use crate::settings;
use crate::text_object::TextObject;

/// Nested playback is legal (a macro may invoke another) but bounded, so a
/// register that plays itself terminates instead of recursing forever.
const MAX_REPLAY_DEPTH: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    Insert,
    /// Normal mode: the command grammar is live.
    #[default]
    Command,
    Commandline,
    Visual,
    VisualLine,
    /// Emulation disabled; every key passes through to the host.
    Suspended,
}

impl Mode {
    pub fn label(&self) -> &'static str {
        match self {
            Mode::Insert => "INSERT",
            Mode::Command => "COMMAND",
            Mode::Commandline => "COMMAND-LINE",
            Mode::Visual => "VISUAL",
            Mode::VisualLine => "VISUAL LINE",
            Mode::Suspended => "SUSPENDED",
        }
    }
}

pub struct EditorSession {
    pub(crate) mode: Mode,
    /// Partially typed Normal/Visual command. Non-empty only mid-parse.
    pub(crate) pending: String,
    /// Defined iff mode is Visual or VisualLine.
    pub(crate) visual_anchor: Option<Position>,
    /// Sticky column for vertical movement.
    pub(crate) desired_col: usize,
    pub(crate) marks: HashMap<char, Position>,
    pub(crate) recorder: MacroRecorder,
    pub(crate) dot: DotRepeat,
    pub(crate) last_find: Option<CharSearch>,
    pub(crate) last_search: Option<String>,
    pub(crate) commandline: Option<CommandlineState>,
    /// > 0 while replaying recorded events through the dispatch path.
    pub(crate) replay_depth: u32,
    /// Set while `.` is re-feeding the last change.
    pub(crate) dot_replay: bool,
    /// Undo groups currently held open on the host.
    pub(crate) open_groups: u32,
    /// The active insert session holds an undo group to close on exit.
    pub(crate) insert_group_open: bool,
    /// One-shot status message, shown by the next presentation sync.
    pub(crate) message: Option<String>,
}

impl Default for EditorSession {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorSession {
    pub fn new() -> Self {
        Self {
            mode: Mode::Command,
            pending: String::new(),
            visual_anchor: None,
            desired_col: 0,
            marks: HashMap::new(),
            recorder: MacroRecorder::new(),
            dot: DotRepeat::new(),
            last_find: None,
            last_search: None,
            commandline: None,
            replay_depth: 0,
            dot_replay: false,
            open_groups: 0,
            insert_group_open: false,
            message: None,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn pending(&self) -> &str {
        &self.pending
    }

    pub fn commandline_state(&self) -> Option<&CommandlineState> {
        self.commandline.as_ref()
    }

    pub fn recording_register(&self) -> Option<char> {
        self.recorder.recording_register()
    }

    pub fn is_suspended(&self) -> bool {
        self.mode == Mode::Suspended
    }

    /// Host lifecycle hook: the buffer lost focus or was swapped out.
    /// Everything transient resets; marks and macro registers survive.
    pub fn reset(&mut self, host: &mut dyn HostEditor) {
        self.recorder.abort();
        self.dot.abort_insert_capture();
        self.pending.clear();
        self.visual_anchor = None;
        self.commandline = None;
        self.replay_depth = 0;
        self.dot_replay = false;
        self.insert_group_open = false;
        self.close_stray_groups(host);
        host.clear_selection();
        self.mode = Mode::Command;
        self.sync(host);
    }

    /// Host settings-changed callback.
    pub fn setting_changed(&mut self, host: &mut dyn HostEditor, name: &str) {
        log::debug!("setting changed: {name}");
        self.sync(host);
    }

    /// Feed commandline text submitted through the host's own palette.
    pub fn submit_command(&mut self, host: &mut dyn HostEditor, text: &str) {
        commandline::execute(self, host, text);
        self.sync(host);
    }

    // ── Key dispatch ─────────────────────────────────────────────────

    /// Route one key event. Returns whether the session consumed it; a
    /// `false` lets the host apply its own bindings.
    pub fn handle_key(&mut self, host: &mut dyn HostEditor, key: KeyEvent) -> bool {
        if key.kind == KeyEventKind::Release {
            return false;
        }
        if is_suspend_toggle(key) {
            self.toggle_suspended(host);
            return true;
        }
        if self.mode == Mode::Suspended {
            return false;
        }
        // Verbatim capture of live input, consumed keys included. The
        // sealing `q` is trimmed again by the recorder itself.
        if self.replay_depth == 0 {
            self.recorder.capture(key);
        }
        let handled = match self.mode {
            Mode::Insert => self.handle_insert_key(host, key),
            Mode::Command | Mode::Visual | Mode::VisualLine => self.handle_grammar_key(host, key),
            Mode::Commandline => self.handle_commandline_key(host, key),
            Mode::Suspended => false,
        };
        self.sync(host);
        handled
    }

    fn toggle_suspended(&mut self, host: &mut dyn HostEditor) {
        if self.mode == Mode::Suspended {
            self.mode = Mode::Command;
        } else {
            self.escape(host);
            self.mode = Mode::Suspended;
        }
        self.sync(host);
    }

    // ── Insert mode ──────────────────────────────────────────────────

    fn handle_insert_key(&mut self, host: &mut dyn HostEditor, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Esc => {
                self.exit_insert(host);
                return true;
            }
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.exit_insert(host);
                return true;
            }
            _ => {}
        }
        self.dot.capture_insert(key);
        match key.code {
            KeyCode::Char(c) if text_modifiers(key.modifiers) => {
                host.insert_at_cursor(&c.to_string());
                true
            }
            KeyCode::Enter => {
                host.insert_at_cursor("\n");
                true
            }
            KeyCode::Tab => {
                let width = settings::indent_width(host);
                host.insert_at_cursor(&" ".repeat(width));
                true
            }
            KeyCode::Backspace => {
                edit::backspace(host);
                true
            }
            KeyCode::Delete => {
                edit::delete_forward(host);
                true
            }
            KeyCode::Left => self.insert_cursor_move(host, Motion::Left),
            KeyCode::Right => {
                // In insert mode the cursor may rest one past the line end.
                let pos = host.cursor();
                let line = host.line(pos.line).unwrap_or_default();
                host.set_cursor(Position::new(
                    pos.line,
                    motion::next_boundary(&line, pos.col),
                ));
                self.desired_col = host.cursor().col;
                true
            }
            KeyCode::Up => self.insert_cursor_move(host, Motion::Up),
            KeyCode::Down => self.insert_cursor_move(host, Motion::Down),
            KeyCode::Home => self.insert_cursor_move(host, Motion::LineStart),
            KeyCode::End => {
                let pos = host.cursor();
                let line = host.line(pos.line).unwrap_or_default();
                host.set_cursor(Position::new(pos.line, line.len()));
                self.desired_col = host.cursor().col;
                true
            }
            _ => false,
        }
    }

    fn insert_cursor_move(&mut self, host: &mut dyn HostEditor, motion: Motion) -> bool {
        let ctx = self.motion_context();
        if let Some(next) = motion::resolve(&*host, host.cursor(), motion, &ctx) {
            host.set_cursor(clamp_position(host, next, true));
            if !matches!(motion, Motion::Up | Motion::Down) {
                self.desired_col = host.cursor().col;
            }
        }
        true
    }

    /// Start an insert session. The caller has already opened the undo
    /// group that covers it (and any preceding operator edit).
    pub(crate) fn begin_insert_session(&mut self, host: &mut dyn HostEditor) {
        self.insert_group_open = true;
        if self.dot_replay {
            // Dot-repeat: replay the stored insert buffer instead of
            // waiting for live typing, then leave insert immediately.
            self.mode = Mode::Insert;
            let events = self.dot.insert_events().to_vec();
            for ev in events {
                self.handle_insert_key(host, ev);
            }
            self.exit_insert(host);
        } else {
            self.dot.begin_insert_capture();
            self.mode = Mode::Insert;
        }
    }

    pub(crate) fn exit_insert(&mut self, host: &mut dyn HostEditor) {
        self.dot.end_insert_capture();
        if self.insert_group_open {
            host.end_undo_group();
            self.open_groups = self.open_groups.saturating_sub(1);
            self.insert_group_open = false;
        }
        // Vim convention: leaving insert steps one column left, clamped.
        let pos = host.cursor();
        let line = host.line(pos.line).unwrap_or_default();
        let col = motion::prev_boundary(&line, pos.col);
        host.set_cursor(clamp_position(host, Position::new(pos.line, col), false));
        self.desired_col = host.cursor().col;
        self.mode = Mode::Command;
    }

    // ── Normal / Visual modes ────────────────────────────────────────

    fn handle_grammar_key(&mut self, host: &mut dyn HostEditor, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Esc => {
                self.escape(host);
                true
            }
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.escape(host);
                true
            }
            KeyCode::Char('r') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                if let Err(err) = host.run_command(crate::host::BuiltinCommand::Redo) {
                    log::warn!("redo failed: {err}");
                }
                true
            }
            KeyCode::Left => self.arrow_move(host, Motion::Left),
            KeyCode::Right => self.arrow_move(host, Motion::Right),
            KeyCode::Up => self.arrow_move(host, Motion::Up),
            KeyCode::Down => self.arrow_move(host, Motion::Down),
            KeyCode::Char(c) if text_modifiers(key.modifiers) => {
                self.feed_char(host, c);
                true
            }
            _ => false,
        }
    }

    fn arrow_move(&mut self, host: &mut dyn HostEditor, motion: Motion) -> bool {
        self.apply_move(host, motion, 1);
        true
    }

    /// Append one character to the pending command and act on the parse.
    pub(crate) fn feed_char(&mut self, host: &mut dyn HostEditor, c: char) {
        // A bare `q` while recording seals the register; it never reaches
        // the grammar.
        if self.pending.is_empty() && c == 'q' && self.recorder.is_recording() {
            self.recorder.stop();
            return;
        }
        self.pending.push(c);
        let ctx = match self.mode {
            Mode::Visual | Mode::VisualLine => ParseContext::Visual,
            _ => ParseContext::Normal,
        };
        match parser::parse(&self.pending, ctx) {
            ParseResult::Incomplete => {}
            ParseResult::Invalid => {
                log::debug!("discarding pending input {:?}", self.pending);
                self.pending.clear();
            }
            ParseResult::Complete(cmd) => {
                let text = std::mem::take(&mut self.pending);
                self.dispatch(host, cmd, &text);
            }
        }
    }

    fn dispatch(&mut self, host: &mut dyn HostEditor, cmd: Command, text: &str) {
        if is_change_command(cmd) {
            self.dot.set_last_change(text);
        }
        match cmd {
            Command::Move { motion, count } => self.apply_move(host, motion, count),
            Command::Operate {
                verb,
                target,
                count,
            } => {
                edit::apply_operator(self, host, verb, target, count);
                if target == Target::Selection {
                    match verb {
                        // Indent keeps the selection alive so it can be
                        // nudged repeatedly.
                        Verb::Indent | Verb::Unindent => {}
                        Verb::Change => {
                            self.visual_anchor = None;
                            host.clear_selection();
                        }
                        _ => self.leave_visual(host),
                    }
                }
            }
            Command::EnterInsert { kind, count } => edit::enter_insert(self, host, kind, count),
            Command::DeleteChar { count } => edit::delete_chars(self, host, count),
            Command::ReplaceChar { ch, count } => edit::replace_chars(self, host, ch, count),
            Command::PasteAfter { count } => edit::paste(self, host, true, count),
            Command::PasteBefore { count } => edit::paste(self, host, false, count),
            Command::JoinLines { count } => {
                if matches!(self.mode, Mode::Visual | Mode::VisualLine) {
                    if let Some((range, _)) = self.selection_range(host) {
                        let joins = edit::last_line(range)
                            .saturating_sub(range.start.line)
                            .max(1);
                        host.set_cursor(Position::new(range.start.line, 0));
                        edit::join_lines(self, host, joins);
                    }
                    self.leave_visual(host);
                } else {
                    edit::join_lines(self, host, count.max(2) - 1);
                }
            }
            Command::Undo { count } => {
                for _ in 0..count.max(1) {
                    if let Err(err) = host.run_command(crate::host::BuiltinCommand::Undo) {
                        log::warn!("undo failed: {err}");
                        break;
                    }
                }
            }
            Command::ToggleVisual => self.toggle_visual(host, Mode::Visual),
            Command::ToggleVisualLine => self.toggle_visual(host, Mode::VisualLine),
            Command::EnterCommandline { seed } => self.enter_commandline(host, seed),
            Command::SetMark { mark } => {
                self.marks.insert(mark, host.cursor());
            }
            Command::JumpToMark { mark, exact } => self.jump_to_mark(host, mark, exact),
            Command::RecordToggle { register } => self.recorder.start(register),
            Command::PlayMacro { register, count } => self.play_macro(host, register, count),
            Command::RepeatChange { count } => self.repeat_change(host, count),
            Command::ToggleComment { count } => edit::toggle_comment(self, host, count),
            Command::NextTab { count } => {
                for _ in 0..count.max(1) {
                    let _ = host.run_command(crate::host::BuiltinCommand::NextTab);
                }
            }
            Command::PrevTab { count } => {
                for _ in 0..count.max(1) {
                    let _ = host.run_command(crate::host::BuiltinCommand::PrevTab);
                }
            }
            Command::SelectObject(obj) => self.select_object(host, obj),
            Command::SwapVisualEnds => self.swap_visual_ends(host),
        }
    }

    /// Apply a motion `count` times, one step at a time. A step that fails
    /// or stands still short-circuits the rest; a failed character search
    /// leaves the search history untouched so `;`/`,` stay no-ops.
    fn apply_move(&mut self, host: &mut dyn HostEditor, motion: Motion, count: usize) {
        let start = host.cursor();
        let mut pos = start;
        for _ in 0..count.max(1) {
            let ctx = self.motion_context();
            match motion::resolve(&*host, pos, motion, &ctx) {
                Some(next) => {
                    if next == pos {
                        break;
                    }
                    pos = next;
                }
                None => break,
            }
        }
        if pos == start {
            return;
        }
        let allow_past_end = self.mode == Mode::Insert;
        let clamped = clamp_position(host, pos, allow_past_end);
        host.set_cursor(clamped);
        if !matches!(motion, Motion::Up | Motion::Down) {
            self.desired_col = clamped.col;
        }
        if let Motion::Find(cs) = motion {
            self.last_find = Some(cs);
        }
    }

    pub(crate) fn motion_context(&self) -> MotionContext<'_> {
        MotionContext {
            desired_col: self.desired_col,
            last_find: self.last_find,
            last_search: self.last_search.as_deref(),
        }
    }

    // ── Visual mode ──────────────────────────────────────────────────

    fn toggle_visual(&mut self, host: &mut dyn HostEditor, target: Mode) {
        if self.mode == target {
            self.leave_visual(host);
            return;
        }
        if self.visual_anchor.is_none() {
            self.visual_anchor = Some(host.cursor());
        }
        self.mode = target;
    }

    pub(crate) fn leave_visual(&mut self, host: &mut dyn HostEditor) {
        self.visual_anchor = None;
        host.clear_selection();
        if self.mode != Mode::Insert {
            self.mode = Mode::Command;
        }
    }

    /// The live selection as a half-open range: anchor..cursor inclusive
    /// of the character under the cursor, whole lines in VisualLine.
    pub(crate) fn selection_range(&self, host: &dyn HostEditor) -> Option<(Range, bool)> {
        let anchor = self.visual_anchor?;
        let cursor = host.cursor();
        if self.mode == Mode::VisualLine {
            let top = anchor.line.min(cursor.line);
            let bottom = anchor.line.max(cursor.line);
            return Some((
                Range::new(Position::new(top, 0), Position::new(bottom + 1, 0)),
                true,
            ));
        }
        let (start, end) = if anchor <= cursor {
            (anchor, cursor)
        } else {
            (cursor, anchor)
        };
        let line = host.line(end.line).unwrap_or_default();
        let end = Position::new(end.line, motion::next_boundary(&line, end.col));
        Some((Range::new(start, end), false))
    }

    fn select_object(&mut self, host: &mut dyn HostEditor, obj: TextObject) {
        let Some(resolved) = crate::text_object::resolve(&*host, host.cursor(), obj) else {
            return;
        };
        let range = resolved.range;
        self.visual_anchor = Some(range.start);
        if resolved.linewise {
            self.mode = Mode::VisualLine;
            let last = edit::last_line(range);
            host.set_cursor(clamp_position(host, Position::new(last, 0), false));
        } else {
            // Cursor on the last character inside the range.
            let end = range.end;
            let target = if end.col > 0 {
                let line = host.line(end.line).unwrap_or_default();
                Position::new(end.line, motion::prev_boundary(&line, end.col))
            } else {
                let prev = end.line.saturating_sub(1);
                let line = host.line(prev).unwrap_or_default();
                Position::new(prev, motion::prev_boundary(&line, line.len()))
            };
            host.set_cursor(clamp_position(host, target, false));
        }
    }

    fn swap_visual_ends(&mut self, host: &mut dyn HostEditor) {
        if let Some(anchor) = self.visual_anchor {
            self.visual_anchor = Some(host.cursor());
            host.set_cursor(clamp_position(host, anchor, false));
        }
    }

    // ── Commandline mode ─────────────────────────────────────────────

    fn enter_commandline(&mut self, host: &mut dyn HostEditor, seed: char) {
        if seed == ':' && !settings::commandline_enabled(host) {
            host.open_command_palette();
            return;
        }
        self.commandline = Some(CommandlineState::new(seed));
        self.mode = Mode::Commandline;
    }

    fn handle_commandline_key(&mut self, host: &mut dyn HostEditor, key: KeyEvent) -> bool {
        let Some(state) = self.commandline.as_mut() else {
            self.mode = Mode::Command;
            return false;
        };
        match key.code {
            KeyCode::Esc => {
                self.commandline = None;
                self.mode = Mode::Command;
            }
            KeyCode::Enter => {
                let text = state.text.clone();
                self.commandline = None;
                // Back to Command first: the submitted command may move
                // the cursor or re-enter another mode.
                self.mode = Mode::Command;
                commandline::execute(self, host, &text);
            }
            KeyCode::Backspace => {
                if !state.backspace() {
                    self.commandline = None;
                    self.mode = Mode::Command;
                }
            }
            KeyCode::Left => state.move_left(),
            KeyCode::Right => state.move_right(),
            KeyCode::Home => state.move_home(),
            KeyCode::End => state.move_end(),
            KeyCode::Char(c) if text_modifiers(key.modifiers) => state.insert_char(c),
            _ => return false,
        }
        true
    }

    // ── Marks ────────────────────────────────────────────────────────

    fn jump_to_mark(&mut self, host: &mut dyn HostEditor, mark: char, exact: bool) {
        let Some(&pos) = self.marks.get(&mark) else {
            self.message = Some(format!("mark {mark} not set"));
            return;
        };
        let pos = clamp_position(host, pos, false);
        if exact {
            host.set_cursor(pos);
        } else {
            let line = host.line(pos.line).unwrap_or_default();
            host.set_cursor(Position::new(pos.line, motion::first_non_blank(&line)));
        }
        self.desired_col = host.cursor().col;
    }

    // ── Macro playback and dot-repeat ────────────────────────────────

    fn play_macro(&mut self, host: &mut dyn HostEditor, register: char, count: usize) {
        let Some(events) = self.recorder.events(register).map(<[_]>::to_vec) else {
            log::warn!("playback of empty macro register {register:?}");
            self.message = Some(format!("register {register} is empty"));
            return;
        };
        if self.replay_depth >= MAX_REPLAY_DEPTH {
            log::warn!("macro replay depth limit hit in register {register:?}");
            self.message = Some("macro recursion too deep".to_string());
            return;
        }
        host.begin_undo_group();
        self.open_groups += 1;
        self.replay_depth += 1;
        for _ in 0..count.max(1) {
            edit::replay_events(self, host, &events);
        }
        self.replay_depth -= 1;
        if self.open_groups > 0 {
            host.end_undo_group();
            self.open_groups -= 1;
        }
    }

    fn repeat_change(&mut self, host: &mut dyn HostEditor, count: usize) {
        if self.dot_replay {
            return;
        }
        let Some(cmd) = self.dot.last_change().map(str::to_string) else {
            self.message = Some("nothing to repeat".to_string());
            return;
        };
        // Self-reference guard: a remembered `.` would replay forever.
        if cmd == "." {
            return;
        }
        if self.replay_depth >= MAX_REPLAY_DEPTH {
            return;
        }
        host.begin_undo_group();
        self.open_groups += 1;
        self.replay_depth += 1;
        self.dot_replay = true;
        for _ in 0..count.max(1) {
            for c in cmd.chars() {
                self.feed_char(host, c);
            }
            self.pending.clear();
        }
        self.dot_replay = false;
        self.replay_depth -= 1;
        if self.open_groups > 0 {
            host.end_undo_group();
            self.open_groups -= 1;
        }
    }

    // ── Escape / cleanup ─────────────────────────────────────────────

    /// Synchronous abort: whatever was in flight, land in Command mode
    /// with no pending input and, for live input, no undo group open.
    fn escape(&mut self, host: &mut dyn HostEditor) {
        match self.mode {
            Mode::Insert => self.exit_insert(host),
            Mode::Visual | Mode::VisualLine => self.leave_visual(host),
            Mode::Commandline => {
                self.commandline = None;
                self.mode = Mode::Command;
            }
            _ => {}
        }
        self.pending.clear();
        if self.replay_depth == 0 && !self.dot_replay {
            self.close_stray_groups(host);
        }
    }

    fn close_stray_groups(&mut self, host: &mut dyn HostEditor) {
        while self.open_groups > 0 {
            host.end_undo_group();
            self.open_groups -= 1;
        }
        self.insert_group_open = false;
    }

    // ── Presentation ─────────────────────────────────────────────────

    /// Push selection, status text, and cursor glyph to the host. Called
    /// after every handled event.
    fn sync(&mut self, host: &mut dyn HostEditor) {
        if matches!(self.mode, Mode::Visual | Mode::VisualLine) {
            if let Some((range, _)) = self.selection_range(host) {
                let cursor_at_start = self
                    .visual_anchor
                    .map(|a| host.cursor() < a)
                    .unwrap_or(false);
                host.set_selection(range, cursor_at_start);
            }
        }

        if self.mode == Mode::Suspended {
            host.set_status("vim: off");
            host.set_cursor_shape(CursorShape::Bar);
            host.set_cursor_visible(true);
            return;
        }

        let (shape, base) = if let Some(cl) = &self.commandline {
            (CursorShape::Bar, cl.text.clone())
        } else if !self.pending.is_empty() {
            (CursorShape::HalfBlock, self.pending.clone())
        } else {
            match self.mode {
                Mode::Insert => (CursorShape::Bar, "-- INSERT --".to_string()),
                Mode::Visual => (CursorShape::Block, "-- VISUAL --".to_string()),
                Mode::VisualLine => (CursorShape::Block, "-- VISUAL LINE --".to_string()),
                _ => (CursorShape::Block, String::new()),
            }
        };
        let mut status = base;
        if let Some(reg) = self.recorder.recording_register() {
            if status.is_empty() {
                status = format!("recording @{reg}");
            } else {
                status = format!("{status} recording @{reg}");
            }
        }
        if let Some(msg) = self.message.take() {
            status = msg;
        }
        host.set_status(&status);
        host.set_cursor_shape(shape);
        host.set_cursor_visible(true);
    }
}

/// True for key modifier sets that still produce plain text (none, or
/// shift for uppercase/symbols).
fn text_modifiers(m: KeyModifiers) -> bool {
    m.difference(KeyModifiers::SHIFT).is_empty()
}

fn is_suspend_toggle(key: KeyEvent) -> bool {
    key.code == KeyCode::Char('v')
        && key.modifiers.contains(KeyModifiers::CONTROL)
        && key.modifiers.contains(KeyModifiers::ALT)
}

/// Commands that produce a buffer change and are therefore remembered for
/// `.`; pure motions, mode toggles, and replays are not.
fn is_change_command(cmd: Command) -> bool {
    match cmd {
        Command::Operate { target, .. } => target != Target::Selection,
        Command::EnterInsert { .. }
        | Command::DeleteChar { .. }
        | Command::ReplaceChar { .. }
        | Command::PasteAfter { .. }
        | Command::PasteBefore { .. }
        | Command::JoinLines { .. }
        | Command::ToggleComment { .. } => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testhost::TestHost;

    fn key(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
    }

    fn ctrl_alt(c: char) -> KeyEvent {
        KeyEvent::new(
            KeyCode::Char(c),
            KeyModifiers::CONTROL | KeyModifiers::ALT,
        )
    }

    fn esc() -> KeyEvent {
        KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE)
    }

    fn enter() -> KeyEvent {
        KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE)
    }

    fn feed(s: &mut EditorSession, h: &mut TestHost, input: &str) {
        for c in input.chars() {
            s.handle_key(h, key(c));
        }
    }

    fn session() -> EditorSession {
        EditorSession::new()
    }

    fn balanced(h: &TestHost) -> bool {
        h.group_depth == 0 && !h.unbalanced
    }

    #[test]
    fn test_dd_on_first_line() {
        let mut s = session();
        let mut h = TestHost::new("one\ntwo\nthree");
        feed(&mut s, &mut h, "dd");
        assert_eq!(h.text(), "two\nthree");
        assert_eq!(h.cursor, Position::new(0, 0));
        assert_eq!(h.clipboard, "one\n");
        assert!(balanced(&h));
    }

    #[test]
    fn test_dd_on_single_line_buffer_keeps_line() {
        let mut s = session();
        let mut h = TestHost::new("only line");
        feed(&mut s, &mut h, "dd");
        assert_eq!(h.lines, vec![""]);
        assert_eq!(h.cursor, Position::new(0, 0));
    }

    #[test]
    fn test_dd_on_last_line() {
        let mut s = session();
        let mut h = TestHost::new("one\ntwo");
        h.cursor = Position::new(1, 0);
        feed(&mut s, &mut h, "dd");
        assert_eq!(h.text(), "one");
        assert_eq!(h.cursor, Position::new(0, 0));
    }

    #[test]
    fn test_counted_dd_clamps_at_buffer_end() {
        let mut s = session();
        let mut h = TestHost::new("a\nb\nc\nd");
        h.cursor = Position::new(2, 0);
        feed(&mut s, &mut h, "3dd");
        assert_eq!(h.text(), "a\nb");
        assert!(balanced(&h));
    }

    #[test]
    fn test_2dd() {
        let mut s = session();
        let mut h = TestHost::new("one\ntwo\nthree");
        feed(&mut s, &mut h, "2dd");
        assert_eq!(h.text(), "three");
    }

    #[test]
    fn test_yiw_then_p_pastes_the_word() {
        let mut s = session();
        let mut h = TestHost::new("hello world");
        h.cursor = Position::new(0, 6);
        feed(&mut s, &mut h, "yiw");
        assert_eq!(h.clipboard, "world");
        assert_eq!(h.cursor, Position::new(0, 6));
        feed(&mut s, &mut h, "p");
        assert_eq!(h.text(), "hello wworldorld");
        assert!(balanced(&h));
    }

    #[test]
    fn test_insert_then_dot_repeats_verbatim() {
        let mut s = session();
        let mut h = TestHost::new("ab\ncd");
        feed(&mut s, &mut h, "iT");
        s.handle_key(&mut h, esc());
        assert_eq!(h.text(), "Tab\ncd");
        feed(&mut s, &mut h, "j.");
        assert_eq!(h.text(), "Tab\nTcd");
        feed(&mut s, &mut h, "l.");
        assert_eq!(h.text(), "Tab\nTTcd");
        assert_eq!(s.mode(), Mode::Command);
        assert!(balanced(&h));
    }

    #[test]
    fn test_macro_playback_matches_direct_input() {
        let mut s1 = session();
        let mut h1 = TestHost::new("a1 b2 c3 d4 e5 f6");
        feed(&mut s1, &mut h1, "qadwdwq@a");

        let mut s2 = session();
        let mut h2 = TestHost::new("a1 b2 c3 d4 e5 f6");
        feed(&mut s2, &mut h2, "dwdwdwdw");

        assert_eq!(h1.text(), h2.text());
        assert!(balanced(&h1));
    }

    #[test]
    fn test_counted_macro_playback() {
        let mut s = session();
        let mut h = TestHost::new("a b c d e f g h");
        feed(&mut s, &mut h, "qxdwq");
        assert_eq!(h.text(), "b c d e f g h");
        feed(&mut s, &mut h, "3@x");
        assert_eq!(h.text(), "e f g h");
    }

    #[test]
    fn test_unknown_macro_register_is_a_noop() {
        let mut s = session();
        let mut h = TestHost::new("keep me");
        feed(&mut s, &mut h, "@z");
        assert_eq!(h.text(), "keep me");
        assert!(h.status.contains("register z"));
        assert!(balanced(&h));
    }

    #[test]
    fn test_recording_indicator_and_seal() {
        let mut s = session();
        let mut h = TestHost::new("text");
        feed(&mut s, &mut h, "qa");
        assert_eq!(s.recording_register(), Some('a'));
        assert!(h.status.contains("recording @a"));
        feed(&mut s, &mut h, "q");
        assert_eq!(s.recording_register(), None);
    }

    #[test]
    fn test_visual_line_indent_preserves_selection() {
        let mut s = session();
        let mut h = TestHost::new("one\ntwo\nthree");
        feed(&mut s, &mut h, "Vj>");
        assert_eq!(h.text(), "    one\n    two\nthree");
        assert_eq!(s.mode(), Mode::VisualLine);
        let (range, _) = h.selection.expect("selection still applied");
        assert_eq!(range.start, Position::new(0, 0));
        assert_eq!(range.end, Position::new(2, 0));
        // And it can be unindented again without leaving visual mode.
        feed(&mut s, &mut h, "<");
        assert_eq!(h.text(), "one\ntwo\nthree");
        assert_eq!(s.mode(), Mode::VisualLine);
        assert!(balanced(&h));
    }

    #[test]
    fn test_escape_always_lands_in_command_mode() {
        let mut h = TestHost::new("some text here");

        let mut s = session();
        feed(&mut s, &mut h, "2d");
        assert_eq!(s.pending(), "2d");
        s.handle_key(&mut h, esc());
        assert_eq!(s.mode(), Mode::Command);
        assert!(s.pending().is_empty());
        assert!(balanced(&h));

        feed(&mut s, &mut h, "i");
        assert_eq!(s.mode(), Mode::Insert);
        s.handle_key(&mut h, esc());
        assert_eq!(s.mode(), Mode::Command);
        assert!(balanced(&h));

        feed(&mut s, &mut h, "v");
        assert_eq!(s.mode(), Mode::Visual);
        s.handle_key(&mut h, esc());
        assert_eq!(s.mode(), Mode::Command);
        assert!(h.selection.is_none());
        assert!(balanced(&h));

        feed(&mut s, &mut h, ":");
        assert_eq!(s.mode(), Mode::Commandline);
        s.handle_key(&mut h, esc());
        assert_eq!(s.mode(), Mode::Command);
        assert!(balanced(&h));
    }

    #[test]
    fn test_failed_find_does_not_poison_repeat() {
        let mut s = session();
        let mut h = TestHost::new("hello world");
        feed(&mut s, &mut h, "fz");
        assert_eq!(h.cursor, Position::new(0, 0));
        // `;` and `,` after a failed search are no-ops, not crashes.
        feed(&mut s, &mut h, ";,");
        assert_eq!(h.cursor, Position::new(0, 0));

        feed(&mut s, &mut h, "fl");
        assert_eq!(h.cursor, Position::new(0, 2));
        // A later miss keeps the last successful search.
        feed(&mut s, &mut h, "fz");
        assert_eq!(h.cursor, Position::new(0, 2));
        feed(&mut s, &mut h, ";");
        assert_eq!(h.cursor, Position::new(0, 3));
        feed(&mut s, &mut h, ",");
        assert_eq!(h.cursor, Position::new(0, 2));
    }

    #[test]
    fn test_replay_is_deterministic() {
        let run = |cmds: &str| {
            let mut s = session();
            let mut h = TestHost::new("foo(bar, baz) qux\nsecond line");
            feed(&mut s, &mut h, cmds);
            (h.text(), h.cursor)
        };
        for cmds in ["wdiw", "di(", "2w2x", "fbdw"] {
            assert_eq!(run(cmds), run(cmds), "sequence {cmds:?} diverged");
        }
    }

    #[test]
    fn test_invalid_pending_is_discarded_silently() {
        let mut s = session();
        let mut h = TestHost::new("unchanged");
        feed(&mut s, &mut h, "dZ");
        assert_eq!(h.text(), "unchanged");
        assert!(s.pending().is_empty());
        assert!(balanced(&h));
    }

    #[test]
    fn test_pending_echo_and_cursor_shape() {
        let mut s = session();
        let mut h = TestHost::new("text");
        feed(&mut s, &mut h, "2d");
        assert_eq!(h.status, "2d");
        assert_eq!(h.shape, CursorShape::HalfBlock);
        s.handle_key(&mut h, esc());
        assert_eq!(h.status, "");
        assert_eq!(h.shape, CursorShape::Block);
        feed(&mut s, &mut h, "i");
        assert_eq!(h.status, "-- INSERT --");
        assert_eq!(h.shape, CursorShape::Bar);
    }

    #[test]
    fn test_change_word_enters_insert_within_one_undo_group() {
        let mut s = session();
        let mut h = TestHost::new("hello world");
        feed(&mut s, &mut h, "ciw");
        assert_eq!(s.mode(), Mode::Insert);
        assert_eq!(h.text(), " world");
        feed(&mut s, &mut h, "bye");
        s.handle_key(&mut h, esc());
        assert_eq!(h.text(), "bye world");
        assert!(balanced(&h));
        // One undo reverts the whole change+insert.
        feed(&mut s, &mut h, "u");
        assert_eq!(h.text(), "hello world");
    }

    #[test]
    fn test_cc_on_single_line_clears_it() {
        let mut s = session();
        let mut h = TestHost::new("only line");
        feed(&mut s, &mut h, "cc");
        assert_eq!(s.mode(), Mode::Insert);
        assert_eq!(h.lines, vec![""]);
        feed(&mut s, &mut h, "new");
        s.handle_key(&mut h, esc());
        assert_eq!(h.text(), "new");
        assert!(balanced(&h));
    }

    #[test]
    fn test_cc_in_the_middle_keeps_neighbours() {
        let mut s = session();
        let mut h = TestHost::new("a\nb\nc");
        h.cursor = Position::new(1, 0);
        feed(&mut s, &mut h, "ccx");
        s.handle_key(&mut h, esc());
        assert_eq!(h.text(), "a\nx\nc");
    }

    #[test]
    fn test_delete_word_then_undo() {
        let mut s = session();
        let mut h = TestHost::new("hello world");
        feed(&mut s, &mut h, "dw");
        assert_eq!(h.text(), "world");
        feed(&mut s, &mut h, "u");
        assert_eq!(h.text(), "hello world");
    }

    #[test]
    fn test_motion_count_short_circuits_at_buffer_edge() {
        let mut s = session();
        let mut h = TestHost::new("a\nb\nc");
        feed(&mut s, &mut h, "99j");
        assert_eq!(h.cursor, Position::new(2, 0));
        feed(&mut s, &mut h, "99k");
        assert_eq!(h.cursor, Position::new(0, 0));
    }

    #[test]
    fn test_visual_yank_returns_to_command_mode() {
        let mut s = session();
        let mut h = TestHost::new("hello world");
        feed(&mut s, &mut h, "vey");
        assert_eq!(h.clipboard, "hello");
        assert_eq!(s.mode(), Mode::Command);
        assert!(h.selection.is_none());
        assert_eq!(h.cursor, Position::new(0, 0));
    }

    #[test]
    fn test_visual_toggle_same_key_exits() {
        let mut s = session();
        let mut h = TestHost::new("text");
        feed(&mut s, &mut h, "v");
        assert_eq!(s.mode(), Mode::Visual);
        feed(&mut s, &mut h, "V");
        assert_eq!(s.mode(), Mode::VisualLine);
        feed(&mut s, &mut h, "V");
        assert_eq!(s.mode(), Mode::Command);
    }

    #[test]
    fn test_visual_object_selection() {
        let mut s = session();
        let mut h = TestHost::new("say \"hello there\" now");
        h.cursor = Position::new(0, 8);
        feed(&mut s, &mut h, "vi\"d");
        assert_eq!(h.text(), "say \"\" now");
    }

    #[test]
    fn test_linewise_yank_paste() {
        let mut s = session();
        let mut h = TestHost::new("one\ntwo");
        feed(&mut s, &mut h, "yy");
        assert_eq!(h.clipboard, "one\n");
        feed(&mut s, &mut h, "p");
        assert_eq!(h.text(), "one\none\ntwo");
        assert_eq!(h.cursor, Position::new(1, 0));
    }

    #[test]
    fn test_replace_char_with_count() {
        let mut s = session();
        let mut h = TestHost::new("hello");
        feed(&mut s, &mut h, "rH");
        assert_eq!(h.text(), "Hello");
        feed(&mut s, &mut h, "3rx");
        assert_eq!(h.text(), "xxxlo");
    }

    #[test]
    fn test_replace_char_aborts_past_line_end() {
        let mut s = session();
        let mut h = TestHost::new("hi");
        feed(&mut s, &mut h, "9ry");
        assert_eq!(h.text(), "hi");
        assert!(balanced(&h));
    }

    #[test]
    fn test_join_lines() {
        let mut s = session();
        let mut h = TestHost::new("hello\n   world\nrest");
        feed(&mut s, &mut h, "J");
        assert_eq!(h.text(), "hello world\nrest");
        assert_eq!(h.cursor, Position::new(0, 5));
    }

    #[test]
    fn test_suspend_toggle_passes_keys_through() {
        let mut s = session();
        let mut h = TestHost::new("text");
        s.handle_key(&mut h, ctrl_alt('v'));
        assert!(s.is_suspended());
        assert!(!s.handle_key(&mut h, key('x')));
        assert_eq!(h.text(), "text");
        s.handle_key(&mut h, ctrl_alt('v'));
        assert_eq!(s.mode(), Mode::Command);
        // Emulation is live again.
        s.handle_key(&mut h, key('x'));
        assert_eq!(h.text(), "ext");
    }

    #[test]
    fn test_commandline_goto_line() {
        let mut s = session();
        let mut h = TestHost::new("one\ntwo\n   three");
        feed(&mut s, &mut h, ":3");
        s.handle_key(&mut h, enter());
        assert_eq!(s.mode(), Mode::Command);
        assert_eq!(h.cursor, Position::new(2, 3));
    }

    #[test]
    fn test_commandline_unknown_command_reports_error() {
        let mut s = session();
        let mut h = TestHost::new("text");
        feed(&mut s, &mut h, ":frobnicate");
        s.handle_key(&mut h, enter());
        assert!(h.status.contains("not an editor command"));
        assert_eq!(s.mode(), Mode::Command);
        assert_eq!(h.text(), "text");
    }

    #[test]
    fn test_commandline_write_and_quit() {
        let mut s = session();
        let mut h = TestHost::new("text");
        feed(&mut s, &mut h, ":wq");
        s.handle_key(&mut h, enter());
        assert_eq!(h.saved, 1);
        assert!(h.quit_requested);
    }

    #[test]
    fn test_search_then_next() {
        let mut s = session();
        let mut h = TestHost::new("alpha\nbeta\nalpha alpha");
        feed(&mut s, &mut h, "/alpha");
        s.handle_key(&mut h, enter());
        assert_eq!(h.cursor, Position::new(2, 0));
        feed(&mut s, &mut h, "n");
        assert_eq!(h.cursor, Position::new(2, 6));
        feed(&mut s, &mut h, "N");
        assert_eq!(h.cursor, Position::new(2, 0));
    }

    #[test]
    fn test_palette_used_when_commandline_disabled() {
        let mut s = session();
        let mut h = TestHost::new("text");
        h.settings
            .insert(settings::COMMANDLINE_MODE.to_string(), "false".to_string());
        feed(&mut s, &mut h, ":");
        assert_eq!(s.mode(), Mode::Command);
        assert_eq!(h.palette_opens, 1);
        // `/` search stays internal regardless.
        feed(&mut s, &mut h, "/");
        assert_eq!(s.mode(), Mode::Commandline);
    }

    #[test]
    fn test_marks_jump() {
        let mut s = session();
        let mut h = TestHost::new("  first\nsecond\nthird");
        h.cursor = Position::new(0, 4);
        feed(&mut s, &mut h, "ma");
        feed(&mut s, &mut h, "jj");
        assert_eq!(h.cursor.line, 2);
        feed(&mut s, &mut h, "'a");
        assert_eq!(h.cursor, Position::new(0, 2));
        feed(&mut s, &mut h, "j`a");
        assert_eq!(h.cursor, Position::new(0, 4));
    }

    #[test]
    fn test_unset_mark_is_an_error_message() {
        let mut s = session();
        let mut h = TestHost::new("text");
        feed(&mut s, &mut h, "'z");
        assert!(h.status.contains("mark z not set"));
        assert_eq!(h.cursor, Position::new(0, 0));
    }

    #[test]
    fn test_comment_toggle_round_trips() {
        let mut s = session();
        let mut h = TestHost::new("let x = 1;");
        feed(&mut s, &mut h, "gcc");
        assert_eq!(h.text(), "// let x = 1;");
        feed(&mut s, &mut h, "gcc");
        assert_eq!(h.text(), "let x = 1;");
    }

    #[test]
    fn test_tab_navigation_commands() {
        let mut s = session();
        let mut h = TestHost::new("text");
        feed(&mut s, &mut h, "gt");
        assert_eq!(h.tab_moves, 1);
        feed(&mut s, &mut h, "2gT");
        assert_eq!(h.tab_moves, -1);
    }

    #[test]
    fn test_dot_with_count() {
        let mut s = session();
        let mut h = TestHost::new("a b c d e f");
        feed(&mut s, &mut h, "dw");
        assert_eq!(h.text(), "b c d e f");
        feed(&mut s, &mut h, "2.");
        assert_eq!(h.text(), "d e f");
        assert!(balanced(&h));
    }

    #[test]
    fn test_dot_without_history_is_message_only() {
        let mut s = session();
        let mut h = TestHost::new("text");
        feed(&mut s, &mut h, ".");
        assert_eq!(h.text(), "text");
        assert!(h.status.contains("nothing to repeat"));
    }

    #[test]
    fn test_substitute_enters_insert() {
        let mut s = session();
        let mut h = TestHost::new("word");
        feed(&mut s, &mut h, "2s");
        assert_eq!(s.mode(), Mode::Insert);
        assert_eq!(h.text(), "rd");
        feed(&mut s, &mut h, "xy");
        s.handle_key(&mut h, esc());
        assert_eq!(h.text(), "xyrd");
    }

    #[test]
    fn test_open_line_below_and_dot() {
        let mut s = session();
        let mut h = TestHost::new("top\nbottom");
        feed(&mut s, &mut h, "onew");
        s.handle_key(&mut h, esc());
        assert_eq!(h.text(), "top\nnew\nbottom");
        feed(&mut s, &mut h, ".");
        assert_eq!(h.text(), "top\nnew\nnew\nbottom");
    }

    #[test]
    fn test_reset_clears_transient_state() {
        let mut s = session();
        let mut h = TestHost::new("some text");
        feed(&mut s, &mut h, "qa2d");
        assert!(s.recording_register().is_some());
        assert_eq!(s.pending(), "2d");
        s.reset(&mut h);
        assert_eq!(s.mode(), Mode::Command);
        assert!(s.pending().is_empty());
        assert!(s.recording_register().is_none());
        assert!(balanced(&h));
    }

    #[test]
    fn test_delete_paragraph_object() {
        let mut s = session();
        let mut h = TestHost::new("one\ntwo\n\nthree");
        feed(&mut s, &mut h, "dip");
        assert_eq!(h.text(), "\nthree");
        assert!(balanced(&h));
    }

    #[test]
    fn test_change_inside_brackets() {
        let mut s = session();
        let mut h = TestHost::new("call(arg, other)");
        h.cursor = Position::new(0, 7);
        feed(&mut s, &mut h, "ci(");
        assert_eq!(s.mode(), Mode::Insert);
        assert_eq!(h.text(), "call()");
        feed(&mut s, &mut h, "x");
        s.handle_key(&mut h, esc());
        assert_eq!(h.text(), "call(x)");
    }

    #[test]
    fn test_unmatched_bracket_aborts_cleanly() {
        let mut s = session();
        let mut h = TestHost::new("no brackets");
        feed(&mut s, &mut h, "di(");
        assert_eq!(h.text(), "no brackets");
        assert_eq!(s.mode(), Mode::Command);
        assert!(balanced(&h));
    }

    #[test]
    fn test_d_dollar() {
        let mut s = session();
        let mut h = TestHost::new("hello world");
        h.cursor = Position::new(0, 5);
        feed(&mut s, &mut h, "D");
        assert_eq!(h.text(), "hello");
    }

    #[test]
    fn test_x_cuts_into_clipboard() {
        let mut s = session();
        let mut h = TestHost::new("abc");
        feed(&mut s, &mut h, "2x");
        assert_eq!(h.text(), "c");
        assert_eq!(h.clipboard, "ab");
    }

    #[test]
    fn test_goto_line_commands() {
        let mut s = session();
        let mut h = TestHost::new("a\nb\nc\nd");
        feed(&mut s, &mut h, "G");
        assert_eq!(h.cursor, Position::new(3, 0));
        feed(&mut s, &mut h, "gg");
        assert_eq!(h.cursor, Position::new(0, 0));
        feed(&mut s, &mut h, "3G");
        assert_eq!(h.cursor, Position::new(2, 0));
    }

    #[test]
    fn test_insert_exit_nudges_cursor_left() {
        let mut s = session();
        let mut h = TestHost::new("abc");
        feed(&mut s, &mut h, "A");
        assert_eq!(h.cursor, Position::new(0, 3));
        s.handle_key(&mut h, esc());
        assert_eq!(h.cursor, Position::new(0, 2));
    }
}
