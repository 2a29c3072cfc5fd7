//! The command grammar.
//!
//! Normal/Visual-mode input accumulates into a pending string; after every
//! character the whole string is re-parsed by a small recursive descent
//! over `[count] verb [count] (doubled-verb | i/a object | motion)` plus
//! the single-key commands. The result is typed:
//!
//! - [`ParseResult::Incomplete`]: some rule could still match longer input,
//!   keep the pending string and wait.
//! - [`ParseResult::Invalid`]: no rule can match any extension; the caller
//!   discards the pending string silently.
//! - [`ParseResult::Complete`]: exactly one command matched; dispatch it.
//!
//! Structural parsing makes the tie-breaks explicit: `d` alone is
//! incomplete, `di(` resolves to the nested object rule before any bare
//! fallback, and counts compose multiplicatively (`2d3w` operates over six
//! words).

use crate::motion::{CharSearch, Motion};
use crate::text_object::{ObjectKind, TextObject};

/// Which mode's vocabulary applies. Visual mode reuses the motion grammar
/// but turns operators into selection commands and `i`/`a` into object
/// selectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseContext {
    Normal,
    Visual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Delete,
    Change,
    Yank,
    Indent,
    Unindent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Doubled operator (`dd`, `yy`, `cc`, `>>`): whole lines.
    Line,
    Motion(Motion),
    Object(TextObject),
    /// Visual mode: the active selection.
    Selection,
}

/// How an insert-entering command places the cursor first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertKind {
    /// `i`
    Before,
    /// `a`
    After,
    /// `I`
    AtFirstNonBlank,
    /// `A`
    AtLineEnd,
    /// `o`
    LineBelow,
    /// `O`
    LineAbove,
    /// `s`: delete `count` characters, then insert.
    Substitute,
    /// `R`: insert at the cursor (overwrite is not emulated).
    Overwrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Move { motion: Motion, count: usize },
    Operate { verb: Verb, target: Target, count: usize },
    EnterInsert { kind: InsertKind, count: usize },
    DeleteChar { count: usize },
    ReplaceChar { ch: char, count: usize },
    PasteAfter { count: usize },
    PasteBefore { count: usize },
    JoinLines { count: usize },
    Undo { count: usize },
    ToggleVisual,
    ToggleVisualLine,
    EnterCommandline { seed: char },
    SetMark { mark: char },
    JumpToMark { mark: char, exact: bool },
    RecordToggle { register: char },
    PlayMacro { register: char, count: usize },
    RepeatChange { count: usize },
    ToggleComment { count: usize },
    NextTab { count: usize },
    PrevTab { count: usize },
    SelectObject(TextObject),
    SwapVisualEnds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseResult {
    Incomplete,
    Invalid,
    Complete(Command),
}

use ParseResult::{Complete, Incomplete, Invalid};

pub fn parse(input: &str, ctx: ParseContext) -> ParseResult {
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    let count = parse_count(&chars, &mut i);
    let Some(&c) = chars.get(i) else {
        return Incomplete;
    };
    i += 1;
    let n = count.unwrap_or(1);

    if let Some(motion) = simple_motion(c) {
        return fin(&chars, i, Command::Move { motion, count: n });
    }

    match c {
        'G' => {
            let motion = match count {
                Some(n) => Motion::GotoLine(n.saturating_sub(1)),
                None => Motion::DocumentEnd,
            };
            fin(&chars, i, Command::Move { motion, count: 1 })
        }
        'f' | 'F' | 't' | 'T' => match chars.get(i) {
            None => Incomplete,
            Some(&target) => fin(
                &chars,
                i + 1,
                Command::Move {
                    motion: Motion::Find(char_search(c, target)),
                    count: n,
                },
            ),
        },
        'g' => parse_g(&chars, i, count, ctx),
        'd' if ctx == ParseContext::Normal => parse_operator(&chars, i, Verb::Delete, 'd', count),
        'c' if ctx == ParseContext::Normal => parse_operator(&chars, i, Verb::Change, 'c', count),
        'y' if ctx == ParseContext::Normal => parse_operator(&chars, i, Verb::Yank, 'y', count),
        '>' if ctx == ParseContext::Normal => parse_operator(&chars, i, Verb::Indent, '>', count),
        '<' if ctx == ParseContext::Normal => parse_operator(&chars, i, Verb::Unindent, '<', count),
        _ if ctx == ParseContext::Visual => parse_visual(&chars, i, c, n),
        'x' => fin(&chars, i, Command::DeleteChar { count: n }),
        'r' => match chars.get(i) {
            None => Incomplete,
            Some(&ch) => fin(&chars, i + 1, Command::ReplaceChar { ch, count: n }),
        },
        'p' => fin(&chars, i, Command::PasteAfter { count: n }),
        'P' => fin(&chars, i, Command::PasteBefore { count: n }),
        'J' => fin(&chars, i, Command::JoinLines { count: n }),
        'u' => fin(&chars, i, Command::Undo { count: n }),
        'i' => insert(&chars, i, InsertKind::Before, n),
        'a' => insert(&chars, i, InsertKind::After, n),
        'I' => insert(&chars, i, InsertKind::AtFirstNonBlank, n),
        'A' => insert(&chars, i, InsertKind::AtLineEnd, n),
        'o' => insert(&chars, i, InsertKind::LineBelow, n),
        'O' => insert(&chars, i, InsertKind::LineAbove, n),
        's' => insert(&chars, i, InsertKind::Substitute, n),
        'R' => insert(&chars, i, InsertKind::Overwrite, n),
        'S' => fin(
            &chars,
            i,
            Command::Operate {
                verb: Verb::Change,
                target: Target::Line,
                count: n,
            },
        ),
        'D' => fin(
            &chars,
            i,
            Command::Operate {
                verb: Verb::Delete,
                target: Target::Motion(Motion::LineEnd),
                count: 1,
            },
        ),
        'C' => fin(
            &chars,
            i,
            Command::Operate {
                verb: Verb::Change,
                target: Target::Motion(Motion::LineEnd),
                count: 1,
            },
        ),
        'Y' => fin(
            &chars,
            i,
            Command::Operate {
                verb: Verb::Yank,
                target: Target::Line,
                count: n,
            },
        ),
        'v' => fin(&chars, i, Command::ToggleVisual),
        'V' => fin(&chars, i, Command::ToggleVisualLine),
        ':' | '/' => fin(&chars, i, Command::EnterCommandline { seed: c }),
        'm' => match chars.get(i) {
            None => Incomplete,
            Some(&mark) if mark.is_ascii_alphanumeric() => {
                fin(&chars, i + 1, Command::SetMark { mark })
            }
            Some(_) => Invalid,
        },
        '\'' | '`' => match chars.get(i) {
            None => Incomplete,
            Some(&mark) if mark.is_ascii_alphanumeric() => fin(
                &chars,
                i + 1,
                Command::JumpToMark {
                    mark,
                    exact: c == '`',
                },
            ),
            Some(_) => Invalid,
        },
        'q' => match chars.get(i) {
            None => Incomplete,
            Some(&register) if register.is_ascii_alphanumeric() => {
                fin(&chars, i + 1, Command::RecordToggle { register })
            }
            Some(_) => Invalid,
        },
        '@' => match chars.get(i) {
            None => Incomplete,
            Some(&register) if register.is_ascii_alphanumeric() => {
                fin(&chars, i + 1, Command::PlayMacro { register, count: n })
            }
            Some(_) => Invalid,
        },
        '.' => fin(&chars, i, Command::RepeatChange { count: n }),
        _ => Invalid,
    }
}

fn insert(chars: &[char], i: usize, kind: InsertKind, count: usize) -> ParseResult {
    fin(chars, i, Command::EnterInsert { kind, count })
}

/// Visual-only single keys (operators act on the selection).
fn parse_visual(chars: &[char], i: usize, c: char, count: usize) -> ParseResult {
    let op = |verb| Command::Operate {
        verb,
        target: Target::Selection,
        count,
    };
    match c {
        'd' | 'x' => fin(chars, i, op(Verb::Delete)),
        'c' | 's' => fin(chars, i, op(Verb::Change)),
        'y' => fin(chars, i, op(Verb::Yank)),
        '>' => fin(chars, i, op(Verb::Indent)),
        '<' => fin(chars, i, op(Verb::Unindent)),
        'J' => fin(chars, i, Command::JoinLines { count }),
        'v' => fin(chars, i, Command::ToggleVisual),
        'V' => fin(chars, i, Command::ToggleVisualLine),
        'o' => fin(chars, i, Command::SwapVisualEnds),
        'i' | 'a' => match chars.get(i) {
            None => Incomplete,
            Some(&oc) => match object_kind(oc) {
                Some(kind) => fin(
                    chars,
                    i + 1,
                    Command::SelectObject(TextObject {
                        kind,
                        around: c == 'a',
                    }),
                ),
                None => Invalid,
            },
        },
        _ => Invalid,
    }
}

/// `g`-prefixed commands: `gg`, `gt`, `gT`, `gcc`.
fn parse_g(chars: &[char], i: usize, count: Option<usize>, ctx: ParseContext) -> ParseResult {
    let n = count.unwrap_or(1);
    match chars.get(i) {
        None => Incomplete,
        Some('g') => {
            let motion = match count {
                Some(n) => Motion::GotoLine(n.saturating_sub(1)),
                None => Motion::DocumentStart,
            };
            fin(chars, i + 1, Command::Move { motion, count: 1 })
        }
        Some('t') if ctx == ParseContext::Normal => {
            fin(chars, i + 1, Command::NextTab { count: n })
        }
        Some('T') if ctx == ParseContext::Normal => {
            fin(chars, i + 1, Command::PrevTab { count: n })
        }
        Some('c') if ctx == ParseContext::Normal => match chars.get(i + 1) {
            None => Incomplete,
            Some('c') => fin(chars, i + 2, Command::ToggleComment { count: n }),
            Some(_) => Invalid,
        },
        Some(_) => Invalid,
    }
}

/// Everything that may follow an operator: a second count, the doubled
/// operator, an `i`/`a` object, or a motion.
fn parse_operator(
    chars: &[char],
    mut i: usize,
    verb: Verb,
    verb_char: char,
    outer: Option<usize>,
) -> ParseResult {
    let inner = parse_count(chars, &mut i);
    let counted = outer.is_some() || inner.is_some();
    let total = outer.unwrap_or(1) * inner.unwrap_or(1);
    let operate = |target| Command::Operate {
        verb,
        target,
        count: total,
    };

    let Some(&c) = chars.get(i) else {
        return Incomplete;
    };
    i += 1;

    if c == verb_char {
        return fin(chars, i, operate(Target::Line));
    }
    if let Some(motion) = simple_motion(c) {
        return fin(chars, i, operate(Target::Motion(motion)));
    }
    match c {
        'G' => {
            let motion = if counted {
                Motion::GotoLine(total.saturating_sub(1))
            } else {
                Motion::DocumentEnd
            };
            fin(chars, i, operate(Target::Motion(motion)))
        }
        'g' => match chars.get(i) {
            None => Incomplete,
            Some('g') => {
                let motion = if counted {
                    Motion::GotoLine(total.saturating_sub(1))
                } else {
                    Motion::DocumentStart
                };
                fin(chars, i + 1, operate(Target::Motion(motion)))
            }
            Some(_) => Invalid,
        },
        'f' | 'F' | 't' | 'T' => match chars.get(i) {
            None => Incomplete,
            Some(&target) => fin(
                chars,
                i + 1,
                operate(Target::Motion(Motion::Find(char_search(c, target)))),
            ),
        },
        'i' | 'a' => match chars.get(i) {
            None => Incomplete,
            Some(&oc) => match object_kind(oc) {
                Some(kind) => fin(
                    chars,
                    i + 1,
                    operate(Target::Object(TextObject {
                        kind,
                        around: c == 'a',
                    })),
                ),
                None => Invalid,
            },
        },
        _ => Invalid,
    }
}

// ── Vocabulary tables ────────────────────────────────────────────────

fn simple_motion(c: char) -> Option<Motion> {
    Some(match c {
        'h' => Motion::Left,
        'l' => Motion::Right,
        'j' => Motion::Down,
        'k' => Motion::Up,
        'w' => Motion::WordForward,
        'b' => Motion::WordBackward,
        'e' => Motion::WordEnd,
        'W' => Motion::TokenForward,
        'B' => Motion::TokenBackward,
        'E' => Motion::TokenEnd,
        '0' => Motion::LineStart,
        '$' => Motion::LineEnd,
        '^' => Motion::FirstNonBlank,
        '{' => Motion::ParagraphBackward,
        '}' => Motion::ParagraphForward,
        ';' => Motion::RepeatFind,
        ',' => Motion::RepeatFindReverse,
        'n' => Motion::SearchNext,
        'N' => Motion::SearchPrev,
        _ => return None,
    })
}

fn object_kind(c: char) -> Option<ObjectKind> {
    Some(match c {
        'w' => ObjectKind::Word,
        'p' => ObjectKind::Paragraph,
        '(' | ')' | 'b' => ObjectKind::Bracket('('),
        '[' | ']' => ObjectKind::Bracket('['),
        '{' | '}' | 'B' => ObjectKind::Bracket('{'),
        '<' | '>' => ObjectKind::Bracket('<'),
        '"' | '\'' | '`' => ObjectKind::Quote(c),
        _ => return None,
    })
}

fn char_search(kind: char, target: char) -> CharSearch {
    CharSearch {
        target,
        forward: kind == 'f' || kind == 't',
        till: kind == 't' || kind == 'T',
    }
}

/// Leading decimal count. The first digit must be nonzero (`0` alone is the
/// line-start motion); later digits may be anything.
fn parse_count(chars: &[char], i: &mut usize) -> Option<usize> {
    let first = *chars.get(*i)?;
    if !('1'..='9').contains(&first) {
        return None;
    }
    let mut n = 0usize;
    while let Some(d) = chars.get(*i).and_then(|c| c.to_digit(10)) {
        n = n.saturating_mul(10).saturating_add(d as usize);
        *i += 1;
    }
    Some(n)
}

/// A complete command must consume the whole pending string.
fn fin(chars: &[char], i: usize, cmd: Command) -> ParseResult {
    if i == chars.len() {
        Complete(cmd)
    } else {
        Invalid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normal(input: &str) -> ParseResult {
        parse(input, ParseContext::Normal)
    }

    fn visual(input: &str) -> ParseResult {
        parse(input, ParseContext::Visual)
    }

    fn complete(input: &str) -> Command {
        match normal(input) {
            Complete(cmd) => cmd,
            other => panic!("{input:?} did not complete: {other:?}"),
        }
    }

    #[test]
    fn test_single_motion() {
        assert_eq!(
            complete("w"),
            Command::Move {
                motion: Motion::WordForward,
                count: 1
            }
        );
        assert_eq!(
            complete("3j"),
            Command::Move {
                motion: Motion::Down,
                count: 3
            }
        );
    }

    #[test]
    fn test_zero_is_line_start() {
        assert_eq!(
            complete("0"),
            Command::Move {
                motion: Motion::LineStart,
                count: 1
            }
        );
        // ...but a zero inside a count is a digit.
        assert_eq!(
            complete("10j"),
            Command::Move {
                motion: Motion::Down,
                count: 10
            }
        );
    }

    #[test]
    fn test_operator_waits_for_target() {
        assert_eq!(normal("d"), Incomplete);
        assert_eq!(normal("2d"), Incomplete);
        assert_eq!(normal("d2"), Incomplete);
        assert_eq!(normal("di"), Incomplete);
    }

    #[test]
    fn test_doubled_operator() {
        assert_eq!(
            complete("dd"),
            Command::Operate {
                verb: Verb::Delete,
                target: Target::Line,
                count: 1
            }
        );
        assert_eq!(
            complete("3dd"),
            Command::Operate {
                verb: Verb::Delete,
                target: Target::Line,
                count: 3
            }
        );
        assert_eq!(
            complete(">>"),
            Command::Operate {
                verb: Verb::Indent,
                target: Target::Line,
                count: 1
            }
        );
    }

    #[test]
    fn test_counts_multiply() {
        assert_eq!(
            complete("2d3w"),
            Command::Operate {
                verb: Verb::Delete,
                target: Target::Motion(Motion::WordForward),
                count: 6
            }
        );
    }

    #[test]
    fn test_nested_object() {
        assert_eq!(
            complete("di("),
            Command::Operate {
                verb: Verb::Delete,
                target: Target::Object(TextObject {
                    kind: ObjectKind::Bracket('('),
                    around: false
                }),
                count: 1
            }
        );
        assert_eq!(
            complete("ya\""),
            Command::Operate {
                verb: Verb::Yank,
                target: Target::Object(TextObject {
                    kind: ObjectKind::Quote('"'),
                    around: true
                }),
                count: 1
            }
        );
        // Closers normalize onto the opener.
        assert_eq!(
            complete("ci}"),
            Command::Operate {
                verb: Verb::Change,
                target: Target::Object(TextObject {
                    kind: ObjectKind::Bracket('{'),
                    around: false
                }),
                count: 1
            }
        );
    }

    #[test]
    fn test_operator_with_find_motion() {
        assert_eq!(
            complete("dt;"),
            Command::Operate {
                verb: Verb::Delete,
                target: Target::Motion(Motion::Find(CharSearch {
                    target: ';',
                    forward: true,
                    till: true
                })),
                count: 1
            }
        );
        assert_eq!(normal("dt"), Incomplete);
    }

    #[test]
    fn test_invalid_resets() {
        assert_eq!(normal("Z"), Invalid);
        assert_eq!(normal("dz"), Invalid);
        assert_eq!(normal("diz"), Invalid);
        assert_eq!(normal("gx"), Invalid);
    }

    #[test]
    fn test_g_commands() {
        assert_eq!(normal("g"), Incomplete);
        assert_eq!(
            complete("gg"),
            Command::Move {
                motion: Motion::DocumentStart,
                count: 1
            }
        );
        assert_eq!(
            complete("5gg"),
            Command::Move {
                motion: Motion::GotoLine(4),
                count: 1
            }
        );
        assert_eq!(complete("gt"), Command::NextTab { count: 1 });
        assert_eq!(normal("gc"), Incomplete);
        assert_eq!(complete("gcc"), Command::ToggleComment { count: 1 });
    }

    #[test]
    fn test_goto_line() {
        assert_eq!(
            complete("G"),
            Command::Move {
                motion: Motion::DocumentEnd,
                count: 1
            }
        );
        assert_eq!(
            complete("12G"),
            Command::Move {
                motion: Motion::GotoLine(11),
                count: 1
            }
        );
    }

    #[test]
    fn test_find_waits_for_char() {
        assert_eq!(normal("f"), Incomplete);
        assert_eq!(
            complete("fx"),
            Command::Move {
                motion: Motion::Find(CharSearch {
                    target: 'x',
                    forward: true,
                    till: false
                }),
                count: 1
            }
        );
    }

    #[test]
    fn test_insert_entries() {
        assert_eq!(
            complete("i"),
            Command::EnterInsert {
                kind: InsertKind::Before,
                count: 1
            }
        );
        assert_eq!(
            complete("A"),
            Command::EnterInsert {
                kind: InsertKind::AtLineEnd,
                count: 1
            }
        );
        assert_eq!(
            complete("3s"),
            Command::EnterInsert {
                kind: InsertKind::Substitute,
                count: 3
            }
        );
    }

    #[test]
    fn test_shorthand_operators() {
        assert_eq!(
            complete("D"),
            Command::Operate {
                verb: Verb::Delete,
                target: Target::Motion(Motion::LineEnd),
                count: 1
            }
        );
        assert_eq!(
            complete("Y"),
            Command::Operate {
                verb: Verb::Yank,
                target: Target::Line,
                count: 1
            }
        );
        assert_eq!(
            complete("S"),
            Command::Operate {
                verb: Verb::Change,
                target: Target::Line,
                count: 1
            }
        );
    }

    #[test]
    fn test_macro_and_mark_operands() {
        assert_eq!(normal("q"), Incomplete);
        assert_eq!(complete("qa"), Command::RecordToggle { register: 'a' });
        assert_eq!(
            complete("3@a"),
            Command::PlayMacro {
                register: 'a',
                count: 3
            }
        );
        assert_eq!(complete("ma"), Command::SetMark { mark: 'a' });
        assert_eq!(
            complete("'a"),
            Command::JumpToMark {
                mark: 'a',
                exact: false
            }
        );
        assert_eq!(
            complete("`a"),
            Command::JumpToMark {
                mark: 'a',
                exact: true
            }
        );
        assert_eq!(normal("q!"), Invalid);
    }

    #[test]
    fn test_dot_repeat() {
        assert_eq!(complete("."), Command::RepeatChange { count: 1 });
        assert_eq!(complete("4."), Command::RepeatChange { count: 4 });
    }

    #[test]
    fn test_visual_vocabulary() {
        assert_eq!(
            visual("d"),
            Complete(Command::Operate {
                verb: Verb::Delete,
                target: Target::Selection,
                count: 1
            })
        );
        assert_eq!(
            visual("iw"),
            Complete(Command::SelectObject(TextObject {
                kind: ObjectKind::Word,
                around: false
            }))
        );
        assert_eq!(visual("i"), Incomplete);
        assert_eq!(visual("o"), Complete(Command::SwapVisualEnds));
        assert_eq!(
            visual("w"),
            Complete(Command::Move {
                motion: Motion::WordForward,
                count: 1
            })
        );
        // Insert entries do not exist in visual mode.
        assert_eq!(visual("R"), Invalid);
    }

    #[test]
    fn test_parsing_is_deterministic() {
        for input in ["dd", "2d3w", "di(", "fx", "3@a", "gcc"] {
            assert_eq!(normal(input), normal(input));
        }
    }
}
