//! Rendering: tab strip, text area with a relative-number gutter and
//! selection highlighting, and a status line that doubles as the
//! commandline echo area.

use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    widgets::Paragraph,
};
use unicode_width::UnicodeWidthStr;
use vimlet_core::{Position, Range};

use crate::app::App;

pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();
    if area.height < 2 || area.width == 0 {
        return;
    }

    let show_tabs = app.tabs.len() > 1;
    let tabs_height = u16::from(show_tabs);
    let text_area = Rect {
        x: area.x,
        y: area.y + tabs_height,
        width: area.width,
        height: area.height.saturating_sub(1 + tabs_height),
    };
    let bottom = Rect {
        x: area.x,
        y: area.y + area.height - 1,
        width: area.width,
        height: 1,
    };

    if show_tabs {
        let tabs_area = Rect {
            height: 1,
            ..area
        };
        render_tabs(frame, tabs_area, app);
    }
    render_text(frame, text_area, app);
    render_bottom(frame, bottom, app);
}

fn render_tabs(frame: &mut Frame, area: Rect, app: &App) {
    let mut spans = Vec::new();
    for (i, tab) in app.tabs.iter().enumerate() {
        let style = if i == app.active {
            Style::default().fg(Color::Black).bg(Color::Gray)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let marker = if tab.buffer.dirty { "+" } else { "" };
        spans.push(Span::styled(format!(" {}{} ", tab.name, marker), style));
        spans.push(Span::raw(" "));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_text(frame: &mut Frame, area: Rect, app: &App) {
    if area.height == 0 {
        return;
    }
    let tab = app.active_tab();
    let buffer = &tab.buffer;
    let cursor = tab.cursor;

    let gutter_width: u16 = format!("{}", buffer.line_count()).len() as u16 + 2;
    let text_x = area.x + gutter_width;
    let text_width = area.width.saturating_sub(gutter_width);

    let visible = area.height as usize;
    let scroll = if cursor.line >= visible {
        cursor.line - visible + 1
    } else {
        0
    };

    let selection = app.selection.map(|(range, _)| range);

    let mut gutter_lines: Vec<Line> = Vec::new();
    let mut text_lines: Vec<Line> = Vec::new();
    for i in scroll..buffer.line_count().min(scroll + visible) {
        let is_current = i == cursor.line;
        let number = if is_current {
            format!("{:>width$} ", i + 1, width = gutter_width as usize - 2)
        } else {
            let rel = i.abs_diff(cursor.line);
            format!("{:>width$} ", rel, width = gutter_width as usize - 2)
        };
        let gutter_style = if is_current {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        gutter_lines.push(Line::from(Span::styled(number, gutter_style)));

        let text = buffer.line(i).unwrap_or_default();
        text_lines.push(styled_line(text, i, selection, is_current));
    }
    for _ in buffer.line_count().saturating_sub(scroll)..visible {
        gutter_lines.push(Line::from(Span::styled(
            format!("{:>width$} ", "~", width = gutter_width as usize - 2),
            Style::default().fg(Color::DarkGray),
        )));
        text_lines.push(Line::from(""));
    }

    frame.render_widget(
        Paragraph::new(gutter_lines),
        Rect {
            width: gutter_width,
            ..area
        },
    );
    frame.render_widget(
        Paragraph::new(text_lines),
        Rect {
            x: text_x,
            width: text_width,
            ..area
        },
    );

    // Terminal cursor, unless the commandline owns it this frame.
    if app.cursor_visible && app.session.commandline_state().is_none() && app.palette.is_none() {
        let x = text_x + cursor.col.min(u16::MAX as usize) as u16;
        let y = area.y + (cursor.line - scroll) as u16;
        if x < text_x + text_width && y < area.y + area.height {
            frame.set_cursor_position((x, y));
        }
    }
}

/// One rendered line, with the selected span highlighted.
fn styled_line(
    text: &str,
    line_idx: usize,
    selection: Option<Range>,
    is_current: bool,
) -> Line<'static> {
    let normal = if is_current {
        Style::default().fg(Color::White)
    } else {
        Style::default().fg(Color::Gray)
    };
    let selected = Style::default().bg(Color::Rgb(68, 68, 120)).fg(Color::White);

    let Some(range) = selection else {
        return Line::from(Span::styled(text.to_string(), normal));
    };
    let (start, end) = match span_on_line(range, line_idx, text.len()) {
        Some(span) => span,
        None => return Line::from(Span::styled(text.to_string(), normal)),
    };

    let mut spans = Vec::new();
    if start > 0 {
        spans.push(Span::styled(text[..start].to_string(), normal));
    }
    if start < end {
        spans.push(Span::styled(text[start..end].to_string(), selected));
    } else {
        // Zero-width slice on a selected empty line; show one cell.
        spans.push(Span::styled(" ".to_string(), selected));
    }
    if end < text.len() {
        spans.push(Span::styled(text[end..].to_string(), normal));
    }
    Line::from(spans)
}

/// Byte span of `range` on one line, or `None` when the line is outside
/// the selection.
fn span_on_line(range: Range, line: usize, len: usize) -> Option<(usize, usize)> {
    let covers_line = Position::new(line, 0) < range.end && Position::new(line, len) >= range.start;
    if !covers_line {
        return None;
    }
    let start = if line == range.start.line {
        range.start.col.min(len)
    } else {
        0
    };
    let end = if line == range.end.line {
        range.end.col.min(len)
    } else {
        len
    };
    Some((start, end))
}

fn render_bottom(frame: &mut Frame, area: Rect, app: &App) {
    // Commandline (internal or palette) takes over the echo area.
    let echo = app
        .palette
        .as_ref()
        .map(|p| (p.text.clone(), p.cursor))
        .or_else(|| {
            app.session
                .commandline_state()
                .map(|cl| (cl.text.clone(), cl.cursor))
        });
    if let Some((text, cursor)) = echo {
        frame.render_widget(
            Paragraph::new(Line::from(Span::raw(text.clone()))),
            area,
        );
        let x = area.x + text[..cursor.min(text.len())].width() as u16;
        frame.set_cursor_position((x, area.y));
        return;
    }

    let tab = app.active_tab();
    let left = app.status.clone();
    let dirty = if tab.buffer.dirty { " [+]" } else { "" };
    let right = format!(
        "{}{}  {}:{}",
        tab.name,
        dirty,
        tab.cursor.line + 1,
        tab.cursor.col + 1
    );
    let pad = (area.width as usize)
        .saturating_sub(left.width())
        .saturating_sub(right.width());
    let line = Line::from(vec![
        Span::styled(left, Style::default().fg(Color::White)),
        Span::raw(" ".repeat(pad)),
        Span::styled(right, Style::default().fg(Color::DarkGray)),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_on_line() {
        let range = Range::new(Position::new(1, 2), Position::new(3, 4));
        assert_eq!(span_on_line(range, 0, 10), None);
        assert_eq!(span_on_line(range, 1, 10), Some((2, 10)));
        assert_eq!(span_on_line(range, 2, 10), Some((0, 10)));
        assert_eq!(span_on_line(range, 3, 10), Some((0, 4)));
        assert_eq!(span_on_line(range, 4, 10), None);
    }

    #[test]
    fn test_span_on_line_single_line_range() {
        let range = Range::new(Position::new(0, 2), Position::new(0, 5));
        assert_eq!(span_on_line(range, 0, 10), Some((2, 5)));
    }
}
