mod app;
mod buffer;
mod clipboard;
mod config;
mod ui;

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    cursor::SetCursorStyle,
    event,
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use vimlet_core::CursorShape;

use app::{App, EditorTab};
use config::Config;

fn main() -> Result<()> {
    env_logger::init();

    let config = Config::load();
    let mut tabs = Vec::new();
    for arg in std::env::args().skip(1) {
        tabs.push(EditorTab::from_file(PathBuf::from(arg))?);
    }
    let mut app = App::new(config, tabs);

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        SetCursorStyle::DefaultUserShape
    )?;
    terminal.show_cursor()?;

    if let Err(err) = result {
        eprintln!("Error: {err:?}");
    }

    Ok(())
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    const TICK_RATE: Duration = Duration::from_millis(50);
    let mut shape = CursorShape::Block;

    loop {
        terminal.draw(|frame| {
            ui::render(frame, app);
        })?;

        if app.shape != shape {
            shape = app.shape;
            execute!(terminal.backend_mut(), cursor_style(shape))?;
        }

        if app.should_quit {
            return Ok(());
        }

        if event::poll(TICK_RATE)? {
            let ev = event::read()?;
            app.handle_event(ev);
        }
    }
}

fn cursor_style(shape: CursorShape) -> SetCursorStyle {
    match shape {
        CursorShape::Block => SetCursorStyle::SteadyBlock,
        CursorShape::Bar => SetCursorStyle::SteadyBar,
        CursorShape::HalfBlock => SetCursorStyle::SteadyUnderScore,
    }
}
