use anyhow::{Context, Result};
use crossterm::event::{Event, EventStream, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use futures::StreamExt;
use ratatui::prelude::*;
use std::io;

mod api;
mod config;
mod service;
mod tui;

use config::Config;
use tui::app::App;

#[tokio::main]
async fn main() -> Result<()> {
    // Resolve configuration before touching the terminal so a missing
    // token shows up as a plain error message, not inside raw mode.
    let config = Config::from_env()?;
    let mut app = App::new(&config)?;

    // Setup terminal
    enable_raw_mode()
        .context("Failed to enable raw mode. Make sure you're running in a terminal.")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)
        .context("Failed to enter alternate screen. Make sure you're running in a terminal.")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("Failed to create terminal.")?;

    let result = run(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    result
}

async fn run(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> Result<()> {
    let mut events = EventStream::new();

    while !app.should_quit {
        // Start any fetch the latest state changes call for
        app.sync();
        terminal.draw(|f| app.render(f))?;

        tokio::select! {
            maybe_event = events.next() => {
                match maybe_event {
                    Some(event) => {
                        if let Event::Key(key) = event? {
                            if key.kind == KeyEventKind::Press {
                                app.handle_key(key.code, key.modifiers)?;
                            }
                        }
                    }
                    // Input stream closed; nothing left to react to
                    None => app.should_quit = true,
                }
            }
            Some(event) = app.rx.recv() => {
                app.handle_api_event(event);
            }
            term = app.debouncer.settled() => {
                app.apply_search(&term);
            }
        }
    }

    Ok(())
}
