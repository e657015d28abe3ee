//! Terminal setup and the cooperative event loop.

use crate::app::App;
use anyhow::{Context, Result};
use crossterm::{
    event::{Event, EventStream},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::{self, Stdout};
use tokio::time::{interval, Duration, MissedTickBehavior};

type Term = Terminal<CrosstermBackend<Stdout>>;

const TICK: Duration = Duration::from_millis(50);

/// Restores the terminal when dropped, including on early return
struct TerminalGuard {
    terminal: Term,
}

impl TerminalGuard {
    fn enter() -> Result<Self> {
        enable_raw_mode().context("Failed to enable raw mode")?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen).context("Failed to enter alternate screen")?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout))
            .context("Failed to create terminal")?;
        Ok(Self { terminal })
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
        let _ = self.terminal.show_cursor();
    }
}

/// Run the UI until the user quits.
///
/// Key events and network completions are handled one at a time on this task;
/// requests themselves run on spawned tasks so the UI keeps redrawing.
pub async fn run(mut app: App) -> Result<()> {
    let mut guard = TerminalGuard::enter()?;
    let mut events = EventStream::new();
    let mut tick = interval(TICK);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut needs_redraw = true;

    while !app.should_quit() {
        if needs_redraw {
            guard
                .terminal
                .draw(|frame| crate::ui::draw(frame, &app))
                .context("Failed to draw frame")?;
            needs_redraw = false;
        }

        tokio::select! {
            maybe_event = events.next() => match maybe_event {
                Some(Ok(Event::Key(key))) => {
                    app.handle_key(key);
                    needs_redraw = true;
                }
                Some(Ok(Event::Resize(_, _))) => needs_redraw = true,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    tracing::warn!(error = %err, "terminal event error");
                }
                None => break,
            },
            _ = tick.tick() => needs_redraw |= app.poll(),
        }
    }

    tracing::info!("exiting");
    Ok(())
}
