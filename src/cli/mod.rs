//! TUI front-end (Ratatui + Crossterm)
//! - Network calls run on spawned tasks and report back over a channel
//! - Session events (forced sign-out) are folded into the same loop

use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{self, DisableMouseCapture, EnableMouseCapture, Event};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};

use crate::api::ApiClient;
use crate::session::{SessionEvent, SessionStore};

pub mod input;
pub mod state;
pub mod ui;

type Term = Terminal<CrosstermBackend<std::io::Stdout>>;

pub async fn run(session: SessionStore) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    crossterm::execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = event_loop(&mut terminal, session).await;

    disable_raw_mode()?;
    crossterm::execute!(terminal.backend_mut(), LeaveAlternateScreen, DisableMouseCapture)?;
    terminal.show_cursor()?;
    result
}

async fn event_loop(terminal: &mut Term, session: SessionStore) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut session_events = session.subscribe();
    let mut app = state::App::new(ApiClient::new(session), tx);
    app.start();
    info!("ui started");

    let tick_rate = Duration::from_millis(200);
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui::draw(f, &mut app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        // crossterm polling blocks; keep it off the runtime's worker.
        let key = tokio::task::block_in_place(|| -> Result<Option<event::KeyEvent>> {
            if event::poll(timeout)? {
                if let Event::Key(key) = event::read()? {
                    return Ok(Some(key));
                }
            }
            Ok(None)
        })?;
        if let Some(key) = key {
            app.handle_key(key);
        }

        while let Ok(event) = rx.try_recv() {
            app.apply(event);
        }
        loop {
            match session_events.try_recv() {
                Ok(event) => app.on_session(event),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!(skipped = n, "session events lagged");
                    if !app.session().is_authenticated() {
                        app.on_session(SessionEvent::SignedOut);
                    }
                }
                Err(_) => break,
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }

        if app.quit {
            info!("ui closed");
            break;
        }
    }
    Ok(())
}
