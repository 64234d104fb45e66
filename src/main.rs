use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rx_chat::{Config, SessionEvent};

mod app;
mod handler;
mod tui;
mod ui;

use app::App;
use tui::{EventHandler, Tui, TICK_RATE};

/// Log to a file: the terminal belongs to the UI. Logging stays off when
/// the file cannot be opened.
fn init_logging() -> Option<PathBuf> {
    let dir = dirs::data_local_dir()?.join("rx-chat");
    fs::create_dir_all(&dir).ok()?;

    let path = dir.join("rx-chat.log");
    let file = OpenOptions::new().create(true).append(true).open(&path).ok()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("rx_chat=info"));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(false),
        )
        .with(filter)
        .init();

    Some(path)
}

#[tokio::main]
async fn main() -> Result<()> {
    let log_path = init_logging();

    let config = Config::load()?;
    let (mut app, mut session_events) = App::new(&config)?;
    info!(model = %app.session.model(), log = ?log_path, "starting");

    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let result = run(&mut terminal, &mut app, &mut session_events).await;

    app.session.shutdown();
    tui::restore()?;
    terminal.show_cursor()?;

    info!("exiting");
    result
}

async fn run(
    terminal: &mut Tui,
    app: &mut App,
    session_events: &mut mpsc::UnboundedReceiver<SessionEvent>,
) -> Result<()> {
    let mut events = EventHandler::new(TICK_RATE);

    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        tokio::select! {
            Some(event) = events.next() => handler::handle_event(app, event)?,
            Some(event) = session_events.recv() => app.on_session_event(event),
            else => break,
        }
    }

    Ok(())
}
