use ratatui::layout::Rect;
use tokio::sync::mpsc;

use rx_chat::{ChatSession, CompletionClient, Config, SessionEvent};

/// Rows moved by one wheel notch
pub const WHEEL_STEP: u16 = 3;

pub struct App {
    pub should_quit: bool,
    pub session: ChatSession,

    // Input line
    pub input: String,
    pub input_cursor: usize, // cursor position in chars

    // Chat scroll state
    pub chat_scroll: u16,
    pub follow_tail: bool,
    pub chat_height: u16, // Inner height of the chat area, set during render
    pub chat_width: u16,  // Inner width, used to estimate wrapping

    // Chat area for mouse hit-testing (updated during render)
    pub chat_area: Option<Rect>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation
}

impl App {
    pub fn new(config: &Config) -> anyhow::Result<(Self, mpsc::UnboundedReceiver<SessionEvent>)> {
        let client = CompletionClient::from_config(config)?;
        if !client.has_api_key() {
            tracing::warn!("no API key configured; requests will fail until one is set");
        }
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(
        client: CompletionClient,
        config: &Config,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (session, events) = ChatSession::new(client, config.typing_interval());

        let app = Self {
            should_quit: false,
            session,
            input: String::new(),
            input_cursor: 0,
            chat_scroll: 0,
            follow_tail: true,
            chat_height: 0,
            chat_width: 0,
            chat_area: None,
            animation_frame: 0,
        };

        (app, events)
    }

    /// Input is only accepted while nothing is pending or being typed out
    pub fn input_enabled(&self) -> bool {
        !self.session.is_busy()
    }

    /// Send the input line. Returns false when the session refused it.
    pub fn submit_input(&mut self) -> bool {
        if !self.input_enabled() || !self.session.submit(&self.input) {
            return false;
        }
        self.input.clear();
        self.input_cursor = 0;
        self.follow_tail = true;
        true
    }

    pub fn on_session_event(&mut self, event: SessionEvent) {
        let started_reveal = matches!(event, SessionEvent::Reply(Ok(_)));
        self.session.handle(event);
        if started_reveal {
            self.animation_frame = 0;
        }
    }

    pub fn tick_animation(&mut self) {
        if self.session.is_awaiting_reply() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_up(&mut self, rows: u16) {
        self.follow_tail = false;
        self.chat_scroll = self.chat_scroll.saturating_sub(rows);
    }

    pub fn scroll_down(&mut self, rows: u16) {
        self.follow_tail = false;
        self.chat_scroll = self.chat_scroll.saturating_add(rows);
    }

    pub fn page_up(&mut self) {
        self.scroll_up(self.chat_height.max(1));
    }

    pub fn page_down(&mut self) {
        self.scroll_down(self.chat_height.max(1));
    }

    /// Jump to the newest line and keep following it
    pub fn follow_latest(&mut self) {
        self.follow_tail = true;
    }

    /// Fit the scroll offset to `total_lines` of chat content
    pub fn sync_scroll(&mut self, total_lines: u16) {
        let visible_height = if self.chat_height > 0 { self.chat_height } else { 20 };
        let max_scroll = total_lines.saturating_sub(visible_height);

        if self.follow_tail {
            self.chat_scroll = max_scroll;
        } else {
            self.chat_scroll = self.chat_scroll.min(max_scroll);
            // Scrolling back down to the end picks up following again
            if self.chat_scroll == max_scroll {
                self.follow_tail = true;
            }
        }
    }

    pub fn quit(&mut self) {
        self.session.shutdown();
        self.should_quit = true;
    }
}
