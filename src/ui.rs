use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
};

use rx_chat::format::{format, Segment};
use rx_chat::Sender;

use crate::app::App;

/// Shown after the revealed part of a reply
pub const REVEAL_CURSOR: &str = "▌";

const TITLE: &str = "Drug Recommendation Assistant";
const DISCLAIMER: &str = "Always consult a healthcare professional before taking any medication.";

fn heading_style() -> Style {
    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
}

fn label_style(sender: Sender) -> Style {
    let color = match sender {
        Sender::User => Color::Cyan,
        Sender::Assistant => Color::Yellow,
    };
    Style::default().fg(color).add_modifier(Modifier::BOLD)
}

/// Append `text` to the last line, starting a new line at every `\n`
fn push_text(lines: &mut Vec<Line<'static>>, text: &str, style: Style) {
    for (i, piece) in text.split('\n').enumerate() {
        if i > 0 {
            lines.push(Line::default());
        }
        let piece = piece.trim_end_matches('\r');
        if piece.is_empty() {
            continue;
        }
        if let Some(line) = lines.last_mut() {
            line.push_span(Span::styled(piece.to_string(), style));
        }
    }
}

/// Lay formatted segments out as terminal lines
pub fn segments_to_lines(segments: &[Segment]) -> Vec<Line<'static>> {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let mut lines = vec![Line::default()];

    for segment in segments {
        match segment {
            Segment::Heading(children) => {
                for child in children {
                    push_text(&mut lines, &child.text(), heading_style());
                }
            }
            Segment::Bold(text) => push_text(&mut lines, text, bold),
            Segment::PlainText(text) => push_text(&mut lines, text, Style::default()),
        }
    }

    lines
}

/// Rough number of rows `lines` take once wrapped at `width`
fn wrapped_height(lines: &[Line], width: u16) -> u16 {
    let width = usize::from(width.max(1));
    let rows: usize = lines
        .iter()
        .map(|line| {
            let line_width = line.width();
            if line_width == 0 {
                1
            } else {
                line_width.div_ceil(width)
            }
        })
        .sum();
    u16::try_from(rows).unwrap_or(u16::MAX)
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();
    let error_height = if app.session.error().is_some() { 1 } else { 0 };

    let [header_area, chat_area, error_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(error_height),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    if error_height > 0 {
        render_error(app, frame, error_area);
    }
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = Line::from(vec![
        Span::styled(format!(" {} ", TITLE), Style::default().fg(Color::Cyan).bold()),
        Span::styled(format!("[{}]", app.session.model()), Style::default().fg(Color::Black)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Black),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn chat_lines(app: &App) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();

    for message in app.session.history() {
        lines.push(Line::from(Span::styled(
            format!("{}:", message.sender().display_name()),
            label_style(message.sender()),
        )));
        lines.extend(segments_to_lines(&format(message.text())));
        lines.push(Line::default());
    }

    if let Some(reveal) = app.session.reveal() {
        lines.push(Line::from(Span::styled(
            format!("{}:", Sender::Assistant.display_name()),
            label_style(Sender::Assistant),
        )));
        let mut revealed = segments_to_lines(&reveal.segments);
        if let Some(last) = revealed.last_mut() {
            last.push_span(Span::styled(REVEAL_CURSOR, Style::default().fg(Color::Yellow)));
        }
        lines.extend(revealed);
    } else if app.session.is_awaiting_reply() {
        lines.push(Line::from(Span::styled(
            format!("{}:", Sender::Assistant.display_name()),
            label_style(Sender::Assistant),
        )));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat(usize::from(app.animation_frame) + 1);
        lines.push(Line::from(Span::styled(
            format!("Thinking{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    lines
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    app.chat_area = Some(area);
    // Inner size minus borders
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let lines = chat_lines(app);
    app.sync_scroll(wrapped_height(&lines, app.chat_width));

    let border_color = if app.follow_tail { Color::DarkGray } else { Color::Cyan };
    let title = if app.follow_tail {
        " Conversation ".to_string()
    } else {
        " Conversation (End to follow) ".to_string()
    };

    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    let chat = Paragraph::new(Text::from(lines))
        .block(chat_block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_error(app: &App, frame: &mut Frame, area: Rect) {
    let Some(error) = app.session.error() else {
        return;
    };

    let line = Line::from(vec![
        Span::styled(format!(" Error: {} ", error), Style::default().fg(Color::Red).bold()),
        Span::styled("(Esc to dismiss)", Style::default().fg(Color::DarkGray)),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let enabled = app.input_enabled();
    let (border_color, title) = if enabled {
        (Color::Yellow, " Describe your symptoms ")
    } else if app.session.reveal().is_some() {
        (Color::DarkGray, " Assistant is typing (Esc to skip) ")
    } else {
        (Color::DarkGray, " Waiting for the assistant ")
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Keep the cursor inside the visible slice of the input
    let inner_width = usize::from(area.width.saturating_sub(2));
    let cursor_pos = app.input_cursor;
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app.input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let text_style = if enabled {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let input = Paragraph::new(visible_text)
        .style(text_style)
        .block(input_block);

    frame.render_widget(input, area);

    if enabled {
        let cursor_x = u16::try_from(cursor_pos - scroll_offset).unwrap_or(0);
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mut hints = if app.session.reveal().is_some() {
        vec![
            Span::styled(" Esc ", key_style),
            Span::styled(" skip ", label_style),
        ]
    } else {
        vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" send ", label_style),
        ]
    };

    if app.session.error().is_some() && app.session.reveal().is_none() {
        hints.extend(vec![
            Span::styled(" Esc ", key_style),
            Span::styled(" dismiss ", label_style),
        ]);
    }

    hints.extend(vec![
        Span::styled(" ↑/↓ ", key_style),
        Span::styled(" scroll ", label_style),
        Span::styled(" End ", key_style),
        Span::styled(" latest ", label_style),
        Span::styled(" ^C ", key_style),
        Span::styled(" quit ", label_style),
        Span::styled(format!("  {}", DISCLAIMER), Style::default().fg(Color::DarkGray)),
    ]);

    let footer = Paragraph::new(Line::from(hints)).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}
