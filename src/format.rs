//! Reply formatting
//!
//! Turns raw model text into display segments. Only two markup forms are
//! recognised: `###` heading lines and `**bold**` spans. Everything else is
//! kept verbatim, so a half-typed marker simply shows up as literal text.

use std::sync::OnceLock;

use regex::Regex;

/// Prefix that turns a line into a heading
pub const HEADING_MARKER: &str = "###";
/// Marker placed on both sides of a bold span
pub const BOLD_MARKER: &str = "**";

/// A parsed display unit
///
/// Headings only ever contain `Bold` and `PlainText` children, so the tree is
/// at most two levels deep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Heading(Vec<Segment>),
    Bold(String),
    PlainText(String),
}

impl Segment {
    /// Textual content with all markers consumed
    pub fn text(&self) -> String {
        match self {
            Segment::Heading(children) => plain_text(children),
            Segment::Bold(text) | Segment::PlainText(text) => text.clone(),
        }
    }
}

fn heading_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // The line break stays with whatever follows the heading
    PATTERN.get_or_init(|| Regex::new(r"(?m)^###[^\n]*").expect("heading pattern is valid"))
}

fn bold_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // `.` does not cross newlines, so bold never spans lines
    PATTERN.get_or_init(|| Regex::new(r"\*\*.*?\*\*").expect("bold pattern is valid"))
}

enum Chunk<'a> {
    Delimiter(&'a str),
    Text(&'a str),
}

/// Split `text` on `pattern`, keeping the matched delimiters as chunks of their own
fn split_keep<'a>(pattern: &Regex, text: &'a str) -> Vec<Chunk<'a>> {
    let mut chunks = Vec::new();
    let mut last = 0;

    for m in pattern.find_iter(text) {
        if m.start() > last {
            chunks.push(Chunk::Text(&text[last..m.start()]));
        }
        chunks.push(Chunk::Delimiter(m.as_str()));
        last = m.end();
    }

    if last < text.len() {
        chunks.push(Chunk::Text(&text[last..]));
    }

    chunks
}

/// Append plain text, merging with a preceding plain segment
fn push_plain(segments: &mut Vec<Segment>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Segment::PlainText(existing)) = segments.last_mut() {
        existing.push_str(text);
    } else {
        segments.push(Segment::PlainText(text.to_string()));
    }
}

fn inline_segments(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();

    for chunk in split_keep(bold_pattern(), text) {
        match chunk {
            Chunk::Delimiter(span) => {
                let inner = &span[BOLD_MARKER.len()..span.len() - BOLD_MARKER.len()];
                if inner.is_empty() {
                    // `****` carries nothing to emphasise
                    push_plain(&mut segments, span);
                } else {
                    segments.push(Segment::Bold(inner.to_string()));
                }
            }
            Chunk::Text(text) => push_plain(&mut segments, text),
        }
    }

    segments
}

fn heading_segment(line: &str) -> Segment {
    let title = line[HEADING_MARKER.len()..].trim();
    let mut children = inline_segments(title);

    // A fully bold title is already emphasised by being a heading
    if let [Segment::Bold(text)] = children.as_mut_slice() {
        let text = std::mem::take(text);
        children = vec![Segment::PlainText(text)];
    }

    Segment::Heading(children)
}

/// Parse raw reply text into display segments
pub fn format(raw: &str) -> Vec<Segment> {
    let mut segments = Vec::new();

    for chunk in split_keep(heading_pattern(), raw) {
        match chunk {
            Chunk::Delimiter(line) => segments.push(heading_segment(line)),
            Chunk::Text(text) => segments.extend(inline_segments(text)),
        }
    }

    segments
}

/// Concatenated textual content of `segments`
pub fn plain_text(segments: &[Segment]) -> String {
    segments.iter().map(Segment::text).collect()
}

/// Render segments back into markup that `format` understands
pub fn segments_to_markup(segments: &[Segment]) -> String {
    let mut out = String::new();
    for segment in segments {
        match segment {
            Segment::Heading(children) => {
                out.push_str(HEADING_MARKER);
                out.push(' ');
                out.push_str(&segments_to_markup(children));
            }
            Segment::Bold(text) => {
                out.push_str(BOLD_MARKER);
                out.push_str(text);
                out.push_str(BOLD_MARKER);
            }
            Segment::PlainText(text) => out.push_str(text),
        }
    }
    out
}
