//! Message framing for streamed response bodies
//!
//! Splits the body of a watch response into [`RawFrame`]s, one per message
//! unit, independently of where the network chunk boundaries fall:
//! - `text/event-stream`: Server-Sent Events (`data:` lines joined with `\n`,
//!   `id:` kept, blank line ends the event, `:` lines are keep-alives)
//! - `application/x-ndjson` / `application/json`: one frame per non-empty line

use tracing::warn;

use crate::constants::JSON_MEDIA_TYPE;
use crate::constants::NDJSON_MEDIA_TYPE;

/// One message unit from the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    /// Message payload
    pub data: String,
    /// Event id (SSE `id:` field), usable as a resume token
    pub id: Option<String>,
}

impl RawFrame {
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            id: None,
        }
    }

    pub fn with_id(
        data: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            data: data.into(),
            id: Some(id.into()),
        }
    }
}

/// Frame splitter selected from the response content type
pub enum FrameParser {
    EventStream(SseParser),
    Lines(LineParser),
}

impl FrameParser {
    /// Picks line framing for JSON/NDJSON bodies and SSE for everything else.
    pub fn for_content_type(content_type: Option<&str>) -> Self {
        let media_type = content_type
            .and_then(|ct| ct.split(';').next())
            .map(|ct| ct.trim().to_ascii_lowercase());

        match media_type.as_deref() {
            Some(NDJSON_MEDIA_TYPE) | Some(JSON_MEDIA_TYPE) => FrameParser::Lines(LineParser::new()),
            _ => FrameParser::EventStream(SseParser::new()),
        }
    }

    pub fn feed(
        &mut self,
        bytes: &[u8],
    ) -> Vec<RawFrame> {
        match self {
            FrameParser::EventStream(parser) => parser.feed(bytes),
            FrameParser::Lines(parser) => parser.feed(bytes),
        }
    }
}

/// Streaming SSE parser that accumulates bytes and yields complete events
#[derive(Default)]
pub struct SseParser {
    /// Undecoded tail of the previous chunk (may end inside a UTF-8 sequence)
    pending: Vec<u8>,
    /// Incomplete line
    buffer: String,
    current_data: Vec<String>,
    current_id: Option<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes into the parser and return any complete events
    pub fn feed(
        &mut self,
        bytes: &[u8],
    ) -> Vec<RawFrame> {
        if !append_utf8(&mut self.pending, &mut self.buffer, bytes) {
            return Vec::new();
        }

        let mut frames = Vec::new();
        while let Some(newline_pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline_pos).collect();
            let line = line.trim_end_matches('\n').trim_end_matches('\r');

            if line.is_empty() {
                // an event without data lines is never dispatched
                if !self.current_data.is_empty() {
                    frames.push(RawFrame {
                        data: self.current_data.join("\n"),
                        id: self.current_id.take(),
                    });
                }
                self.current_data.clear();
            } else if let Some(value) = line.strip_prefix("data:") {
                // Handle both "data: value" and "data:value"
                let value = value.strip_prefix(' ').unwrap_or(value);
                self.current_data.push(value.to_string());
            } else if let Some(value) = line.strip_prefix("id:") {
                self.current_id = Some(value.trim().to_string());
            }
            // Comments (`:` keep-alives), `event:` and unknown fields are ignored
        }

        frames
    }
}

/// Newline-delimited framing, one payload per line
#[derive(Default)]
pub struct LineParser {
    pending: Vec<u8>,
    buffer: String,
}

impl LineParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(
        &mut self,
        bytes: &[u8],
    ) -> Vec<RawFrame> {
        if !append_utf8(&mut self.pending, &mut self.buffer, bytes) {
            return Vec::new();
        }

        let mut frames = Vec::new();
        while let Some(newline_pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline_pos).collect();
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let payload = line.strip_prefix("data:").map(str::trim_start).unwrap_or(line);
            frames.push(RawFrame::new(payload));
        }

        frames
    }
}

/// Appends `bytes` to `buffer`, carrying an incomplete trailing UTF-8
/// sequence over to the next chunk. Returns false (dropping the chunk) when
/// the bytes are not valid UTF-8.
fn append_utf8(
    pending: &mut Vec<u8>,
    buffer: &mut String,
    bytes: &[u8],
) -> bool {
    pending.extend_from_slice(bytes);

    match std::str::from_utf8(pending) {
        Ok(s) => {
            buffer.push_str(s);
            pending.clear();
            true
        }
        Err(e) if e.error_len().is_none() => {
            // Chunk boundary split a multi-byte character
            let valid = e.valid_up_to();
            let tail = pending.split_off(valid);
            if let Ok(s) = std::str::from_utf8(pending) {
                buffer.push_str(s);
            }
            *pending = tail;
            true
        }
        Err(_) => {
            warn!("Received invalid UTF-8 in watch stream, dropping chunk");
            pending.clear();
            false
        }
    }
}
