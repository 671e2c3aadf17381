//! Incremental parser for Server-Sent Events frames.
//!
//! SSE is a line-oriented text protocol: `event:` names the event, one or
//! more `data:` lines accumulate the payload, and a blank line terminates
//! the event. Transports feed raw chunks as they arrive off the socket; the
//! parser buffers partial lines across chunk boundaries and yields complete
//! events lazily. A parser instance is bound to one connection and is not
//! restartable; a new connection gets a new parser.

/// A single parsed SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event type from the `event:` field, if one was given.
    pub event: Option<String>,
    /// Accumulated payload: consecutive `data:` lines joined by `\n`.
    pub data: String,
}

/// Streaming SSE parser fed chunk-by-chunk or line-by-line.
#[derive(Debug, Default)]
pub struct SseParser {
    line_buf: Vec<u8>,
    event_type: Option<String>,
    data_lines: Vec<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a raw byte chunk; returns every event completed by this chunk.
    ///
    /// A trailing partial line is kept in the buffer until the next feed, so
    /// chunk boundaries can fall anywhere, including inside a multi-byte
    /// UTF-8 sequence. Lines are only decoded to text once complete.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        let mut events = Vec::new();
        self.line_buf.extend_from_slice(chunk);
        while let Some(pos) = self.line_buf.iter().position(|&b| b == b'\n') {
            let rest = self.line_buf.split_off(pos + 1);
            let mut line = std::mem::replace(&mut self.line_buf, rest);
            while matches!(line.last(), Some(b'\n') | Some(b'\r')) {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = self.feed_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Feed one line with its terminator already stripped.
    ///
    /// Returns a completed event when the line is the blank terminator of a
    /// non-empty frame. `id:`, `retry:` and comment lines are ignored.
    pub fn feed_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            if self.event_type.is_none() && self.data_lines.is_empty() {
                // keep-alive blank line between events
                return None;
            }
            let event = SseEvent {
                event: self.event_type.take(),
                data: self.data_lines.join("\n"),
            };
            self.data_lines.clear();
            return Some(event);
        }
        if let Some(rest) = line.strip_prefix("data:") {
            let rest = rest.strip_prefix(' ').unwrap_or(rest);
            self.data_lines.push(rest.to_string());
        } else if let Some(rest) = line.strip_prefix("event:") {
            let rest = rest.strip_prefix(' ').unwrap_or(rest);
            self.event_type = Some(rest.to_string());
        }
        None
    }
}
