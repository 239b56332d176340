use crate::messaging::SseEvent;
use crate::types::{DEFAULT_MAX_SSE_LINE_LENGTH, RealtimeError, Result};
use futures::stream::{self, Stream, StreamExt};

/// Incremental `text/event-stream` decoder.
///
/// Bytes are buffered until a full line is available, so frames split across
/// network chunks (even inside a UTF-8 sequence) decode correctly. A pending
/// line longer than the configured limit is an error.
#[derive(Debug)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    /// Bytes of `buffer` already known to hold no newline
    scanned: usize,
    max_line_length: usize,
    id: Option<String>,
    event: Option<String>,
    data: Vec<String>,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::with_max_line_length(DEFAULT_MAX_SSE_LINE_LENGTH)
    }

    pub fn with_max_line_length(max_line_length: usize) -> Self {
        Self {
            buffer: Vec::new(),
            scanned: 0,
            max_line_length,
            id: None,
            event: None,
            data: Vec::new(),
        }
    }

    /// Feeds a chunk and returns every event it completed.
    ///
    /// # Errors
    ///
    /// [`RealtimeError::Connection`] when the unterminated line exceeds the
    /// length limit. The buffered bytes are discarded.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<SseEvent>> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        let mut consumed = 0;
        while let Some(offset) = self.buffer[self.scanned..].iter().position(|b| *b == b'\n') {
            let end = self.scanned + offset;
            let raw = &self.buffer[consumed..end];
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
            let line = String::from_utf8_lossy(raw).into_owned();

            consumed = end + 1;
            self.scanned = consumed;
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }

        self.buffer.drain(..consumed);
        self.scanned = self.buffer.len();

        if self.buffer.len() > self.max_line_length {
            let length = self.buffer.len();
            self.buffer.clear();
            self.scanned = 0;
            return Err(RealtimeError::Connection(format!(
                "SSE line of {} bytes exceeds the {} byte limit",
                length, self.max_line_length
            )));
        }
        Ok(events)
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.flush();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "id" => self.id = Some(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => tracing::trace!("Ignoring SSE field: {}", field),
        }
        None
    }

    fn flush(&mut self) -> Option<SseEvent> {
        if self.id.is_none() && self.event.is_none() && self.data.is_empty() {
            return None;
        }

        let event = SseEvent {
            id: self.id.take(),
            event: self.event.take().unwrap_or_else(|| "message".to_string()),
            data: self.data.join("\n"),
        };
        self.data.clear();
        Some(event)
    }
}

/// Turns a byte stream into a stream of decoded events.
pub fn decode_stream<S, B, E>(bytes: S) -> impl Stream<Item = Result<SseEvent>>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<RealtimeError>,
{
    let mut decoder = SseDecoder::new();
    bytes
        .map(move |chunk| match chunk {
            Ok(chunk) => match decoder.push(chunk.as_ref()) {
                Ok(events) => events.into_iter().map(Ok).collect::<Vec<_>>(),
                Err(e) => vec![Err(e)],
            },
            Err(e) => vec![Err(e.into())],
        })
        .flat_map(stream::iter)
}
