//! # Frame Parser
//!
//! Splits decoded stream text into event frames.
//!
//! - Frames end at a blank line (`\n\n`); `\r\n` and bare `\r` line endings are
//!   normalised to `\n` first
//! - Within a frame only `data:` lines carry payload; the prefix is removed and
//!   the content trimmed. Several data lines are joined with `\n`
//! - Frames without data (comments, `event:`/`id:`-only, keep-alives) are skipped
//! - An incomplete trailing frame stays buffered for the next fragment

/// Field prefix of payload-bearing lines.
const DATA_PREFIX: &str = "data:";

/// Frame boundary after line-ending normalisation.
const BOUNDARY: &str = "\n\n";

/// Accumulates decoded text and yields the payload of each completed frame.
///
/// Holds no cross-connection state: create a fresh parser per connection.
#[derive(Debug, Default)]
pub struct FrameParser {
    buffer: String,
    /// A `\r` ended the last fragment; the next char decides CRLF vs bare CR.
    pending_cr: bool,
    /// Prefix of `buffer` already searched for a boundary.
    scanned: usize,
}

impl FrameParser {
    /// Create an empty parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a decoded fragment and return the payloads of all frames it completes,
    /// in wire order.
    pub fn push(&mut self, fragment: &str) -> Vec<String> {
        self.append_normalized(fragment);

        let mut payloads = Vec::new();
        let mut consumed = 0;
        let mut search_from = self.scanned;
        while let Some(offset) = self.buffer[search_from..].find(BOUNDARY) {
            let end = search_from + offset;
            if let Some(payload) = extract_payload(&self.buffer[consumed..end]) {
                payloads.push(payload);
            }
            consumed = end + BOUNDARY.len();
            search_from = consumed;
        }
        if consumed > 0 {
            let _ = self.buffer.drain(..consumed);
        }
        self.scanned = resume_offset(&self.buffer);
        payloads
    }

    /// Bytes of text waiting for a frame boundary.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len() + usize::from(self.pending_cr)
    }

    /// Discard any buffered partial frame.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.pending_cr = false;
        self.scanned = 0;
    }

    fn append_normalized(&mut self, fragment: &str) {
        if !self.pending_cr && !fragment.contains('\r') {
            self.buffer.push_str(fragment);
            return;
        }
        for ch in fragment.chars() {
            if self.pending_cr {
                self.pending_cr = false;
                self.buffer.push('\n');
                if ch == '\n' {
                    continue;
                }
            }
            if ch == '\r' {
                self.pending_cr = true;
            } else {
                self.buffer.push(ch);
            }
        }
    }
}

/// Where the next boundary search starts: a trailing `\n` may be the first
/// half of a boundary completed by the next fragment.
fn resume_offset(buffer: &str) -> usize {
    if buffer.ends_with('\n') {
        buffer.len() - 1
    } else {
        buffer.len()
    }
}

/// Collect the data lines of one frame. `None` when the frame carries no payload.
fn extract_payload(frame: &str) -> Option<String> {
    let mut data_lines = frame
        .split('\n')
        .filter_map(|line| line.strip_prefix(DATA_PREFIX))
        .map(str::trim)
        .peekable();

    let first = data_lines.next()?;
    let payload = if data_lines.peek().is_none() {
        first.to_string()
    } else {
        std::iter::once(first)
            .chain(data_lines)
            .collect::<Vec<_>>()
            .join("\n")
    };

    (!payload.is_empty()).then_some(payload)
}
