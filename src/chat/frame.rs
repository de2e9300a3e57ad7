//! Incremental splitter for the chat stream's framed body.
//!
//! The body is a sequence of blocks separated by a blank line, each block
//! carrying its payload on `data:` lines:
//!
//! ```text
//! data: {"type":"text","content":"Hi"}
//!
//! data: {"type":"done"}
//!
//! ```
//!
//! Network reads do not respect block boundaries, so [`FrameSplitter`] keeps
//! the incomplete tail of the body in a byte buffer until its delimiter
//! arrives. Decoding to text happens per complete block, which also keeps
//! multi-byte UTF-8 sequences intact when a read splits them.
//!
//! # Examples
//!
//! ```
//! use eleonor::chat::frame::FrameSplitter;
//!
//! let mut splitter = FrameSplitter::new();
//! assert!(splitter.push(b"data: {\"type\":\"te").is_empty());
//! let frames = splitter.push(b"xt\",\"content\":\"Hi\"}\n\n");
//! assert_eq!(frames, vec![r#"{"type":"text","content":"Hi"}"#.to_owned()]);
//! ```

use tracing::{debug, warn};

const FRAME_DELIMITER: &[u8] = b"\n\n";

/// Default cap on bytes held back for one unfinished block.
pub const MAX_PENDING_BYTES: usize = 1024 * 1024;

/// Splits a byte stream into the `data` payloads of complete blocks.
#[derive(Debug)]
pub struct FrameSplitter {
    buffer: Vec<u8>,
    /// Offset where the next delimiter search starts.
    scanned: usize,
    max_pending: usize,
    /// Set while the rest of an oversized block is being thrown away.
    discarding: bool,
}

impl Default for FrameSplitter {
    fn default() -> Self {
        Self::with_max_pending(MAX_PENDING_BYTES)
    }
}

impl FrameSplitter {
    /// Create an empty splitter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a splitter that drops any block growing past `max_pending` bytes.
    pub fn with_max_pending(max_pending: usize) -> Self {
        Self {
            buffer: Vec::new(),
            scanned: 0,
            max_pending,
            discarding: false,
        }
    }

    /// Push a chunk of bytes, returning the payloads of every block it completed.
    ///
    /// Carriage returns are dropped so `\r\n\r\n` delimits blocks too. A block
    /// that outgrows the pending cap is dropped with a warning, up to and
    /// including its delimiter.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer
            .extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut payloads = Vec::new();
        while let Some(pos) = self.next_delimiter() {
            let block: Vec<u8> = self.buffer.drain(..pos + FRAME_DELIMITER.len()).collect();
            self.scanned = 0;
            if self.discarding {
                self.discarding = false;
                continue;
            }
            if let Some(data) = parse_block(&String::from_utf8_lossy(&block[..pos])) {
                payloads.push(data);
            }
        }

        if !self.discarding && self.buffer.len() > self.max_pending {
            warn!(
                pending = self.buffer.len(),
                limit = self.max_pending,
                "dropping oversized stream fragment"
            );
            self.discarding = true;
        }
        if self.discarding {
            // Only a partial delimiter is worth keeping.
            let keep = self.buffer.len().min(FRAME_DELIMITER.len() - 1);
            self.buffer.drain(..self.buffer.len() - keep);
            self.scanned = 0;
        }
        payloads
    }

    /// Parse whatever remains buffered as a final block.
    ///
    /// Call this once the source is exhausted; a body that ends without a
    /// trailing blank line still yields its last payload.
    pub fn flush(&mut self) -> Option<String> {
        let block = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        if std::mem::take(&mut self.discarding) || block.is_empty() {
            return None;
        }
        parse_block(&String::from_utf8_lossy(&block))
    }

    /// Number of bytes held back waiting for a delimiter.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// Find the next delimiter, resuming where the previous search stopped.
    fn next_delimiter(&mut self) -> Option<usize> {
        let start = self.scanned;
        match self.buffer[start..]
            .windows(FRAME_DELIMITER.len())
            .position(|w| w == FRAME_DELIMITER)
        {
            Some(offset) => Some(start + offset),
            None => {
                self.scanned = self.buffer.len().saturating_sub(FRAME_DELIMITER.len() - 1);
                None
            }
        }
    }
}

/// Collect the `data` lines of one block, joined with `\n`.
///
/// Blank blocks, comment lines (`:`) and other fields are ignored. A block
/// with no `data` line yields `None`.
fn parse_block(block: &str) -> Option<String> {
    if block.trim().is_empty() {
        return None;
    }

    let mut data_lines: Vec<&str> = Vec::new();
    for line in block.lines() {
        if line.starts_with(':') {
            continue;
        }
        if let Some(("data", value)) = parse_field(line) {
            data_lines.push(value);
        }
    }

    if data_lines.is_empty() {
        debug!(fragment = block, "dropping stream fragment without a data field");
        return None;
    }
    Some(data_lines.join("\n"))
}

/// Parse a line into (field, value). A single space after the colon is stripped.
fn parse_field(line: &str) -> Option<(&str, &str)> {
    let colon_pos = line.find(':')?;
    let field = &line[..colon_pos];
    let value = &line[colon_pos + 1..];
    Some((field, value.strip_prefix(' ').unwrap_or(value)))
}
