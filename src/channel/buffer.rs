//! Accumulation buffer with tail-limited prompt scanning.
//!
//! Prompt detection only ever needs the last few hundred bytes of
//! output; for large captures (full interface tables, running configs)
//! scanning the whole buffer on every poll would dominate the loop.

use super::ansi::strip_ansi;

/// Buffer for accumulating session output.
///
/// The full capture is retained for the transcript; prompt scanning is
/// restricted to the last `search_depth` bytes.
#[derive(Debug)]
pub struct PatternBuffer {
    /// The accumulated output.
    buffer: Vec<u8>,

    /// How many bytes from the end participate in prompt scanning.
    search_depth: usize,
}

impl PatternBuffer {
    /// Create a new buffer with the specified search depth.
    pub fn new(search_depth: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
            search_depth,
        }
    }

    /// Append new data, stripping ANSI escape sequences first.
    pub fn extend(&mut self, data: &[u8]) {
        let cleaned = strip_ansi(data);
        self.buffer.extend_from_slice(&cleaned);
    }

    /// The last `search_depth` bytes (or everything, if shorter).
    pub fn tail(&self) -> &[u8] {
        let start = self.buffer.len().saturating_sub(self.search_depth);
        &self.buffer[start..]
    }

    /// The trailing line of the buffer: whatever follows the last newline
    /// in the tail window, trimmed.
    ///
    /// Returns `None` when that trailing segment is empty or whitespace:
    /// output that ends in a newline has not settled at a prompt, because
    /// prompts are written without one.
    pub fn trailing_line(&self) -> Option<String> {
        let tail = self.tail();
        let start = memchr::memrchr(b'\n', tail).map_or(0, |i| i + 1);
        let line = String::from_utf8_lossy(&tail[start..]);
        let line = line.trim();
        (!line.is_empty()).then(|| line.to_string())
    }

    /// The full capture as a string (lossy UTF-8 conversion).
    pub fn as_str_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.buffer)
    }

    /// Take ownership of the contents and reset.
    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buffer)
    }

    /// Current buffer length.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clear the buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// The configured search depth.
    pub fn search_depth(&self) -> usize {
        self.search_depth
    }
}

impl Default for PatternBuffer {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extend_strips_ansi() {
        let mut buffer = PatternBuffer::new(100);
        buffer.extend(b"\x1b[32mswitch01#\x1b[0m");
        assert_eq!(buffer.as_str_lossy(), "switch01#");
    }

    #[test]
    fn trailing_line_is_text_after_last_newline() {
        let mut buffer = PatternBuffer::new(100);
        buffer.extend(b"some output\r\nmore output\r\nswitch01# ");
        assert_eq!(buffer.trailing_line().as_deref(), Some("switch01#"));
    }

    #[test]
    fn newline_terminated_output_has_no_trailing_line() {
        let mut buffer = PatternBuffer::new(100);
        buffer.extend(b"switch01#-looking output line\r\n");
        assert_eq!(buffer.trailing_line(), None);
    }

    #[test]
    fn trailing_line_respects_search_depth() {
        let mut buffer = PatternBuffer::new(8);
        buffer.extend(b"first line\n");
        buffer.extend(&[b'x'; 100]);
        // The newline is outside the tail window; the visible tail is all
        // filler, so the trailing line is the filler itself.
        assert_eq!(buffer.trailing_line().as_deref(), Some("xxxxxxxx"));
    }

    #[test]
    fn take_clears_buffer() {
        let mut buffer = PatternBuffer::new(100);
        buffer.extend(b"test data");
        assert_eq!(buffer.take(), b"test data");
        assert!(buffer.is_empty());
    }
}
