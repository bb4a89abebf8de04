//! ANSI escape stripping via vte.
//!
//! Devices decorate their output with color and cursor sequences; prompt
//! matching wants the plain text. This is stripping, not rendering: no
//! cursor state is tracked.

use vte::{Params, Parser, Perform};

/// Collects printable characters and the line-shaping controls, dropping
/// every escape sequence.
struct Printable {
    out: Vec<u8>,
}

impl Perform for Printable {
    fn print(&mut self, c: char) {
        let mut buf = [0u8; 4];
        self.out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
    }

    fn execute(&mut self, byte: u8) {
        // Keep only the controls that shape lines.
        if matches!(byte, b'\n' | b'\r' | b'\t') {
            self.out.push(byte);
        }
    }

    fn hook(&mut self, _params: &Params, _intermediates: &[u8], _ignore: bool, _action: char) {}

    fn put(&mut self, _byte: u8) {}

    fn unhook(&mut self) {}

    fn osc_dispatch(&mut self, _params: &[&[u8]], _bell_terminated: bool) {}

    fn csi_dispatch(&mut self, _params: &Params, _intermediates: &[u8], _ignore: bool, _action: char) {}

    fn esc_dispatch(&mut self, _intermediates: &[u8], _ignore: bool, _byte: u8) {}
}

/// Strip ANSI escape sequences from `data`, keeping printable text plus
/// `\r`, `\n`, and `\t`.
pub fn strip_ansi(data: &[u8]) -> Vec<u8> {
    let mut parser = Parser::new();
    let mut performer = Printable {
        out: Vec::with_capacity(data.len()),
    };
    parser.advance(&mut performer, data);
    performer.out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(strip_ansi(b"show version\r\n"), b"show version\r\n");
    }

    #[test]
    fn color_codes_are_dropped() {
        assert_eq!(strip_ansi(b"\x1b[32mgreen\x1b[0m text"), b"green text");
    }

    #[test]
    fn cursor_moves_are_dropped() {
        assert_eq!(strip_ansi(b"\x1b[2J\x1b[Hswitch01#"), b"switch01#");
    }

    #[test]
    fn osc_title_is_dropped() {
        assert_eq!(strip_ansi(b"\x1b]0;title\x07prompt>"), b"prompt>");
    }
}
