//! Text helpers for PTY output: ANSI stripping, whitespace normalisation and
//! incremental UTF-8 decoding.

use std::sync::LazyLock;

use regex::Regex;

static ANSI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b(?:[@-Z\\-_]|\[[0-?]*[ -/]*[@-~])").unwrap());

/// Remove ANSI escape and CSI control sequences.
pub fn strip_ansi(text: &str) -> String {
    ANSI_RE.replace_all(text, "").into_owned()
}

/// Strip control sequences, collapse whitespace runs to one space and trim.
pub fn normalize(text: &str) -> String {
    strip_ansi(text)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decodes a byte stream into UTF-8 text, carrying incomplete multi-byte
/// sequences over to the next call.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode the next chunk. Invalid bytes become U+FFFD; a truncated
    /// sequence at the end is held back until more bytes arrive.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(s) => {
                    out.push_str(s);
                    self.pending.clear();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(std::str::from_utf8(&self.pending[..valid]).unwrap_or_default());
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + len);
                        }
                        None => {
                            self.pending.drain(..valid);
                            break;
                        }
                    }
                }
            }
        }

        out
    }

    /// Flush whatever is still held back, lossily.
    pub fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_ansi_removes_color_and_cursor_codes() {
        let raw = "\x1b[32m?\x1b[39m \x1b[1mEnter key\x1b[22m\x1b[?25l";
        assert_eq!(strip_ansi(raw), "? Enter key");
    }

    #[test]
    fn strip_ansi_removes_single_char_escapes() {
        assert_eq!(strip_ansi("a\x1bMb\x1b\\c"), "abc");
    }

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(normalize("  ? Pick\r\n   one:\t "), "? Pick one:");
    }

    #[test]
    fn normalize_of_control_only_chunk_is_empty() {
        assert_eq!(normalize("\x1b[2K\x1b[1G\r\n"), "");
    }

    #[test]
    fn decoder_passes_ascii_through() {
        let mut d = Utf8Decoder::new();
        assert_eq!(d.decode(b"Done\r\n"), "Done\r\n");
    }

    #[test]
    fn decoder_carries_split_multibyte_sequence() {
        let bytes = "héllo ✔".as_bytes();
        let split = bytes.len() - 2;
        let mut d = Utf8Decoder::new();
        let first = d.decode(&bytes[..split]);
        let second = d.decode(&bytes[split..]);
        assert_eq!(format!("{first}{second}"), "héllo ✔");
        assert!(!first.contains('\u{FFFD}'));
    }

    #[test]
    fn decoder_replaces_invalid_bytes() {
        let mut d = Utf8Decoder::new();
        assert_eq!(d.decode(b"a\xffb"), "a\u{FFFD}b");
    }

    #[test]
    fn finish_flushes_truncated_tail() {
        let mut d = Utf8Decoder::new();
        assert_eq!(d.decode(&[b'x', 0xe2, 0x9c]), "x");
        assert_eq!(d.finish(), "\u{FFFD}");
        assert_eq!(d.finish(), "");
    }
}
