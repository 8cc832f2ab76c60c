//! Turns serial chunks into log lines.

use std::io::{self, Write};
use std::str;

use crate::protocol::BLOCK_START;

/// Lossy UTF-8 decoder for a chunked byte stream.
///
/// Invalid sequences are dropped. A sequence cut in half by a chunk boundary
/// is held back until the next chunk completes it.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.pending);
        bytes.extend_from_slice(chunk);

        let mut text = String::with_capacity(bytes.len());
        let mut rest = &bytes[..];

        loop {
            match str::from_utf8(rest) {
                Ok(valid) => {
                    text.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, invalid) = rest.split_at(e.valid_up_to());
                    if let Ok(valid) = str::from_utf8(valid) {
                        text.push_str(valid);
                    }

                    match e.error_len() {
                        Some(len) => {
                            log::trace!("Dropping {} undecodable bytes", len);
                            rest = &invalid[len..];
                        }
                        None => {
                            self.pending = invalid.to_vec();
                            break;
                        }
                    }
                }
            }
        }

        text
    }
}

/// Holds the partial line between chunks
#[derive(Debug, Default)]
pub struct LineFramer {
    buffer: String,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append text and return every line it completed, empty ones included.
    pub fn feed(&mut self, text: &str) -> Vec<String> {
        self.buffer.push_str(text);

        match self.buffer.rfind('\n') {
            Some(end) => {
                let partial = self.buffer.split_off(end + 1);
                let complete = std::mem::replace(&mut self.buffer, partial);
                complete[..end].split('\n').map(String::from).collect()
            }
            None => Vec::new(),
        }
    }

    /// The not yet terminated tail
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    pub fn take_pending(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buffer))
        }
    }
}

/// Writes framed lines to the log.
///
/// Blank lines are dropped and every block header after the first byte of
/// the log gets a blank line in front of it.
pub struct LogWriter<W> {
    inner: W,
    written: u64,
}

impl<W: Write> LogWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    /// Returns false if the line was dropped
    pub fn write_line(&mut self, line: &str) -> io::Result<bool> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(false);
        }

        if trimmed.starts_with(BLOCK_START) && self.written > 0 {
            self.put(b"\n")?;
        }

        self.put(line.trim_end().as_bytes())?;
        self.put(b"\n")?;

        Ok(true)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    /// Bytes written so far
    pub fn position(&self) -> u64 {
        self.written
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }

    fn put(&mut self, buf: &[u8]) -> io::Result<()> {
        self.inner.write_all(buf)?;
        self.written += buf.len() as u64;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_all(lines: &[&str]) -> String {
        let mut writer = LogWriter::new(Vec::new());
        for line in lines {
            writer.write_line(line).unwrap();
        }
        String::from_utf8(writer.into_inner()).unwrap()
    }

    #[test]
    fn keeps_partial_line() {
        let mut framer = LineFramer::new();

        assert!(framer.feed("[ 0 ] --").is_empty());
        assert_eq!(framer.pending(), "[ 0 ] --");

        assert_eq!(framer.feed("--\nbefo"), vec!["[ 0 ] ----"]);
        assert_eq!(framer.pending(), "befo");

        assert_eq!(framer.feed("re\n\nafter\n"), vec!["before", "", "after"]);
        assert_eq!(framer.pending(), "");
        assert_eq!(framer.take_pending(), None);
    }

    #[test]
    fn chunk_boundaries_do_not_matter() {
        let stream = "[ 3 ] ----\r\nbefore: |X:a 0x00-0x01 - Y:a 0x00-0x02\r\n\r\nafter:  |X\n[ 4 ] --\ntail";

        let mut whole = LineFramer::new();
        let expected = whole.feed(stream);

        for split in 0..=stream.len() {
            if !stream.is_char_boundary(split) {
                continue;
            }
            let (first, second) = stream.split_at(split);

            let mut framer = LineFramer::new();
            let mut lines = framer.feed(first);
            lines.extend(framer.feed(second));

            assert_eq!(lines, expected, "split at {}", split);
            assert_eq!(framer.pending(), whole.pending());
        }
    }

    #[test]
    fn separates_blocks() {
        assert_eq!(
            write_all(&["[ 3 ] ----", "[ 4 ] ----"]),
            "[ 3 ] ----\n\n[ 4 ] ----\n"
        );
    }

    #[test]
    fn first_header_gets_no_separator() {
        assert_eq!(write_all(&["  [ 0 ] ----", "x"]), "  [ 0 ] ----\nx\n");
    }

    #[test]
    fn drops_blank_lines_and_trailing_whitespace() {
        assert_eq!(
            write_all(&["hello\r", "", "   ", "\t", "world  "]),
            "hello\nworld\n"
        );

        let mut writer = LogWriter::new(Vec::new());
        assert!(!writer.write_line(" \r").unwrap());
        assert_eq!(writer.position(), 0);
        assert!(writer.write_line("a").unwrap());
        assert_eq!(writer.position(), 2);
    }

    #[test]
    fn drops_invalid_utf8() {
        let mut decoder = Utf8Decoder::new();
        assert_eq!(decoder.decode(b"ok\xff\xfe go\n"), "ok go\n");
    }

    #[test]
    fn joins_split_utf8_sequences() {
        let mut decoder = Utf8Decoder::new();
        let bytes = "µm".as_bytes();

        assert_eq!(decoder.decode(&bytes[..1]), "");
        assert_eq!(decoder.decode(&bytes[1..]), "µm");
    }
}
