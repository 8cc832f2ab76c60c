use std::fmt;

/// Selects the streaming mode of the sensor firmware
pub const MODE_STREAM: &[u8] = b"2";

/// First character of a block header line
pub const BLOCK_START: char = '[';

const BEFORE_TAG: &str = "before: |X:";
const AFTER_TAG: &str = "after:  |X:";
const Y_TAG: &str = " - Y:";

/// Length of ` 0xHH-0xHH`
const PAIR_LEN: usize = 10;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Phase {
    Before,
    After,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Before => f.write_str("before"),
            Phase::After => f.write_str("after"),
        }
    }
}

/// One phase reading of the sensor
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub struct Reading {
    pub x: i16,
    pub y: i16,
}

/// A classified log line
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum LogLine {
    /// `[ n ] ----`
    Header(u32),
    /// `before: |X:... 0xHH-0xHH - Y:... 0xHH-0xHH`
    Before(Reading),
    /// `after:  |X:... 0xHH-0xHH - Y:... 0xHH-0xHH`
    After(Reading),
    Other,
}

impl LogLine {
    /// Classify a single log line. Surrounding whitespace is ignored.
    pub fn classify(line: &str) -> LogLine {
        let line = line.trim();

        if let Some(index) = parse_header(line) {
            return LogLine::Header(index);
        }

        if let Some(reading) = sample_body(line, BEFORE_TAG).and_then(parse_pairs) {
            return LogLine::Before(reading);
        }

        if let Some(reading) = sample_body(line, AFTER_TAG).and_then(parse_pairs) {
            return LogLine::After(reading);
        }

        LogLine::Other
    }
}

/// Combine a big-endian byte pair into a two's complement value
pub fn decode_i16(high: u8, low: u8) -> i16 {
    i16::from_be_bytes([high, low])
}

fn parse_header(line: &str) -> Option<u32> {
    let rest = line.strip_prefix("[ ")?;
    let end = rest.find(|c: char| !c.is_ascii_digit())?;
    let (digits, rest) = rest.split_at(end);
    let dashes = rest.strip_prefix(" ] ")?;

    if digits.is_empty() || dashes.is_empty() || !dashes.bytes().all(|b| b == b'-') {
        return None;
    }

    digits.parse().ok()
}

/// Strip the phase tag, allowing one control character in front of it
fn sample_body<'a>(line: &'a str, tag: &str) -> Option<&'a str> {
    line.strip_prefix(tag).or_else(|| {
        let mut chars = line.chars();
        match chars.next() {
            Some(c) if c.is_control() => chars.as_str().strip_prefix(tag),
            _ => None,
        }
    })
}

/// Find the X and Y byte pairs after the X tag.
///
/// The free text in front of each pair may itself contain pairs, so this
/// picks the rightmost X pair that is still followed by a Y pair, and then
/// the rightmost Y pair.
fn parse_pairs(body: &str) -> Option<Reading> {
    let bytes = body.as_bytes();

    for (pos, _) in body.rmatch_indices(Y_TAG) {
        if pos < PAIR_LEN {
            continue;
        }

        let (x_high, x_low) = match hex_pair(&bytes[pos - PAIR_LEN..pos]) {
            Some(pair) => pair,
            None => continue,
        };

        let tail = &bytes[pos + Y_TAG.len()..];
        let y = (0..=tail.len().saturating_sub(PAIR_LEN))
            .rev()
            .find_map(|start| hex_pair(tail.get(start..start + PAIR_LEN)?));

        if let Some((y_high, y_low)) = y {
            return Some(Reading {
                x: decode_i16(x_high, x_low),
                y: decode_i16(y_high, y_low),
            });
        }
    }

    None
}

/// Parse exactly ` 0xHH-0xHH`
fn hex_pair(b: &[u8]) -> Option<(u8, u8)> {
    if b.len() != PAIR_LEN || &b[..3] != b" 0x" || &b[5..8] != b"-0x" {
        return None;
    }

    Some((hex_byte(&b[3..5])?, hex_byte(&b[8..10])?))
}

fn hex_byte(b: &[u8]) -> Option<u8> {
    let high = (b[0] as char).to_digit(16)?;
    let low = (b[1] as char).to_digit(16)?;
    Some((high << 4 | low) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_signed_values() {
        for value in &[-1i16, 32767, -32768, 0, 10, -10] {
            let [high, low] = value.to_be_bytes();
            assert_eq!(decode_i16(high, low), *value);
        }

        assert_eq!(decode_i16(0x80, 0x00), -32768);
        assert_eq!(decode_i16(0x00, 0x00), 0);
        assert_eq!(decode_i16(0xFF, 0xFF), -1);
        assert_eq!(decode_i16(0x7F, 0xFF), 32767);
    }

    #[test]
    fn headers() {
        assert_eq!(LogLine::classify("[ 0 ] ----------"), LogLine::Header(0));
        assert_eq!(LogLine::classify("  [ 42 ] -  "), LogLine::Header(42));
        assert_eq!(LogLine::classify("[ 4 ] ----"), LogLine::Header(4));

        assert_eq!(LogLine::classify("[ ] ----"), LogLine::Other);
        assert_eq!(LogLine::classify("[ 1 ]"), LogLine::Other);
        assert_eq!(LogLine::classify("[ 1 ] "), LogLine::Other);
        assert_eq!(LogLine::classify("[ 1 ] --x"), LogLine::Other);
        assert_eq!(LogLine::classify("[1] ----"), LogLine::Other);
        assert_eq!(LogLine::classify("[ -1 ] ----"), LogLine::Other);
        assert_eq!(LogLine::classify("[ 99999999999 ] ----"), LogLine::Other);
    }

    #[test]
    fn sample_lines() {
        assert_eq!(
            LogLine::classify("before: |X:foo 0x00-0x0A - Y:foo 0xFF-0xF6"),
            LogLine::Before(Reading { x: 10, y: -10 })
        );
        assert_eq!(
            LogLine::classify("after:  |X:foo 0x00-0x0B - Y:foo 0x00-0x00"),
            LogLine::After(Reading { x: 11, y: 0 })
        );
        assert_eq!(
            LogLine::classify("\u{0}before: |X: 0x7f-0xff - Y: 0x80-0x00"),
            LogLine::Before(Reading { x: 32767, y: -32768 })
        );
    }

    #[test]
    fn after_needs_two_spaces() {
        assert_eq!(
            LogLine::classify("after: |X:foo 0x00-0x0B - Y:foo 0x00-0x00"),
            LogLine::Other
        );
    }

    #[test]
    fn rejects_broken_sample_lines() {
        let lines = [
            "before: |X:foo 0x0-0x0A - Y:foo 0xFF-0xF6",
            "before: |X:foo 0x00-0x0G - Y:foo 0xFF-0xF6",
            "before: |X:foo 0x00-0x0A - Y:foo",
            "before: |X:foo - Y:foo 0xFF-0xF6",
            "\u{0}\u{0}before: |X:foo 0x00-0x0A - Y:foo 0xFF-0xF6",
            "xbefore: |X:foo 0x00-0x0A - Y:foo 0xFF-0xF6",
        ];

        for line in &lines {
            assert_eq!(LogLine::classify(line), LogLine::Other, "{:?}", line);
        }
    }

    #[test]
    fn greedy_pair_selection() {
        // Pairs inside the free text are skipped in favour of the last ones
        assert_eq!(
            LogLine::classify("before: |X:raw 0x01-0x02 0x00-0x03 - Y:raw 0x01-0x01 0x00-0x04 ok"),
            LogLine::Before(Reading { x: 3, y: 4 })
        );
    }

    #[test]
    fn non_ascii_text_is_tolerated() {
        assert_eq!(
            LogLine::classify("before: |X:µ 0x00-0x01 - Y:° 0x00-0x02"),
            LogLine::Before(Reading { x: 1, y: 2 })
        );
    }
}
