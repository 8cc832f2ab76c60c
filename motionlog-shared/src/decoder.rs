use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use crate::protocol::{LogLine, Phase, Reading};

/// Readings of one complete block
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Sample {
    pub block: u32,
    pub before: Reading,
    pub after: Reading,
}

/// One of the four plotted values of a sample
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Channel {
    BeforeX,
    BeforeY,
    AfterX,
    AfterY,
}

impl Channel {
    pub const ALL: [Channel; 4] = [
        Channel::BeforeX,
        Channel::BeforeY,
        Channel::AfterX,
        Channel::AfterY,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Channel::BeforeX => "Before X",
            Channel::BeforeY => "Before Y",
            Channel::AfterX => "After X",
            Channel::AfterY => "After Y",
        }
    }

    pub fn phase(self) -> Phase {
        match self {
            Channel::BeforeX | Channel::BeforeY => Phase::Before,
            Channel::AfterX | Channel::AfterY => Phase::After,
        }
    }

    pub fn value(self, sample: &Sample) -> i16 {
        match self {
            Channel::BeforeX => sample.before.x,
            Channel::BeforeY => sample.before.y,
            Channel::AfterX => sample.after.x,
            Channel::AfterY => sample.after.y,
        }
    }
}

#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct SampleSeries {
    blocks: Vec<u32>,
    samples: Vec<Sample>,
    incomplete: Vec<u32>,
}

impl SampleSeries {
    /// Every block header seen, in log order
    pub fn blocks(&self) -> &[u32] {
        &self.blocks
    }

    /// Blocks that had both phase readings
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Blocks that were missing a phase reading
    pub fn incomplete(&self) -> &[u32] {
        &self.incomplete
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn block_numbers(&self) -> Vec<u32> {
        self.samples.iter().map(|s| s.block).collect()
    }

    pub fn values(&self, channel: Channel) -> Vec<i16> {
        self.samples.iter().map(|s| channel.value(s)).collect()
    }

    /// (block, value) pairs of a channel
    pub fn points(&self, channel: Channel) -> impl Iterator<Item = (u32, i16)> + '_ {
        self.samples.iter().map(move |s| (s.block, channel.value(s)))
    }
}

#[derive(Debug)]
pub enum ParseOutcome {
    /// The log had no block headers
    NoData,
    Series(SampleSeries),
}

#[derive(Debug)]
struct OpenBlock {
    index: u32,
    before: Option<Reading>,
    after: Option<Reading>,
}

/// Line by line sample extraction
#[derive(Debug, Default)]
pub struct SampleDecoder {
    current: Option<OpenBlock>,
    series: SampleSeries,
}

impl SampleDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_line(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        let class = LogLine::classify(line);
        log::trace!("{:?} <- {:?}", class, line);

        match class {
            LogLine::Header(index) => {
                self.close_block();
                self.series.blocks.push(index);
                self.current = Some(OpenBlock {
                    index,
                    before: None,
                    after: None,
                });
            }
            LogLine::Before(reading) => self.record(Phase::Before, reading),
            LogLine::After(reading) => self.record(Phase::After, reading),
            LogLine::Other => {}
        }
    }

    pub fn finish(mut self) -> ParseOutcome {
        self.close_block();

        let series = self.series;
        log::debug!(
            "Parsed {} blocks, {} samples, {} incomplete",
            series.blocks.len(),
            series.samples.len(),
            series.incomplete.len(),
        );

        if series.is_empty() {
            ParseOutcome::NoData
        } else {
            ParseOutcome::Series(series)
        }
    }

    fn record(&mut self, phase: Phase, reading: Reading) {
        let block = match self.current.as_mut() {
            Some(block) => block,
            None => {
                log::trace!("Ignoring {} reading before the first block", phase);
                return;
            }
        };

        let slot = match phase {
            Phase::Before => &mut block.before,
            Phase::After => &mut block.after,
        };

        if slot.replace(reading).is_some() {
            log::warn!("Block {}: repeated {} reading, keeping the last one", block.index, phase);
        }
    }

    fn close_block(&mut self) {
        let block = match self.current.take() {
            Some(block) => block,
            None => return,
        };

        match (block.before, block.after) {
            (Some(before), Some(after)) => self.series.samples.push(Sample {
                block: block.index,
                before,
                after,
            }),
            (before, _) => {
                let missing = if before.is_none() { Phase::Before } else { Phase::After };
                log::warn!("Block {}: no {} reading, skipped", block.index, missing);
                self.series.incomplete.push(block.index);
            }
        }
    }
}

pub fn parse<I, S>(lines: I) -> ParseOutcome
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut decoder = SampleDecoder::new();
    for line in lines {
        decoder.push_line(line.as_ref());
    }
    decoder.finish()
}

/// Parse a log file. Undecodable bytes are replaced rather than failing the read.
pub fn parse_file(path: &Path) -> io::Result<ParseOutcome> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut decoder = SampleDecoder::new();
    let mut buf = Vec::new();

    while reader.read_until(b'\n', &mut buf)? > 0 {
        decoder.push_line(&String::from_utf8_lossy(&buf));
        buf.clear();
    }

    Ok(decoder.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(lines: &[&str]) -> SampleSeries {
        match parse(lines) {
            ParseOutcome::Series(series) => series,
            ParseOutcome::NoData => panic!("no data"),
        }
    }

    #[test]
    fn three_line_log() {
        let series = series(&[
            "[ 0 ] ----------",
            "before: |X:foo 0x00-0x0A - Y:foo 0xFF-0xF6",
            "after:  |X:foo 0x00-0x0B - Y:foo 0x00-0x00",
        ]);

        assert_eq!(series.block_numbers(), vec![0]);
        assert_eq!(series.values(Channel::BeforeX), vec![10]);
        assert_eq!(series.values(Channel::BeforeY), vec![-10]);
        assert_eq!(series.values(Channel::AfterX), vec![11]);
        assert_eq!(series.values(Channel::AfterY), vec![0]);
        assert!(series.incomplete().is_empty());
    }

    #[test]
    fn no_headers_is_no_data() {
        let lines = [
            "before: |X:foo 0x00-0x0A - Y:foo 0xFF-0xF6",
            "boot ok",
            "",
        ];
        assert!(matches!(parse(&lines), ParseOutcome::NoData));
        assert!(matches!(parse(Vec::<String>::new()), ParseOutcome::NoData));
    }

    #[test]
    fn readings_before_first_header_are_ignored() {
        let series = series(&[
            "after:  |X:foo 0x00-0x01 - Y:foo 0x00-0x01",
            "[ 1 ] ---",
            "\u{0}before: |X:foo 0x00-0x02 - Y:foo 0x00-0x03",
            "garbage",
            "after:  |X:foo 0x00-0x04 - Y:foo 0x00-0x05",
        ]);

        assert_eq!(
            series.samples(),
            &[Sample {
                block: 1,
                before: Reading { x: 2, y: 3 },
                after: Reading { x: 4, y: 5 },
            }]
        );
    }

    #[test]
    fn incomplete_blocks_are_reported() {
        let series = series(&[
            "[ 0 ] ----",
            "before: |X:a 0x00-0x01 - Y:a 0x00-0x01",
            "[ 1 ] ----",
            "before: |X:a 0x00-0x02 - Y:a 0x00-0x02",
            "after:  |X:a 0x00-0x03 - Y:a 0x00-0x03",
            "[ 2 ] ----",
        ]);

        assert_eq!(series.blocks(), &[0, 1, 2]);
        assert_eq!(series.block_numbers(), vec![1]);
        assert_eq!(series.incomplete(), &[0, 2]);
        assert_eq!(series.points(Channel::AfterY).collect::<Vec<_>>(), vec![(1, 3)]);
    }

    #[test]
    fn repeated_phase_keeps_last() {
        let series = series(&[
            "[ 7 ] ----",
            "before: |X:a 0x00-0x01 - Y:a 0x00-0x01",
            "before: |X:a 0xFF-0xFF - Y:a 0x00-0x09",
            "after:  |X:a 0x00-0x03 - Y:a 0x00-0x03",
        ]);

        assert_eq!(series.values(Channel::BeforeX), vec![-1]);
        assert_eq!(series.values(Channel::BeforeY), vec![9]);
    }

    #[test]
    fn parses_file_with_stray_bytes() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[ 5 ] ----\n\xff\xfe noise\r\n").unwrap();
        file.write_all(b"before: |X:a 0x00-0x01 - Y:a 0x00-0x02\r\n").unwrap();
        file.write_all(b"after:  |X:a 0x80-0x00 - Y:a 0x7F-0xFF").unwrap();
        file.flush().unwrap();

        let series = match parse_file(file.path()).unwrap() {
            ParseOutcome::Series(series) => series,
            ParseOutcome::NoData => panic!("no data"),
        };

        assert_eq!(series.block_numbers(), vec![5]);
        assert_eq!(series.values(Channel::AfterX), vec![-32768]);
        assert_eq!(series.values(Channel::AfterY), vec![32767]);
    }
}
