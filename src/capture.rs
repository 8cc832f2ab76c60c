use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use motionlog_shared::framer::{LineFramer, LogWriter, Utf8Decoder};
use motionlog_shared::protocol::MODE_STREAM;
use motionlog_shared::{ByteSource, ConnectionError};

const READ_CHUNK: usize = 1024;

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Stop when the source has been silent this long
    pub inactivity_timeout: Duration,
    /// Sleep between polls of an idle source
    pub poll_interval: Duration,
    /// Print captured lines to stdout
    pub echo: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout: Duration::from_secs(1),
            poll_interval: Duration::from_millis(10),
            echo: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum StopReason {
    TimedOut,
    Interrupted,
}

#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub struct CaptureStats {
    pub chunks: usize,
    pub bytes: usize,
    pub lines: usize,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct CaptureOutcome {
    pub stop: StopReason,
    pub stats: CaptureStats,
}

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("failed to write the capture log: {0}")]
    Log(#[source] io::Error),
}

/// Closes the source when dropped
struct SourceGuard<'a, S: ByteSource + ?Sized> {
    source: &'a mut S,
}

impl<S: ByteSource + ?Sized> Drop for SourceGuard<'_, S> {
    fn drop(&mut self) {
        self.source.close();
        log::info!("Source closed");
    }
}

/// Stream lines from `source` into `sink` until the source goes quiet or
/// `interrupt` is raised. The source is closed on every return path.
pub fn command_capture<S, W>(
    source: &mut S,
    sink: &mut LogWriter<W>,
    config: &CaptureConfig,
    interrupt: &AtomicBool,
) -> Result<CaptureOutcome, CaptureError>
where
    S: ByteSource + ?Sized,
    W: Write,
{
    log::info!("Capturing");

    let mut guard = SourceGuard { source };

    // Set device in streaming mode
    guard.source.write_all(MODE_STREAM).map_err(ConnectionError::Link)?;
    log::info!("Sent: {}", String::from_utf8_lossy(MODE_STREAM));

    let mut decoder = Utf8Decoder::new();
    let mut framer = LineFramer::new();
    let mut stats = CaptureStats::default();
    let mut buf = vec![0; READ_CHUNK];
    let mut last_data = Instant::now();

    let stop = loop {
        if interrupt.load(Ordering::SeqCst) {
            log::info!("Capture interrupted");
            break StopReason::Interrupted;
        }

        let available = guard.source.bytes_available().map_err(ConnectionError::Link)?;

        if available > 0 {
            if buf.len() < available {
                buf.resize(available, 0);
            }

            let readlen = guard
                .source
                .read(&mut buf[..available])
                .map_err(ConnectionError::Link)?;

            if readlen > 0 {
                log::trace!("Got {} bytes", readlen);
                stats.chunks += 1;
                stats.bytes += readlen;

                let text = decoder.decode(&buf[..readlen]);
                for line in framer.feed(&text) {
                    write_line(sink, &line, config.echo, &mut stats)?;
                }
                sink.flush().map_err(CaptureError::Log)?;

                last_data = Instant::now();
            }
        }

        if last_data.elapsed() > config.inactivity_timeout {
            log::info!("No data received for {:?}, stopping", config.inactivity_timeout);
            break StopReason::TimedOut;
        }

        if available == 0 {
            thread::sleep(config.poll_interval);
        }
    };

    if let Some(rest) = framer.take_pending() {
        log::debug!("Writing unterminated line {:?}", rest);
        write_line(sink, &rest, config.echo, &mut stats)?;
    }
    sink.flush().map_err(CaptureError::Log)?;

    Ok(CaptureOutcome { stop, stats })
}

fn write_line<W: Write>(
    sink: &mut LogWriter<W>,
    line: &str,
    echo: bool,
    stats: &mut CaptureStats,
) -> Result<(), CaptureError> {
    if sink.write_line(line).map_err(CaptureError::Log)? {
        stats.lines += 1;
        if echo {
            println!("{}", line.trim_end());
        }
    }
    Ok(())
}
