use std::io::{BufRead, Write};
use std::path::PathBuf;

use motionlog_shared::ConnectionError;

const PROMPT_ATTEMPTS: usize = 3;

/// Supplies an existing log to process when the device can't be used
pub trait LogChooser {
    /// None means give up
    fn choose(&mut self, err: &ConnectionError) -> Option<PathBuf>;
}

/// Log file given up front on the command line
pub struct PresetLog {
    path: PathBuf,
}

impl PresetLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl LogChooser for PresetLog {
    fn choose(&mut self, err: &ConnectionError) -> Option<PathBuf> {
        log::warn!("{}, processing {} instead", err, self.path.display());

        if self.path.is_file() {
            Some(self.path.clone())
        } else {
            log::error!("{} is not a file", self.path.display());
            None
        }
    }
}

/// Asks for a log path on a terminal
pub struct PromptChooser<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> PromptChooser<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn ask(&mut self) -> Option<String> {
        write!(self.output, "Log file to process (empty to exit): ").ok()?;
        self.output.flush().ok()?;

        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        }
    }
}

impl<R: BufRead, W: Write> LogChooser for PromptChooser<R, W> {
    fn choose(&mut self, err: &ConnectionError) -> Option<PathBuf> {
        writeln!(self.output, "Serial error: {}", err).ok()?;

        for _ in 0..PROMPT_ATTEMPTS {
            let answer = self.ask()?;
            if answer.is_empty() {
                return None;
            }

            let path = PathBuf::from(answer);
            if path.is_file() {
                return Some(path);
            }

            writeln!(self.output, "{} is not a file", path.display()).ok()?;
        }

        None
    }
}
