use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use structopt::StructOpt;

mod capture;
mod fallback;
mod logfile;
mod plot;

use motionlog_shared::framer::LogWriter;
use motionlog_shared::{parse_file, ParseOutcome, SerialLink};

use crate::capture::{CaptureConfig, CaptureError};
use crate::fallback::{LogChooser, PresetLog, PromptChooser};

const DEFAULT_DEVICE: &str = "/dev/ttyACM0";

#[derive(Debug, StructOpt)]
#[structopt(name = "motionlog", about = "Motion sensor serial logger and plotter")]
struct Opt {
    /// Serial Device. Defaults to the first port found, else /dev/ttyACM0
    #[structopt(long = "device", parse(from_os_str))]
    serial: Option<PathBuf>,
    /// Serial baud rate
    #[structopt(long, default_value = "115200")]
    baud: u32,
    #[structopt(short, long)]
    debug: bool,
    #[structopt(subcommand)]
    cmd: CliCommand,
}

#[derive(StructOpt, Debug)]
enum CliCommand {
    /// Capture a log from the device, then parse and plot it
    Run {
        /// Directory for the log and the plot
        #[structopt(long, parse(from_os_str), default_value = ".")]
        out_dir: PathBuf,
        /// Log to process if the device can't be opened. Asks if not given
        #[structopt(long, parse(from_os_str))]
        fallback: Option<PathBuf>,
        #[structopt(flatten)]
        capture: CaptureArgs,
    },
    /// Capture data from device into a log file
    Capture {
        #[structopt(parse(from_os_str))]
        path: Option<PathBuf>,
        #[structopt(flatten)]
        capture: CaptureArgs,
    },
    /// Parse a log file and plot it
    Plot {
        #[structopt(parse(from_os_str))]
        path: PathBuf,
    },
    /// List serial ports
    ListPorts,
}

#[derive(StructOpt, Debug)]
struct CaptureArgs {
    /// Stop after this many milliseconds without data
    #[structopt(long = "timeout-ms", default_value = "1000")]
    timeout_ms: u64,
    /// Don't echo captured lines
    #[structopt(short, long)]
    quiet: bool,
}

impl CaptureArgs {
    fn config(&self) -> CaptureConfig {
        CaptureConfig {
            inactivity_timeout: Duration::from_millis(self.timeout_ms),
            echo: !self.quiet,
            ..CaptureConfig::default()
        }
    }
}

fn main() -> anyhow::Result<()> {
    let opt = Opt::from_args();

    let loglevel = if opt.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(loglevel)).init();

    match opt.cmd {
        CliCommand::Run { out_dir, fallback, capture } => {
            let devpath = device_path(opt.serial);
            let log_path = logfile::new_log_path(&out_dir);
            let interrupt = interrupt_flag();

            let path = match capture_to(&devpath, opt.baud, &log_path, &capture.config(), &interrupt) {
                Ok(()) => log_path,
                Err(CaptureError::Connection(err)) => {
                    log::error!("{}", err);

                    let mut chooser: Box<dyn LogChooser> = match fallback {
                        Some(path) => Box::new(PresetLog::new(path)),
                        None => Box::new(PromptChooser::new(BufReader::new(io::stdin()), io::stdout())),
                    };

                    match chooser.choose(&err) {
                        Some(path) => path,
                        None => {
                            println!("No file selected, exiting");
                            process::exit(1);
                        }
                    }
                }
                Err(err) => return Err(err.into()),
            };

            process_log(&path);
            Ok(())
        }
        CliCommand::Capture { path, capture } => {
            let devpath = device_path(opt.serial);
            let path = path.unwrap_or_else(|| logfile::new_log_path(Path::new(".")));
            let interrupt = interrupt_flag();

            capture_to(&devpath, opt.baud, &path, &capture.config(), &interrupt)?;
            Ok(())
        }
        CliCommand::Plot { path } => {
            process_log(&path);
            Ok(())
        }
        CliCommand::ListPorts => {
            for port in SerialLink::list_ports()? {
                println!("{}\t{:?}", port.port_name, port.port_type);
            }
            Ok(())
        }
    }
}

fn device_path(serial: Option<PathBuf>) -> PathBuf {
    serial
        .or_else(|| {
            SerialLink::list_ports()
                .ok()?
                .first()
                .map(|port| PathBuf::from(&port.port_name))
        })
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DEVICE))
}

/// Raised by Ctrl-C. A second Ctrl-C exits right away.
fn interrupt_flag() -> Arc<AtomicBool> {
    let interrupt = Arc::new(AtomicBool::new(false));
    let flag = interrupt.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        if flag.swap(true, Ordering::SeqCst) {
            process::exit(130);
        }
        log::info!("Program terminated by user");
    }) {
        log::warn!("Failed to set Ctrl-C handler: {}", e);
    }

    interrupt
}

fn capture_to(
    devpath: &Path,
    baud: u32,
    log_path: &Path,
    config: &CaptureConfig,
    interrupt: &AtomicBool,
) -> Result<(), CaptureError> {
    let mut link = SerialLink::new();
    link.connect(devpath, baud)?;
    log::info!("Connected to {} at {} baud", devpath.display(), baud);

    let file = File::create(log_path).map_err(CaptureError::Log)?;
    log::info!("Logging to: {}", log_path.display());

    let mut sink = LogWriter::new(BufWriter::new(file));
    let outcome = capture::command_capture(&mut link, &mut sink, config, interrupt)?;

    log::info!(
        "Capture {:?}: {} bytes in {} chunks, {} lines written",
        outcome.stop,
        outcome.stats.bytes,
        outcome.stats.chunks,
        outcome.stats.lines,
    );

    Ok(())
}

/// Parse a log and plot it next to the log. Failures are reported, not fatal.
fn process_log(path: &Path) {
    match parse_file(path) {
        Ok(ParseOutcome::Series(series)) => {
            if !series.incomplete().is_empty() {
                log::warn!("Blocks without both readings: {:?}", series.incomplete());
            }

            let plot_path = logfile::plot_path(path);
            match plot::render(&series, &plot_path) {
                Ok(()) => println!("Plot saved to: {}", plot_path.display()),
                Err(e) => log::error!("Error plotting data: {}", e),
            }
        }
        Ok(ParseOutcome::NoData) => {
            println!("No valid data found in {} for plotting", path.display());
        }
        Err(e) => log::error!("Error parsing {}: {}", path.display(), e),
    }
}
