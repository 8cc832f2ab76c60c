use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

const LOG_PREFIX: &str = "serial_output_";
const PLOT_SUFFIX: &str = "_plot.png";

/// `serial_output_YYYYMMDD_HHMMSS.txt`
pub fn log_file_name(time: &DateTime<Local>) -> String {
    format!("{}{}.txt", LOG_PREFIX, time.format("%Y%m%d_%H%M%S"))
}

/// Path of a new log file in `dir`, named after the current time
pub fn new_log_path(dir: &Path) -> PathBuf {
    dir.join(log_file_name(&Local::now()))
}

/// The chart next to a log: the extension is replaced by `_plot.png`
pub fn plot_path(log: &Path) -> PathBuf {
    let mut name = log.with_extension("").into_os_string();
    name.push(PLOT_SUFFIX);
    PathBuf::from(name)
}
