// Logging setup for padrelay binaries
// Headless tools log to stderr; the terminal monitor logs to a file so the UI stays clean

use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

pub const MONITOR_LOG_PATH: &str = "/tmp/padrelay-monitor.log";

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Initialize stderr logging. RUST_LOG wins over `default_level`.
pub fn init_stderr(default_level: &str) {
    // Ignore the error if a subscriber is already installed (tests, embedding)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(default_level))
        .with_writer(io::stderr)
        .try_init();
}

/// Initialize logging into a truncated file
///
/// # Behavior
/// - Creates/truncates the file at `path`
/// - No ANSI colours, one line per event
/// - To monitor: `tail -f <path>`
pub fn init_file(path: &Path, default_level: &str) -> io::Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(default_level))
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init();

    Ok(())
}
