//! Runtime configuration and log setup.

use std::io::IsTerminal;
use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

/// Physical-memory device mapped when nothing else is configured.
pub const DEFAULT_DEVICE: &str = "/dev/mem";
/// Overrides the device path.
pub const DEVICE_ENV: &str = "MEMTOOL_DEVICE";
/// Enables debug logging when set to a truthy value.
pub const VERBOSE_ENV: &str = "MEMTOOL_VERBOSE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// File mapped as physical memory.
    pub device: PathBuf,
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: PathBuf::from(DEFAULT_DEVICE),
            verbose: false,
        }
    }
}

impl Config {
    /// Filter directive used when `RUST_LOG` is not set.
    pub fn default_log_directive(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else {
            "warn"
        }
    }

    pub fn log_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.default_log_directive()))
    }
}

/// Installs the global subscriber. Logs go to stderr so stdout carries only dump output.
pub fn init_logging(config: &Config) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(config.log_filter())
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .without_time()
        .with_target(false)
        .try_init();
}
