use std::fmt;
use std::str::FromStr;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Verbosity of the engine's diagnostics, from silent to everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogLevel {
    Nothing,
    Critical,
    #[default]
    Error,
    Warning,
    Info,
    Debug,
}

impl LogLevel {
    pub fn as_level_filter(self) -> LevelFilter {
        match self {
            LogLevel::Nothing => LevelFilter::OFF,
            // tracing has no level above error
            LogLevel::Critical | LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warning => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        let name = name.strip_prefix("log_").unwrap_or(name.as_str());
        match name {
            "nothing" | "off" => Ok(LogLevel::Nothing),
            "critical" => Ok(LogLevel::Critical),
            "error" => Ok(LogLevel::Error),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            _ => Err(format!("unknown log level: {s}")),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Nothing => "LOG_NOTHING",
            LogLevel::Critical => "LOG_CRITICAL",
            LogLevel::Error => "LOG_ERROR",
            LogLevel::Warning => "LOG_WARNING",
            LogLevel::Info => "LOG_INFO",
            LogLevel::Debug => "LOG_DEBUG",
        };
        f.write_str(name)
    }
}

/// Run-wide settings handed to the simulator at construction. Read-only once
/// the simulator holds it.
#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    pub log_level: LogLevel,
    /// Seed for every random draw of a run; `None` seeds from entropy.
    pub seed: Option<u64>,
    /// Half-range indices summed per batch when estimating per-qubit
    /// probabilities.
    pub batch_size: usize,
}

impl SimConfig {
    pub const DEFAULT_BATCH_SIZE: usize = 4096;

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            seed: None,
            batch_size: Self::DEFAULT_BATCH_SIZE,
        }
    }
}

/// Installs the global `tracing` subscriber at the configured level, which
/// `RUST_LOG` may refine. Meant to be called once by the binary; later calls
/// are ignored.
pub fn init_logging(level: LogLevel) {
    let filter = EnvFilter::builder()
        .with_default_directive(level.as_level_filter().into())
        .from_env_lossy();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
