use std::env;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*};

use super::config_io::ConfigError;

pub const LOG_ENV: &str = "TASKDECK_LOG";
pub const FORMAT_ENV: &str = "TASKDECK_LOG_FORMAT";
pub const LOG_FILE: &str = "taskdeck.log";
const DEFAULT_FILTER: &str = "taskdeck=info";

/// Where log events go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    /// Append to a file (the terminal UI owns stderr)
    File(PathBuf),
}

impl LogTarget {
    /// The log file inside a state directory
    pub fn file_in(dir: &Path) -> Self {
        LogTarget::File(dir.join(LOG_FILE))
    }
}

/// Output format from `TASKDECK_LOG_FORMAT`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Compact,
        }
    }

    fn from_env() -> Self {
        Self::parse(env::var(FORMAT_ENV).ok().as_deref())
    }
}

/// Install the global subscriber. Filter comes from `TASKDECK_LOG`
/// (default `taskdeck=info`). A second call is a no-op.
pub fn init_tracing(target: LogTarget) -> Result<(), ConfigError> {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let format = LogFormat::from_env();

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match target {
        LogTarget::Stderr => match format {
            LogFormat::Json => fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(std::io::stderr)
                .boxed(),
            LogFormat::Compact => fmt::layer().compact().with_writer(std::io::stderr).boxed(),
        },
        LogTarget::File(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| ConfigError::Write {
                    path: path.clone(),
                    source: e,
                })?;
            let writer = Mutex::new(file);
            match format {
                LogFormat::Json => fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_writer(writer)
                    .boxed(),
                LogFormat::Compact => fmt::layer()
                    .compact()
                    .with_ansi(false)
                    .with_writer(writer)
                    .boxed(),
            }
        }
    };

    if tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .try_init()
        .is_err()
    {
        tracing::debug!("tracing already initialized");
    }
    Ok(())
}
