//! Logging for the CLI. Diagnostics go to stderr or a JSONL file; stdout only
//! ever carries the final assistant message.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

/// Logging choices made on the command line.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LogOptions {
    /// Number of `-v` flags.
    pub verbosity: u8,
    pub quiet: bool,
    /// Write JSON lines to this file instead of the console.
    pub json_path: Option<PathBuf>,
}

impl LogOptions {
    /// Explicit flags win; otherwise `RUST_LOG`; otherwise our own events at
    /// info and everything else at warn.
    fn directive(&self, rust_log: Option<&str>) -> String {
        if self.quiet {
            return "error".to_string();
        }
        let from_flags = match self.verbosity {
            0 => None,
            1 => Some("info"),
            2 => Some("debug"),
            _ => Some("trace"),
        };
        from_flags
            .map(str::to_string)
            .or_else(|| rust_log.map(str::trim).filter(|d| !d.is_empty()).map(str::to_string))
            .unwrap_or_else(|| "warn,agui_chat=info".to_string())
    }

    fn env_filter(&self) -> EnvFilter {
        let rust_log = std::env::var("RUST_LOG").ok();
        EnvFilter::try_new(self.directive(rust_log.as_deref()))
            .unwrap_or_else(|_| EnvFilter::new("warn,agui_chat=info"))
    }
}

/// Installs the global subscriber.
///
/// With a JSON path the file is written by a background worker; keep the
/// returned guard alive until exit so buffered lines are flushed.
pub fn init_observability(options: &LogOptions) -> Result<Option<WorkerGuard>> {
    let filter = options.env_filter();
    let Some(path) = options.json_path.as_deref() else {
        let console = tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_writer(std::io::stderr);
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(console)
            .try_init();
        return Ok(None);
    };

    let (writer, guard) = tracing_appender::non_blocking(json_file(path)?);
    let json = tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(true)
        .with_writer(writer);
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(json)
        .try_init();
    Ok(Some(guard))
}

fn json_file(path: &Path) -> Result<RollingFileAppender> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("log path {} has no file name", path.display()))?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating log directory {}", dir.display()))?;
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(dir)
        .with_context(|| format!("opening log file {}", path.display()))
}
