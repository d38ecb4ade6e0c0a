//! File logging. The TUI owns stdout, so tracing output goes to
//! `<data_dir>/staydeck/logs/staydeck.log.<date>`.

use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const DEFAULT_DIRECTIVE: &str = "staydeck=info";

pub fn log_dir() -> Result<PathBuf> {
  dirs::data_dir()
    .map(|dir| dir.join("staydeck").join("logs"))
    .ok_or_else(|| eyre!("Could not determine a data directory for log files"))
}

/// Filter from `STAYDECK_LOG`, then `RUST_LOG`, then `level` (a bare level
/// such as `debug` applies to this crate only).
fn build_filter(level: Option<&str>) -> Result<EnvFilter> {
  let from_env = ["STAYDECK_LOG", "RUST_LOG"]
    .iter()
    .find_map(|var| std::env::var(var).ok().filter(|v| !v.trim().is_empty()));

  let directive = match (from_env, level) {
    (Some(directive), _) => directive,
    (None, Some(level)) if !level.contains('=') => format!("staydeck={}", level),
    (None, Some(directive)) => directive.to_string(),
    (None, None) => DEFAULT_DIRECTIVE.to_string(),
  };

  EnvFilter::try_new(&directive).map_err(|e| eyre!("Invalid log filter '{}': {}", directive, e))
}

/// Install the global subscriber. Keep the returned guard alive until exit,
/// dropping it flushes buffered lines.
pub fn init(level: Option<&str>) -> Result<WorkerGuard> {
  let dir = log_dir()?;
  std::fs::create_dir_all(&dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

  let appender = tracing_appender::rolling::daily(&dir, "staydeck.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  tracing_subscriber::fmt()
    .with_env_filter(build_filter(level)?)
    .with_writer(writer)
    .with_ansi(false)
    .with_target(true)
    .try_init()
    .map_err(|e| eyre!("Failed to install log subscriber: {}", e))?;

  Ok(guard)
}
