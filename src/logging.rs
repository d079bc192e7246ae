//! File logging.
//!
//! The terminal belongs to the UI, so log lines go to a daily rolling file
//! instead of stderr.

use color_eyre::eyre::eyre;
use color_eyre::Result;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, e.g. `mealdesk=debug`
pub const LOG_FILTER_ENV: &str = "MEALDESK_LOG";

const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber writing to `dir/mealdesk.log.<date>`.
///
/// Keep the returned guard alive for the life of the program; dropping it
/// flushes and stops the writer thread.
pub fn init(dir: &Path) -> Result<WorkerGuard> {
  std::fs::create_dir_all(dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

  let appender = tracing_appender::rolling::daily(dir, "mealdesk.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  tracing_subscriber::fmt()
    .with_env_filter(filter_from(std::env::var(LOG_FILTER_ENV).ok().as_deref()))
    .with_writer(writer)
    .with_ansi(false)
    .with_target(true)
    .try_init()
    .map_err(|e| eyre!("Failed to install logger: {}", e))?;

  Ok(guard)
}

/// Parse a filter directive, falling back to the default on bad input.
fn filter_from(directive: Option<&str>) -> EnvFilter {
  directive
    .and_then(|d| EnvFilter::try_new(d).ok())
    .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}
