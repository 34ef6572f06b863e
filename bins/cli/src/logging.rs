//! Tracing subscriber setup. Log lines always go to stderr.

use crate::format::LogFormat;
use tracing_subscriber::EnvFilter;

const LOG_LEVEL_ENV: &str = "CPL_LOG_LEVEL";

/// Install the global subscriber. A second call is a no-op.
pub fn init_tracing(format: LogFormat, quiet: bool) {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let level = std::env::var(LOG_LEVEL_ENV).ok();
    let filter = env_filter(rust_log.as_deref(), level.as_deref(), quiet);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    let installed = match format {
        LogFormat::Text => builder.compact().try_init(),
        LogFormat::Json => builder.json().flatten_event(true).try_init(),
    };
    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// `RUST_LOG` wins over `CPL_LOG_LEVEL`; unparsable directives fall back to the default.
fn env_filter(rust_log: Option<&str>, level: Option<&str>, quiet: bool) -> EnvFilter {
    let default = if quiet { "warn" } else { "info" };
    rust_log
        .or(level)
        .map(str::trim)
        .filter(|directives| !directives.is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(default))
}
