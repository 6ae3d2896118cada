use tracing_subscriber::EnvFilter;

use crate::Error;

/// Default filter when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "info,agora_core=debug";

/// Install the global subscriber. Logs go to stderr; stdout carries command output.
///
/// An unparsable `RUST_LOG` is an error rather than silently ignored.
pub fn init() -> Result<(), Error> {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_FILTER.to_string());
    let filter = EnvFilter::try_new(&directives)
        .map_err(|e| Error::Logging(format!("invalid filter '{directives}': {e}")))?;
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))
}
