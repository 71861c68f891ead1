use tracing_subscriber::EnvFilter;

use crate::Error;
use crate::Result;

/// Installs the global fmt subscriber. `RUST_LOG` wins over `default_filter`.
///
/// Fails if a subscriber is already installed.
pub fn init_logging(default_filter: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter)
            .map_err(|e| Error::InvalidConfig(format!("log filter {default_filter}: {e}")))?,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| Error::Fatal(format!("install log subscriber: {e}")))
}
