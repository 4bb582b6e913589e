// Subscriber setup for hosts embedding the client.

use anyhow::anyhow;
use tracing_subscriber::EnvFilter;

/// Installs a `fmt` subscriber. `RUST_LOG` wins over `default_filter`.
/// Fails if another global subscriber is already installed.
pub fn init_tracing(default_filter: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_filter))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|error| anyhow!("failed to install tracing subscriber: {error}"))
}
