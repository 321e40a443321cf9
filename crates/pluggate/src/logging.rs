//! Log output for the command line.
//!
//! The core library logs through the `log` facade. Here those records are
//! bridged into a `tracing` subscriber that writes to stderr, filtered by
//! `RUST_LOG` (default `info`). Stdout stays reserved for command output.
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

pub fn init_logging() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_log::LogTracer::init()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
}
