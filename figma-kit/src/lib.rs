pub mod cli;
pub mod load_config;

pub use cli::{run, Cli, Commands};

use tracing_subscriber::EnvFilter;

/// Installs the global `fmt` subscriber, writing to stderr so stdout stays clean for JSON.
/// `RUST_LOG` overrides the default `info` level.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
