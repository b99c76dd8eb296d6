// Composition root: configuration, schema, executor and router wiring.

pub mod config;
pub mod graphql;
pub mod http;
pub mod state;

use std::path::PathBuf;

use tracing_subscriber::{EnvFilter, fmt};

/// Loads `.env`, then installs the subscriber.
pub fn bootstrap() {
    bootstrap_with(config::load_dotenv);
}

/// The env file goes first so a `RUST_LOG` set there reaches the filter.
fn bootstrap_with(load_env_file: impl FnOnce() -> Option<PathBuf>) {
    let env_file = load_env_file();
    init_tracing();
    if let Some(path) = env_file {
        tracing::info!("Env file: {:?} loaded", path);
    }
}

/// Installs the `fmt` subscriber, filtered by `RUST_LOG` (`info` when unset).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();
}
