//! Subscriber setup for the binary.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset: `level` for this crate only.
pub fn default_directive(level: &str) -> String {
    format!("routing_gym_bridge={level}")
}

/// Install a `fmt` subscriber. `RUST_LOG` wins over `level` when set.
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing(level: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(level)));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init()
}
