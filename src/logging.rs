//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;

use crate::environment::Environment;

/// Default filter directive for an environment when `RUST_LOG` is unset.
#[must_use]
pub fn default_directive(environment: Environment) -> &'static str {
    if environment.is_production() {
        "warn"
    } else {
        "debug"
    }
}

/// Installs a fmt subscriber filtered by `RUST_LOG`, falling back to the
/// environment's default level.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_tracing(environment: Environment) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(environment)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok()
}
