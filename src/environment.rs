//! Runtime environment detection.
//!
//! Diagnostic notices (redirects, retry attempts) are meant for developers.
//! In production they are demoted to `debug` so they stay out of default logs.

use std::str::FromStr;
use std::sync::LazyLock;

use serde::Deserialize;

/// Environment variable that selects the runtime environment.
pub const ENVIRONMENT_VAR: &str = "APP_ENV";

static CURRENT: LazyLock<Environment> = LazyLock::new(Environment::from_env);

/// Deployment environment the process is running in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development (default). Diagnostics are emitted.
    #[default]
    Development,
    /// Production deployment. Diagnostics are suppressed.
    Production,
}

impl Environment {
    /// Reads the environment from `APP_ENV`, defaulting to development.
    #[must_use]
    pub fn from_env() -> Self {
        std::env::var(ENVIRONMENT_VAR)
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or_default()
    }

    /// Process-wide environment, read once on first use.
    #[must_use]
    pub fn current() -> Self {
        *CURRENT
    }

    #[must_use]
    pub fn is_production(self) -> bool {
        self == Self::Production
    }

    /// Whether non-fatal diagnostics should be surfaced at normal log levels.
    #[must_use]
    pub fn diagnostics_enabled(self) -> bool {
        !self.is_production()
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "development" | "dev" | "test" | "" => Ok(Self::Development),
            other => Err(format!("unknown environment: {other}")),
        }
    }
}
