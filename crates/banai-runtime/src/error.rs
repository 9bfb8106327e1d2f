//! Host error types.

use thiserror::Error;

/// Errors raised while bootstrapping a [`Host`](crate::Host).
#[derive(Debug, Error)]
pub enum HostError {
    /// Configuration could not be loaded or is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] banai_config::ConfigError),

    /// Secrets could not be loaded.
    #[error("secret vault error: {0}")]
    Vault(#[from] banai_vault::VaultError),

    /// Logging could not be initialised.
    #[error("telemetry error: {0}")]
    Telemetry(#[from] banai_telemetry::TelemetryError),
}

/// Result alias for host operations.
pub type HostResult<T> = Result<T, HostError>;
