use backdrop_core::ConfigError;
use thiserror::Error;

/// Errors surfaced by the engine's public operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// The supplied configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    /// The host cannot present the requested mode at all.
    #[error("environment unavailable: {0}")]
    EnvironmentUnavailable(String),
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
