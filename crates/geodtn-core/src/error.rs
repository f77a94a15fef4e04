//! Error types for GeoDTN configuration

use thiserror::Error;

/// A setting or input shape the core refuses to run with
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Region needs at least 3 distinct vertices, got {vertices}")]
    DegenerateRegion { vertices: usize },

    #[error("Buffer size must be positive")]
    NonPositiveBufferSize,

    #[error("Unknown queue mode {0} (expected 1..=5)")]
    UnknownQueueMode(u8),

    #[error("TTL check interval must be positive, got {0}")]
    NonPositiveTtlInterval(f64),

    #[error("Energy setting `{field}` must not be negative, got {value}")]
    NegativeEnergy { field: &'static str, value: f64 },

    #[error("Initial copy count must be positive")]
    ZeroCopies,

    #[error("Invalid WKT: {0}")]
    InvalidWkt(String),
}

/// Result type for configuration checks
pub type ConfigResult<T> = Result<T, ConfigError>;
