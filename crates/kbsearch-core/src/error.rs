use thiserror::Error;

/// Engine error taxonomy. Only `InvalidConfig` and `DimensionMismatch`
/// surface to callers; `Provider` and `CacheIo` are recovered close to
/// where they occur (mode fallback and cache-miss respectively).
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding provider failed: {0}")]
    Provider(String),

    #[error("Cache storage failed: {0}")]
    CacheIo(String),
}

pub type Result<T> = std::result::Result<T, Error>;
