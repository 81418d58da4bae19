//! Error types for the cache
//!
//! Only construction and configuration can fail. Cache operations themselves
//! never report errors: oversized sets are dropped and every kind of miss
//! collapses into `None`.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Per-shard byte capacity is outside the supported range
    #[error("Invalid capacity: {0}")]
    InvalidCapacity(String),

    /// Configuration could not be parsed or failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
