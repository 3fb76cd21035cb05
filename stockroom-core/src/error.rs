//! Error types for Stockroom operations

use crate::identity::ProductId;
use std::time::Duration;
use thiserror::Error;

/// Record store errors.
///
/// A missing record on a read is not an error: lookups return `Ok(None)`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Record store call {operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("Record store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Product not found: {id}")]
    NotFound { id: ProductId },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Cache transport errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cached value at {key} could not be converted: {reason}")]
    Conversion { key: String, reason: String },

    #[error("Value for {key} could not be serialized: {reason}")]
    Serialization { key: String, reason: String },

    #[error("Cache transport failure: {reason}")]
    Transport { reason: String },
}

/// Channel transport and consumer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EventError {
    #[error("Channel transport closed, cannot publish to {channel}")]
    TransportClosed { channel: String },

    #[error("Processing failed on {channel}: {reason}")]
    Processing { channel: String, reason: String },

    #[error("Dead-letter publish to {channel} failed: {reason}")]
    DeadLetterFailed { channel: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all Stockroom errors.
#[derive(Debug, Clone, Error)]
pub enum StockroomError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Event error: {0}")]
    Event(#[from] EventError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for Stockroom operations.
pub type StockroomResult<T> = Result<T, StockroomError>;

// =============================================================================
// TESTS
// =============================================================================
