//! Constants for Stockroom
//!
//! Key formats, channel names and configuration defaults used across the
//! workspace.

// ============================================================================
// CACHE KEYS
// ============================================================================

/// Default cache namespace for product entries.
pub const DEFAULT_CACHE_NAMESPACE: &str = "product";

/// Separator between namespace and key suffix (`product::42`).
pub const CACHE_KEY_SEPARATOR: &str = "::";

/// Suffix of the collection key (`product::all`).
pub const COLLECTION_KEY_SUFFIX: &str = "all";

// ============================================================================
// CHANNELS
// ============================================================================

/// Channel receiving product change events.
pub const DEFAULT_PRODUCT_CHANNEL: &str = "product-topic";

/// Secondary channel with an audit listener that never fails.
pub const DEFAULT_AUDIT_CHANNEL: &str = "demo-topic";

/// Suffix appended to a channel name to form its dead-letter channel.
pub const DEAD_LETTER_SUFFIX: &str = ".DLT";

/// Payload marker that makes the product handler fail on purpose.
pub const DEFAULT_FAIL_MARKER: &str = "fail";

/// Default buffer size of each in-memory channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Default number of partitions per channel.
pub const DEFAULT_PARTITIONS: u32 = 1;

/// Messages kept in each channel's retained log for replay and triage.
pub const DEFAULT_CHANNEL_RETENTION: usize = 10_000;

// ============================================================================
// RECORD STORE
// ============================================================================

/// Synthetic latency applied to every record store call (milliseconds).
pub const DEFAULT_STORE_LATENCY_MS: u64 = 3000;

/// Upper bound on any record store call (milliseconds).
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 10_000;

// ============================================================================
// RETRY
// ============================================================================

/// Delivery attempts before a message is dead-lettered.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Backoff before the second attempt (milliseconds).
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 100;

/// Cap on the backoff between attempts (milliseconds).
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 2000;

/// Multiplier applied to the backoff after each failed attempt.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;
