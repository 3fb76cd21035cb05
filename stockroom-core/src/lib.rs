//! Stockroom Core - Entity Types
//!
//! Pure data structures shared by every other crate in the workspace:
//! product records and their transfer objects, change events, error types
//! and configuration. No I/O lives here.

pub mod config;
pub mod constants;
pub mod entities;
pub mod error;
pub mod event;
pub mod identity;

pub use config::{CacheConfig, EventConfig, RetryConfig, StoreConfig};
pub use entities::{NewProduct, Product, ProductDto};
pub use error::{
    CacheError, ConfigError, EventError, StockroomError, StockroomResult, StorageError,
};
pub use event::{ChangeEvent, ChangeKind};
pub use identity::{Price, ProductId, Timestamp};
