//! Cache-aside layers in front of the record store.
//!
//! Two strategies share one [`CacheTransport`] and one key scheme:
//!
//! - [`ReadThroughCache`] is the building block the declarative coordinator
//!   uses: get-or-fetch reads plus explicit put/evict hooks around writes.
//! - [`ManualCacheStore`] issues every cache call by hand, converting cached
//!   values itself and treating an unconvertible value as a miss.
//!
//! Values cross the transport as `serde_json::Value`, the same shape a
//! remote JSON cache would hold, so a value written by one strategy can be
//! read by the other.

pub mod key;
pub mod manual;
pub mod memory;
pub mod read;
pub mod read_through;
pub mod traits;

pub use key::CacheKeys;
pub use manual::ManualCacheStore;
pub use memory::InMemoryCacheTransport;
pub use read::{CacheRead, CacheSource};
pub use read_through::{AllProductsFetcher, ProductByIdFetcher, ReadThroughCache, StorageFetcher};
pub use traits::{decode_value, encode_value, CacheStats, CacheTransport};
