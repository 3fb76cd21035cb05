//! Cache key scheme.

use stockroom_core::constants::{CACHE_KEY_SEPARATOR, COLLECTION_KEY_SUFFIX, DEFAULT_CACHE_NAMESPACE};
use stockroom_core::ProductId;

/// Renders keys inside one cache namespace.
///
/// Per-record entries live at `<namespace>::<id>` and the full collection
/// at `<namespace>::all`. Both cache strategies use the same keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKeys {
    namespace: String,
}

impl CacheKeys {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn per_id(&self, id: ProductId) -> String {
        format!("{}{}{}", self.namespace, CACHE_KEY_SEPARATOR, id)
    }

    pub fn collection(&self) -> String {
        format!(
            "{}{}{}",
            self.namespace, CACHE_KEY_SEPARATOR, COLLECTION_KEY_SUFFIX
        )
    }

    /// Prefix shared by every key in the namespace.
    pub fn prefix(&self) -> String {
        format!("{}{}", self.namespace, CACHE_KEY_SEPARATOR)
    }
}

impl Default for CacheKeys {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_NAMESPACE)
    }
}
