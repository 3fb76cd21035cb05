//! Read results that record where the value came from.

/// Where a cache-aside read was served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
    /// Served from a cache entry; the record store was not called.
    Cache,
    /// Loaded from the record store and written back to the cache.
    Storage,
}

/// Result of a cache-aside read.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRead<T> {
    value: T,
    source: CacheSource,
}

impl<T> CacheRead<T> {
    pub fn from_cache(value: T) -> Self {
        Self {
            value,
            source: CacheSource::Cache,
        }
    }

    pub fn from_storage(value: T) -> Self {
        Self {
            value,
            source: CacheSource::Storage,
        }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn source(&self) -> CacheSource {
        self.source
    }

    pub fn was_cache_hit(&self) -> bool {
        self.source == CacheSource::Cache
    }

    pub fn was_cache_miss(&self) -> bool {
        self.source == CacheSource::Storage
    }

    /// Transform the value, keeping the source.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> CacheRead<U> {
        CacheRead {
            value: f(self.value),
            source: self.source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_flags() {
        let hit = CacheRead::from_cache(1);
        assert!(hit.was_cache_hit());
        assert!(!hit.was_cache_miss());

        let miss = CacheRead::from_storage("a").map(str::len);
        assert!(miss.was_cache_miss());
        assert_eq!(miss.into_value(), 1);
    }
}
