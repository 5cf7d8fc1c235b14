//! Web object cache subsystem.
//!
//! # Data Flow
//! ```text
//! Connection worker
//!     → lookup(host, path)          read lock, copy payload
//!         hit  → promote entry      write lock, new sequence number
//!         miss → forward to origin  (no lock held)
//!     → insert(host, path, bytes)   write lock, evict LRU until it fits
//! ```
//!
//! # Design Decisions
//! - One cache per process, shared by cloning the handle
//! - Whole-cache reader-writer lock; writers are never starved by readers
//! - Recency is a strictly increasing sequence number, so eviction order
//!   has no ties
//! - Sizes are bounded: objects by `MAX_OBJECT_SIZE`, the cache by
//!   `MAX_CACHE_SIZE`

pub mod store;

pub use store::{CacheRejected, CacheStats, InsertOutcome, ObjectCache};

/// Largest response body, in bytes, that will ever be cached.
pub const MAX_OBJECT_SIZE: usize = 10 * 1024;

/// Upper bound on the sum of all cached object sizes.
pub const MAX_CACHE_SIZE: usize = 1024 * 1024;

/// Identifies a cached response: origin host plus normalized path.
///
/// Matching is exact and case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub host: String,
    pub path: String,
}

impl CacheKey {
    pub fn new(host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            path: path.into(),
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.host, self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_constants() {
        assert_eq!(MAX_OBJECT_SIZE, 10_240);
        assert_eq!(MAX_CACHE_SIZE, 1_048_576);
    }

    #[test]
    fn key_is_case_sensitive() {
        assert_ne!(CacheKey::new("example.com", "/a"), CacheKey::new("Example.com", "/a"));
        assert_ne!(CacheKey::new("example.com", "/a"), CacheKey::new("example.com", "/A"));
        assert_eq!(CacheKey::new("example.com", "/a").to_string(), "example.com/a");
    }
}
