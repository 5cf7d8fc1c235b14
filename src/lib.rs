//! Caching HTTP/1.0 forward proxy library.

pub mod cache;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use cache::{CacheKey, ObjectCache, MAX_CACHE_SIZE, MAX_OBJECT_SIZE};
pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
