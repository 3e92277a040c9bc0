// Public API
pub use keys::session_cache_key;
pub use provider::{CacheProvider, InMemoryCacheProvider, RedisCacheProvider};

// Internal modules
mod keys;
mod provider;
