//! Result cache adapter. Implements `CachePort` against Redis.

pub mod redis_cache;

pub use redis_cache::RedisCache;
