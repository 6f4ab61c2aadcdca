//! Caching utilities for sigres

use crate::platform::cipher::CipherProgram;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Cipher programs keyed by absolute player script URL
pub type ProgramCache = Cache<String, Arc<CipherProgram>>;

/// Create a new async cache with TTL and max capacity
pub fn new_async_cache_with_capacity<K, V>(ttl: Duration, max_capacity: u64) -> Cache<K, V>
where
    K: std::hash::Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    Cache::builder()
        .time_to_live(ttl)
        .max_capacity(max_capacity)
        .build()
}

/// Create a program cache
pub fn new_program_cache(ttl: Duration, max_capacity: u64) -> ProgramCache {
    new_async_cache_with_capacity(ttl, max_capacity)
}
