//! Response caching: a content-addressed file cache fronted by an in-memory
//! hot cache so repeated lookups within one run skip the filesystem.

pub mod keys;
pub mod store;

pub use keys::RequestFingerprint;
pub use store::FileCache;

use crate::config::Config;
use moka::future::Cache;
use std::sync::Arc;

pub type HotCache = Cache<String, Arc<Vec<u8>>>;

pub fn init_hot_cache(config: &Config) -> HotCache {
    Cache::builder()
        .time_to_live(config.cache_hot_ttl)
        .max_capacity(config.cache_hot_capacity)
        .build()
}
