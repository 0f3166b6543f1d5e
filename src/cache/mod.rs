//! Bounded in-process cache with LRU eviction and per-entry TTL.

pub mod lru;

pub use lru::LruCache;
