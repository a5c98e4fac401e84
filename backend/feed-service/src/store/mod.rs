//! Cache-store capability layer.
//!
//! The indexer, counters, and assembler never talk to a concrete client;
//! they receive an `Arc<dyn FeedStore>` exposing exactly the hash,
//! sorted-set, counter, and TTL operations the feed needs. The production
//! implementation is Redis-backed; the in-memory implementation backs the
//! test suite and local development.

mod memory;
mod redis;

pub use self::memory::MemoryFeedStore;
pub use self::redis::RedisFeedStore;

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::Result;

#[async_trait]
pub trait FeedStore: Send + Sync {
    /// HSET: overwrite the given fields of a hash.
    async fn hash_set(&self, key: &str, fields: &[(&str, String)]) -> Result<()>;

    /// HSETNX: set a hash field only when absent. Returns true when written.
    async fn hash_set_if_absent(&self, key: &str, field: &str, value: &str) -> Result<bool>;

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>>;

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>>;

    /// HINCRBY: atomic in-place field increment.
    async fn hash_increment(&self, key: &str, field: &str, delta: i64) -> Result<i64>;

    async fn hash_remove(&self, key: &str, field: &str) -> Result<()>;

    /// ZADD: insert or move a member to the given score.
    async fn sorted_set_add(&self, key: &str, member: &str, score: f64) -> Result<()>;

    /// ZREVRANGE: members by score descending, inclusive index bounds.
    async fn sorted_set_rev_range(&self, key: &str, start: isize, stop: isize)
        -> Result<Vec<String>>;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// INCRBY: atomic counter increment on a string key.
    async fn increment(&self, key: &str, delta: i64) -> Result<i64>;

    async fn delete(&self, key: &str) -> Result<()>;

    async fn expire(&self, key: &str, ttl: Duration) -> Result<()>;

    /// Connection liveness probe.
    async fn ping(&self) -> Result<()>;
}

/// Key layout of everything the feed persists.
///
/// - `post:{id}` → snapshot hash, TTL 7 days
/// - `post:{id}:reactions` → viewer id → reaction type
/// - `feed:{userId}` → sorted set of post id by event time (millis)
/// - `affinity:{actorId},{authorId}` → interaction counter
/// - `page:{userId}:{cursorScore}:{cursorPostId}:{limit}` → cached page JSON
pub mod keys {
    pub fn snapshot(post_id: i64) -> String {
        format!("post:{post_id}")
    }

    pub fn reactions(post_id: i64) -> String {
        format!("post:{post_id}:reactions")
    }

    pub fn feed_index(user_id: i64) -> String {
        format!("feed:{user_id}")
    }

    pub fn affinity(actor_id: i64, author_id: i64) -> String {
        format!("affinity:{actor_id},{author_id}")
    }

    pub fn page(user_id: i64, cursor_score: Option<f64>, cursor_post_id: Option<i64>, limit: usize) -> String {
        let score = cursor_score
            .map(|s| s.to_string())
            .unwrap_or_else(|| "start".to_string());
        let post = cursor_post_id
            .map(|p| p.to_string())
            .unwrap_or_else(|| "start".to_string());
        format!("page:{user_id}:{score}:{post}:{limit}")
    }
}
