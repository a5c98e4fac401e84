//! Redis-backed [`FeedStore`].
//!
//! One multiplexed `ConnectionManager` shared by all callers; every
//! operation clones the manager handle, which is the supported way to issue
//! concurrent commands over it.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use super::FeedStore;
use crate::error::{AppError, Result};

#[derive(Clone)]
pub struct RedisFeedStore {
    client: Arc<ConnectionManager>,
}

impl RedisFeedStore {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| AppError::Store(format!("failed to create Redis client: {e}")))?;

        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| AppError::Store(format!("failed to create Redis connection: {e}")))?;

        Ok(Self {
            client: Arc::new(manager),
        })
    }

    fn conn(&self) -> ConnectionManager {
        self.client.as_ref().clone()
    }
}

fn store_err(op: &str, key: &str, e: redis::RedisError) -> AppError {
    warn!("Redis {} failed for {}: {}", op, key, e);
    AppError::Store(format!("{op} {key}: {e}"))
}

#[async_trait]
impl FeedStore for RedisFeedStore {
    async fn hash_set(&self, key: &str, fields: &[(&str, String)]) -> Result<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut cmd = redis::cmd("HSET");
        cmd.arg(key);
        for (field, value) in fields {
            cmd.arg(*field).arg(value);
        }
        cmd.query_async::<_, ()>(&mut self.conn())
            .await
            .map_err(|e| store_err("HSET", key, e))
    }

    async fn hash_set_if_absent(&self, key: &str, field: &str, value: &str) -> Result<bool> {
        redis::cmd("HSETNX")
            .arg(key)
            .arg(field)
            .arg(value)
            .query_async(&mut self.conn())
            .await
            .map_err(|e| store_err("HSETNX", key, e))
    }

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>> {
        redis::cmd("HGET")
            .arg(key)
            .arg(field)
            .query_async(&mut self.conn())
            .await
            .map_err(|e| store_err("HGET", key, e))
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>> {
        redis::cmd("HGETALL")
            .arg(key)
            .query_async(&mut self.conn())
            .await
            .map_err(|e| store_err("HGETALL", key, e))
    }

    async fn hash_increment(&self, key: &str, field: &str, delta: i64) -> Result<i64> {
        redis::cmd("HINCRBY")
            .arg(key)
            .arg(field)
            .arg(delta)
            .query_async(&mut self.conn())
            .await
            .map_err(|e| store_err("HINCRBY", key, e))
    }

    async fn hash_remove(&self, key: &str, field: &str) -> Result<()> {
        redis::cmd("HDEL")
            .arg(key)
            .arg(field)
            .query_async::<_, ()>(&mut self.conn())
            .await
            .map_err(|e| store_err("HDEL", key, e))
    }

    async fn sorted_set_add(&self, key: &str, member: &str, score: f64) -> Result<()> {
        redis::cmd("ZADD")
            .arg(key)
            .arg(score)
            .arg(member)
            .query_async::<_, ()>(&mut self.conn())
            .await
            .map_err(|e| store_err("ZADD", key, e))
    }

    async fn sorted_set_rev_range(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>> {
        redis::cmd("ZREVRANGE")
            .arg(key)
            .arg(start)
            .arg(stop)
            .query_async(&mut self.conn())
            .await
            .map_err(|e| store_err("ZREVRANGE", key, e))
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        redis::cmd("GET")
            .arg(key)
            .query_async(&mut self.conn())
            .await
            .map_err(|e| store_err("GET", key, e))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .query_async::<_, ()>(&mut self.conn())
            .await
            .map_err(|e| store_err("SET", key, e))
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        redis::cmd("SETEX")
            .arg(key)
            .arg(ttl.as_secs())
            .arg(value)
            .query_async::<_, ()>(&mut self.conn())
            .await
            .map_err(|e| store_err("SETEX", key, e))
    }

    async fn increment(&self, key: &str, delta: i64) -> Result<i64> {
        redis::cmd("INCRBY")
            .arg(key)
            .arg(delta)
            .query_async(&mut self.conn())
            .await
            .map_err(|e| store_err("INCRBY", key, e))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        redis::cmd("DEL")
            .arg(key)
            .query_async::<_, ()>(&mut self.conn())
            .await
            .map_err(|e| store_err("DEL", key, e))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        redis::cmd("EXPIRE")
            .arg(key)
            .arg(ttl.as_secs() as i64)
            .query_async::<_, ()>(&mut self.conn())
            .await
            .map_err(|e| store_err("EXPIRE", key, e))
    }

    async fn ping(&self) -> Result<()> {
        redis::cmd("PING")
            .query_async::<_, String>(&mut self.conn())
            .await
            .map_err(|e| store_err("PING", "-", e))?;
        Ok(())
    }
}
