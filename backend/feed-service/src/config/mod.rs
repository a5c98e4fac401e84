use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    #[serde(default)]
    pub kafka: KafkaConfig,
    #[serde(default)]
    pub feed: FeedConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub env: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaConfig {
    #[serde(default = "default_kafka_bootstrap_servers")]
    pub bootstrap_servers: String,
    #[serde(default = "default_kafka_group_id")]
    pub group_id: String,
    #[serde(default = "default_kafka_topic")]
    pub topic: String,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: default_kafka_bootstrap_servers(),
            group_id: default_kafka_group_id(),
            topic: default_kafka_topic(),
        }
    }
}

/// Tunables for the fan-out indexer and feed assembler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Candidates pulled from the feed index before re-scoring
    #[serde(default = "default_candidate_pool_size")]
    pub candidate_pool_size: usize,
    /// Retention of denormalized post snapshots, seconds
    #[serde(default = "default_snapshot_ttl_secs")]
    pub snapshot_ttl_secs: u64,
    /// Assembled-page cache TTL, seconds
    #[serde(default = "default_page_cache_ttl_secs")]
    pub page_cache_ttl_secs: u64,
    /// Whether authors see their own posts in their feed
    #[serde(default = "default_include_author")]
    pub include_author_in_fanout: bool,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            candidate_pool_size: default_candidate_pool_size(),
            snapshot_ttl_secs: default_snapshot_ttl_secs(),
            page_cache_ttl_secs: default_page_cache_ttl_secs(),
            include_author_in_fanout: default_include_author(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            app: AppConfig {
                env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                port: std::env::var("APP_PORT")
                    .unwrap_or_else(|_| "8000".to_string())
                    .parse()
                    .context("invalid APP_PORT")?,
                log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .context("invalid DATABASE_MAX_CONNECTIONS")?,
            },
            redis: RedisConfig {
                url: std::env::var("REDIS_URL")
                    .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            },
            kafka: KafkaConfig {
                bootstrap_servers: std::env::var("KAFKA_BOOTSTRAP_SERVERS")
                    .unwrap_or_else(|_| default_kafka_bootstrap_servers()),
                group_id: std::env::var("KAFKA_GROUP_ID")
                    .unwrap_or_else(|_| default_kafka_group_id()),
                topic: std::env::var("KAFKA_FEED_TOPIC").unwrap_or_else(|_| default_kafka_topic()),
            },
            feed: FeedConfig {
                candidate_pool_size: std::env::var("FEED_CANDIDATE_POOL_SIZE")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_else(default_candidate_pool_size),
                snapshot_ttl_secs: std::env::var("FEED_SNAPSHOT_TTL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_else(default_snapshot_ttl_secs),
                page_cache_ttl_secs: std::env::var("FEED_PAGE_CACHE_TTL_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_else(default_page_cache_ttl_secs),
                include_author_in_fanout: std::env::var("FEED_INCLUDE_AUTHOR")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_else(default_include_author),
            },
        })
    }
}

fn default_kafka_bootstrap_servers() -> String {
    "localhost:9092".to_string()
}

fn default_kafka_group_id() -> String {
    "feed-service-group".to_string()
}

fn default_kafka_topic() -> String {
    "pulse.feed.events".to_string()
}

fn default_candidate_pool_size() -> usize {
    100
}

fn default_snapshot_ttl_secs() -> u64 {
    // 7 days
    604_800
}

fn default_page_cache_ttl_secs() -> u64 {
    15
}

fn default_include_author() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_config_defaults() {
        let cfg = FeedConfig::default();
        assert_eq!(cfg.candidate_pool_size, 100);
        assert_eq!(cfg.snapshot_ttl_secs, 604_800);
        assert_eq!(cfg.page_cache_ttl_secs, 15);
        assert!(cfg.include_author_in_fanout);
    }
}
