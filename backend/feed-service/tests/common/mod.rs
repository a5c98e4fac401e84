//! Shared fixtures for the integration tests: static collaborator stubs,
//! failure-injecting store decorators, and direct seeding of the cache
//! layout the assembler reads.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use feed_service::clients::{ArchivedPost, PostArchive, SocialGraph, UserDirectory, UserProfile};
use feed_service::config::FeedConfig;
use feed_service::error::{AppError, Result};
use feed_service::models::join_media_urls;
use feed_service::services::{
    EngagementDecayRanking, FanoutIndexer, FeedAssembler, InteractionCounters,
};
use feed_service::store::{FeedStore, MemoryFeedStore};

pub const VIEWER: i64 = 100;

pub fn store() -> Arc<MemoryFeedStore> {
    Arc::new(MemoryFeedStore::new())
}

pub fn counters(store: &Arc<MemoryFeedStore>) -> Arc<InteractionCounters> {
    let store_dyn: Arc<dyn FeedStore> = store.clone();
    Arc::new(InteractionCounters::new(store_dyn))
}

pub fn assembler(store: &Arc<MemoryFeedStore>) -> FeedAssembler {
    assembler_with_archive(store, None)
}

pub fn assembler_with_archive(
    store: &Arc<MemoryFeedStore>,
    archive: Option<Arc<dyn PostArchive>>,
) -> FeedAssembler {
    let store_dyn: Arc<dyn FeedStore> = store.clone();
    FeedAssembler::new(
        store_dyn,
        counters(store),
        Arc::new(EngagementDecayRanking::default()),
        archive,
        FeedConfig::default(),
    )
}

pub fn indexer(
    store: Arc<dyn FeedStore>,
    followers: Vec<i64>,
    users: Vec<(i64, &str)>,
    include_author: bool,
) -> FanoutIndexer {
    FanoutIndexer::new(
        store,
        Arc::new(StaticSocialGraph { followers }),
        Arc::new(StaticUserDirectory::with_users(users)),
        Duration::from_secs(604_800),
        include_author,
    )
}

/// One post seeded straight into the cache layout the assembler reads.
pub struct SeedPost {
    pub post_id: i64,
    pub author_id: i64,
    pub created_at: DateTime<Utc>,
    pub likes: i64,
    pub comments: i64,
    pub shares: i64,
    pub media_urls: Vec<String>,
}

impl SeedPost {
    pub fn new(post_id: i64, author_id: i64, created_at: DateTime<Utc>) -> Self {
        Self {
            post_id,
            author_id,
            created_at,
            likes: 0,
            comments: 0,
            shares: 0,
            media_urls: vec![],
        }
    }

    pub fn likes(mut self, likes: i64) -> Self {
        self.likes = likes;
        self
    }

    pub fn comments(mut self, comments: i64) -> Self {
        self.comments = comments;
        self
    }

    pub fn shares(mut self, shares: i64) -> Self {
        self.shares = shares;
        self
    }

    pub fn media(mut self, url: &str) -> Self {
        self.media_urls.push(url.to_string());
        self
    }
}

/// Write the snapshot hash and the viewer's feed-index entry for a post.
pub async fn seed_post(store: &Arc<MemoryFeedStore>, post: SeedPost) {
    seed_post_for(store, VIEWER, post).await;
}

pub async fn seed_post_for(store: &Arc<MemoryFeedStore>, feed_user: i64, post: SeedPost) {
    let key = format!("post:{}", post.post_id);
    store
        .hash_set(
            &key,
            &[
                ("authorId", post.author_id.to_string()),
                ("authorName", format!("user-{}", post.author_id)),
                ("authorAvatarUrl", String::new()),
                ("content", format!("post {}", post.post_id)),
                ("createdAt", post.created_at.to_rfc3339()),
                ("mediaUrls", join_media_urls(&post.media_urls)),
                ("likeCount", post.likes.to_string()),
                ("commentCount", post.comments.to_string()),
                ("shareCount", post.shares.to_string()),
            ],
        )
        .await
        .unwrap();
    store
        .sorted_set_add(
            &format!("feed:{feed_user}"),
            &post.post_id.to_string(),
            post.created_at.timestamp_millis() as f64,
        )
        .await
        .unwrap();
}

pub struct StaticSocialGraph {
    pub followers: Vec<i64>,
}

#[async_trait]
impl SocialGraph for StaticSocialGraph {
    async fn follower_ids(&self, _author_id: i64) -> Result<Vec<i64>> {
        Ok(self.followers.clone())
    }
}

pub struct StaticUserDirectory {
    profiles: HashMap<i64, UserProfile>,
}

impl StaticUserDirectory {
    pub fn with_users(users: Vec<(i64, &str)>) -> Self {
        Self {
            profiles: users
                .into_iter()
                .map(|(user_id, name)| {
                    (
                        user_id,
                        UserProfile {
                            user_id,
                            display_name: name.to_string(),
                            avatar_url: format!("http://a/{name}.png"),
                        },
                    )
                })
                .collect(),
        }
    }
}

#[async_trait]
impl UserDirectory for StaticUserDirectory {
    async fn profile(&self, user_id: i64) -> Result<Option<UserProfile>> {
        Ok(self.profiles.get(&user_id).cloned())
    }
}

pub struct StaticArchive {
    pub posts: HashMap<i64, ArchivedPost>,
}

#[async_trait]
impl PostArchive for StaticArchive {
    async fn load_post(&self, post_id: i64) -> Result<Option<ArchivedPost>> {
        Ok(self.posts.get(&post_id).cloned())
    }
}

/// A store where every operation fails, for outage resilience tests.
pub struct FailingStore;

macro_rules! fail {
    () => {
        Err(AppError::Store("injected outage".to_string()))
    };
}

#[async_trait]
impl FeedStore for FailingStore {
    async fn hash_set(&self, _key: &str, _fields: &[(&str, String)]) -> Result<()> {
        fail!()
    }
    async fn hash_set_if_absent(&self, _key: &str, _field: &str, _value: &str) -> Result<bool> {
        fail!()
    }
    async fn hash_get(&self, _key: &str, _field: &str) -> Result<Option<String>> {
        fail!()
    }
    async fn hash_get_all(&self, _key: &str) -> Result<HashMap<String, String>> {
        fail!()
    }
    async fn hash_increment(&self, _key: &str, _field: &str, _delta: i64) -> Result<i64> {
        fail!()
    }
    async fn hash_remove(&self, _key: &str, _field: &str) -> Result<()> {
        fail!()
    }
    async fn sorted_set_add(&self, _key: &str, _member: &str, _score: f64) -> Result<()> {
        fail!()
    }
    async fn sorted_set_rev_range(
        &self,
        _key: &str,
        _start: isize,
        _stop: isize,
    ) -> Result<Vec<String>> {
        fail!()
    }
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        fail!()
    }
    async fn set(&self, _key: &str, _value: &str) -> Result<()> {
        fail!()
    }
    async fn set_with_ttl(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<()> {
        fail!()
    }
    async fn increment(&self, _key: &str, _delta: i64) -> Result<i64> {
        fail!()
    }
    async fn delete(&self, _key: &str) -> Result<()> {
        fail!()
    }
    async fn expire(&self, _key: &str, _ttl: Duration) -> Result<()> {
        fail!()
    }
    async fn ping(&self) -> Result<()> {
        fail!()
    }
}

/// Delegates to an inner store but fails sorted-set inserts on the listed
/// keys, for per-follower isolation tests.
pub struct FlakyIndexStore {
    pub inner: Arc<MemoryFeedStore>,
    pub fail_keys: HashSet<String>,
}

#[async_trait]
impl FeedStore for FlakyIndexStore {
    async fn hash_set(&self, key: &str, fields: &[(&str, String)]) -> Result<()> {
        self.inner.hash_set(key, fields).await
    }
    async fn hash_set_if_absent(&self, key: &str, field: &str, value: &str) -> Result<bool> {
        self.inner.hash_set_if_absent(key, field, value).await
    }
    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>> {
        self.inner.hash_get(key, field).await
    }
    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>> {
        self.inner.hash_get_all(key).await
    }
    async fn hash_increment(&self, key: &str, field: &str, delta: i64) -> Result<i64> {
        self.inner.hash_increment(key, field, delta).await
    }
    async fn hash_remove(&self, key: &str, field: &str) -> Result<()> {
        self.inner.hash_remove(key, field).await
    }
    async fn sorted_set_add(&self, key: &str, member: &str, score: f64) -> Result<()> {
        if self.fail_keys.contains(key) {
            return Err(AppError::Store(format!("injected failure for {key}")));
        }
        self.inner.sorted_set_add(key, member, score).await
    }
    async fn sorted_set_rev_range(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>> {
        self.inner.sorted_set_rev_range(key, start, stop).await
    }
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key).await
    }
    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.inner.set(key, value).await
    }
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.inner.set_with_ttl(key, value, ttl).await
    }
    async fn increment(&self, key: &str, delta: i64) -> Result<i64> {
        self.inner.increment(key, delta).await
    }
    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.delete(key).await
    }
    async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        self.inner.expire(key, ttl).await
    }
    async fn ping(&self) -> Result<()> {
        self.inner.ping().await
    }
}
