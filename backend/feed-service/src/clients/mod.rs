//! Collaborator interfaces.
//!
//! The feed core consumes the rest of the platform only through these
//! narrow traits: the social graph (follower lists), the user directory
//! (display profiles), and the relational post archive (authoritative
//! fallback reads used to rebuild an expired snapshot). Production
//! implementations read the relational source of truth via sqlx.

mod postgres;

pub use postgres::{PostgresPostArchive, PostgresSocialGraph, PostgresUserDirectory};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;

/// Display fields denormalized into every snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub user_id: i64,
    pub display_name: String,
    pub avatar_url: String,
}

/// Authoritative post row used to repopulate the cache on a full miss.
#[derive(Debug, Clone)]
pub struct ArchivedPost {
    pub post_id: i64,
    pub author_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub media_urls: Vec<String>,
    pub like_count: i64,
    pub comment_count: i64,
    pub share_count: i64,
    pub parent_post_id: Option<i64>,
}

/// Follower-list lookup against the social graph source of truth.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SocialGraph: Send + Sync {
    async fn follower_ids(&self, author_id: i64) -> Result<Vec<i64>>;
}

/// User display-profile lookup.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn profile(&self, user_id: i64) -> Result<Option<UserProfile>>;
}

/// Relational fallback read for cache rehydration.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PostArchive: Send + Sync {
    async fn load_post(&self, post_id: i64) -> Result<Option<ArchivedPost>>;
}
