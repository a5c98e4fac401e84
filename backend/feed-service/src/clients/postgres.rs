use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{ArchivedPost, PostArchive, SocialGraph, UserDirectory, UserProfile};
use crate::error::Result;

/// Follower lists from the relational `follows` table.
#[derive(Clone)]
pub struct PostgresSocialGraph {
    pool: PgPool,
}

impl PostgresSocialGraph {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SocialGraph for PostgresSocialGraph {
    async fn follower_ids(&self, author_id: i64) -> Result<Vec<i64>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT follower_id
            FROM follows
            WHERE followee_id = $1
            "#,
        )
        .bind(author_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}

/// Display profiles from the relational `users` table.
#[derive(Clone)]
pub struct PostgresUserDirectory {
    pool: PgPool,
}

impl PostgresUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PostgresUserDirectory {
    async fn profile(&self, user_id: i64) -> Result<Option<UserProfile>> {
        let row: Option<(i64, String, Option<String>)> = sqlx::query_as(
            r#"
            SELECT id, username, avatar_url
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, username, avatar_url)| UserProfile {
            user_id: id,
            display_name: username,
            avatar_url: avatar_url.unwrap_or_default(),
        }))
    }
}

/// Authoritative post reads for snapshot rehydration.
#[derive(Clone)]
pub struct PostgresPostArchive {
    pool: PgPool,
}

impl PostgresPostArchive {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct PostRow {
    id: i64,
    author_id: i64,
    content: String,
    created_at: DateTime<Utc>,
    like_count: i64,
    comment_count: i64,
    share_count: i64,
    parent_post_id: Option<i64>,
}

#[async_trait]
impl PostArchive for PostgresPostArchive {
    async fn load_post(&self, post_id: i64) -> Result<Option<ArchivedPost>> {
        let row: Option<PostRow> = sqlx::query_as(
            r#"
            SELECT p.id,
                   p.author_id,
                   p.content,
                   p.created_at,
                   (SELECT COUNT(*) FROM post_likes l WHERE l.post_id = p.id) AS like_count,
                   (SELECT COUNT(*) FROM post_comments c WHERE c.post_id = p.id) AS comment_count,
                   p.share_count,
                   p.parent_post_id
            FROM posts p
            WHERE p.id = $1
            "#,
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let media_urls: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT url
            FROM post_media
            WHERE post_id = $1
            ORDER BY id
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(ArchivedPost {
            post_id: row.id,
            author_id: row.author_id,
            content: row.content,
            created_at: row.created_at,
            media_urls,
            like_count: row.like_count,
            comment_count: row.comment_count,
            share_count: row.share_count,
            parent_post_id: row.parent_post_id,
        }))
    }
}
