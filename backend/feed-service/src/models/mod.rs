//! Wire models and the cached post snapshot.
//!
//! `PostSnapshot` is the denormalized projection the feed works from: it is
//! written by the fan-out indexer as a Redis hash and read back during feed
//! assembly without touching the relational database. The codec here owns
//! the hash field layout; counters are separate fields so the interaction
//! counter service can HINCRBY them in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{AppError, Result};

/// Reaction type value meaning "no reaction" / removed.
pub const REACTION_NONE: i32 = 0;

/// Maximum characters kept of a post body in the snapshot.
pub const SNIPPET_MAX_CHARS: usize = 200;

/// Snapshot hash counter fields, initialized to zero only when absent.
pub const COUNTER_FIELDS: [&str; 3] = ["likeCount", "commentCount", "shareCount"];

/// Parent-post reference recorded when a snapshot describes a share.
#[derive(Debug, Clone, PartialEq)]
pub struct ParentRef {
    pub post_id: i64,
    pub author_id: i64,
    pub author_name: String,
    pub author_avatar_url: String,
    pub content_snippet: String,
}

/// Denormalized per-post record cached for feed reads.
#[derive(Debug, Clone)]
pub struct PostSnapshot {
    pub post_id: i64,
    pub author_id: i64,
    pub author_name: String,
    pub author_avatar_url: String,
    pub content_snippet: String,
    pub created_at: DateTime<Utc>,
    pub media_urls: Vec<String>,
    pub like_count: i64,
    pub comment_count: i64,
    pub share_count: i64,
    pub parent: Option<ParentRef>,
}

impl PostSnapshot {
    pub fn has_media(&self) -> bool {
        !self.media_urls.is_empty()
    }

    /// Display fields written on every post event (idempotent overwrite).
    /// Counter fields are intentionally absent; see [`COUNTER_FIELDS`].
    pub fn display_fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("authorId", self.author_id.to_string()),
            ("authorName", self.author_name.clone()),
            ("authorAvatarUrl", self.author_avatar_url.clone()),
            ("content", truncate_snippet(&self.content_snippet)),
            ("createdAt", self.created_at.to_rfc3339()),
            ("mediaUrls", join_media_urls(&self.media_urls)),
        ];
        if let Some(parent) = &self.parent {
            fields.push(("parentPostId", parent.post_id.to_string()));
            fields.push(("parentAuthorId", parent.author_id.to_string()));
            fields.push(("parentAuthorName", parent.author_name.clone()));
            fields.push(("parentAuthorAvatarUrl", parent.author_avatar_url.clone()));
            fields.push((
                "parentContentSnippet",
                truncate_snippet(&parent.content_snippet),
            ));
        }
        fields
    }

    /// Rebuild a snapshot from its hash fields.
    ///
    /// Author id and a parsable `createdAt` are mandatory; everything else
    /// degrades to an empty/zero value so one corrupt field does not hide
    /// the post. Counter fields never go below zero.
    pub fn from_hash(post_id: i64, hash: &HashMap<String, String>) -> Result<Self> {
        let author_id = hash
            .get("authorId")
            .and_then(|v| v.parse::<i64>().ok())
            .ok_or_else(|| {
                AppError::DataIntegrity(format!("post {post_id}: missing or bad authorId"))
            })?;

        let created_at = hash
            .get("createdAt")
            .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| {
                AppError::DataIntegrity(format!("post {post_id}: missing or bad createdAt"))
            })?;

        let parent = match hash.get("parentPostId").and_then(|v| v.parse::<i64>().ok()) {
            Some(parent_post_id) => Some(ParentRef {
                post_id: parent_post_id,
                author_id: field_i64(hash, "parentAuthorId"),
                author_name: field_string(hash, "parentAuthorName"),
                author_avatar_url: field_string(hash, "parentAuthorAvatarUrl"),
                content_snippet: field_string(hash, "parentContentSnippet"),
            }),
            None => None,
        };

        Ok(Self {
            post_id,
            author_id,
            author_name: field_string(hash, "authorName"),
            author_avatar_url: field_string(hash, "authorAvatarUrl"),
            content_snippet: field_string(hash, "content"),
            created_at,
            media_urls: split_media_urls(hash.get("mediaUrls").map(String::as_str).unwrap_or("")),
            like_count: field_i64(hash, "likeCount").max(0),
            comment_count: field_i64(hash, "commentCount").max(0),
            share_count: field_i64(hash, "shareCount").max(0),
            parent,
        })
    }
}

fn field_string(hash: &HashMap<String, String>, field: &str) -> String {
    hash.get(field).cloned().unwrap_or_default()
}

fn field_i64(hash: &HashMap<String, String>, field: &str) -> i64 {
    hash.get(field).and_then(|v| v.parse().ok()).unwrap_or(0)
}

/// Truncate to [`SNIPPET_MAX_CHARS`] characters without splitting a char.
pub fn truncate_snippet(content: &str) -> String {
    content.chars().take(SNIPPET_MAX_CHARS).collect()
}

pub fn join_media_urls(urls: &[String]) -> String {
    urls.iter()
        .filter(|u| !u.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join(",")
}

pub fn split_media_urls(csv: &str) -> Vec<String> {
    csv.split(',')
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// One ranked entry of an assembled feed page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    pub post_id: i64,
    pub author_id: i64,
    pub author_name: String,
    pub author_avatar_url: String,
    pub content_snippet: String,
    #[serde(default)]
    pub media_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub like_count: i64,
    pub comment_count: i64,
    pub share_count: i64,
    pub rank_score: f64,
    pub my_reaction_type: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_post_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_author_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_author_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_author_avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_content_snippet: Option<String>,
}

impl FeedItem {
    pub fn from_snapshot(snapshot: &PostSnapshot, rank_score: f64, my_reaction_type: i32) -> Self {
        Self {
            post_id: snapshot.post_id,
            author_id: snapshot.author_id,
            author_name: snapshot.author_name.clone(),
            author_avatar_url: snapshot.author_avatar_url.clone(),
            content_snippet: snapshot.content_snippet.clone(),
            media_urls: snapshot.media_urls.clone(),
            created_at: snapshot.created_at,
            like_count: snapshot.like_count,
            comment_count: snapshot.comment_count,
            share_count: snapshot.share_count,
            rank_score,
            my_reaction_type,
            parent_post_id: snapshot.parent.as_ref().map(|p| p.post_id),
            parent_author_id: snapshot.parent.as_ref().map(|p| p.author_id),
            parent_author_name: snapshot.parent.as_ref().map(|p| p.author_name.clone()),
            parent_author_avatar_url: snapshot
                .parent
                .as_ref()
                .map(|p| p.author_avatar_url.clone()),
            parent_content_snippet: snapshot.parent.as_ref().map(|p| p.content_snippet.clone()),
        }
    }
}

/// Continuation token: exclusive lower bound for the next page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cursor {
    pub rank_score: f64,
    pub post_id: i64,
    /// `createdAt` of the first item on the page that produced this cursor;
    /// clients pass it back as `lastPostTime` for the session-recency pass.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_date_time: Option<DateTime<Utc>>,
}

/// Assembled feed response page.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedPage {
    pub items: Vec<FeedItem>,
    pub next_cursor: Option<Cursor>,
}

impl FeedPage {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            next_cursor: None,
        }
    }
}
