//! Fan-out indexer: the write path of the feed.
//!
//! On every post-created or post-shared event the indexer denormalizes the
//! post into a snapshot hash and appends the post id to each follower's
//! feed index, scored by the event timestamp. Everything here is a
//! cache-only side effect; the relational write already happened upstream.
//!
//! The handler is safe to re-invoke on redelivery: display fields are an
//! idempotent overwrite, counters are initialized with HSETNX, and index
//! membership is a ZADD.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::clients::{SocialGraph, UserDirectory};
use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::{truncate_snippet, ParentRef, PostSnapshot, COUNTER_FIELDS};
use crate::store::{keys, FeedStore};

/// Parent reference carried by a share event.
#[derive(Debug, Clone)]
pub struct ParentPostRef {
    pub post_id: i64,
    pub author_id: i64,
    pub content_snippet: String,
}

/// A post-created or post-shared event as seen by the indexer.
/// Shares are ordinary post events with their own id plus `parent`.
#[derive(Debug, Clone)]
pub struct PostEvent {
    pub post_id: i64,
    pub author_id: i64,
    pub created_at: DateTime<Utc>,
    pub content_snippet: String,
    pub media_urls: Vec<String>,
    pub parent: Option<ParentPostRef>,
}

pub struct FanoutIndexer {
    store: Arc<dyn FeedStore>,
    graph: Arc<dyn SocialGraph>,
    users: Arc<dyn UserDirectory>,
    snapshot_ttl: Duration,
    include_author: bool,
}

impl FanoutIndexer {
    pub fn new(
        store: Arc<dyn FeedStore>,
        graph: Arc<dyn SocialGraph>,
        users: Arc<dyn UserDirectory>,
        snapshot_ttl: Duration,
        include_author: bool,
    ) -> Self {
        Self {
            store,
            graph,
            users,
            snapshot_ttl,
            include_author,
        }
    }

    /// Index one post event: upsert the snapshot, then insert the post into
    /// every follower's feed index. Returns the number of indexes updated.
    ///
    /// Per-follower failures are logged and skipped; the event as a whole
    /// only fails when the author cannot be resolved or the snapshot write
    /// itself fails.
    pub async fn handle_post_event(&self, event: PostEvent) -> Result<usize> {
        let author = self
            .users
            .profile(event.author_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("author {}", event.author_id)))?;

        let parent = match &event.parent {
            Some(parent_ref) => {
                // Best-effort: a missing parent author still leaves a usable
                // share snapshot with empty display fields.
                let parent_author = self
                    .users
                    .profile(parent_ref.author_id)
                    .await
                    .unwrap_or_else(|e| {
                        warn!(
                            parent_author_id = parent_ref.author_id,
                            error = %e,
                            "Parent author lookup failed"
                        );
                        None
                    });
                Some(ParentRef {
                    post_id: parent_ref.post_id,
                    author_id: parent_ref.author_id,
                    author_name: parent_author
                        .as_ref()
                        .map(|p| p.display_name.clone())
                        .unwrap_or_default(),
                    author_avatar_url: parent_author
                        .as_ref()
                        .map(|p| p.avatar_url.clone())
                        .unwrap_or_default(),
                    content_snippet: truncate_snippet(&parent_ref.content_snippet),
                })
            }
            None => None,
        };

        let snapshot = PostSnapshot {
            post_id: event.post_id,
            author_id: event.author_id,
            author_name: author.display_name,
            author_avatar_url: author.avatar_url,
            content_snippet: truncate_snippet(&event.content_snippet),
            created_at: event.created_at,
            media_urls: event.media_urls.clone(),
            like_count: 0,
            comment_count: 0,
            share_count: 0,
            parent,
        };
        self.upsert_snapshot(&snapshot).await?;

        let mut follower_ids = self.graph.follower_ids(event.author_id).await?;
        if self.include_author && !follower_ids.contains(&event.author_id) {
            follower_ids.push(event.author_id);
        }

        let score = event.created_at.timestamp_millis() as f64;
        let member = event.post_id.to_string();
        let mut indexed = 0usize;
        for follower_id in &follower_ids {
            match self
                .store
                .sorted_set_add(&keys::feed_index(*follower_id), &member, score)
                .await
            {
                Ok(()) => {
                    indexed += 1;
                    metrics::record_fanout_entry();
                }
                Err(e) => {
                    metrics::record_fanout_failure();
                    warn!(
                        post_id = event.post_id,
                        follower_id,
                        error = %e,
                        "Feed index insert failed, skipping follower"
                    );
                }
            }
        }

        info!(
            post_id = event.post_id,
            author_id = event.author_id,
            followers = follower_ids.len(),
            indexed,
            "Post fan-out completed"
        );
        Ok(indexed)
    }

    /// Write display fields (overwrite), seed counters only when absent,
    /// and refresh the retention TTL.
    async fn upsert_snapshot(&self, snapshot: &PostSnapshot) -> Result<()> {
        let key = keys::snapshot(snapshot.post_id);
        self.store.hash_set(&key, &snapshot.display_fields()).await?;
        for field in COUNTER_FIELDS {
            self.store.hash_set_if_absent(&key, field, "0").await?;
        }
        self.store.expire(&key, self.snapshot_ttl).await?;
        debug!(post_id = snapshot.post_id, "Snapshot upserted");
        Ok(())
    }
}
