//! Feed assembler: the read path of the feed.
//!
//! A request pulls a bounded candidate pool from the viewer's feed index,
//! hydrates snapshots, re-scores them with the ranking strategy, and pages
//! through the sorted result with an exclusive cursor. Assembled pages are
//! cached for a few seconds to absorb scroll bursts.
//!
//! The feed is best-effort: broken candidates are dropped one by one, and
//! any top-level failure collapses to an empty page so the endpoint never
//! turns an internal error into a client error.

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::clients::PostArchive;
use crate::config::FeedConfig;
use crate::error::Result;
use crate::metrics;
use crate::models::{
    Cursor, FeedItem, FeedPage, ParentRef, PostSnapshot, REACTION_NONE, COUNTER_FIELDS,
};
use crate::services::interactions::InteractionCounters;
use crate::services::ranking::{RankingStrategy, ViewerContext};
use crate::store::{keys, FeedStore};

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

/// Subtracted from the last emitted score to form the next cursor bound.
const CURSOR_EPSILON: f64 = 0.01;

/// Decoded read-request parameters.
#[derive(Debug, Clone, Default)]
pub struct FeedQuery {
    /// Exclusive lower bound from the previous page, if any.
    pub cursor: Option<Cursor>,
    /// Posts created strictly after this instant bypass the cursor filter,
    /// so a returning session sees new content first.
    pub session_boundary: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

pub struct FeedAssembler {
    store: Arc<dyn FeedStore>,
    counters: Arc<InteractionCounters>,
    ranking: Arc<dyn RankingStrategy>,
    archive: Option<Arc<dyn PostArchive>>,
    config: FeedConfig,
}

impl FeedAssembler {
    pub fn new(
        store: Arc<dyn FeedStore>,
        counters: Arc<InteractionCounters>,
        ranking: Arc<dyn RankingStrategy>,
        archive: Option<Arc<dyn PostArchive>>,
        config: FeedConfig,
    ) -> Self {
        Self {
            store,
            counters,
            ranking,
            archive,
            config,
        }
    }

    /// Assemble one feed page. Never fails: any internal error degrades to
    /// an empty page with no cursor.
    pub async fn get_feed(&self, viewer_id: i64, query: FeedQuery) -> FeedPage {
        match self.assemble(viewer_id, &query).await {
            Ok(page) => page,
            Err(e) => {
                warn!(viewer_id, error = %e, "Feed assembly failed, returning empty page");
                FeedPage::empty()
            }
        }
    }

    async fn assemble(&self, viewer_id: i64, query: &FeedQuery) -> Result<FeedPage> {
        let limit = clamp_limit(query.limit);
        let cursor = query.cursor.clone();

        let cache_key = keys::page(
            viewer_id,
            cursor.as_ref().map(|c| c.rank_score),
            cursor.as_ref().map(|c| c.post_id),
            limit,
        );
        if let Some(cached) = self.store.get(&cache_key).await? {
            match serde_json::from_str::<FeedPage>(&cached) {
                Ok(page) => {
                    metrics::record_page_cache("hit");
                    debug!(viewer_id, %cache_key, "Page cache hit");
                    return Ok(page);
                }
                Err(e) => {
                    // Treat an undecodable cached page as a miss.
                    debug!(viewer_id, %cache_key, error = %e, "Dropping unreadable cached page");
                }
            }
        }
        metrics::record_page_cache("miss");

        let candidate_ids = self
            .store
            .sorted_set_rev_range(
                &keys::feed_index(viewer_id),
                0,
                self.config.candidate_pool_size as isize - 1,
            )
            .await?;

        let now = Utc::now();
        let mut scored: Vec<FeedItem> = Vec::with_capacity(candidate_ids.len());
        for candidate in &candidate_ids {
            match self.hydrate_candidate(viewer_id, candidate, now).await {
                Ok(Some(item)) => scored.push(item),
                Ok(None) => {
                    metrics::record_candidate_skipped();
                }
                Err(e) => {
                    metrics::record_candidate_skipped();
                    debug!(viewer_id, candidate = %candidate, error = %e, "Skipping feed candidate");
                }
            }
        }

        if scored.is_empty() {
            return Ok(FeedPage::empty());
        }

        scored.sort_by(|a, b| {
            b.rank_score
                .partial_cmp(&a.rank_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.post_id.cmp(&a.post_id))
        });

        let items = apply_cursor_and_limit(&scored, cursor.as_ref(), query.session_boundary, limit);
        let next_cursor = build_next_cursor(&items);
        let page = FeedPage { items, next_cursor };

        // Best-effort: a failed page-cache write must not fail the request.
        match serde_json::to_string(&page) {
            Ok(json) => {
                if let Err(e) = self
                    .store
                    .set_with_ttl(
                        &cache_key,
                        &json,
                        Duration::from_secs(self.config.page_cache_ttl_secs),
                    )
                    .await
                {
                    warn!(viewer_id, %cache_key, error = %e, "Page cache write failed");
                }
            }
            Err(e) => warn!(viewer_id, error = %e, "Page serialization failed"),
        }

        Ok(page)
    }

    /// Hydrate and score one candidate. `Ok(None)` means skip silently:
    /// missing snapshot (and no archive row), unparsable member, or an
    /// expired reference left behind in the index.
    async fn hydrate_candidate(
        &self,
        viewer_id: i64,
        candidate: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<FeedItem>> {
        let Ok(post_id) = candidate.parse::<i64>() else {
            return Ok(None);
        };

        let hash = self.store.hash_get_all(&keys::snapshot(post_id)).await?;
        let snapshot = if hash.is_empty() {
            match self.rehydrate(post_id).await? {
                Some(snapshot) => snapshot,
                None => return Ok(None),
            }
        } else {
            PostSnapshot::from_hash(post_id, &hash)?
        };

        // Display-only; any failure falls back to "no reaction".
        let my_reaction = self
            .counters
            .reaction_of(post_id, viewer_id)
            .await
            .unwrap_or(REACTION_NONE);

        let affinity = self.counters.affinity(viewer_id, snapshot.author_id).await?;
        let viewer = ViewerContext {
            viewer_id,
            now,
            affinity,
        };
        let score = self.ranking.score(&snapshot, &viewer);

        Ok(Some(FeedItem::from_snapshot(&snapshot, score, my_reaction)))
    }

    /// Rebuild an expired snapshot from the relational source of truth.
    ///
    /// Display fields are overwritten; counter fields are seeded with
    /// HSETNX so any counters still live in the cache win over the
    /// relational counts.
    async fn rehydrate(&self, post_id: i64) -> Result<Option<PostSnapshot>> {
        let Some(archive) = &self.archive else {
            return Ok(None);
        };
        let Some(post) = archive.load_post(post_id).await? else {
            return Ok(None);
        };

        let parent = match post.parent_post_id {
            Some(parent_id) => archive.load_post(parent_id).await?.map(|p| ParentRef {
                post_id: p.post_id,
                author_id: p.author_id,
                author_name: String::new(),
                author_avatar_url: String::new(),
                content_snippet: crate::models::truncate_snippet(&p.content),
            }),
            None => None,
        };

        let snapshot = PostSnapshot {
            post_id: post.post_id,
            author_id: post.author_id,
            author_name: String::new(),
            author_avatar_url: String::new(),
            content_snippet: crate::models::truncate_snippet(&post.content),
            created_at: post.created_at,
            media_urls: post.media_urls,
            like_count: post.like_count.max(0),
            comment_count: post.comment_count.max(0),
            share_count: post.share_count.max(0),
            parent,
        };

        let key = keys::snapshot(post_id);
        self.store.hash_set(&key, &snapshot.display_fields()).await?;
        for (field, count) in COUNTER_FIELDS.iter().zip([
            snapshot.like_count,
            snapshot.comment_count,
            snapshot.share_count,
        ]) {
            self.store
                .hash_set_if_absent(&key, field, &count.to_string())
                .await?;
        }
        self.store
            .expire(&key, Duration::from_secs(self.config.snapshot_ttl_secs))
            .await?;

        debug!(post_id, "Snapshot rehydrated from relational archive");

        // Re-read counters: cached values win over the relational seed.
        let hash = self.store.hash_get_all(&key).await?;
        Ok(Some(PostSnapshot::from_hash(post_id, &hash)?))
    }
}

/// `0`/absent fall back to the default page size; anything larger than the
/// maximum is clamped down to it.
pub(crate) fn clamp_limit(limit: Option<u32>) -> usize {
    match limit {
        None | Some(0) => DEFAULT_PAGE_SIZE,
        Some(n) => (n as usize).min(MAX_PAGE_SIZE),
    }
}

/// Walk the sorted candidates and emit up to `limit` items.
///
/// Pass one admits posts created strictly after the session boundary,
/// bypassing the cursor. Pass two fills the remaining slots with items
/// strictly below the cursor bound: an item is skipped when its score is
/// at or above the cursor score, or ties the score with a post id at or
/// below the cursor's.
pub(crate) fn apply_cursor_and_limit(
    sorted: &[FeedItem],
    cursor: Option<&Cursor>,
    session_boundary: Option<DateTime<Utc>>,
    limit: usize,
) -> Vec<FeedItem> {
    let mut page: Vec<FeedItem> = Vec::with_capacity(limit);
    let mut emitted: HashSet<i64> = HashSet::new();

    if let Some(boundary) = session_boundary {
        for item in sorted {
            if page.len() >= limit {
                break;
            }
            if item.created_at > boundary {
                emitted.insert(item.post_id);
                page.push(item.clone());
            }
        }
    }

    for item in sorted {
        if page.len() >= limit {
            break;
        }
        if emitted.contains(&item.post_id) {
            continue;
        }
        if let Some(cursor) = cursor {
            if item.rank_score >= cursor.rank_score
                || (item.rank_score == cursor.rank_score && item.post_id <= cursor.post_id)
            {
                continue;
            }
        }
        page.push(item.clone());
    }

    page
}

/// Cursor for the page after `items`: the last item's score nudged down by
/// epsilon, its post id, and the first item's creation time (the boundary
/// a returning session passes back as `lastPostTime`).
pub(crate) fn build_next_cursor(items: &[FeedItem]) -> Option<Cursor> {
    let last = items.last()?;
    let first = items.first()?;
    Some(Cursor {
        rank_score: last.rank_score - CURSOR_EPSILON,
        post_id: last.post_id,
        last_date_time: Some(first.created_at),
    })
}
