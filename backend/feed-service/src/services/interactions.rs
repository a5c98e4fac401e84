//! Interaction counters: reactions, engagement counts, and affinity.
//!
//! Count mutations go through the store's atomic increment primitives;
//! concurrent reactions from different viewers never lose an increment.
//! The only read-before-write is on a viewer's own reaction record, which
//! has a single writer by construction.

use std::sync::Arc;
use tracing::debug;

use crate::error::Result;
use crate::models::REACTION_NONE;
use crate::services::ranking::AffinitySignal;
use crate::store::{keys, FeedStore};

/// Engagement counters that only move when the actor is not the author.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InteractionKind {
    Comment,
    Share,
}

impl InteractionKind {
    fn counter_field(self) -> &'static str {
        match self {
            InteractionKind::Comment => "commentCount",
            InteractionKind::Share => "shareCount",
        }
    }
}

/// What a reaction write did to the stored record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReactionOutcome {
    Added,
    Changed,
    Removed,
    Unchanged,
}

pub struct InteractionCounters {
    store: Arc<dyn FeedStore>,
}

impl InteractionCounters {
    pub fn new(store: Arc<dyn FeedStore>) -> Self {
        Self { store }
    }

    /// Apply a reaction transition for one viewer on one post.
    ///
    /// none→nonzero: record + likeCount +1 (+affinity when not the author).
    /// nonzero→nonzero: record overwritten, counts untouched.
    /// nonzero→none: record removed + likeCount −1.
    /// same→same: no-op.
    pub async fn set_reaction(
        &self,
        post_id: i64,
        author_id: i64,
        user_id: i64,
        reaction_type: i32,
    ) -> Result<ReactionOutcome> {
        let reactions_key = keys::reactions(post_id);
        let field = user_id.to_string();

        let previous = self
            .store
            .hash_get(&reactions_key, &field)
            .await?
            .and_then(|v| v.parse::<i32>().ok())
            .unwrap_or(REACTION_NONE);

        if previous == reaction_type {
            return Ok(ReactionOutcome::Unchanged);
        }

        let outcome = if previous == REACTION_NONE {
            self.store
                .hash_set(&reactions_key, &[(field.as_str(), reaction_type.to_string())])
                .await?;
            self.store
                .hash_increment(&keys::snapshot(post_id), "likeCount", 1)
                .await?;
            self.bump_affinity(user_id, author_id).await?;
            ReactionOutcome::Added
        } else if reaction_type == REACTION_NONE {
            self.store.hash_remove(&reactions_key, &field).await?;
            self.decrement_like_count(post_id).await?;
            ReactionOutcome::Removed
        } else {
            self.store
                .hash_set(&reactions_key, &[(field.as_str(), reaction_type.to_string())])
                .await?;
            ReactionOutcome::Changed
        };

        debug!(post_id, user_id, reaction_type, ?outcome, "Reaction recorded");
        Ok(outcome)
    }

    /// Current reaction of a viewer on a post, `REACTION_NONE` by default.
    pub async fn reaction_of(&self, post_id: i64, user_id: i64) -> Result<i32> {
        Ok(self
            .store
            .hash_get(&keys::reactions(post_id), &user_id.to_string())
            .await?
            .and_then(|v| v.parse::<i32>().ok())
            .unwrap_or(REACTION_NONE))
    }

    /// Bump a comment/share counter unless the actor is the post's author.
    /// Self-interactions must not inflate one's own ranking signal.
    /// Returns whether a count was written.
    pub async fn increment_if_not_self(
        &self,
        kind: InteractionKind,
        post_id: i64,
        actor_id: i64,
        author_id: i64,
    ) -> Result<bool> {
        if actor_id == author_id {
            debug!(post_id, actor_id, ?kind, "Self-interaction ignored");
            return Ok(false);
        }

        self.store
            .hash_increment(&keys::snapshot(post_id), kind.counter_field(), 1)
            .await?;
        self.bump_affinity(actor_id, author_id).await?;
        Ok(true)
    }

    /// Follow creates the affinity counter so the pair starts at a known
    /// (small) value instead of the unknown-author penalty.
    pub async fn record_follow(&self, follower_id: i64, followee_id: i64) -> Result<()> {
        self.store
            .set(&keys::affinity(follower_id, followee_id), "1")
            .await
    }

    /// Affinity is scoped to the follow relationship; unfollow deletes it.
    pub async fn record_unfollow(&self, follower_id: i64, followee_id: i64) -> Result<()> {
        self.store
            .delete(&keys::affinity(follower_id, followee_id))
            .await
    }

    /// Read the viewer→author affinity signal.
    pub async fn affinity(&self, viewer_id: i64, author_id: i64) -> Result<AffinitySignal> {
        if viewer_id == author_id {
            return Ok(AffinitySignal::Own);
        }

        let signal = match self
            .store
            .get(&keys::affinity(viewer_id, author_id))
            .await?
            .and_then(|v| v.parse::<i64>().ok())
        {
            Some(count) if count >= 0 => AffinitySignal::Known(count),
            _ => AffinitySignal::Unknown,
        };
        Ok(signal)
    }

    async fn bump_affinity(&self, actor_id: i64, author_id: i64) -> Result<()> {
        if actor_id == author_id {
            return Ok(());
        }
        self.store
            .increment(&keys::affinity(actor_id, author_id), 1)
            .await?;
        Ok(())
    }

    /// Guarded decrement; the counter never goes below zero even if the
    /// snapshot was rebuilt while reactions were in flight.
    async fn decrement_like_count(&self, post_id: i64) -> Result<()> {
        let key = keys::snapshot(post_id);
        let current = self
            .store
            .hash_get(&key, "likeCount")
            .await?
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(0);
        if current > 0 {
            self.store.hash_increment(&key, "likeCount", -1).await?;
        }
        Ok(())
    }
}
