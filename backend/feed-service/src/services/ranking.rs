//! Pluggable rank scoring.
//!
//! The assembler orders candidates with a [`RankingStrategy`] so the weight
//! constants and decay curve can be swapped and tested in isolation instead
//! of living inside the request handler.

use chrono::{DateTime, Utc};

use crate::models::PostSnapshot;

/// What the viewer's interaction history says about a post's author.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AffinitySignal {
    /// The viewer authored the post; affinity does not apply.
    Own,
    /// Interaction counter present (zero or more interactions).
    Known(i64),
    /// No counter exists. Distinct from `Known(0)`: never-interacted
    /// authors must not outrank rarely-interacted ones.
    Unknown,
}

/// Per-request context a strategy scores against.
#[derive(Debug, Clone)]
pub struct ViewerContext {
    pub viewer_id: i64,
    pub now: DateTime<Utc>,
    pub affinity: AffinitySignal,
}

pub trait RankingStrategy: Send + Sync {
    fn score(&self, snapshot: &PostSnapshot, viewer: &ViewerContext) -> f64;
}

/// Default strategy: exponential recency decay, log-damped engagement,
/// a flat media bonus, and an affinity boost with an unknown-author penalty.
#[derive(Debug, Clone)]
pub struct EngagementDecayRanking {
    pub recency_weight: f64,
    pub engagement_weight: f64,
    pub media_weight: f64,
    pub affinity_weight: f64,
    /// Hours for the recency term to fall to 1/e.
    pub decay_hours: f64,
    pub comment_factor: f64,
    pub share_factor: f64,
    /// Raw boost applied (pre-weight) when no affinity counter exists.
    pub unknown_affinity_penalty: f64,
}

impl Default for EngagementDecayRanking {
    fn default() -> Self {
        Self {
            recency_weight: 0.6,
            engagement_weight: 0.3,
            media_weight: 0.1,
            affinity_weight: 0.2,
            decay_hours: 24.0,
            comment_factor: 0.5,
            share_factor: 0.8,
            unknown_affinity_penalty: -5.0,
        }
    }
}

impl RankingStrategy for EngagementDecayRanking {
    fn score(&self, snapshot: &PostSnapshot, viewer: &ViewerContext) -> f64 {
        let hours_since_created = (viewer.now - snapshot.created_at).num_milliseconds() as f64
            / 3_600_000.0;
        let recency = (-hours_since_created / self.decay_hours).exp();

        let engagement = (1.0 + snapshot.like_count as f64).ln()
            + self.comment_factor * (1.0 + snapshot.comment_count as f64).ln()
            + self.share_factor * (1.0 + snapshot.share_count as f64).ln();

        let media = if snapshot.has_media() { 1.0 } else { 0.0 };

        let interaction_boost = match viewer.affinity {
            AffinitySignal::Own => 0.0,
            AffinitySignal::Known(count) => (1.0 + count.max(0) as f64).ln(),
            AffinitySignal::Unknown => self.unknown_affinity_penalty,
        };

        self.recency_weight * recency
            + self.engagement_weight * engagement
            + self.media_weight * media
            + self.affinity_weight * interaction_boost
    }
}
