pub mod clients;
pub mod config;
pub mod consumers;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod services;
pub mod store;

pub use config::Config;
pub use error::{AppError, Result};

// Re-export the feed core
pub use services::{
    AffinitySignal, EngagementDecayRanking, FanoutIndexer, FeedAssembler, FeedQuery,
    InteractionCounters, InteractionKind, RankingStrategy, ViewerContext,
};
pub use store::{FeedStore, MemoryFeedStore, RedisFeedStore};
