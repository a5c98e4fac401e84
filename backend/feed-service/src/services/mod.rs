pub mod assembler;
pub mod fanout;
pub mod interactions;
pub mod ranking;

pub use assembler::{FeedAssembler, FeedQuery, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
pub use fanout::{FanoutIndexer, ParentPostRef, PostEvent};
pub use interactions::{InteractionCounters, InteractionKind, ReactionOutcome};
pub use ranking::{AffinitySignal, EngagementDecayRanking, RankingStrategy, ViewerContext};
