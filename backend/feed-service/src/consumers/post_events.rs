//! Kafka consumer for the feed's write path.
//!
//! Listens to post lifecycle, interaction, and follow events and applies
//! them through the fan-out indexer and interaction counters. Processing
//! is fire-and-forget relative to the requests that produced the events:
//! the read path never waits on this loop.
//!
//! Failure policy: a bad or failing message is logged and skipped, never
//! retried synchronously; offsets are committed after processing; consumer
//! errors back off before the next poll.

use chrono::{DateTime, Utc};
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::ClientConfig;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::services::fanout::{FanoutIndexer, ParentPostRef, PostEvent};
use crate::services::interactions::{InteractionCounters, InteractionKind};

#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),
    #[error("deserialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("feed error: {0}")]
    Feed(#[from] crate::error::AppError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum FeedEvent {
    PostCreated(PostCreatedEvent),
    PostShared(PostSharedEvent),
    ReactionSet(ReactionSetEvent),
    CommentCreated(CommentCreatedEvent),
    UserFollowed(FollowEvent),
    UserUnfollowed(FollowEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostCreatedEvent {
    pub post_id: i64,
    pub author_id: i64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub content_snippet: String,
    #[serde(default)]
    pub media_urls: Vec<String>,
}

/// A share is a post event with its own id plus the shared post's
/// reference; it also bumps the parent's share counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostSharedEvent {
    pub post_id: i64,
    pub author_id: i64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub content_snippet: String,
    #[serde(default)]
    pub media_urls: Vec<String>,
    pub parent_post_id: i64,
    pub parent_author_id: i64,
    #[serde(default)]
    pub parent_content_snippet: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionSetEvent {
    pub post_id: i64,
    pub author_id: i64,
    pub user_id: i64,
    pub reaction_type: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentCreatedEvent {
    pub post_id: i64,
    pub author_id: i64,
    pub actor_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowEvent {
    pub follower_id: i64,
    pub followee_id: i64,
}

impl From<PostCreatedEvent> for PostEvent {
    fn from(event: PostCreatedEvent) -> Self {
        PostEvent {
            post_id: event.post_id,
            author_id: event.author_id,
            created_at: event.created_at,
            content_snippet: event.content_snippet,
            media_urls: event.media_urls,
            parent: None,
        }
    }
}

impl From<&PostSharedEvent> for PostEvent {
    fn from(event: &PostSharedEvent) -> Self {
        PostEvent {
            post_id: event.post_id,
            author_id: event.author_id,
            created_at: event.created_at,
            content_snippet: event.content_snippet.clone(),
            media_urls: event.media_urls.clone(),
            parent: Some(ParentPostRef {
                post_id: event.parent_post_id,
                author_id: event.parent_author_id,
                content_snippet: event.parent_content_snippet.clone(),
            }),
        }
    }
}

pub struct FeedEventConsumer {
    consumer: StreamConsumer,
    indexer: Arc<FanoutIndexer>,
    counters: Arc<InteractionCounters>,
}

impl FeedEventConsumer {
    pub fn new(
        bootstrap_servers: &str,
        group_id: &str,
        topic: &str,
        indexer: Arc<FanoutIndexer>,
        counters: Arc<InteractionCounters>,
    ) -> Result<Self, ConsumerError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("group.id", group_id)
            .set("bootstrap.servers", bootstrap_servers)
            .set("enable.auto.commit", "true")
            .set("auto.commit.interval.ms", "5000")
            .set("session.timeout.ms", "30000")
            .set("enable.partition.eof", "false")
            .set("auto.offset.reset", "latest")
            .create()?;

        consumer.subscribe(&[topic])?;

        Ok(Self {
            consumer,
            indexer,
            counters,
        })
    }

    pub async fn start(&self) {
        info!("Starting feed event consumer");

        loop {
            match self.consumer.recv().await {
                Ok(msg) => {
                    if let Some(payload) = msg.payload() {
                        if let Err(e) = self.process_message(payload).await {
                            // Skip and move on; redelivery of the same event
                            // is safe, retry storms are not.
                            error!("Failed to process feed event: {}", e);
                        }
                    }
                    if let Err(e) = self
                        .consumer
                        .commit_message(&msg, rdkafka::consumer::CommitMode::Async)
                    {
                        warn!("Failed to commit offset: {}", e);
                    }
                }
                Err(e) => {
                    error!("Kafka consumer error: {}", e);
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
            }
        }
    }

    async fn process_message(&self, payload: &[u8]) -> Result<(), ConsumerError> {
        let event: FeedEvent = serde_json::from_slice(payload)?;

        match event {
            FeedEvent::PostCreated(event) => {
                self.indexer.handle_post_event(event.into()).await?;
            }
            FeedEvent::PostShared(event) => {
                self.indexer.handle_post_event(PostEvent::from(&event)).await?;
                self.counters
                    .increment_if_not_self(
                        InteractionKind::Share,
                        event.parent_post_id,
                        event.author_id,
                        event.parent_author_id,
                    )
                    .await?;
            }
            FeedEvent::ReactionSet(event) => {
                self.counters
                    .set_reaction(
                        event.post_id,
                        event.author_id,
                        event.user_id,
                        event.reaction_type,
                    )
                    .await?;
            }
            FeedEvent::CommentCreated(event) => {
                self.counters
                    .increment_if_not_self(
                        InteractionKind::Comment,
                        event.post_id,
                        event.actor_id,
                        event.author_id,
                    )
                    .await?;
            }
            FeedEvent::UserFollowed(event) => {
                self.counters
                    .record_follow(event.follower_id, event.followee_id)
                    .await?;
            }
            FeedEvent::UserUnfollowed(event) => {
                self.counters
                    .record_unfollow(event.follower_id, event.followee_id)
                    .await?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_created_event_deserialize() {
        let json = r#"{
            "event_type": "post_created",
            "post_id": 42,
            "author_id": 7,
            "created_at": "2025-06-01T12:00:00Z",
            "content_snippet": "hello",
            "media_urls": ["http://m/1.jpg"]
        }"#;

        let event: FeedEvent = serde_json::from_str(json).unwrap();
        match event {
            FeedEvent::PostCreated(event) => {
                assert_eq!(event.post_id, 42);
                assert_eq!(event.author_id, 7);
                assert_eq!(event.media_urls.len(), 1);
            }
            _ => panic!("expected PostCreated"),
        }
    }

    #[test]
    fn test_post_created_event_deserialize_minimal() {
        let json = r#"{
            "event_type": "post_created",
            "post_id": 42,
            "author_id": 7,
            "created_at": "2025-06-01T12:00:00Z"
        }"#;

        let event: FeedEvent = serde_json::from_str(json).unwrap();
        match event {
            FeedEvent::PostCreated(event) => {
                assert_eq!(event.content_snippet, "");
                assert!(event.media_urls.is_empty());
            }
            _ => panic!("expected PostCreated"),
        }
    }

    #[test]
    fn test_post_shared_event_maps_to_post_event_with_parent() {
        let json = r#"{
            "event_type": "post_shared",
            "post_id": 43,
            "author_id": 8,
            "created_at": "2025-06-01T13:00:00Z",
            "parent_post_id": 42,
            "parent_author_id": 7,
            "parent_content_snippet": "hello"
        }"#;

        let event: FeedEvent = serde_json::from_str(json).unwrap();
        let FeedEvent::PostShared(shared) = event else {
            panic!("expected PostShared");
        };
        let post_event = PostEvent::from(&shared);
        let parent = post_event.parent.expect("share carries a parent ref");
        assert_eq!(parent.post_id, 42);
        assert_eq!(parent.author_id, 7);
    }

    #[test]
    fn test_unknown_event_type_is_an_error() {
        let json = r#"{"event_type": "post_vanished", "post_id": 1}"#;
        assert!(serde_json::from_str::<FeedEvent>(json).is_err());
    }
}
