//! Feed assembler end-to-end over the in-memory store: ranking order,
//! exact scores, limit clamping, cursor pagination, session recency,
//! page caching, rehydration, and outage resilience.

mod common;

use chrono::{Duration as ChronoDuration, Utc};
use common::{
    assembler, assembler_with_archive, counters, seed_post, store, SeedPost, StaticArchive,
    FailingStore, VIEWER,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use feed_service::clients::ArchivedPost;
use feed_service::config::FeedConfig;
use feed_service::models::Cursor;
use feed_service::services::{EngagementDecayRanking, FeedAssembler, FeedQuery, InteractionCounters};
use feed_service::store::FeedStore;

fn query(limit: Option<u32>) -> FeedQuery {
    FeedQuery {
        cursor: None,
        session_boundary: None,
        limit,
    }
}

#[tokio::test]
async fn test_recency_orders_posts_with_equal_engagement() {
    let store = store();
    let t0 = Utc::now() - ChronoDuration::hours(2);
    seed_post(&store, SeedPost::new(1, 10, t0)).await;
    seed_post(&store, SeedPost::new(2, 11, t0 + ChronoDuration::minutes(1))).await;

    let page = assembler(&store).get_feed(VIEWER, query(Some(10))).await;

    let ids: Vec<i64> = page.items.iter().map(|i| i.post_id).collect();
    assert_eq!(ids, vec![2, 1], "newer post wins when engagement is equal");
}

#[tokio::test]
async fn test_rank_scores_match_the_stated_formula() {
    let store = store();
    let now = Utc::now();
    // P1: 10 likes, one hour old. P2: untouched, five minutes old.
    seed_post(
        &store,
        SeedPost::new(1, 10, now - ChronoDuration::hours(1)).likes(10),
    )
    .await;
    seed_post(&store, SeedPost::new(2, 11, now - ChronoDuration::minutes(5))).await;

    let page = assembler(&store).get_feed(VIEWER, query(Some(10))).await;
    assert_eq!(page.items.len(), 2);

    let by_id: HashMap<i64, f64> = page.items.iter().map(|i| (i.post_id, i.rank_score)).collect();

    // Both authors are unknown to the viewer: boost is the -5 penalty.
    let expected_p1 = 0.6 * (-1.0f64 / 24.0).exp() + 0.3 * 11.0f64.ln() + 0.2 * -5.0;
    let expected_p2 = 0.6 * (-(5.0f64 / 60.0) / 24.0).exp() + 0.2 * -5.0;

    assert!((by_id[&1] - expected_p1).abs() < 1e-3, "P1 score {}", by_id[&1]);
    assert!((by_id[&2] - expected_p2).abs() < 1e-3, "P2 score {}", by_id[&2]);

    // With these numbers engagement outweighs the recency edge.
    assert_eq!(page.items[0].post_id, 1);
}

#[tokio::test]
async fn test_limit_clamping_and_defaults() {
    let store = store();
    let now = Utc::now();
    for post_id in 1..=30 {
        seed_post(
            &store,
            SeedPost::new(post_id, 10, now - ChronoDuration::minutes(post_id)),
        )
        .await;
    }
    let assembler = assembler(&store);

    assert_eq!(assembler.get_feed(VIEWER, query(None)).await.items.len(), 20);
    assert_eq!(assembler.get_feed(VIEWER, query(Some(0))).await.items.len(), 20);
    assert_eq!(assembler.get_feed(VIEWER, query(Some(5))).await.items.len(), 5);
    // 500 clamps to the 100 maximum; only 30 posts exist.
    assert_eq!(
        assembler.get_feed(VIEWER, query(Some(500))).await.items.len(),
        30
    );
}

#[tokio::test]
async fn test_page_order_is_total_and_descending() {
    let store = store();
    let t0 = Utc::now() - ChronoDuration::hours(1);
    // Three identical posts: scores tie, so post id must break the tie.
    for post_id in [5, 9, 7] {
        seed_post(&store, SeedPost::new(post_id, 10, t0)).await;
    }

    let page = assembler(&store).get_feed(VIEWER, query(Some(10))).await;

    for pair in page.items.windows(2) {
        assert!(pair[0].rank_score >= pair[1].rank_score);
        if pair[0].rank_score == pair[1].rank_score {
            assert!(pair[0].post_id > pair[1].post_id);
        }
    }
    let ids: Vec<i64> = page.items.iter().map(|i| i.post_id).collect();
    assert_eq!(ids, vec![9, 7, 5]);
}

#[tokio::test]
async fn test_cursor_pagination_is_monotonic_and_duplicate_free() {
    let store = store();
    let now = Utc::now();
    // Hour-spaced posts: adjacent scores differ by more than the cursor
    // epsilon, so every post is reachable by paging.
    for post_id in 1..=9 {
        seed_post(
            &store,
            SeedPost::new(post_id, 10, now - ChronoDuration::hours(post_id)),
        )
        .await;
    }
    let assembler = assembler(&store);

    let mut seen: HashSet<i64> = HashSet::new();
    let mut cursor: Option<Cursor> = None;
    let mut previous_last_score = f64::INFINITY;
    let mut pages = 0;

    loop {
        let page = assembler
            .get_feed(
                VIEWER,
                FeedQuery {
                    cursor: cursor.clone(),
                    session_boundary: None,
                    limit: Some(3),
                },
            )
            .await;
        if page.items.is_empty() {
            assert!(page.next_cursor.is_none());
            break;
        }
        pages += 1;

        for item in &page.items {
            assert!(
                item.rank_score < previous_last_score + 1e-9,
                "page {pages} leaked an item at or above the previous page"
            );
            assert!(seen.insert(item.post_id), "post {} repeated", item.post_id);
        }
        previous_last_score = page.items.last().unwrap().rank_score;
        cursor = page.next_cursor.clone();
        assert!(cursor.is_some());
    }

    assert_eq!(pages, 3);
    assert_eq!(seen.len(), 9);
}

#[tokio::test]
async fn test_next_cursor_carries_first_item_timestamp() {
    let store = store();
    let now = Utc::now();
    seed_post(&store, SeedPost::new(1, 10, now - ChronoDuration::hours(2))).await;
    seed_post(&store, SeedPost::new(2, 10, now - ChronoDuration::hours(1))).await;

    let page = assembler(&store).get_feed(VIEWER, query(Some(10))).await;
    let cursor = page.next_cursor.expect("non-empty page has a cursor");

    assert_eq!(cursor.post_id, page.items.last().unwrap().post_id);
    assert!((cursor.rank_score - (page.items.last().unwrap().rank_score - 0.01)).abs() < 1e-12);
    assert_eq!(cursor.last_date_time, Some(page.items[0].created_at));
}

#[tokio::test]
async fn test_session_recency_admits_new_posts_past_the_cursor() {
    let store = store();
    let now = Utc::now();
    seed_post(&store, SeedPost::new(1, 10, now - ChronoDuration::hours(10))).await;
    seed_post(&store, SeedPost::new(2, 10, now - ChronoDuration::hours(9))).await;
    seed_post(&store, SeedPost::new(3, 10, now - ChronoDuration::minutes(1))).await;

    // A cursor below every score would normally exhaust the feed.
    let page = assembler(&store)
        .get_feed(
            VIEWER,
            FeedQuery {
                cursor: Some(Cursor {
                    rank_score: -100.0,
                    post_id: 0,
                    last_date_time: None,
                }),
                session_boundary: Some(now - ChronoDuration::minutes(30)),
                limit: Some(10),
            },
        )
        .await;

    let ids: Vec<i64> = page.items.iter().map(|i| i.post_id).collect();
    assert_eq!(ids, vec![3], "only the post newer than the boundary comes through");
}

#[tokio::test]
async fn test_empty_feed_returns_empty_page_with_null_cursor() {
    let store = store();
    let page = assembler(&store).get_feed(VIEWER, query(None)).await;
    assert!(page.items.is_empty());
    assert!(page.next_cursor.is_none());
}

#[tokio::test]
async fn test_store_outage_degrades_to_empty_page() {
    let failing: Arc<dyn FeedStore> = Arc::new(FailingStore);
    let assembler = FeedAssembler::new(
        failing.clone(),
        Arc::new(InteractionCounters::new(failing)),
        Arc::new(EngagementDecayRanking::default()),
        None,
        FeedConfig::default(),
    );

    let page = assembler.get_feed(VIEWER, query(Some(10))).await;
    assert!(page.items.is_empty());
    assert!(page.next_cursor.is_none());
}

#[tokio::test]
async fn test_broken_candidates_are_skipped_not_fatal() {
    let store = store();
    let now = Utc::now();

    // A member that is not a post id at all.
    store
        .sorted_set_add("feed:100", "not-a-post", now.timestamp_millis() as f64)
        .await
        .unwrap();
    // A stale reference whose snapshot has expired.
    store
        .sorted_set_add("feed:100", "7", now.timestamp_millis() as f64)
        .await
        .unwrap();
    // A snapshot with an unparsable timestamp.
    store
        .hash_set(
            "post:8",
            &[
                ("authorId", "10".to_string()),
                ("createdAt", "last tuesday".to_string()),
            ],
        )
        .await
        .unwrap();
    store
        .sorted_set_add("feed:100", "8", now.timestamp_millis() as f64)
        .await
        .unwrap();
    // One healthy post.
    seed_post(&store, SeedPost::new(9, 10, now - ChronoDuration::minutes(5))).await;

    let page = assembler(&store).get_feed(VIEWER, query(Some(10))).await;
    let ids: Vec<i64> = page.items.iter().map(|i| i.post_id).collect();
    assert_eq!(ids, vec![9]);
}

#[tokio::test]
async fn test_page_cache_serves_repeat_requests() {
    let store = store();
    seed_post(
        &store,
        SeedPost::new(1, 10, Utc::now() - ChronoDuration::hours(1)).likes(2),
    )
    .await;
    let assembler = assembler(&store);

    let first = assembler.get_feed(VIEWER, query(Some(10))).await;
    assert_eq!(first.items[0].like_count, 2);

    // Counters move, but the cached page is what scroll bursts see.
    store.hash_increment("post:1", "likeCount", 5).await.unwrap();
    let second = assembler.get_feed(VIEWER, query(Some(10))).await;
    assert_eq!(second.items[0].like_count, 2);
}

#[tokio::test]
async fn test_viewer_reaction_and_affinity_shape_the_page() {
    let store = store();
    let t0 = Utc::now() - ChronoDuration::hours(1);
    seed_post(&store, SeedPost::new(1, 10, t0)).await;
    seed_post(&store, SeedPost::new(2, 11, t0)).await;

    let counters = counters(&store);
    counters.set_reaction(1, 10, VIEWER, 2).await.unwrap();
    counters.record_follow(VIEWER, 11).await.unwrap();

    let page = assembler(&store).get_feed(VIEWER, query(Some(10))).await;
    let by_id: HashMap<i64, &feed_service::models::FeedItem> =
        page.items.iter().map(|i| (i.post_id, i)).collect();

    assert_eq!(by_id[&1].my_reaction_type, 2);
    assert_eq!(by_id[&2].my_reaction_type, 0);
    assert_eq!(by_id[&1].like_count, 1);

    // Both authors end up with affinity 1 (reaction vs follow), so the
    // reacted post's extra like is the only score difference.
    assert!(by_id[&1].rank_score > by_id[&2].rank_score);
}

#[tokio::test]
async fn test_rehydration_rebuilds_expired_snapshot_from_archive() {
    let store = store();
    let now = Utc::now();

    // Index entry survives, snapshot expired.
    store
        .sorted_set_add("feed:100", "7", now.timestamp_millis() as f64)
        .await
        .unwrap();

    let archive = StaticArchive {
        posts: HashMap::from([(
            7,
            ArchivedPost {
                post_id: 7,
                author_id: 10,
                content: "restored from the source of truth".to_string(),
                created_at: now - ChronoDuration::hours(3),
                media_urls: vec!["http://m/7.jpg".to_string()],
                like_count: 4,
                comment_count: 2,
                share_count: 1,
                parent_post_id: None,
            },
        )]),
    };

    let page = assembler_with_archive(&store, Some(Arc::new(archive)))
        .get_feed(VIEWER, query(Some(10)))
        .await;

    assert_eq!(page.items.len(), 1);
    let item = &page.items[0];
    assert_eq!(item.post_id, 7);
    assert_eq!(item.content_snippet, "restored from the source of truth");
    assert_eq!(item.like_count, 4);
    assert_eq!(item.media_urls, vec!["http://m/7.jpg"]);

    // The snapshot is cached again for subsequent reads.
    assert_eq!(
        store.hash_get("post:7", "likeCount").await.unwrap().as_deref(),
        Some("4")
    );
}

#[tokio::test]
async fn test_without_archive_expired_snapshots_are_skipped() {
    let store = store();
    store
        .sorted_set_add("feed:100", "7", Utc::now().timestamp_millis() as f64)
        .await
        .unwrap();

    let page = assembler(&store).get_feed(VIEWER, query(Some(10))).await;
    assert!(page.items.is_empty());
}
