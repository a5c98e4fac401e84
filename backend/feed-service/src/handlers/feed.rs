use actix_web::{get, web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use crate::error::Result;
use crate::middleware::Viewer;
use crate::models::Cursor;
use crate::services::{FeedAssembler, FeedQuery};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedQueryParams {
    pub cursor_score: Option<f64>,
    pub cursor_post_id: Option<i64>,
    /// RFC3339 session boundary; posts created after it are shown first.
    pub last_post_time: Option<String>,
    pub limit: Option<u32>,
}

impl FeedQueryParams {
    /// Both halves of the cursor are required; a partial cursor is treated
    /// as no cursor rather than rejected.
    fn cursor(&self) -> Option<Cursor> {
        match (self.cursor_score, self.cursor_post_id) {
            (Some(rank_score), Some(post_id)) => Some(Cursor {
                rank_score,
                post_id,
                last_date_time: None,
            }),
            _ => None,
        }
    }

    /// Unparsable boundaries are ignored; the feed still pages normally.
    fn session_boundary(&self) -> Option<DateTime<Utc>> {
        self.last_post_time
            .as_deref()
            .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }
}

pub struct FeedHandlerState {
    pub assembler: Arc<FeedAssembler>,
}

#[get("/feed")]
pub async fn get_feed(
    query: web::Query<FeedQueryParams>,
    viewer: Viewer,
    state: web::Data<FeedHandlerState>,
) -> Result<HttpResponse> {
    debug!(
        viewer_id = viewer.0,
        limit = ?query.limit,
        has_cursor = query.cursor().is_some(),
        "Feed request"
    );

    let page = state
        .assembler
        .get_feed(
            viewer.0,
            FeedQuery {
                cursor: query.cursor(),
                session_boundary: query.session_boundary(),
                limit: query.limit,
            },
        )
        .await;

    Ok(HttpResponse::Ok().json(page))
}
