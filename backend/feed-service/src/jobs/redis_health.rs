//! Periodic store liveness probe.
//!
//! Keeps the shared connection warm and surfaces store outages in the logs
//! before user traffic does.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::store::FeedStore;

#[derive(Debug, Clone)]
pub struct StoreHealthConfig {
    pub interval: Duration,
}

impl Default for StoreHealthConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
        }
    }
}

pub async fn start_store_health_check(store: Arc<dyn FeedStore>, config: StoreHealthConfig) {
    loop {
        tokio::time::sleep(config.interval).await;
        match store.ping().await {
            Ok(()) => debug!("Store health check OK"),
            Err(e) => warn!("Store health check failed: {}", e),
        }
    }
}
