use actix_web::{dev::Service, web, App, HttpServer};
use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use feed_service::clients::{PostgresPostArchive, PostgresSocialGraph, PostgresUserDirectory};
use feed_service::config::Config;
use feed_service::consumers::FeedEventConsumer;
use feed_service::handlers::{get_feed, FeedHandlerState};
use feed_service::jobs::redis_health::{start_store_health_check, StoreHealthConfig};
use feed_service::services::{
    EngagementDecayRanking, FanoutIndexer, FeedAssembler, InteractionCounters,
};
use feed_service::store::{FeedStore, RedisFeedStore};

#[actix_web::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env().context("failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.app.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting feed-service v{}", env!("CARGO_PKG_VERSION"));
    info!("Environment: {}", config.app.env);

    // Cache store
    let store: Arc<dyn FeedStore> = Arc::new(
        RedisFeedStore::connect(&config.redis.url)
            .await
            .context("failed to connect to Redis")?,
    );
    info!("Connected to Redis at {}", config.redis.url);

    // Relational collaborators
    let pg_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.database.url)
        .await
        .context("failed to create database pool")?;
    info!("Connected to PostgreSQL");

    let graph = Arc::new(PostgresSocialGraph::new(pg_pool.clone()));
    let users = Arc::new(PostgresUserDirectory::new(pg_pool.clone()));
    let archive = Arc::new(PostgresPostArchive::new(pg_pool));

    // Feed core
    let indexer = Arc::new(FanoutIndexer::new(
        store.clone(),
        graph,
        users,
        Duration::from_secs(config.feed.snapshot_ttl_secs),
        config.feed.include_author_in_fanout,
    ));
    let counters = Arc::new(InteractionCounters::new(store.clone()));
    let assembler = Arc::new(FeedAssembler::new(
        store.clone(),
        counters.clone(),
        Arc::new(EngagementDecayRanking::default()),
        Some(archive),
        config.feed.clone(),
    ));

    // Write path: event consumer, fire-and-forget relative to HTTP traffic
    match FeedEventConsumer::new(
        &config.kafka.bootstrap_servers,
        &config.kafka.group_id,
        &config.kafka.topic,
        indexer,
        counters,
    ) {
        Ok(consumer) => {
            tokio::spawn(async move {
                consumer.start().await;
            });
            info!(
                "Feed event consumer started on topic {}",
                config.kafka.topic
            );
        }
        Err(e) => {
            // The read path still serves from whatever is cached.
            warn!("Feed event consumer disabled - Kafka unavailable: {}", e);
        }
    }

    // Store health probe
    let health_store = store.clone();
    tokio::spawn(async move {
        start_store_health_check(health_store, StoreHealthConfig::default()).await;
    });

    let feed_handler_state = web::Data::new(FeedHandlerState { assembler });

    let port = config.app.port;
    info!("HTTP server listening on 0.0.0.0:{}", port);
    HttpServer::new(move || {
        App::new()
            .app_data(feed_handler_state.clone())
            .route("/health", web::get().to(|| async { "OK" }))
            .route("/metrics", web::get().to(feed_service::metrics::serve_metrics))
            .wrap_fn(|req, srv| {
                let method = req.method().to_string();
                let path = req
                    .match_pattern()
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| req.path().to_string());
                let start = Instant::now();

                let fut = srv.call(req);
                async move {
                    match fut.await {
                        Ok(res) => {
                            feed_service::metrics::observe_http_request(
                                &method,
                                &path,
                                res.status().as_u16(),
                                start.elapsed(),
                            );
                            Ok(res)
                        }
                        Err(err) => {
                            feed_service::metrics::observe_http_request(
                                &method,
                                &path,
                                500,
                                start.elapsed(),
                            );
                            Err(err)
                        }
                    }
                }
            })
            .service(web::scope("/api/v1").service(get_feed))
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await?;

    Ok(())
}
