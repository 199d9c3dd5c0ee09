// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Integration Tests for the Redis document store
//!
//! Tests use testcontainers for portability - no external docker-compose required.
//!
//! # Running Tests
//! ```bash
//! # Run all integration tests (requires Docker / OrbStack)
//! cargo test --test integration -- --ignored
//!
//! # Run specific test
//! cargo test --test integration redis_store -- --ignored
//! ```
//!
//! # Test Organization
//! - `redis_store_*` - DocumentStore contract on a real Redis
//! - `connect_*` - connection retry and readiness
//! - `run_*` - full runs between two Redis containers

mod common;

use common::{pose, poses_before, seed, test_namespace, wrench, TestStore, POSE};
use docmover::config::{ReplicatorConfig, StoreEndpoint, StoreSettings};
use docmover::engine::{replicate, ReplicationRequest, RunStatus};
use docmover::error::ReplicationError;
use docmover::filter::Filter;
use docmover::query;
use docmover::record::Timestamp;
use docmover::resilience::{wait_until_ready, RetryConfig};
use docmover::runner;
use docmover::store::{DocumentStore, Namespace, RedisStore};
use futures::TryStreamExt;
use serde_json::json;
use std::time::Duration;
use testcontainers::clients::Cli;

// =============================================================================
// DocumentStore Contract
// =============================================================================

#[tokio::test]
#[ignore] // Requires Docker
async fn redis_store_insert_find_remove() {
    let docker = Cli::default();
    let redis = TestStore::start(&docker, "source").await;
    let ns = test_namespace();

    let record = pose(1, Timestamp::from_secs(10))
        .named("first")
        .with_meta("robot", json!("arm-1"));
    let id = redis.store.insert(&ns, record.clone()).await.unwrap();

    let found = redis.store.find_named(&ns, "first").await.unwrap().unwrap();
    assert_eq!(found.id.as_ref(), Some(&id));
    assert!(found.same_content(&record));

    assert!(redis.store.remove(&ns, &id).await.unwrap());
    assert!(!redis.store.remove(&ns, &id).await.unwrap());
    assert!(redis.store.find_named(&ns, "first").await.unwrap().is_none());
}

#[tokio::test]
#[ignore] // Requires Docker
async fn redis_store_ignores_caller_ids() {
    let docker = Cli::default();
    let redis = TestStore::start(&docker, "destination").await;
    let ns = test_namespace();

    let a = redis.store.insert(&ns, pose(1, Timestamp::EPOCH)).await.unwrap();
    let mut copy = redis.store.find_named(&ns, "missing").await.unwrap();
    assert!(copy.is_none());

    // Re-inserting a fetched record yields a new id, not an overwrite
    copy = redis.store.find(&ns, &Filter::All).try_next().await.unwrap();
    let b = redis.store.insert(&ns, copy.unwrap()).await.unwrap();
    assert_ne!(a, b);
    assert_eq!(redis.store.count(&ns, &Filter::All).await.unwrap(), 2);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn redis_store_find_pages_in_insertion_order() {
    let docker = Cli::default();
    let redis = TestStore::start(&docker, "source").await;
    let ns = test_namespace();

    // Page size is 3; 10 records span four pages
    let ids = seed(&redis.store, &ns, poses_before(10, Timestamp::from_secs(100))).await;
    let found: Vec<_> = redis
        .store
        .find(&ns, &Filter::All)
        .map_ok(|r| r.id.unwrap())
        .try_collect()
        .await
        .unwrap();
    assert_eq!(found, ids);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn redis_store_find_tolerates_removal_behind_cursor() {
    let docker = Cli::default();
    let redis = TestStore::start(&docker, "source").await;
    let ns = test_namespace();
    seed(&redis.store, &ns, poses_before(8, Timestamp::from_secs(100))).await;

    let mut seen = 0;
    let mut records = redis.store.find(&ns, &Filter::All);
    while let Some(record) = records.try_next().await.unwrap() {
        assert!(redis.store.remove(&ns, record.id.as_ref().unwrap()).await.unwrap());
        seen += 1;
    }
    drop(records);

    assert_eq!(seen, 8);
    assert_eq!(redis.store.count(&ns, &Filter::All).await.unwrap(), 0);
    assert_eq!(redis.key_count("docmover:*").await, 1); // only the id counter survives
}

#[tokio::test]
#[ignore] // Requires Docker
async fn redis_store_filters_client_side() {
    let docker = Cli::default();
    let redis = TestStore::start(&docker, "source").await;
    let ns = test_namespace();
    let t = Timestamp::from_secs(1);
    seed(&redis.store, &ns, (0..4).map(|i| wrench(i, t))).await;
    seed(&redis.store, &ns, (0..3).map(|i| pose(i, t))).await;

    assert_eq!(redis.store.count(&ns, &query::by_type(POSE)).await.unwrap(), 3);
    assert_eq!(redis.store.count(&ns, &Filter::All).await.unwrap(), 7);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn redis_store_namespaces_are_isolated() {
    let docker = Cli::default();
    let redis = TestStore::start(&docker, "source").await;
    let a = Namespace::new("db", "a");
    let b = Namespace::new("db", "b");

    redis.store.insert(&a, pose(1, Timestamp::EPOCH)).await.unwrap();
    assert_eq!(redis.store.count(&a, &Filter::All).await.unwrap(), 1);
    assert_eq!(redis.store.count(&b, &Filter::All).await.unwrap(), 0);
}

// =============================================================================
// Connection
// =============================================================================

#[tokio::test]
#[ignore] // Requires Docker
async fn connect_and_wait_until_ready() {
    let docker = Cli::default();
    let redis = TestStore::start(&docker, "destination").await;
    assert!(wait_until_ready(&redis.store, &RetryConfig::testing()).await.is_ok());
}

#[tokio::test]
async fn connect_gives_up_on_unreachable_store() {
    // Nothing listens on port 1
    let result =
        RedisStore::connect("source", "redis://127.0.0.1:1", &RetryConfig::testing()).await;
    match result {
        Err(ReplicationError::Connection { store, message }) => {
            assert_eq!(store, "source");
            assert!(message.contains("3 attempts"));
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("connected to a closed port"),
    }
}

#[tokio::test]
async fn connect_rejects_malformed_url() {
    let result = RedisStore::connect("source", "not a url", &RetryConfig::testing()).await;
    assert!(matches!(result, Err(ReplicationError::Config(_))));
}

// =============================================================================
// Full Runs
// =============================================================================

#[tokio::test]
#[ignore] // Requires Docker
async fn run_moves_between_two_redis_stores() {
    let docker = Cli::default();
    let source = TestStore::start(&docker, "source").await;
    let destination = TestStore::start(&docker, "destination").await;
    let ns = test_namespace();
    let now = Timestamp::from_secs(1_000);

    seed(&source.store, &ns, [pose(1, Timestamp::from_secs(10)).named("X")]).await;
    seed(&source.store, &ns, poses_before(5, now)).await;

    let request = ReplicationRequest::new(ns.clone(), now);
    let summary = replicate(&source.store, &destination.store, &request).await.unwrap();
    assert_eq!(summary.counts.copied, 6);
    assert_eq!(source.store.count(&ns, &Filter::All).await.unwrap(), 6);

    let request = ReplicationRequest::new(ns.clone(), now).delete_after_move(true);
    let summary = replicate(&source.store, &destination.store, &request).await.unwrap();
    assert_eq!(summary.counts.deleted, 6);
    assert_eq!(summary.status(), RunStatus::Success);
    assert!(source.store.find_named(&ns, "X").await.unwrap().is_none());
    assert_eq!(destination.store.count(&ns, &Filter::All).await.unwrap(), 12);
}

#[tokio::test]
#[ignore] // Requires Docker
async fn run_from_config() {
    let docker = Cli::default();
    let source = TestStore::start(&docker, "source").await;
    let destination = TestStore::start(&docker, "destination").await;

    let config = ReplicatorConfig {
        source: endpoint(&source.url),
        destination: endpoint(&destination.url),
        destination_collection: Some("archive".into()),
        move_before_secs: 60,
        query: Some(json!({"_meta.stored_type": POSE})),
        delete_after_move: true,
        store: StoreSettings {
            key_prefix: "docmover".to_string(),
            ..StoreSettings::for_testing()
        },
        ..ReplicatorConfig::for_testing("replication_test", "replication_test")
    };
    let ns = config.source_namespace();
    let now = Timestamp::now();

    // Two old poses, one old wrench, one fresh pose
    let old = now.minus_secs(3_600);
    seed(&source.store, &ns, [pose(1, old), pose(2, old), wrench(3, old), pose(4, now)]).await;

    let summary = tokio::time::timeout(Duration::from_secs(30), runner::run(&config, now))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(summary.counts.deleted, 2);
    assert!(summary.is_success());
    assert_eq!(source.store.count(&ns, &Filter::All).await.unwrap(), 2);
    assert_eq!(
        destination
            .store
            .count(&config.destination_namespace(), &Filter::All)
            .await
            .unwrap(),
        2
    );
}

fn endpoint(url: &str) -> StoreEndpoint {
    let port = url
        .rsplit(':')
        .next()
        .and_then(|p| p.parse().ok())
        .expect("container url has a port");
    StoreEndpoint::new("127.0.0.1", port)
}
