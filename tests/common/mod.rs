//! Shared test utilities for replication and integration tests.
//!
//! This module provides:
//! - Redis testcontainer setup
//! - A recording, fault-injecting DocumentStore
//! - Record seeding helpers

#![allow(dead_code)] // Each test binary uses a different subset

pub mod containers;
pub mod recording_store;

pub use containers::*;
pub use recording_store::*;

use docmover::record::{Record, RecordId, Timestamp};
use docmover::store::{DocumentStore, Namespace};
use serde_json::json;

pub const POSE: &str = "geometry_msgs/Pose";
pub const WRENCH: &str = "geometry_msgs/Wrench";

/// The namespace most tests replicate within.
pub fn test_namespace() -> Namespace {
    Namespace::new("replication_test", "replication_test")
}

/// A pose-like record inserted at `inserted_at`.
pub fn pose(i: i64, inserted_at: Timestamp) -> Record {
    Record::new(
        POSE,
        json!({"position": {"x": i, "y": 0.5, "z": 0}, "orientation": {"w": 1.0}}),
        inserted_at,
    )
}

/// A wrench-like record inserted at `inserted_at`.
pub fn wrench(i: i64, inserted_at: Timestamp) -> Record {
    Record::new(
        WRENCH,
        json!({"force": {"x": i, "y": 0, "z": 9.81}, "torque": {"x": 0, "y": 0, "z": 0}}),
        inserted_at,
    )
}

/// Insert every record, returning the assigned ids in order.
pub async fn seed<S: DocumentStore + ?Sized>(
    store: &S,
    ns: &Namespace,
    records: impl IntoIterator<Item = Record>,
) -> Vec<RecordId> {
    let mut ids = Vec::new();
    for record in records {
        ids.push(store.insert(ns, record).await.expect("seed insert failed"));
    }
    ids
}

/// `n` pose records inserted one millisecond apart, ending before `before`.
pub fn poses_before(n: i64, before: Timestamp) -> Vec<Record> {
    (0..n)
        .map(|i| pose(i, Timestamp::from_millis(before.as_millis() - n + i)))
        .collect()
}
