// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Document store integration traits.
//!
//! Defines the interface the replicator needs from a document store. Two
//! backends ship with the crate:
//!
//! - [`MemoryStore`]: in-process, used by tests and embedders
//! - [`RedisStore`]: networked store on Redis (hash + sorted set per collection)
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), docmover::StoreError> {
//! use docmover::store::{DocumentStore, MemoryStore, Namespace};
//! use docmover::record::{Record, Timestamp};
//! use serde_json::json;
//!
//! let store = MemoryStore::new("local");
//! let ns = Namespace::new("robot", "poses");
//! let id = store
//!     .insert(&ns, Record::new("geometry_msgs/Pose", json!({"x": 1}), Timestamp::now()))
//!     .await?;
//! assert!(store.remove(&ns, &id).await?);
//! # Ok(())
//! # }
//! ```

mod memory;
mod redis_store;

pub use self::memory::MemoryStore;
pub use self::redis_store::{
    RedisStore, DEFAULT_KEY_PREFIX, DEFAULT_OPERATION_TIMEOUT, DEFAULT_PAGE_SIZE,
};

use crate::error::StoreError;
use crate::filter::Filter;
use crate::query;
use crate::record::{Record, RecordId};
use futures::stream::{BoxStream, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Type alias for boxed async futures (reduces trait signature complexity).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = StoreResult<T>> + Send + 'a>>;

/// Lazy, forward-only sequence of records produced by [`DocumentStore::find`].
pub type RecordStream<'a> = BoxStream<'a, StoreResult<Record>>;

/// A database/collection pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Namespace {
    pub database: String,
    pub collection: String,
}

impl Namespace {
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

/// Trait defining what the replicator needs from a document store.
///
/// Implementations must:
/// 1. Yield `find` results lazily, in insertion order, and tolerate records
///    being removed while a cursor is open (`remove` during `find`)
/// 2. Assign a fresh identifier on every `insert`, ignoring any `_id` the
///    caller supplied
/// 3. Report lost connectivity as [`StoreError::Connection`], so the engine
///    can tell a dead store from one failed command
pub trait DocumentStore: Send + Sync {
    /// Label used in logs and metrics (e.g. `"source"`).
    fn name(&self) -> &str;

    /// Readiness probe.
    fn ping(&self) -> BoxFuture<'_, ()>;

    /// Records matching `filter`, oldest insertion first.
    fn find<'a>(&'a self, ns: &'a Namespace, filter: &'a Filter) -> RecordStream<'a>;

    /// Insert a record, returning the identifier this store assigned.
    fn insert<'a>(&'a self, ns: &'a Namespace, record: Record) -> BoxFuture<'a, RecordId>;

    /// Remove a record by identifier. Returns `false` if it was not present.
    fn remove<'a>(&'a self, ns: &'a Namespace, id: &'a RecordId) -> BoxFuture<'a, bool>;

    /// Number of records matching `filter`.
    fn count<'a>(&'a self, ns: &'a Namespace, filter: &'a Filter) -> BoxFuture<'a, u64> {
        Box::pin(async move {
            self.find(ns, filter)
                .try_fold(0u64, |n, _| async move { Ok(n + 1) })
                .await
        })
    }

    /// First record whose `_meta.name` equals `name`.
    fn find_named<'a>(&'a self, ns: &'a Namespace, name: &'a str) -> BoxFuture<'a, Option<Record>> {
        Box::pin(async move {
            let filter = query::by_name(name);
            let mut records = self.find(ns, &filter);
            records.try_next().await
        })
    }
}

impl<T: DocumentStore + ?Sized> DocumentStore for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn ping(&self) -> BoxFuture<'_, ()> {
        (**self).ping()
    }

    fn find<'a>(&'a self, ns: &'a Namespace, filter: &'a Filter) -> RecordStream<'a> {
        (**self).find(ns, filter)
    }

    fn insert<'a>(&'a self, ns: &'a Namespace, record: Record) -> BoxFuture<'a, RecordId> {
        (**self).insert(ns, record)
    }

    fn remove<'a>(&'a self, ns: &'a Namespace, id: &'a RecordId) -> BoxFuture<'a, bool> {
        (**self).remove(ns, id)
    }

    fn count<'a>(&'a self, ns: &'a Namespace, filter: &'a Filter) -> BoxFuture<'a, u64> {
        (**self).count(ns, filter)
    }

    fn find_named<'a>(&'a self, ns: &'a Namespace, name: &'a str) -> BoxFuture<'a, Option<Record>> {
        (**self).find_named(ns, name)
    }
}

impl<T: DocumentStore + ?Sized> DocumentStore for &T {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn ping(&self) -> BoxFuture<'_, ()> {
        (**self).ping()
    }

    fn find<'a>(&'a self, ns: &'a Namespace, filter: &'a Filter) -> RecordStream<'a> {
        (**self).find(ns, filter)
    }

    fn insert<'a>(&'a self, ns: &'a Namespace, record: Record) -> BoxFuture<'a, RecordId> {
        (**self).insert(ns, record)
    }

    fn remove<'a>(&'a self, ns: &'a Namespace, id: &'a RecordId) -> BoxFuture<'a, bool> {
        (**self).remove(ns, id)
    }

    fn count<'a>(&'a self, ns: &'a Namespace, filter: &'a Filter) -> BoxFuture<'a, u64> {
        (**self).count(ns, filter)
    }

    fn find_named<'a>(&'a self, ns: &'a Namespace, name: &'a str) -> BoxFuture<'a, Option<Record>> {
        (**self).find_named(ns, name)
    }
}
