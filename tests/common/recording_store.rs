//! Recording, fault-injecting DocumentStore for tests.
//!
//! Wraps a [`MemoryStore`] and records every insert() and remove() call for
//! assertions. Failures can be injected per operation to exercise the
//! engine's isolation rules without a real store going down.

use docmover::error::StoreError;
use docmover::filter::Filter;
use docmover::record::{Record, RecordId};
use docmover::store::{BoxFuture, DocumentStore, MemoryStore, Namespace, RecordStream};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// A recorded insert() call.
#[derive(Debug, Clone)]
pub struct InsertCall {
    pub namespace: Namespace,
    pub record: Record,
}

/// A recorded remove() call.
#[derive(Debug, Clone)]
pub struct RemoveCall {
    pub namespace: Namespace,
    pub id: RecordId,
}

/// In-memory store that records calls and fails on demand.
///
/// # Example
/// ```rust,ignore
/// let destination = RecordingStore::new("destination");
///
/// // Second insert fails, third loses the connection
/// destination.fail_insert(2);
/// destination.disconnect_after_inserts(2);
///
/// // Use in tests...
///
/// assert_eq!(destination.inserted().len(), 3);
/// ```
pub struct RecordingStore {
    inner: MemoryStore,
    inserts: Mutex<Vec<InsertCall>>,
    removes: Mutex<Vec<RemoveCall>>,
    finds: AtomicUsize,
    /// 1-based insert attempts that fail with an operation error
    failing_inserts: Mutex<HashSet<usize>>,
    /// Insert attempts after this many are connection failures
    disconnect_after: AtomicUsize,
    insert_attempts: AtomicUsize,
    fail_removes: AtomicBool,
    /// remove() reports the record as already gone
    removes_find_nothing: AtomicBool,
    /// Cursor yields this many records, then a connection error
    find_fails_after: AtomicUsize,
    insert_delay_ms: AtomicU64,
}

impl RecordingStore {
    /// Create a store that behaves like a healthy [`MemoryStore`].
    pub fn new(name: &str) -> Self {
        Self {
            inner: MemoryStore::new(name),
            inserts: Mutex::new(Vec::new()),
            removes: Mutex::new(Vec::new()),
            finds: AtomicUsize::new(0),
            failing_inserts: Mutex::new(HashSet::new()),
            disconnect_after: AtomicUsize::new(usize::MAX),
            insert_attempts: AtomicUsize::new(0),
            fail_removes: AtomicBool::new(false),
            removes_find_nothing: AtomicBool::new(false),
            find_fails_after: AtomicUsize::new(usize::MAX),
            insert_delay_ms: AtomicU64::new(0),
        }
    }

    // =========================================================================
    // Fault Configuration
    // =========================================================================

    /// Make the `n`th insert attempt (1-based) fail with an operation error.
    pub fn fail_insert(&self, n: usize) {
        self.failing_inserts.lock().unwrap().insert(n);
    }

    /// Let `n` insert attempts through, then report the store unreachable.
    pub fn disconnect_after_inserts(&self, n: usize) {
        self.disconnect_after.store(n, Ordering::SeqCst);
    }

    /// Make every remove() fail with an operation error.
    pub fn fail_removes(&self) {
        self.fail_removes.store(true, Ordering::SeqCst);
    }

    /// Make remove() report that the record was already gone.
    pub fn lose_records_before_remove(&self) {
        self.removes_find_nothing.store(true, Ordering::SeqCst);
    }

    /// Cursors yield `n` records and then fail with a connection error.
    pub fn fail_find_after(&self, n: usize) {
        self.find_fails_after.store(n, Ordering::SeqCst);
    }

    /// Every insert takes this long (use with paused time).
    pub fn delay_inserts(&self, delay: Duration) {
        self.insert_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    // =========================================================================
    // Query Methods
    // =========================================================================

    /// The wrapped store, for seeding and direct inspection.
    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    /// Successful insert() calls.
    pub fn inserted(&self) -> Vec<InsertCall> {
        self.inserts.lock().unwrap().clone()
    }

    /// All insert() attempts, successful or not.
    pub fn insert_attempts(&self) -> usize {
        self.insert_attempts.load(Ordering::SeqCst)
    }

    /// Successful remove() calls.
    pub fn removed(&self) -> Vec<RemoveCall> {
        self.removes.lock().unwrap().clone()
    }

    /// Number of cursors opened.
    pub fn find_count(&self) -> usize {
        self.finds.load(Ordering::SeqCst)
    }
}

impl DocumentStore for RecordingStore {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn ping(&self) -> BoxFuture<'_, ()> {
        self.inner.ping()
    }

    fn find<'a>(&'a self, ns: &'a Namespace, filter: &'a Filter) -> RecordStream<'a> {
        self.finds.fetch_add(1, Ordering::SeqCst);
        let fail_after = self.find_fails_after.load(Ordering::SeqCst);
        if fail_after == usize::MAX {
            return self.inner.find(ns, filter);
        }
        let name = self.inner.name().to_string();
        self.inner
            .find(ns, filter)
            .take(fail_after)
            .chain(stream::once(async move {
                Err(StoreError::connection(name, "cursor lost"))
            }))
            .boxed()
    }

    fn insert<'a>(&'a self, ns: &'a Namespace, record: Record) -> BoxFuture<'a, RecordId> {
        Box::pin(async move {
            let delay = self.insert_delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            let attempt = self.insert_attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt > self.disconnect_after.load(Ordering::SeqCst) {
                return Err(StoreError::connection(self.name(), "connection reset by peer"));
            }
            if self.failing_inserts.lock().unwrap().contains(&attempt) {
                return Err(StoreError::operation(self.name(), "insert", "simulated write failure"));
            }

            let id = self.inner.insert(ns, record.clone()).await?;
            self.inserts.lock().unwrap().push(InsertCall {
                namespace: ns.clone(),
                record,
            });
            Ok(id)
        })
    }

    fn remove<'a>(&'a self, ns: &'a Namespace, id: &'a RecordId) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            if self.fail_removes.load(Ordering::SeqCst) {
                return Err(StoreError::operation(
                    self.name(),
                    "remove",
                    "simulated delete failure",
                ));
            }
            if self.removes_find_nothing.load(Ordering::SeqCst) {
                return Ok(false);
            }

            let removed = self.inner.remove(ns, id).await?;
            if removed {
                self.removes.lock().unwrap().push(RemoveCall {
                    namespace: ns.clone(),
                    id: id.clone(),
                });
            }
            Ok(removed)
        })
    }
}
