// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! In-process document store.
//!
//! Records live in one ordered map per namespace, keyed by insertion
//! sequence. Cursors remember the last sequence they yielded and re-enter the
//! map on each step, so removing records while a cursor is open never skips
//! or repeats anything.
//!
//! [`MemoryStore::set_online`] simulates an outage: while offline every call
//! fails with [`StoreError::Connection`].

use super::{BoxFuture, DocumentStore, Namespace, RecordStream, StoreResult};
use crate::error::StoreError;
use crate::filter::Filter;
use crate::record::{Record, RecordId};
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Document store held entirely in memory.
pub struct MemoryStore {
    name: String,
    collections: RwLock<HashMap<Namespace, BTreeMap<u64, Record>>>,
    next_seq: AtomicU64,
    online: AtomicBool,
}

impl MemoryStore {
    /// Create an empty, online store.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            collections: RwLock::new(HashMap::new()),
            next_seq: AtomicU64::new(1),
            online: AtomicBool::new(true),
        }
    }

    /// Bring the store up or down. Offline stores refuse every call.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Release);
        tracing::debug!(store = %self.name, online, "Memory store availability changed");
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    fn check_online(&self) -> StoreResult<()> {
        if self.is_online() {
            Ok(())
        } else {
            Err(StoreError::connection(&self.name, "store offline"))
        }
    }

    /// First record at or after `from` that matches `filter`.
    async fn next_match(
        &self,
        ns: &Namespace,
        filter: &Filter,
        from: u64,
    ) -> StoreResult<Option<(u64, Record)>> {
        self.check_online()?;
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(ns) else {
            return Ok(None);
        };
        Ok(docs
            .range(from..)
            .find(|(_, record)| filter.matches(&record.to_document()))
            .map(|(seq, record)| (*seq, record.clone())))
    }
}

impl DocumentStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn ping(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move { self.check_online() })
    }

    fn find<'a>(&'a self, ns: &'a Namespace, filter: &'a Filter) -> RecordStream<'a> {
        stream::unfold(Some(0u64), move |cursor| async move {
            let Some(from) = cursor else {
                return None;
            };
            match self.next_match(ns, filter, from).await {
                Ok(Some((seq, record))) => Some((Ok(record), Some(seq.saturating_add(1)))),
                Ok(None) => None,
                // A failed cursor is finished.
                Err(e) => Some((Err(e), None)),
            }
        })
        .boxed()
    }

    fn insert<'a>(&'a self, ns: &'a Namespace, record: Record) -> BoxFuture<'a, RecordId> {
        Box::pin(async move {
            self.check_online()?;
            let seq = self.next_seq.fetch_add(1, Ordering::AcqRel);
            let id = RecordId::from_seq(seq);
            let mut stored = record;
            stored.id = Some(id.clone());

            self.collections
                .write()
                .await
                .entry(ns.clone())
                .or_default()
                .insert(seq, stored);

            tracing::trace!(store = %self.name, ns = %ns, id = %id, "Inserted record");
            Ok(id)
        })
    }

    fn remove<'a>(&'a self, ns: &'a Namespace, id: &'a RecordId) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            self.check_online()?;
            let Some(seq) = id.seq() else {
                return Ok(false);
            };
            let removed = self
                .collections
                .write()
                .await
                .get_mut(ns)
                .and_then(|docs| docs.remove(&seq))
                .is_some();
            tracing::trace!(store = %self.name, ns = %ns, id = %id, removed, "Removed record");
            Ok(removed)
        })
    }
}
