// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Redis-backed document store.
//!
//! # Key Layout
//!
//! ```text
//! {prefix}:seq                       INCR counter, shared by all namespaces
//! {prefix}:docs:{db}:{collection}    HASH   id -> JSON document (without _id)
//! {prefix}:order:{db}:{collection}   ZSET   id scored by insertion sequence
//! ```
//!
//! Inserts and removals touch both keys in one `MULTI`/`EXEC` pipeline.
//! Cursors page through the sorted set with an exclusive lower bound on the
//! last score seen, so removals behind the cursor never shift later pages.
//! Filters are evaluated client-side with [`Filter::matches`].
//!
//! Uses `redis::aio::ConnectionManager`, which reconnects on its own after a
//! dropped connection; each command is additionally bounded by an operation
//! timeout so a dead store surfaces as [`StoreError::Connection`].

use super::{BoxFuture, DocumentStore, Namespace, RecordStream, StoreResult};
use crate::error::{ReplicationError, Result, StoreError};
use crate::filter::Filter;
use crate::metrics;
use crate::record::{Record, RecordId};
use crate::resilience::RetryConfig;
use futures::stream::{self, StreamExt, TryStreamExt};
use redis::aio::ConnectionManager;
use redis::{Client, RedisError, RedisResult};
use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info, warn};

/// Default key prefix.
pub const DEFAULT_KEY_PREFIX: &str = "docmover";

/// Default number of ids fetched per cursor page.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Default bound on a single store command.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Document store on a Redis server.
pub struct RedisStore {
    name: String,
    conn: ConnectionManager,
    key_prefix: String,
    page_size: usize,
    operation_timeout: Duration,
}

/// Position of an open cursor.
struct PageCursor {
    /// Score of the last id read from the order set.
    after: Option<u64>,
    buffered: VecDeque<Record>,
    exhausted: bool,
}

/// One page read from the order set.
struct Page {
    /// Ids read from the order set, including ones whose document vanished.
    scanned: usize,
    last_seq: Option<u64>,
    records: Vec<Record>,
}

impl RedisStore {
    /// Connect with retry logic.
    ///
    /// Retries with exponential backoff per `retry_config`, bounding each
    /// attempt by `retry_config.connection_timeout`.
    pub async fn connect(
        name: impl Into<String>,
        url: &str,
        retry_config: &RetryConfig,
    ) -> Result<Self> {
        let name = name.into();
        info!(store = %name, url = %url, "Connecting to document store");

        let client = Client::open(url).map_err(|e| {
            ReplicationError::Config(format!("Invalid Redis URL for {}: {}", name, e))
        })?;

        let mut attempt = 0;
        loop {
            attempt += 1;

            // Wrap connection attempt in a timeout to avoid hanging on unreachable hosts
            let last_error = match timeout(
                retry_config.connection_timeout,
                client.get_connection_manager(),
            )
            .await
            {
                Ok(Ok(conn)) => {
                    metrics::record_store_connection(&name, true);
                    if attempt > 1 {
                        info!(store = %name, attempt, "Connected to document store after retry");
                    } else {
                        info!(store = %name, "Connected to document store");
                    }
                    return Ok(Self {
                        name,
                        conn,
                        key_prefix: DEFAULT_KEY_PREFIX.to_string(),
                        page_size: DEFAULT_PAGE_SIZE,
                        operation_timeout: DEFAULT_OPERATION_TIMEOUT,
                    });
                }
                Ok(Err(e)) => e.to_string(),
                Err(_) => format!(
                    "timed out after {}ms",
                    retry_config.connection_timeout.as_millis()
                ),
            };

            metrics::record_store_connection(&name, false);

            if attempt >= retry_config.max_attempts {
                error!(
                    store = %name,
                    attempt,
                    error = %last_error,
                    "Failed to connect after max retries"
                );
                return Err(ReplicationError::connection(
                    name,
                    format!("Connection failed after {} attempts: {}", attempt, last_error),
                ));
            }

            let delay = retry_config.delay_for_attempt(attempt);
            warn!(
                store = %name,
                attempt,
                delay_ms = delay.as_millis(),
                error = %last_error,
                "Connection attempt failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Use a different key prefix (e.g. to share one Redis between deployments).
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Ids fetched per cursor round trip.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Bound on any single command.
    pub fn with_operation_timeout(mut self, operation_timeout: Duration) -> Self {
        self.operation_timeout = operation_timeout;
        self
    }

    fn seq_key(&self) -> String {
        format!("{}:seq", self.key_prefix)
    }

    fn docs_key(&self, ns: &Namespace) -> String {
        format!("{}:docs:{}:{}", self.key_prefix, ns.database, ns.collection)
    }

    fn order_key(&self, ns: &Namespace) -> String {
        format!("{}:order:{}:{}", self.key_prefix, ns.database, ns.collection)
    }

    /// Classify a Redis error: transport failures mean the store is gone.
    fn store_error(&self, operation: &str, e: RedisError) -> StoreError {
        if e.is_io_error()
            || e.is_connection_dropped()
            || e.is_connection_refusal()
            || e.is_timeout()
        {
            StoreError::connection(&self.name, format!("{}: {}", operation, e))
        } else {
            StoreError::operation(&self.name, operation, e.to_string())
        }
    }

    /// Run one command with the operation timeout and error classification.
    async fn guarded<T, F>(&self, operation: &str, fut: F) -> StoreResult<T>
    where
        F: Future<Output = RedisResult<T>>,
    {
        match timeout(self.operation_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(self.store_error(operation, e)),
            Err(_) => Err(StoreError::connection(
                &self.name,
                format!(
                    "{} timed out after {}ms",
                    operation,
                    self.operation_timeout.as_millis()
                ),
            )),
        }
    }

    async fn fetch_page(&self, ns: &Namespace, after: Option<u64>) -> StoreResult<Page> {
        let mut conn = self.conn.clone();
        let min = match after {
            Some(seq) => format!("({}", seq),
            None => "-inf".to_string(),
        };

        let entries: Vec<(String, f64)> = self
            .guarded(
                "ZRANGEBYSCORE",
                redis::cmd("ZRANGEBYSCORE")
                    .arg(self.order_key(ns))
                    .arg(min)
                    .arg("+inf")
                    .arg("WITHSCORES")
                    .arg("LIMIT")
                    .arg(0)
                    .arg(self.page_size)
                    .query_async(&mut conn),
            )
            .await?;

        let scanned = entries.len();
        let last_seq = entries.last().map(|(_, score)| *score as u64);
        if entries.is_empty() {
            return Ok(Page {
                scanned,
                last_seq,
                records: Vec::new(),
            });
        }

        let ids: Vec<String> = entries.into_iter().map(|(id, _)| id).collect();
        let bodies: Vec<Option<String>> = self
            .guarded(
                "HMGET",
                redis::cmd("HMGET")
                    .arg(self.docs_key(ns))
                    .arg(&ids)
                    .query_async(&mut conn),
            )
            .await?;

        let mut records = Vec::with_capacity(ids.len());
        for (id, body) in ids.into_iter().zip(bodies) {
            // Removed between the two reads.
            let Some(body) = body else { continue };
            let mut record: Record = serde_json::from_str(&body)?;
            record.id = Some(RecordId::new(id));
            records.push(record);
        }

        Ok(Page {
            scanned,
            last_seq,
            records,
        })
    }
}

impl DocumentStore for RedisStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn ping(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let mut conn = self.conn.clone();
            let reply: String = self
                .guarded("PING", redis::cmd("PING").query_async(&mut conn))
                .await?;
            if reply == "PONG" {
                Ok(())
            } else {
                Err(StoreError::operation(
                    &self.name,
                    "PING",
                    format!("Unexpected PING response: {}", reply),
                ))
            }
        })
    }

    fn find<'a>(&'a self, ns: &'a Namespace, filter: &'a Filter) -> RecordStream<'a> {
        let start = PageCursor {
            after: None,
            buffered: VecDeque::new(),
            exhausted: false,
        };
        stream::unfold(Some(start), move |state| async move {
            let Some(mut cursor) = state else {
                return None;
            };
            loop {
                if let Some(record) = cursor.buffered.pop_front() {
                    return Some((Ok(record), Some(cursor)));
                }
                if cursor.exhausted {
                    return None;
                }
                match self.fetch_page(ns, cursor.after).await {
                    Ok(page) => {
                        cursor.exhausted = page.scanned < self.page_size;
                        cursor.after = page.last_seq.or(cursor.after);
                        cursor.buffered.extend(
                            page.records
                                .into_iter()
                                .filter(|r| filter.matches(&r.to_document())),
                        );
                    }
                    Err(e) => return Some((Err(e), None)),
                }
            }
        })
        .boxed()
    }

    fn insert<'a>(&'a self, ns: &'a Namespace, record: Record) -> BoxFuture<'a, RecordId> {
        Box::pin(async move {
            let body = serde_json::to_string(&record.detached())?;
            let mut conn = self.conn.clone();

            let seq: u64 = self
                .guarded(
                    "INCR",
                    redis::cmd("INCR").arg(self.seq_key()).query_async(&mut conn),
                )
                .await?;
            let id = RecordId::from_seq(seq);

            let mut pipe = redis::pipe();
            pipe.atomic()
                .hset(self.docs_key(ns), id.as_str(), body)
                .ignore()
                .zadd(self.order_key(ns), id.as_str(), seq)
                .ignore();
            let () = self
                .guarded("MULTI/HSET/ZADD", pipe.query_async(&mut conn))
                .await?;

            Ok(id)
        })
    }

    fn remove<'a>(&'a self, ns: &'a Namespace, id: &'a RecordId) -> BoxFuture<'a, bool> {
        Box::pin(async move {
            let mut conn = self.conn.clone();
            let mut pipe = redis::pipe();
            pipe.atomic()
                .hdel(self.docs_key(ns), id.as_str())
                .zrem(self.order_key(ns), id.as_str());
            let (removed, _unordered): (u64, u64) = self
                .guarded("MULTI/HDEL/ZREM", pipe.query_async(&mut conn))
                .await?;
            Ok(removed > 0)
        })
    }

    fn count<'a>(&'a self, ns: &'a Namespace, filter: &'a Filter) -> BoxFuture<'a, u64> {
        Box::pin(async move {
            if filter.is_all() {
                let mut conn = self.conn.clone();
                return self
                    .guarded(
                        "HLEN",
                        redis::cmd("HLEN").arg(self.docs_key(ns)).query_async(&mut conn),
                    )
                    .await;
            }
            self.find(ns, filter)
                .try_fold(0u64, |n, _| async move { Ok(n + 1) })
                .await
        })
    }
}
