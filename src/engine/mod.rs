// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Replicator engine.
//!
//! Moves records from a source store to a destination store:
//!
//! 1. Parse the caller filter (fail fast on malformed input) and build the
//!    selection `inserted_at < cutoff AND filter`
//! 2. Open one forward cursor over the source
//! 3. For each record, in cursor order: insert a copy into the destination,
//!    then (if `delete_after_move`) remove the original from the source
//! 4. Aggregate per-record outcomes into a [`RunSummary`]
//!
//! # Consistency
//!
//! Copy happens before delete and there is no transaction across the two
//! stores. A crash or failed delete leaves the record in both stores; the
//! next run copies it again (at-least-once). A record is never removed from
//! the source unless the destination acknowledged the insert. The engine
//! never reads back from, updates, or deletes in the destination.
//!
//! # Failure isolation
//!
//! A failed insert or remove is recorded against that record and the run
//! moves on. A destination *connection* failure is different: the record is
//! marked `copy-failed`, record processing stops, and every record the cursor
//! still yields is counted as `skipped` without another insert attempt.
//!
//! # Cancellation
//!
//! An optional deadline is checked between records, once the cursor has
//! yielded the next one. A run whose cursor is exhausted is not halted, even
//! if the deadline passed during its last record. Once a store call has been
//! issued it always runs to completion.

mod types;

pub use types::{HaltReason, OutcomeCounts, RecordFailure, RecordState, RunStatus, RunSummary};

use crate::error::{ReplicationError, Result};
use crate::filter::Filter;
use crate::metrics;
use crate::query;
use crate::record::{Record, Timestamp};
use crate::store::{DocumentStore, Namespace, RecordStream};
use futures::TryStreamExt;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Inputs of one replication run.
#[derive(Debug, Clone)]
pub struct ReplicationRequest {
    /// Where records are read (and optionally removed).
    pub source: Namespace,
    /// Where copies are inserted.
    pub destination: Namespace,
    /// Only records inserted strictly before this are selected.
    pub cutoff: Timestamp,
    /// Extra filter in JSON form; validated before any store call.
    pub filter: Option<Value>,
    /// Remove each record from the source after its copy is acknowledged.
    pub delete_after_move: bool,
    /// Stop starting new records once this instant has passed.
    pub deadline: Option<Instant>,
}

impl ReplicationRequest {
    /// Copy-only request into a destination namespace with the same name.
    pub fn new(source: Namespace, cutoff: Timestamp) -> Self {
        Self {
            destination: source.clone(),
            source,
            cutoff,
            filter: None,
            delete_after_move: false,
            deadline: None,
        }
    }

    pub fn with_destination(mut self, destination: Namespace) -> Self {
        self.destination = destination;
        self
    }

    pub fn with_filter(mut self, filter: Value) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn delete_after_move(mut self, delete: bool) -> Self {
        self.delete_after_move = delete;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Copies (and optionally moves) records between two document stores.
///
/// Holds both stores for the duration of a run. Runs are sequential;
/// concurrent runs over the same collections are not coordinated.
pub struct Replicator<S, D> {
    source: S,
    destination: D,
}

/// Outcome of handing one record to [`Replicator::transfer`].
enum Step {
    Done(RecordState),
    Failed(RecordState, String),
    /// Destination connection lost; record counted as `copy-failed`.
    DestinationLost(String),
}

impl<S: DocumentStore, D: DocumentStore> Replicator<S, D> {
    pub fn new(source: S, destination: D) -> Self {
        Self {
            source,
            destination,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn destination(&self) -> &D {
        &self.destination
    }

    /// Run one replication pass.
    ///
    /// Returns `Err` only when nothing was touched: a malformed filter, or
    /// a source that fails before yielding its first record. Everything after
    /// that is reported through the returned [`RunSummary`].
    pub async fn replicate(&self, request: &ReplicationRequest) -> Result<RunSummary> {
        let started = Instant::now();
        let label = request.source.to_string();

        let extra = match request.filter.as_ref().map(Filter::parse).transpose() {
            Ok(extra) => extra,
            Err(e) => {
                error!(source = %request.source, error = %e, "Rejected replication filter");
                metrics::record_run_aborted(&label, "filter");
                return Err(e.into());
            }
        };
        let selection = query::build(request.cutoff, extra);

        info!(
            source = %request.source,
            destination = %request.destination,
            cutoff = %request.cutoff,
            selection = %selection,
            delete_after_move = request.delete_after_move,
            "Starting replication run"
        );
        metrics::record_cutoff(&label, request.cutoff.as_millis());

        let mut summary = RunSummary::new(request);
        let mut records = self.source.find(&request.source, &selection);
        let mut started_records = false;

        loop {
            let record = match records.try_next().await {
                Ok(Some(record)) => record,
                Ok(None) => break,
                Err(e) if !started_records => {
                    error!(source = %request.source, error = %e, "Could not open source cursor");
                    metrics::record_run_aborted(&label, "source");
                    return Err(ReplicationError::from(e));
                }
                Err(e) => {
                    error!(source = %request.source, error = %e, "Source cursor failed mid-run");
                    summary.halt = Some(HaltReason::SourceFailed {
                        message: e.to_string(),
                    });
                    break;
                }
            };
            started_records = true;

            // The pulled record is left untouched and uncounted
            if request.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                warn!(
                    source = %request.source,
                    "Run deadline elapsed, stopping before next record"
                );
                summary.halt = Some(HaltReason::DeadlineElapsed);
                break;
            }

            match self.transfer(request, &record).await {
                Step::Done(state) => {
                    metrics::record_outcome(&label, state.as_str());
                    summary.record(state);
                }
                Step::Failed(state, message) => {
                    metrics::record_outcome(&label, state.as_str());
                    summary.record_failure(&record, state, message);
                }
                Step::DestinationLost(message) => {
                    metrics::record_outcome(&label, RecordState::CopyFailed.as_str());
                    summary.record_failure(&record, RecordState::CopyFailed, message.clone());

                    let skipped = drain(&mut records, &request.source).await;
                    error!(
                        destination = %request.destination,
                        error = %message,
                        skipped,
                        "Destination unreachable, skipping remaining records"
                    );
                    metrics::record_outcomes(&label, RecordState::Skipped.as_str(), skipped);
                    summary.counts.add(RecordState::Skipped, skipped);
                    summary.halt = Some(HaltReason::DestinationUnreachable { message });
                    break;
                }
            }
        }

        summary.elapsed = started.elapsed();
        let status = summary.status();
        metrics::record_run(&label, status.as_str(), summary.elapsed);

        let counts = summary.counts;
        if status == RunStatus::Success {
            info!(
                source = %request.source,
                copied = counts.copied,
                deleted = counts.deleted,
                elapsed_ms = summary.elapsed.as_millis(),
                "Replication run complete"
            );
        } else {
            warn!(
                source = %request.source,
                copied = counts.copied,
                deleted = counts.deleted,
                copy_failed = counts.copy_failed,
                delete_failed = counts.delete_failed,
                skipped = counts.skipped,
                halt = ?summary.halt,
                "Replication run finished with failures"
            );
        }

        Ok(summary)
    }

    /// Copy one record, then remove the original if requested.
    async fn transfer(&self, request: &ReplicationRequest, record: &Record) -> Step {
        let copy_started = Instant::now();
        let copy_id = match self
            .destination
            .insert(&request.destination, record.detached())
            .await
        {
            Ok(id) => id,
            Err(e) if e.is_connection() => return Step::DestinationLost(e.to_string()),
            Err(e) => {
                warn!(
                    id = ?record.id,
                    destination = %request.destination,
                    error = %e,
                    "Copy failed, continuing with next record"
                );
                return Step::Failed(RecordState::CopyFailed, e.to_string());
            }
        };
        metrics::record_copy_latency(&request.source.to_string(), copy_started.elapsed());

        if !request.delete_after_move {
            debug!(id = ?record.id, copy_id = %copy_id, "Copied record");
            return Step::Done(RecordState::Copied);
        }

        let Some(id) = record.id.as_ref() else {
            warn!(copy_id = %copy_id, "Source record has no identifier, cannot delete");
            return Step::Failed(
                RecordState::DeleteFailed,
                "source record has no identifier".to_string(),
            );
        };

        let delete_started = Instant::now();
        let outcome = match self.source.remove(&request.source, id).await {
            Ok(true) => Step::Done(RecordState::Deleted),
            Ok(false) => Step::Failed(
                RecordState::DeleteFailed,
                "record no longer present in source".to_string(),
            ),
            Err(e) => Step::Failed(RecordState::DeleteFailed, e.to_string()),
        };
        metrics::record_delete_latency(&request.source.to_string(), delete_started.elapsed());

        match &outcome {
            Step::Done(_) => debug!(id = %id, copy_id = %copy_id, "Moved record"),
            Step::Failed(_, message) => warn!(
                id = %id,
                copy_id = %copy_id,
                error = %message,
                "Delete after copy failed; copy kept, source still holds the record"
            ),
            Step::DestinationLost(_) => {}
        }
        outcome
    }
}

/// Replicate from `source` to `destination` without keeping a [`Replicator`].
pub async fn replicate<S, D>(
    source: &S,
    destination: &D,
    request: &ReplicationRequest,
) -> Result<RunSummary>
where
    S: DocumentStore + ?Sized,
    D: DocumentStore + ?Sized,
{
    Replicator::new(source, destination).replicate(request).await
}

/// Count what is left in the cursor without acting on it.
async fn drain(records: &mut RecordStream<'_>, source: &Namespace) -> u64 {
    let mut skipped = 0;
    loop {
        match records.try_next().await {
            Ok(Some(_)) => skipped += 1,
            Ok(None) => break,
            Err(e) => {
                warn!(
                    source = %source,
                    error = %e,
                    skipped,
                    "Source cursor failed while counting skipped records"
                );
                break;
            }
        }
    }
    skipped
}
