// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Run outcome types.
//!
//! # Per-record State Machine
//!
//! ```text
//!            insert ok            delete_after_move
//! pending ───────────────→ copied ─────────────────→ deleted
//!    │                                    │
//!    │ insert failed                      │ remove failed / record gone
//!    ↓                                    ↓
//! copy-failed                       delete-failed
//!
//! pending ──(run halted before this record)──→ skipped
//! ```
//!
//! `copied` is terminal when `delete_after_move` is off. There are no retries
//! within a run; rerunning the whole replication is the retry mechanism.

use crate::engine::ReplicationRequest;
use crate::error::{EXIT_PARTIAL_FAILURE, EXIT_SUCCESS};
use crate::record::{Record, RecordId, Timestamp};
use crate::store::Namespace;
use std::fmt;
use std::time::Duration;

/// Terminal state of one record in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordState {
    /// Copied to the destination; source untouched.
    Copied,
    /// Insert into the destination failed; source untouched.
    CopyFailed,
    /// Copied, then removed from the source.
    Deleted,
    /// Copied, but removing from the source failed. The source keeps a
    /// duplicate that a later run will copy again.
    DeleteFailed,
    /// Never attempted because the run halted first.
    Skipped,
}

impl RecordState {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordState::Copied => "copied",
            RecordState::CopyFailed => "copy-failed",
            RecordState::Deleted => "deleted",
            RecordState::DeleteFailed => "delete-failed",
            RecordState::Skipped => "skipped",
        }
    }

    /// Failures that make a run a partial failure.
    pub fn is_failure(self) -> bool {
        matches!(self, RecordState::CopyFailed | RecordState::DeleteFailed)
    }
}

impl fmt::Display for RecordState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Number of records in each terminal state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub copied: u64,
    pub copy_failed: u64,
    pub deleted: u64,
    pub delete_failed: u64,
    pub skipped: u64,
}

impl OutcomeCounts {
    pub fn add(&mut self, state: RecordState, n: u64) {
        let slot = match state {
            RecordState::Copied => &mut self.copied,
            RecordState::CopyFailed => &mut self.copy_failed,
            RecordState::Deleted => &mut self.deleted,
            RecordState::DeleteFailed => &mut self.delete_failed,
            RecordState::Skipped => &mut self.skipped,
        };
        *slot += n;
    }

    pub fn get(&self, state: RecordState) -> u64 {
        match state {
            RecordState::Copied => self.copied,
            RecordState::CopyFailed => self.copy_failed,
            RecordState::Deleted => self.deleted,
            RecordState::DeleteFailed => self.delete_failed,
            RecordState::Skipped => self.skipped,
        }
    }

    /// Records that reached the destination in this run.
    pub fn transferred(&self) -> u64 {
        self.copied + self.deleted + self.delete_failed
    }

    /// Every record the run saw, including skipped ones.
    pub fn total(&self) -> u64 {
        self.copied + self.copy_failed + self.deleted + self.delete_failed + self.skipped
    }

    pub fn failures(&self) -> u64 {
        self.copy_failed + self.delete_failed
    }
}

/// Overall health of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every selected record reached its target state.
    Success,
    /// At least one copy/delete failed, or the run halted early.
    PartialFailure,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::PartialFailure => "partial-failure",
        }
    }

    pub fn exit_code(self) -> u8 {
        match self {
            RunStatus::Success => EXIT_SUCCESS,
            RunStatus::PartialFailure => EXIT_PARTIAL_FAILURE,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why record processing stopped before the cursor was exhausted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HaltReason {
    /// The destination dropped mid-run. Remaining records were skipped.
    DestinationUnreachable { message: String },
    /// The source cursor failed after the run had started.
    SourceFailed { message: String },
    /// The run deadline passed between two records.
    DeadlineElapsed,
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HaltReason::DestinationUnreachable { message } => {
                write!(f, "destination unreachable: {}", message)
            }
            HaltReason::SourceFailed { message } => write!(f, "source cursor failed: {}", message),
            HaltReason::DeadlineElapsed => f.write_str("run deadline elapsed"),
        }
    }
}

/// A record that needs operator attention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFailure {
    /// Source identifier of the record.
    pub id: Option<RecordId>,
    pub name: Option<String>,
    pub state: RecordState,
    pub error: String,
}

/// Result of one replication run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub source: Namespace,
    pub destination: Namespace,
    pub cutoff: Timestamp,
    pub delete_after_move: bool,
    pub counts: OutcomeCounts,
    pub halt: Option<HaltReason>,
    pub failures: Vec<RecordFailure>,
    pub elapsed: Duration,
}

impl RunSummary {
    pub(crate) fn new(request: &ReplicationRequest) -> Self {
        Self {
            source: request.source.clone(),
            destination: request.destination.clone(),
            cutoff: request.cutoff,
            delete_after_move: request.delete_after_move,
            counts: OutcomeCounts::default(),
            halt: None,
            failures: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    pub(crate) fn record(&mut self, state: RecordState) {
        self.counts.add(state, 1);
    }

    pub(crate) fn record_failure(&mut self, record: &Record, state: RecordState, error: String) {
        self.counts.add(state, 1);
        self.failures.push(RecordFailure {
            id: record.id.clone(),
            name: record.meta.name.clone(),
            state,
            error,
        });
    }

    pub fn status(&self) -> RunStatus {
        if self.counts.failures() == 0 && self.halt.is_none() {
            RunStatus::Success
        } else {
            RunStatus::PartialFailure
        }
    }

    pub fn is_success(&self) -> bool {
        self.status() == RunStatus::Success
    }

    /// Process exit code for this run.
    pub fn exit_code(&self) -> u8 {
        self.status().exit_code()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "replication {} -> {} (cutoff {}, delete after move: {})",
            self.source,
            self.destination,
            self.cutoff,
            if self.delete_after_move { "yes" } else { "no" }
        )?;
        for state in [
            RecordState::Copied,
            RecordState::Deleted,
            RecordState::CopyFailed,
            RecordState::DeleteFailed,
            RecordState::Skipped,
        ] {
            writeln!(f, "  {:<14}{}", state.as_str(), self.counts.get(state))?;
        }
        writeln!(f, "  {:<14}{}", "status", self.status())?;
        writeln!(f, "  {:<14}{:.3}s", "elapsed", self.elapsed.as_secs_f64())?;
        if let Some(halt) = &self.halt {
            writeln!(f, "  {:<14}{}", "halted", halt)?;
        }
        if !self.failures.is_empty() {
            writeln!(f, "  failures:")?;
            for failure in &self.failures {
                let id = failure
                    .id
                    .as_ref()
                    .map(RecordId::to_string)
                    .unwrap_or_else(|| "<no id>".to_string());
                match &failure.name {
                    Some(name) => writeln!(
                        f,
                        "    {} ({}) {}: {}",
                        id, name, failure.state, failure.error
                    )?,
                    None => writeln!(f, "    {} {}: {}", id, failure.state, failure.error)?,
                }
            }
        }
        Ok(())
    }
}
