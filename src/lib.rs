//! # docmover
//!
//! Copies records older than a cutoff from a source document store to a
//! destination document store, optionally removing each original once its
//! copy is stored.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────────────┐
//! │                               docmover                                    │
//! │                                                                           │
//! │  ┌───────────────┐    ┌──────────────┐    ┌────────────────────────────┐  │
//! │  │ ReplicatorCfg │───►│ query::build │───►│ Replicator                 │  │
//! │  │ (CLI / JSON)  │    │ (cutoff AND  │    │ find → insert → remove     │  │
//! │  └───────────────┘    │  filter)     │    │ (per record, in order)     │  │
//! │                       └──────────────┘    └────────────────────────────┘  │
//! │                                              │                  │         │
//! │                                              ▼                  ▼         │
//! │                                   ┌────────────────┐  ┌────────────────┐  │
//! │                                   │ source store   │  │ destination    │  │
//! │                                   │ (find, remove) │  │ (insert only)  │  │
//! │                                   └────────────────┘  └────────────────┘  │
//! └───────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Guarantees
//!
//! 1. **Copy before delete**: a source record is removed only after the
//!    destination acknowledged its copy
//! 2. **At-least-once**: rerunning after a failure may duplicate records at
//!    the destination but never loses one
//! 3. **Insert-only destination**: nothing at the destination is read back,
//!    updated, or removed
//!
//! ## Usage
//!
//! ```rust,no_run
//! use docmover::engine::{replicate, ReplicationRequest};
//! use docmover::record::Timestamp;
//! use docmover::store::{MemoryStore, Namespace};
//! use serde_json::json;
//!
//! # async fn example() -> docmover::Result<()> {
//! let source = MemoryStore::new("source");
//! let destination = MemoryStore::new("destination");
//!
//! let request = ReplicationRequest::new(Namespace::new("roslog", "poses"), Timestamp::now())
//!     .with_filter(json!({"_meta.stored_type": "geometry_msgs/Pose"}))
//!     .delete_after_move(true);
//! let summary = replicate(&source, &destination, &request).await?;
//! println!("{}", summary);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod metrics;
pub mod query;
pub mod record;
pub mod resilience;
pub mod runner;
pub mod store;

// Re-exports for convenience
pub use config::{ReplicatorConfig, StoreEndpoint, StoreSettings};
pub use engine::{replicate, ReplicationRequest, Replicator, RunStatus, RunSummary};
pub use error::{FilterError, ReplicationError, Result, StoreError};
pub use filter::Filter;
pub use record::{Record, RecordId, Timestamp};
pub use store::{DocumentStore, MemoryStore, Namespace, RedisStore};
