//! Configuration for a replication run.
//!
//! [`ReplicatorConfig`] carries everything the runner needs: where both
//! stores live, what to select, and how patient to be with a store that is
//! still starting. It can be built programmatically, deserialized from
//! JSON, or assembled from command-line flags by the binary.
//!
//! # Quick Start
//!
//! ```rust
//! use docmover::config::{ReplicatorConfig, StoreEndpoint};
//!
//! let config = ReplicatorConfig {
//!     source: StoreEndpoint::new("robot-1", 62345),
//!     source_database: "roslog".into(),
//!     source_collection: "poses".into(),
//!     delete_after_move: true,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```
//!
//! # Configuration Structure
//!
//! ```text
//! ReplicatorConfig
//! ├── source: StoreEndpoint           # where records are read and removed
//! ├── destination: StoreEndpoint      # where copies are inserted
//! ├── source_database / source_collection
//! ├── destination_database / destination_collection   # default to source names
//! ├── move_before_secs                # age threshold
//! ├── query                           # optional extra filter (JSON)
//! ├── delete_after_move
//! ├── run_timeout_sec                 # optional deadline
//! └── store: StoreSettings            # retry, paging, key prefix
//! ```

use crate::engine::ReplicationRequest;
use crate::error::{ReplicationError, Result};
use crate::filter::Filter;
use crate::record::Timestamp;
use crate::resilience::RetryConfig;
use crate::store::Namespace;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Default source port (the robot-local store).
pub const DEFAULT_SOURCE_PORT: u16 = 62345;

/// Default destination port (the local replication target).
pub const DEFAULT_DESTINATION_PORT: u16 = 49163;

/// Host/port pair of a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreEndpoint {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
}

fn default_host() -> String {
    "localhost".to_string()
}

impl StoreEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Connection URL for the store client.
    pub fn url(&self) -> String {
        format!("redis://{}:{}", self.host, self.port)
    }
}

impl std::fmt::Display for StoreEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// The top-level config object for one replication run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicatorConfig {
    #[serde(default = "default_source_endpoint")]
    pub source: StoreEndpoint,

    #[serde(default = "default_destination_endpoint")]
    pub destination: StoreEndpoint,

    pub source_database: String,
    pub source_collection: String,

    /// Falls back to `source_database` when unset.
    #[serde(default)]
    pub destination_database: Option<String>,

    /// Falls back to `source_collection` when unset.
    #[serde(default)]
    pub destination_collection: Option<String>,

    /// Only records older than this many seconds are selected.
    /// `0` selects everything inserted before the run started.
    #[serde(default)]
    pub move_before_secs: u64,

    /// Extra selection filter, in the JSON filter language.
    #[serde(default)]
    pub query: Option<Value>,

    #[serde(default)]
    pub delete_after_move: bool,

    /// Stop starting new records after this many seconds.
    #[serde(default)]
    pub run_timeout_sec: Option<u64>,

    #[serde(default)]
    pub store: StoreSettings,
}

fn default_source_endpoint() -> StoreEndpoint {
    StoreEndpoint::new(default_host(), DEFAULT_SOURCE_PORT)
}

fn default_destination_endpoint() -> StoreEndpoint {
    StoreEndpoint::new(default_host(), DEFAULT_DESTINATION_PORT)
}

impl Default for ReplicatorConfig {
    fn default() -> Self {
        Self {
            source: default_source_endpoint(),
            destination: default_destination_endpoint(),
            source_database: "message_store".to_string(),
            source_collection: "message_store".to_string(),
            destination_database: None,
            destination_collection: None,
            move_before_secs: 0,
            query: None,
            delete_after_move: false,
            run_timeout_sec: None,
            store: StoreSettings::default(),
        }
    }
}

impl ReplicatorConfig {
    /// Create a minimal config for testing.
    pub fn for_testing(database: &str, collection: &str) -> Self {
        Self {
            source_database: database.to_string(),
            source_collection: collection.to_string(),
            store: StoreSettings::for_testing(),
            ..Default::default()
        }
    }

    pub fn source_namespace(&self) -> Namespace {
        Namespace::new(&self.source_database, &self.source_collection)
    }

    pub fn destination_namespace(&self) -> Namespace {
        Namespace::new(
            self.destination_database
                .as_deref()
                .unwrap_or(&self.source_database),
            self.destination_collection
                .as_deref()
                .unwrap_or(&self.source_collection),
        )
    }

    /// Age cutoff relative to `now`.
    pub fn cutoff(&self, now: Timestamp) -> Timestamp {
        now.minus_secs(self.move_before_secs)
    }

    pub fn run_timeout(&self) -> Option<Duration> {
        self.run_timeout_sec.map(Duration::from_secs)
    }

    /// Reject configurations that cannot produce a meaningful run.
    ///
    /// The query is parsed here too, so a malformed filter fails before any
    /// store is contacted.
    pub fn validate(&self) -> Result<()> {
        if self.source_database.is_empty() || self.source_collection.is_empty() {
            return Err(ReplicationError::Config(
                "source database and collection must not be empty".to_string(),
            ));
        }
        if matches!(self.destination_database.as_deref(), Some(""))
            || matches!(self.destination_collection.as_deref(), Some(""))
        {
            return Err(ReplicationError::Config(
                "destination database and collection must not be empty".to_string(),
            ));
        }
        if self.source.host.is_empty() || self.destination.host.is_empty() {
            return Err(ReplicationError::Config("store host must not be empty".to_string()));
        }
        if self.source == self.destination
            && self.source_namespace() == self.destination_namespace()
        {
            return Err(ReplicationError::Config(format!(
                "source and destination are the same collection ({} on {})",
                self.source_namespace(),
                self.source
            )));
        }
        if self.run_timeout_sec == Some(0) {
            return Err(ReplicationError::Config("run timeout must be positive".to_string()));
        }
        self.store.validate()?;
        if let Some(query) = &self.query {
            Filter::parse(query)?;
        }
        Ok(())
    }

    /// Build the engine request for a run starting at `now`.
    pub fn request(&self, now: Timestamp) -> ReplicationRequest {
        let mut request = ReplicationRequest::new(self.source_namespace(), self.cutoff(now))
            .with_destination(self.destination_namespace())
            .delete_after_move(self.delete_after_move);
        if let Some(query) = &self.query {
            request = request.with_filter(query.clone());
        }
        if let Some(limit) = self.run_timeout() {
            request = request.with_deadline(tokio::time::Instant::now() + limit);
        }
        request
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// StoreSettings: connection and client tuning
// ═══════════════════════════════════════════════════════════════════════════════

/// Store client settings shared by source and destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    /// Connection attempts before a store is declared unreachable.
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: usize,

    /// Delay before the first reconnect attempt (ms).
    #[serde(default = "default_connect_initial_delay_ms")]
    pub connect_initial_delay_ms: u64,

    /// Ceiling for reconnect backoff (ms).
    #[serde(default = "default_connect_max_delay_ms")]
    pub connect_max_delay_ms: u64,

    /// Bound on each connection attempt or ping (ms).
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Bound on each store command once connected (ms).
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,

    /// Ids fetched per cursor page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Prefix for every key the store client touches.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

fn default_connect_attempts() -> usize {
    20
}

fn default_connect_initial_delay_ms() -> u64 {
    500
}

fn default_connect_max_delay_ms() -> u64 {
    30_000
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_operation_timeout_ms() -> u64 {
    5_000
}

fn default_page_size() -> usize {
    crate::store::DEFAULT_PAGE_SIZE
}

fn default_key_prefix() -> String {
    crate::store::DEFAULT_KEY_PREFIX.to_string()
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            connect_attempts: default_connect_attempts(),
            connect_initial_delay_ms: default_connect_initial_delay_ms(),
            connect_max_delay_ms: default_connect_max_delay_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            operation_timeout_ms: default_operation_timeout_ms(),
            page_size: default_page_size(),
            key_prefix: default_key_prefix(),
        }
    }
}

impl StoreSettings {
    /// Fast-fail settings for tests.
    pub fn for_testing() -> Self {
        Self {
            connect_attempts: 3,
            connect_initial_delay_ms: 10,
            connect_max_delay_ms: 100,
            connect_timeout_ms: 500,
            operation_timeout_ms: 1_000,
            page_size: 10,
            key_prefix: "docmover-test".to_string(),
        }
    }

    /// Retry schedule for connecting and readiness checks.
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.connect_attempts,
            initial_delay: Duration::from_millis(self.connect_initial_delay_ms),
            max_delay: Duration::from_millis(self.connect_max_delay_ms),
            backoff_factor: RetryConfig::startup().backoff_factor,
            connection_timeout: Duration::from_millis(self.connect_timeout_ms),
        }
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    fn validate(&self) -> Result<()> {
        if self.connect_attempts == 0 {
            return Err(ReplicationError::Config("connect_attempts must be at least 1".to_string()));
        }
        if self.page_size == 0 {
            return Err(ReplicationError::Config("page_size must be at least 1".to_string()));
        }
        if self.operation_timeout_ms == 0 || self.connect_timeout_ms == 0 {
            return Err(ReplicationError::Config("store timeouts must be positive".to_string()));
        }
        if self.key_prefix.is_empty() {
            return Err(ReplicationError::Config("key_prefix must not be empty".to_string()));
        }
        Ok(())
    }
}
