// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Run lifecycle: validate, connect, wait for readiness, replicate.
//!
//! # Startup Sequence
//!
//! ```text
//! validate config ──→ connect source ──→ connect destination
//!                                               │
//!        replicate ←── wait_until_ready(both) ←─┘
//! ```
//!
//! Any failure before `replicate` is fatal and touches no data.

use crate::config::ReplicatorConfig;
use crate::engine::{Replicator, RunSummary};
use crate::error::Result;
use crate::record::Timestamp;
use crate::resilience::wait_until_ready;
use crate::store::{DocumentStore, RedisStore};
use tracing::info;

/// Label of the store records are read from.
pub const SOURCE_STORE: &str = "source";

/// Label of the store copies are written to.
pub const DESTINATION_STORE: &str = "destination";

/// Connect to both configured stores and run one replication pass.
///
/// `now` anchors the age cutoff; pass [`Timestamp::now()`] outside tests.
pub async fn run(config: &ReplicatorConfig, now: Timestamp) -> Result<RunSummary> {
    config.validate()?;

    let retry = config.store.retry_config();
    let source = connect(SOURCE_STORE, &config.source.url(), config).await?;
    let destination = connect(DESTINATION_STORE, &config.destination.url(), config).await?;

    wait_until_ready(&source, &retry).await?;
    wait_until_ready(&destination, &retry).await?;
    info!(source = %config.source, destination = %config.destination, "Both stores ready");

    run_with(source, destination, config, now).await
}

/// Run one replication pass over already-connected stores.
pub async fn run_with<S, D>(
    source: S,
    destination: D,
    config: &ReplicatorConfig,
    now: Timestamp,
) -> Result<RunSummary>
where
    S: DocumentStore,
    D: DocumentStore,
{
    config.validate()?;
    let request = config.request(now);
    Replicator::new(source, destination).replicate(&request).await
}

async fn connect(name: &str, url: &str, config: &ReplicatorConfig) -> Result<RedisStore> {
    let store = RedisStore::connect(name, url, &config.store.retry_config())
        .await?
        .with_key_prefix(config.store.key_prefix.clone())
        .with_page_size(config.store.page_size)
        .with_operation_timeout(config.store.operation_timeout());
    Ok(store)
}
