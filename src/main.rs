// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! docmover - copy or move aged records between document stores.
//!
//! Exit codes: 0 when every selected record reached its target state,
//! 1 when some copies/deletes failed or the run halted early, 2 when the run
//! could not start (bad arguments, bad filter, unreachable store).

use clap::Parser;
use docmover::config::{
    ReplicatorConfig, StoreEndpoint, DEFAULT_DESTINATION_PORT, DEFAULT_SOURCE_PORT,
};
use docmover::error::{FilterError, ReplicationError, EXIT_FATAL};
use docmover::record::Timestamp;
use docmover::runner;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Copy (and optionally move) records older than a threshold from a source
/// document store to a destination document store.
#[derive(Parser, Debug)]
#[command(name = "docmover")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Source database name
    source_db: String,

    /// Source collection name
    source_collection: String,

    /// Source store host
    #[arg(long, default_value = "localhost")]
    source_host: String,

    /// Source store port
    #[arg(long, default_value_t = DEFAULT_SOURCE_PORT)]
    source_port: u16,

    /// Destination store host
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Destination store port
    #[arg(long, default_value_t = DEFAULT_DESTINATION_PORT)]
    port: u16,

    /// Destination database name (defaults to the source database)
    #[arg(long)]
    dest_db: Option<String>,

    /// Destination collection name (defaults to the source collection)
    #[arg(long)]
    dest_collection: Option<String>,

    /// Only move records inserted more than this many seconds ago
    #[arg(long, value_name = "SECONDS", default_value_t = 0)]
    move_before: u64,

    /// Extra selection filter as JSON, e.g. '{"_meta.stored_type": "geometry_msgs/Pose"}'
    #[arg(long, value_name = "JSON")]
    query: Option<String>,

    /// Remove each record from the source once its copy is stored
    #[arg(long)]
    delete_after_move: bool,

    /// Stop starting new records after this many seconds
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<u64>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn into_config(self) -> Result<ReplicatorConfig, ReplicationError> {
        let query = self
            .query
            .as_deref()
            .map(serde_json::from_str::<serde_json::Value>)
            .transpose()
            .map_err(|e| ReplicationError::Filter(FilterError::Json(e.to_string())))?;

        Ok(ReplicatorConfig {
            source: StoreEndpoint::new(self.source_host, self.source_port),
            destination: StoreEndpoint::new(self.host, self.port),
            source_database: self.source_db,
            source_collection: self.source_collection,
            destination_database: self.dest_db,
            destination_collection: self.dest_collection,
            move_before_secs: self.move_before,
            query,
            delete_after_move: self.delete_after_move,
            run_timeout_sec: self.timeout,
            ..Default::default()
        })
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = match cli.into_config() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid arguments");
            eprintln!("docmover: {}", e);
            return ExitCode::from(EXIT_FATAL);
        }
    };

    match runner::run(&config, Timestamp::now()).await {
        Ok(summary) => {
            print!("{}", summary);
            ExitCode::from(summary.exit_code())
        }
        Err(e) => {
            error!(error = %e, retryable = e.is_retryable(), "Replication run aborted");
            eprintln!("docmover: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}
