//! CLI argument parsing for the foodshare-geocoder binary.

use clap::{Parser, Subcommand};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "foodshare-geocoder", about = "Foodshare address geocoding worker")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server (default if no subcommand given)
    Serve,
    /// Run database migrations and exit
    Migrate,
    /// Run one batch invocation and print the outcome as JSON
    Batch {
        /// Scan mode: "incremental" or "catch-up"
        #[arg(long, default_value = "incremental")]
        mode: String,
        /// Resume after this record id
        #[arg(long)]
        last_processed_id: Option<Uuid>,
        /// Resume after this RFC 3339 timestamp
        #[arg(long)]
        last_processed_timestamp: Option<chrono::DateTime<chrono::Utc>>,
        /// Keep re-invoking with the returned checkpoint until the scan
        /// completes
        #[arg(long)]
        follow: bool,
    },
}
