//! Foodshare Geocoder - address geocoding worker
//!
//! Serves the geocoding HTTP API and runs batch scans over the address
//! table. Batch continuation is checkpoint-driven: an external scheduler
//! (or `batch --follow`) re-invokes with the returned checkpoint until the
//! scan reports completion.

mod cli;
mod config;
mod db;
mod error;
mod http;
mod services;
mod types;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use crate::cli::{Cli, Command};
use crate::db::{AddressStore, PgAddressStore};
use crate::http::handlers::BatchResponse;
use crate::http::AppState;
use crate::services::coordinator::BatchCoordinator;
use crate::services::geocoding::create_geocoder;
use crate::types::{BatchCheckpoint, BatchMode};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs directory - use LOGS_DIR env var or default to ./logs
    let logs_dir = std::env::var("LOGS_DIR").unwrap_or_else(|_| "./logs".to_string());
    std::fs::create_dir_all(&logs_dir).ok();

    // File appender for persistent logs (daily rotation)
    let file_appender = RollingFileAppender::new(Rotation::DAILY, &logs_dir, "geocoder.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Initialize logging - both stdout and file
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,foodshare_geocoder=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false),
        )
        .init();

    info!("Starting Foodshare geocoder...");

    let config = config::Config::from_env()?;
    info!("Configuration loaded");

    let pool = db::create_pool(&config.database_url).await?;
    info!("Connected to PostgreSQL");

    db::run_migrations(&pool).await?;

    if let Some(Command::Migrate) = cli.command {
        return Ok(());
    }

    let store: Arc<dyn AddressStore> = Arc::new(PgAddressStore::new(pool));
    let geocoder = create_geocoder(&config.geocoder_backend, &config.nominatim_url);

    match cli.command {
        None | Some(Command::Serve) => {
            let state = AppState {
                store,
                geocoder,
                batch: config.batch.clone(),
            };
            http::serve(state, &config.bind_addr).await?;
        }
        Some(Command::Batch {
            mode,
            last_processed_id,
            last_processed_timestamp,
            follow,
        }) => {
            let mode = parse_mode(&mode)?;
            let coordinator = BatchCoordinator::new(store, geocoder, config.batch.clone());
            let mut checkpoint = BatchCheckpoint::new(
                last_processed_id.unwrap_or_else(Uuid::nil),
                last_processed_timestamp,
            );

            loop {
                let outcome = coordinator.run(mode, checkpoint).await?;
                checkpoint = outcome.checkpoint;
                let is_complete = outcome.is_complete;

                println!("{}", serde_json::to_string_pretty(&BatchResponse::from(outcome))?);

                if is_complete || !follow {
                    break;
                }
                info!("Batch incomplete, continuing from checkpoint");
            }
        }
        Some(Command::Migrate) => unreachable!("handled above"),
    }

    Ok(())
}

fn parse_mode(mode: &str) -> Result<BatchMode, error::Error> {
    match mode {
        "incremental" => Ok(BatchMode::Incremental),
        "catch-up" | "catchup" | "catchUp" => Ok(BatchMode::CatchUp),
        other => Err(error::Error::Validation(format!(
            "unknown batch mode '{other}' (expected 'incremental' or 'catch-up')"
        ))),
    }
}
