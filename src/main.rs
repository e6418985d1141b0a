//! hexmap - delivery-order hexagon aggregation CLI
//!
//! Drives the aggregation core against the SQLite store: ingest raw order
//! rows, then render filtered hexagon layers, global statistics, and the
//! available filter choices as JSON on stdout.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use h3o::Resolution;
use serde_json::json;
use tracing::info;

use hexmap_backend::{
    ingest, overlay, AggregationEngine, Config, FilterCatalog, MapRequest, RecordFilter,
    RecordStore, SqliteRecordStore,
};

#[derive(Parser)]
#[command(name = "hexmap", about = "Delivery-order hexagon aggregation")]
struct Cli {
    /// SQLite database path (overrides HEXMAP_DB_PATH).
    #[arg(long, global = true)]
    db: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load raw order rows (JSON Lines) into the store.
    Ingest {
        /// Path to the .jsonl file of raw orders.
        input: PathBuf,
    },
    /// Render the filtered hexagon layer plus supply points and stats.
    Aggregate {
        #[arg(long, default_value = "All")]
        carrier: String,
        #[arg(long = "hour-bucket", default_value = "All")]
        hour_bucket: String,
        /// H3 resolution (0-15); defaults to the configured resolution.
        #[arg(long)]
        resolution: Option<u8>,
        /// Maximum hexagons to return.
        #[arg(long)]
        limit: Option<usize>,
        /// Attach the administrative boundary overlay, when configured.
        #[arg(long)]
        include_overlay: bool,
        #[arg(long)]
        pretty: bool,
    },
    /// Print filter-scoped global statistics.
    Stats {
        #[arg(long, default_value = "All")]
        carrier: String,
        #[arg(long = "hour-bucket", default_value = "All")]
        hour_bucket: String,
    },
    /// Print the available filter choices.
    Filters,
}

fn print_json(value: &serde_json::Value, pretty: bool) -> Result<()> {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", rendered);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hexmap=info,hexmap_backend=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(db) = cli.db {
        config.database_path = db;
    }

    let store: Arc<dyn RecordStore> = Arc::new(
        SqliteRecordStore::new(&config.database_path, config.query_timeout())
            .context("failed to open the order store")?,
    );

    match cli.command {
        Command::Ingest { input } => {
            let report = ingest::load_jsonl(store.as_ref(), &input).await?;
            info!(
                "ingestion complete: {} inserted, {} skipped",
                report.inserted, report.skipped
            );
            print_json(
                &json!({ "inserted": report.inserted, "skipped": report.skipped }),
                false,
            )?;
        }
        Command::Aggregate {
            carrier,
            hour_bucket,
            resolution,
            limit,
            include_overlay,
            pretty,
        } => {
            let resolution = match resolution {
                Some(r) => Resolution::try_from(r)
                    .map_err(|_| anyhow::anyhow!("resolution must be 0-15, got {}", r))?,
                None => config.resolution(),
            };
            let filter = RecordFilter::from_params(Some(&carrier), Some(&hour_bucket));

            let engine = AggregationEngine::new(Arc::clone(&store))
                .with_limits(config.hexagon_limit, config.source_point_limit);

            let view = engine
                .render(&MapRequest {
                    carrier: filter.carrier.clone(),
                    hour_bucket: filter.hour_bucket.clone(),
                    resolution,
                    limit,
                })
                .await?;
            let supply_points = engine.source_points(&filter, None).await?;

            let mut output = json!({
                "hexagons": view.hexagons,
                "supply_points": supply_points,
                "stats": view.stats,
            });
            if include_overlay {
                if let Some(path) = &config.overlay_path {
                    if let Some(boundaries) = overlay::load_overlay(std::path::Path::new(path))? {
                        output["boundaries"] = boundaries;
                    }
                }
            }
            print_json(&output, pretty)?;
        }
        Command::Stats {
            carrier,
            hour_bucket,
        } => {
            let filter = RecordFilter::from_params(Some(&carrier), Some(&hour_bucket));
            let engine = AggregationEngine::new(Arc::clone(&store));
            let stats = engine.summarize(&filter).await?;
            print_json(&serde_json::to_value(&stats)?, true)?;
        }
        Command::Filters => {
            let catalog = FilterCatalog::new(Arc::clone(&store));
            let output = json!({
                "carriers": catalog.carriers().await?,
                "hour_buckets": catalog.hour_buckets().await?,
            });
            print_json(&output, true)?;
        }
    }

    Ok(())
}
