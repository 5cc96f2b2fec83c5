//! CLI entry point for the RouteWise position-tracking service.
//!
//! Provides subcommands for serving the ingest API, ingesting reports from the
//! command line, simulating GPS fixes, and inspecting or exporting history.

mod infra;

use crate::infra::{DynamoHistoryStore, SnsDispatcher, load_aws_config};
use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use routewise::alert::{AlertDispatcher, LogDispatcher};
use routewise::api::{self, DEFAULT_HISTORY_LIMIT};
use routewise::config::{HistoryBackend, Settings};
use routewise::output::{append_records, print_json, print_pretty};
use routewise::pipeline::IngestionPipeline;
use routewise::report::PositionReport;
use routewise::simulate::{generate_history, simulated_report};
use routewise::store::{HistoryStore, MemoryHistoryStore};
use routewise::transport::{BasicClient, post_report};
use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "routewise")]
#[command(about = "City bus position tracking and stop-proximity alerts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP ingest API
    Serve {
        /// Address to bind (overrides BIND_ADDR)
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Ingest position reports from a JSON file or an inline JSON document
    Ingest {
        /// Path to a JSON file, or a JSON object/array
        #[arg(value_name = "FILE_OR_JSON")]
        source: String,
    },
    /// Generate simulated GPS fixes near random stops
    Simulate {
        /// Bus to simulate (all buses when omitted)
        #[arg(value_name = "BUS_ID")]
        bus_id: Option<String>,

        /// Number of rounds to run
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,

        /// Seconds to wait between rounds
        #[arg(short, long, default_value_t = 0)]
        interval: u64,

        /// Optional: base URL of a running ingest API to POST to instead of ingesting locally
        #[arg(long)]
        target: Option<String>,
    },
    /// Show recent positions for a bus
    History {
        #[arg(value_name = "BUS_ID")]
        bus_id: String,

        /// Maximum number of records to show
        #[arg(short, long, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: usize,

        /// Print as JSON instead of one line per record
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Append recent positions for a bus to a CSV file
    Export {
        #[arg(value_name = "BUS_ID")]
        bus_id: String,

        /// CSV file to append results to
        #[arg(short, long, default_value = "history.csv")]
        output: String,

        /// Maximum number of records to export
        #[arg(short, long, default_value_t = 100)]
        limit: usize,
    },
    /// Backfill five synthetic records per bus directly into the history store
    GenerateTestData,
    /// Subscribe an e-mail address to proximity alerts
    Subscribe {
        #[arg(value_name = "EMAIL")]
        email: String,
    },
    /// List the buses and stops in the route catalog
    Routes,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/routewise.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("routewise.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env()?;

    match cli.command {
        Commands::Serve { bind } => {
            let pipeline = build_pipeline(&settings).await?;
            let addr = bind.unwrap_or_else(|| settings.bind_addr.clone());
            api::serve(Arc::new(pipeline), &addr).await?;
        }
        Commands::Ingest { source } => {
            let pipeline = build_pipeline(&settings).await?;
            let reports = read_reports(&source)?;
            let mut stored = Vec::new();
            for report in &reports {
                match pipeline.ingest(report).await {
                    Ok(record) => stored.push(record),
                    Err(e) => error!(code = e.code(), error = %e, "Report rejected"),
                }
            }
            info!(received = reports.len(), stored = stored.len(), "Ingest finished");
            print_json(&stored)?;
        }
        Commands::Simulate {
            bus_id,
            count,
            interval,
            target,
        } => {
            simulate(&settings, bus_id, count, interval, target).await?;
        }
        Commands::History { bus_id, limit, json } => {
            let pipeline = build_pipeline(&settings).await?;
            let (route, records) = pipeline.recent_history(&bus_id, limit).await?;
            info!(
                bus_id = %route.vehicle_id,
                route = %route.route_label,
                count = records.len(),
                "History"
            );
            if json {
                print_json(&records)?;
            } else {
                for r in &records {
                    info!(
                        time = %r.formatted_time(),
                        lat = r.latitude,
                        lon = r.longitude,
                        speed_kmph = r.speed_kmph,
                        next_stop = %r.next_stop_name,
                        distance_km = r.distance_to_stop_km,
                        "Position"
                    );
                }
                print_pretty(&records);
            }
        }
        Commands::Export {
            bus_id,
            output,
            limit,
        } => {
            let pipeline = build_pipeline(&settings).await?;
            let (route, records) = pipeline.recent_history(&bus_id, limit).await?;
            let rows = append_records(&output, &records)?;
            info!(bus_id = %route.vehicle_id, rows, path = %output, "Export complete");
        }
        Commands::GenerateTestData => {
            let pipeline = build_pipeline(&settings).await?;
            let now = Utc::now().timestamp();
            let records = generate_history(pipeline.catalog(), now, &mut rand::rng());
            for record in &records {
                pipeline.put_raw(record).await?;
            }
            info!(count = records.len(), "Test data generated");
        }
        Commands::Subscribe { email } => {
            let email = email.trim();
            if email.is_empty() {
                bail!("an e-mail address is required");
            }
            if settings.alert_topic_arn.is_none() {
                warn!("ALERT_TOPIC_ARN is not set; the subscription will only be logged");
            }
            let alerts = build_alerts(&settings).await;
            alerts.subscribe(email).await?;
            info!(email, "Subscription request sent");
        }
        Commands::Routes => {
            let catalog = settings.load_catalog()?;
            for route in catalog.iter() {
                let stops: Vec<_> = route.stop_names().collect();
                info!(
                    bus_id = %route.vehicle_id,
                    route = %route.route_label,
                    frequency = %route.service_frequency_label,
                    class = %route.vehicle_class,
                    stops = %stops.join(" → "),
                    "Route"
                );
            }
        }
    }

    Ok(())
}

/// Wires the catalog, history store and alert channel chosen by `settings`.
async fn build_pipeline(settings: &Settings) -> Result<IngestionPipeline> {
    let catalog = Arc::new(settings.load_catalog()?);
    info!(routes = catalog.len(), "Route catalog loaded");

    let store: Arc<dyn HistoryStore> = match settings.history_backend {
        HistoryBackend::DynamoDb => {
            let config = load_aws_config(settings).await;
            info!(
                table = %settings.history_table,
                region = %settings.aws_region,
                "Using DynamoDB history store"
            );
            Arc::new(DynamoHistoryStore::new(&config, settings.history_table.clone()))
        }
        HistoryBackend::Memory => {
            warn!("Using in-memory history store; records are lost on exit");
            Arc::new(MemoryHistoryStore::new())
        }
    };

    Ok(IngestionPipeline::new(catalog, store, build_alerts(settings).await)
        .with_default_alert_radius(settings.default_alert_radius_km))
}

async fn build_alerts(settings: &Settings) -> Arc<dyn AlertDispatcher> {
    match &settings.alert_topic_arn {
        Some(arn) => {
            let config = load_aws_config(settings).await;
            info!(topic = %arn, "Publishing alerts to SNS");
            Arc::new(SnsDispatcher::new(&config, arn.clone()))
        }
        None => {
            info!("ALERT_TOPIC_ARN not set, alerts will be logged only");
            Arc::new(LogDispatcher)
        }
    }
}

/// Accepts a JSON object, a JSON array of objects, or a path to a file holding either.
fn read_reports(source: &str) -> Result<Vec<PositionReport>> {
    let trimmed = source.trim_start();
    let content = if trimmed.starts_with('{') || trimmed.starts_with('[') {
        source.to_string()
    } else {
        std::fs::read_to_string(source).with_context(|| format!("failed to read '{source}'"))?
    };

    let value: serde_json::Value =
        serde_json::from_str(&content).context("reports are not valid JSON")?;
    let reports = match value {
        serde_json::Value::Array(items) => items
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<PositionReport>, _>>()?,
        other => vec![serde_json::from_value(other)?],
    };
    Ok(reports)
}

/// Where simulated fixes go.
enum Sink {
    Local(IngestionPipeline),
    Remote { client: BasicClient, url: String },
}

/// Runs `count` rounds of simulated fixes, ingesting locally or POSTing to `target`.
#[tracing::instrument(skip(settings, target), fields(target = target.as_deref().unwrap_or("local")))]
async fn simulate(
    settings: &Settings,
    bus_id: Option<String>,
    count: usize,
    interval: u64,
    target: Option<String>,
) -> Result<()> {
    let catalog = settings.load_catalog()?;
    let routes: Vec<_> = match &bus_id {
        Some(id) => match catalog.lookup(id) {
            Some(route) => vec![route.clone()],
            None => bail!("Unknown bus {}", id.trim().to_uppercase()),
        },
        None => catalog.iter().cloned().collect(),
    };

    let sink = match target {
        Some(url) => Sink::Remote { client: BasicClient::new()?, url },
        None => Sink::Local(build_pipeline(settings).await?),
    };

    for round in 1..=count {
        for route in &routes {
            let Some(report) = simulated_report(route, &mut rand::rng()) else {
                warn!(bus_id = %route.vehicle_id, "Route has no stops, skipping");
                continue;
            };

            match &sink {
                Sink::Local(pipeline) => match pipeline.ingest(&report).await {
                    Ok(record) => info!(
                        round,
                        bus_id = %record.vehicle_id,
                        next_stop = %record.next_stop_name,
                        distance_km = record.distance_to_stop_km,
                        "Simulated fix stored"
                    ),
                    Err(e) => error!(round, error = %e, "Simulated fix rejected"),
                },
                Sink::Remote { client, url } => match post_report(client, url, &report).await {
                    Ok(reply) if reply.ok => {
                        info!(round, bus_id = %route.vehicle_id, "Simulated fix accepted")
                    }
                    Ok(reply) => {
                        warn!(round, error = ?reply.error, "Simulated fix rejected by server")
                    }
                    Err(e) => error!(round, error = %e, "Failed to post simulated fix"),
                },
            }
        }

        if round < count && interval > 0 {
            tokio::time::sleep(tokio::time::Duration::from_secs(interval)).await;
        }
    }

    info!(rounds = count, buses = routes.len(), "Simulation finished");
    Ok(())
}
