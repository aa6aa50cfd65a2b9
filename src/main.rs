use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use patchscout_monitor::{
    HttpScanClient, JobMonitor, ScanEvent, ScanService,
    config::{Environment, Settings},
    estimator,
    models::{Aggressiveness, JobId, ScanConfiguration, ScanType},
    normalizer,
};

#[derive(Parser)]
#[command(name = "patchscout-monitor", about = "Submit and monitor PatchScout scans")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit a scan and follow it until it finishes
    Scan {
        /// URL, IPv4 address, or domain name
        target: String,
        #[command(flatten)]
        selection: ToolSelection,
        #[arg(long, default_value = "medium")]
        aggressiveness: Aggressiveness,
        #[arg(long, default_value = "1-65535")]
        port_range: String,
        #[arg(long, default_value = "")]
        exclude_ports: String,
        /// Disable NSE scripts
        #[arg(long)]
        no_nse: bool,
        /// Compliance framework to check (repeatable, defaults to PCI DSS and NIST)
        #[arg(long = "compliance")]
        compliance: Vec<String>,
    },
    /// Show the current status of a scan
    Status { id: String },
    /// Request cancellation of a running scan
    Cancel { id: String },
    /// Print the projected duration of a scan configuration
    Estimate {
        #[command(flatten)]
        selection: ToolSelection,
    },
    /// Check that the scan service is reachable
    Health,
}

#[derive(clap::Args)]
struct ToolSelection {
    /// Tool to run (repeatable, defaults to every catalog tool)
    #[arg(long = "tool")]
    tools: Vec<String>,
    #[arg(long, default_value = "comprehensive")]
    scan_type: ScanType,
}

impl ToolSelection {
    fn into_config(self) -> ScanConfiguration {
        let config = ScanConfiguration::default().with_scan_type(self.scan_type);
        if self.tools.is_empty() {
            config
        } else {
            config.with_tools(self.tools)
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let settings = Settings::from_env().context("failed to load settings")?;
    init_tracing(settings.environment);

    let client = HttpScanClient::from_settings(&settings)?;

    match cli.command {
        Command::Scan {
            target,
            selection,
            aggressiveness,
            port_range,
            exclude_ports,
            no_nse,
            compliance,
        } => {
            let mut config = selection.into_config();
            config.aggressiveness = aggressiveness;
            config.port_range = port_range;
            config.exclude_ports = exclude_ports;
            config.include_nse = !no_nse;
            if !compliance.is_empty() {
                config.compliance = compliance;
            }
            run_scan(JobMonitor::new(client, settings.monitor_settings()), &target, config).await
        }
        Command::Status { id } => {
            let status = client.get_scan(&JobId::new(id)).await?;
            let report = serde_json::json!({
                "status": status.status,
                "progress": status.progress.unwrap_or(0.0),
                "current_tool": status.current_tool(),
                "summary": normalizer::summarize(&status),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Cancel { id } => {
            client.cancel_scan(&JobId::new(id.clone())).await?;
            tracing::info!("Cancellation requested for scan {}", id);
            Ok(ExitCode::SUCCESS)
        }
        Command::Estimate { selection } => {
            println!("{}", estimator::estimate(&selection.into_config()));
            Ok(ExitCode::SUCCESS)
        }
        Command::Health => {
            let health = client.health_check().await?;
            println!(
                "{} (version {})",
                health.status.as_deref().unwrap_or("unknown"),
                health.version.as_deref().unwrap_or("unknown")
            );
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_scan(
    monitor: JobMonitor<HttpScanClient>,
    target: &str,
    config: ScanConfiguration,
) -> Result<ExitCode> {
    let job = monitor.submit(target, config).await?;
    let job_id = job.id().clone();

    let (tx, mut rx) = mpsc::channel(16);
    let reporter = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                ScanEvent::Progress {
                    progress_percent,
                    current_tool,
                    remaining_minutes,
                } => {
                    tracing::info!(
                        "Scanning with {}... {}% complete, about {} minutes remaining",
                        current_tool.as_deref().unwrap_or("-"),
                        progress_percent,
                        remaining_minutes
                    );
                }
                ScanEvent::Finished(job) => {
                    tracing::info!(
                        "Scan {} finished as {:?} after {}s",
                        job.id(),
                        job.status(),
                        job.elapsed().num_seconds()
                    );
                }
            }
        }
    });

    // An interrupted run abandons the loop; the scan keeps going remotely
    // until the cancel request below lands.
    let finished = tokio::select! {
        job = monitor.run_with_events(job, tx) => Some(job),
        Ok(()) = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl+C, abandoning scan {}", job_id);
            None
        }
        _ = terminated() => {
            tracing::info!("Received SIGTERM, abandoning scan {}", job_id);
            None
        }
    };
    let _ = reporter.await;

    let Some(job) = finished else {
        if let Err(e) = monitor.service().cancel_scan(&job_id).await {
            tracing::warn!("Failed to cancel scan {} on shutdown: {}", job_id, e);
        }
        return Ok(ExitCode::from(130));
    };

    println!("{}", serde_json::to_string_pretty(&job)?);
    Ok(if job.status().is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn init_tracing(environment: Environment) {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "patchscout_monitor=info".into()),
    );

    if environment == Environment::Production {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[cfg(unix)]
async fn terminated() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            tracing::warn!("SIGTERM handler unavailable: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminated() {
    std::future::pending::<()>().await;
}
