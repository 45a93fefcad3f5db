//! Prometheus exporter for UPS units and other sensors.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};

use sensor_exporter::{CollectorEntry, ExporterConfig, builtin_registry, describe_registry};
use sensor_framework::{HttpServer, Scheduler};

/// Prometheus exporter for UPS units and other sensors.
#[derive(Parser, Debug)]
#[command(name = "sensor-exporter")]
#[command(about = "Scrape sensors on fixed intervals and export their readings as Prometheus metrics")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP listen address (overrides config).
    #[arg(long)]
    listen: Option<String>,

    /// Metrics endpoint path (overrides config).
    #[arg(long)]
    path: Option<String>,

    /// Log level or filter directive (overrides config).
    #[arg(long)]
    log_level: Option<String>,

    /// List the available sensor types and exit.
    #[arg(long)]
    list: bool,

    /// Collectors to run, as TYPE,LABELS,OPTIONS (e.g. upsc,,main@nas).
    #[arg(value_name = "COLLECTOR")]
    collectors: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let registry = builtin_registry().context("Failed to register sensor types")?;

    if args.list {
        print!("{}", describe_registry(&registry));
        return Ok(());
    }

    // Load configuration
    let mut config = match &args.config {
        Some(path) => ExporterConfig::load_from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => ExporterConfig::default(),
    };

    // Apply CLI overrides
    if let Some(listen) = args.listen {
        config.http.listen = listen;
    }
    if let Some(path) = args.path {
        config.http.path = path;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    config
        .collectors
        .extend(args.collectors.into_iter().map(CollectorEntry::new));

    config.validate()?;
    config.require_collectors()?;

    sensor_common::init_tracing(&config.logging)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        collectors = config.collectors.len(),
        "Starting sensor exporter"
    );

    let listen_addr: SocketAddr = config
        .http
        .listen
        .parse()
        .with_context(|| format!("Invalid listen address: {}", config.http.listen))?;

    let definitions = config.definitions()?;
    let scheduler = Scheduler::build(&registry, &definitions, &config.schedule_settings())
        .context("Failed to create collectors")?;
    let store = scheduler.store();

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let collector_tasks = scheduler.start(shutdown_rx.clone());

    // Start HTTP server
    let http_server = HttpServer::new(store.clone(), listen_addr, config.http.path.clone());
    let http_shutdown = shutdown_rx.clone();
    let mut http_task = tokio::spawn(async move { http_server.run(http_shutdown).await });

    // Wait for a shutdown signal, or for the server to fail on its own
    tokio::select! {
        _ = shutdown_signal() => {}
        result = &mut http_task => {
            match result {
                Ok(Ok(())) => warn!("HTTP server stopped unexpectedly"),
                Ok(Err(e)) => error!(error = %e, "HTTP server error"),
                Err(e) => error!(error = %e, "HTTP server task failed"),
            }
        }
    }

    // Signal shutdown
    let _ = shutdown_tx.send(true);

    // A collector stuck in a scrape is not waited for
    for task in &collector_tasks {
        task.abort();
    }

    let _ = tokio::time::timeout(Duration::from_secs(5), async {
        if !http_task.is_finished() {
            let _ = http_task.await;
        }
        for task in collector_tasks {
            let _ = task.await;
        }
    })
    .await;

    info!(incidents = store.incidents().get(), "Exporter stopped");
    Ok(())
}

/// Resolve on Ctrl+C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down...");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received SIGTERM, shutting down...");
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
