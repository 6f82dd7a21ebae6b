//! Prometheus exporter for Zabbix proxy statistics.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

use zabbix_proxy_exporter::config::LogFormat;
use zabbix_proxy_exporter::{ExporterConfig, HttpServer, ProxyCollector, ProxySettings};

/// Prometheus exporter for Zabbix proxy statistics.
#[derive(Parser, Debug)]
#[command(name = "zabbix-proxy-exporter")]
#[command(about = "Export Zabbix proxy statistics as Prometheus metrics")]
#[command(version)]
struct Args {
    /// Path to exporter configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<String>,

    /// Path to the Zabbix proxy configuration file (overrides config).
    #[arg(long)]
    proxy_config: Option<PathBuf>,

    /// HTTP listen address (overrides config).
    #[arg(long)]
    listen: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        ExporterConfig::load_from_file(config_path)?
    } else {
        ExporterConfig::default()
    };

    // CLI overrides
    if let Some(listen) = args.listen {
        config.server.listen = listen;
    }
    if let Some(proxy_config) = args.proxy_config {
        config.proxy.config = proxy_config;
    }

    // Initialize logging
    let log_level = args.log_level.parse().unwrap_or(Level::INFO);
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("zabbix_proxy_exporter={}", log_level).parse()?)
        .add_directive(format!("sqlx={}", Level::WARN).parse()?);

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }

    info!("Starting Zabbix proxy exporter");

    // Resolve the proxy's own configuration. This is the only fatal startup
    // error: without a database path there is nothing to export.
    let settings = ProxySettings::from_file(&config.proxy.config).with_context(|| {
        format!(
            "cannot resolve proxy configuration from '{}'",
            config.proxy.config.display()
        )
    })?;

    info!(
        db = %settings.db_path.display(),
        host = %settings.hostname,
        "Resolved proxy settings"
    );

    let listen_addr = config
        .server
        .listen
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid listen address: {}", e))?;

    let collector = Arc::new(ProxyCollector::new(settings));

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let http_server = HttpServer::new(collector, listen_addr, config.server.path.clone());
    let http_task = tokio::spawn(async move {
        if let Err(e) = http_server.run(shutdown_rx).await {
            error!("HTTP server error: {}", e);
        }
    });

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = async {
            #[cfg(unix)]
            {
                let mut sigterm = tokio::signal::unix::signal(
                    tokio::signal::unix::SignalKind::terminate()
                ).unwrap();
                sigterm.recv().await;
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
            }
        } => {
            info!("Received SIGTERM, shutting down...");
        }
    }

    // Signal shutdown
    shutdown_tx.send(true)?;

    let _ = tokio::time::timeout(Duration::from_secs(5), http_task).await;

    info!("Exporter stopped");
    Ok(())
}
