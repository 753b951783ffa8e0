//! loggated — the Loggate gateway daemon.
//!
//! Single binary that assembles the gateway's surfaces:
//! - Ingestion listener (batch log POSTs + client-metric exposition)
//! - Session-recording listener
//! - Optional peer-scrape listener
//!
//! # Usage
//!
//! ```text
//! loggated --config /etc/loggate/loggate.toml
//! ```

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use loggate_core::config::{Config, ListenerConfig, ListenerKind, LogConfig, LogFormat};
use loggate_ingest::{FileLogger, Forwarder, HostInfoSink, Pipeline};
use loggate_metrics::MetricRegistry;
use loggate_record::Recorder;
use loggate_scrape::ScrapeAggregator;

/// How long in-flight requests may drain after the shutdown signal.
/// Recordings in particular must get a chance to flush and close —
/// exclusive-creation semantics make a severed recording unextendable.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "loggated", about = "Multi-tenant log ingestion gateway")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, default_value = "loggate.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_file(&cli.config).context("loading config")?;
    init_tracing(&config.log);
    debug!(?config, "config loaded");
    run(config).await
}

fn init_tracing(log: &LogConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log.level));
    match log.format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    // ── Ingestion pipeline ─────────────────────────────────────
    let processors = &config.ingest.processors;

    let registry = processors
        .metrics
        .then(|| Arc::new(MetricRegistry::new()));

    let file_logger = if processors.file_logger.enabled {
        Some(
            FileLogger::new(&processors.file_logger.dir)
                .await
                .context("init file logger")?,
        )
    } else {
        None
    };

    let host_info = processors.hostinfo.then(HostInfoSink::new);

    let forwarder = if processors.forward.enabled {
        info!(addr = %processors.forward.addr, "enabling forwarder");
        Some(Forwarder::new(&processors.forward.addr).context("init forwarder")?)
    } else {
        None
    };

    let pipeline = Arc::new(Pipeline::new(forwarder, file_logger, host_info, registry.clone()));
    let ingest = loggate_api::ingest_router(pipeline, registry);

    // ── Session recorder ───────────────────────────────────────
    let recorder = Arc::new(
        Recorder::new(&config.recorder.dir)
            .await
            .context("init recorder")?,
    );
    let record = loggate_api::record_router(recorder);

    // ── Peer scrape (optional) ─────────────────────────────────
    let scrape = if config.scrape.enabled {
        let aggregator = ScrapeAggregator::new(&config.scrape.targets)
            .context("init scrape aggregator")?;
        Some(loggate_api::scrape_router(Arc::new(aggregator)))
    } else {
        None
    };

    // ── Serve ──────────────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut servers = Vec::new();

    servers.push(spawn_server("ingest", &config.ingest.listener, ingest, shutdown_rx.clone()).await?);
    servers.push(spawn_server("recorder", &config.recorder.listener, record, shutdown_rx.clone()).await?);
    if let Some(router) = scrape {
        servers.push(spawn_server("scrape", &config.scrape.listener, router, shutdown_rx.clone()).await?);
    }

    tokio::signal::ctrl_c()
        .await
        .context("installing ctrl-c handler")?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    let drain = async {
        for server in servers {
            let _ = server.await;
        }
    };
    if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
        warn!(grace_secs = SHUTDOWN_GRACE.as_secs(), "drain grace period elapsed");
    }

    info!("loggated stopped");
    Ok(())
}

/// Bind a listener and serve a router on it until shutdown.
async fn spawn_server(
    name: &'static str,
    config: &ListenerConfig,
    router: axum::Router,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<JoinHandle<()>> {
    let addr = bind_addr(config)?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {name} listener on {addr}"))?;
    info!(component = name, %addr, "listening");

    Ok(tokio::spawn(async move {
        let serve = axum::serve(listener, router).with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        });
        if let Err(e) = serve.await {
            error!(component = name, error = %e, "server error");
        }
    }))
}

fn bind_addr(config: &ListenerConfig) -> anyhow::Result<SocketAddr> {
    match config.kind {
        ListenerKind::Plain => {
            let ip: IpAddr = config
                .addr
                .parse()
                .with_context(|| format!("parsing listener addr {:?}", config.addr))?;
            Ok(SocketAddr::new(ip, config.port))
        }
    }
}
