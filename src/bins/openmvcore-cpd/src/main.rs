//! OpenMVCore control plane daemon
//!
//! Runs registration (N2-style), session management (GTPv2-C) and the N4
//! client towards the user plane in one process.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;

use openmvcore_cpd::{start_services, CpConfig, CpContext, PfcpInstaller};

const DEFAULT_CONFIG_PATH: &str = "/etc/openmvcore/cpd.yaml";
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// OpenMVCore control plane
#[derive(Parser, Debug)]
#[command(name = "openmvcore-cpd")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Mobile core session control plane (registration, sessions, N4)")]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Disable color output
    #[arg(long)]
    no_color: bool,

    /// Registration listener address
    #[arg(short = 'e', long)]
    ngap_addr: Option<SocketAddr>,

    /// GTP-C listener address
    #[arg(short = 'g', long)]
    gtpc_addr: Option<SocketAddr>,

    /// User plane PFCP address
    #[arg(short = 'u', long)]
    upf_addr: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args);

    log::info!("OpenMVCore control plane v{} starting...", env!("CARGO_PKG_VERSION"));

    let shutdown = Arc::new(AtomicBool::new(false));
    let cancel = CancellationToken::new();
    setup_signal_handlers(shutdown.clone(), cancel.clone())?;

    let config = load_config(&args)?;

    let installer = Arc::new(
        PfcpInstaller::connect(&config.pfcp)
            .await
            .context("Failed to bind PFCP socket")?,
    );
    if let Err(e) = installer.associate().await {
        log::warn!("PFCP association with {} failed: {}", installer.peer(), e);
    }

    let ctx = CpContext::new(config, installer.clone()).context("Invalid UE pool configuration")?;
    let services = start_services(&ctx, &cancel)
        .await
        .context("Failed to bind listeners")?;

    log::info!(
        "OpenMVCore control plane ready (NGAP {}, GTP-C {}, UPF {})",
        services.ngap_addr,
        services.gtpc_addr,
        installer.peer()
    );

    run_event_loop(&installer, &shutdown, &cancel).await;

    log::info!("Shutting down...");
    cancel.cancel();
    services.join().await;
    log::info!(
        "OpenMVCore control plane stopped ({} sessions, {} subscribers)",
        ctx.sessions.count(),
        ctx.subscribers.count()
    );
    Ok(())
}

fn init_logging(args: &Args) {
    let mut builder = env_logger::Builder::new();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "info" => log::LevelFilter::Info,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        _ => log::LevelFilter::Info,
    };
    builder.filter_level(level);
    builder.format_timestamp_millis();

    if args.no_color {
        builder.write_style(env_logger::WriteStyle::Never);
    }

    builder.init();
}

fn setup_signal_handlers(shutdown: Arc<AtomicBool>, cancel: CancellationToken) -> Result<()> {
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        shutdown.store(true, Ordering::SeqCst);
        cancel.cancel();
    })
    .context("Failed to set Ctrl+C handler")?;

    Ok(())
}

/// Load the YAML config and apply command line overrides
///
/// A missing file is only an error when the path was given explicitly.
fn load_config(args: &Args) -> Result<CpConfig> {
    let mut config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from {}", path);
            CpConfig::load(path).with_context(|| format!("Failed to load config {}", path))?
        }
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            log::info!("Loading configuration from {}", DEFAULT_CONFIG_PATH);
            CpConfig::load(DEFAULT_CONFIG_PATH)
                .with_context(|| format!("Failed to load config {}", DEFAULT_CONFIG_PATH))?
        }
        None => {
            log::debug!("Configuration file not found: {}, using defaults", DEFAULT_CONFIG_PATH);
            CpConfig::default()
        }
    };

    if let Some(addr) = args.ngap_addr {
        config.ngap.addr = addr;
    }
    if let Some(addr) = args.gtpc_addr {
        config.gtpc.addr = addr;
    }
    if let Some(addr) = args.upf_addr {
        config.pfcp.upf_addr = addr;
    }
    Ok(config)
}

/// Wait for shutdown, probing the user plane periodically
async fn run_event_loop(installer: &PfcpInstaller, shutdown: &AtomicBool, cancel: &CancellationToken) {
    log::debug!("Entering main event loop");
    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.tick().await;

    while !shutdown.load(Ordering::SeqCst) {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = heartbeat.tick() => {
                match installer.heartbeat().await {
                    Ok(ts) => log::debug!("PFCP heartbeat from {} (recovery={})", installer.peer(), ts),
                    Err(e) => log::warn!("PFCP heartbeat to {} failed: {}", installer.peer(), e),
                }
            }
        }
    }
    log::debug!("Exiting main event loop");
}
