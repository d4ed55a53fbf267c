//! OpenMVCore user plane N4 responder

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;

use openmvcore_upfd::PfcpServer;

/// OpenMVCore UPF - N4 responder
#[derive(Parser, Debug)]
#[command(name = "openmvcore-upfd")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "User plane PFCP responder", long_about = None)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Disable color output
    #[arg(long)]
    no_color: bool,

    /// PFCP listen address
    #[arg(short, long, default_value = "127.0.0.1:8805")]
    pfcp_addr: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args);

    log::info!("OpenMVCore UPF v{} starting...", env!("CARGO_PKG_VERSION"));

    let shutdown = Arc::new(AtomicBool::new(false));
    let cancel = CancellationToken::new();
    setup_signal_handlers(shutdown.clone(), cancel.clone())?;

    let server = PfcpServer::bind(args.pfcp_addr)
        .await
        .with_context(|| format!("Failed to bind PFCP socket on {}", args.pfcp_addr))?;

    server.run(cancel).await.context("PFCP server failed")?;

    log::info!(
        "OpenMVCore UPF stopped ({} sessions, shutdown={})",
        server.sessions().count(),
        shutdown.load(Ordering::SeqCst)
    );
    Ok(())
}

fn init_logging(args: &Args) {
    let mut builder = env_logger::Builder::new();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_default_pfcp_addr() {
        let args = Args::parse_from(["openmvcore-upfd"]);
        assert_eq!(args.pfcp_addr, "127.0.0.1:8805".parse().unwrap());
        assert_eq!(args.log_level, "info");
    }

    #[test]
    fn test_args_custom() {
        let args = Args::parse_from(["openmvcore-upfd", "-p", "0.0.0.0:18805", "--no-color"]);
        assert_eq!(args.pfcp_addr.port(), 18805);
        assert!(args.no_color);
    }
}
