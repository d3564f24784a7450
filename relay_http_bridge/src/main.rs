use clap::Parser;
use relay_core::{BackendRegistry, SessionConfig, SessionRegistry};
use relay_http_bridge::{BridgeConfig, start_bridge};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// HTTP bridge to stdio JSON-RPC backends.
///
/// Exposes a small REST surface over a table of launchable backend programs;
/// each session gets its own child process speaking newline-delimited
/// JSON-RPC over its stdio pipes.
#[derive(Parser, Debug)]
#[command(name = "relay_http_bridge")]
#[command(version, about)]
struct Args {
    /// Address to bind the HTTP server.
    #[arg(long, default_value = "127.0.0.1:3000")]
    bind_addr: SocketAddr,

    /// JSON file mapping backend names to launch descriptors.
    #[arg(long, default_value = "backends.json")]
    backends: PathBuf,

    /// Per-request deadline in seconds.
    #[arg(long, default_value_t = relay_core::DEFAULT_REQUEST_TIMEOUT_SECS)]
    request_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let backends = BackendRegistry::from_file(&args.backends)?;
    tracing::info!(
        backends = backends.list().len(),
        config = %args.backends.display(),
        "loaded backend registry"
    );

    let registry = SessionRegistry::new(
        backends,
        SessionConfig {
            request_timeout: Duration::from_secs(args.request_timeout_secs),
        },
    );

    let config = BridgeConfig {
        bind_addr: args.bind_addr,
    };
    tracing::info!("Starting relay HTTP bridge on {}", config.bind_addr);
    start_bridge(config, registry).await?;
    Ok(())
}
