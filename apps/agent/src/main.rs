use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tunl::browser::open_browser;
use tunl::{Args, Config, Tunnel};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    info!("tunl v{}", env!("CARGO_PKG_VERSION"));
    info!("Local server: {}:{}", args.host, args.port);

    let config = Config::from_args(args)?;
    info!("Broker: {}", config.websocket_url);

    let open = config.open_browser;
    let tunnel = Tunnel::connect(config).await?;

    println!("↪ Your URL: {}", tunnel.public_url());
    if open && let Err(e) = open_browser(tunnel.public_url()) {
        warn!("{}", e);
    }

    // Run until the broker drops us or we are interrupted
    tokio::select! {
        result = tunnel.serve() => {
            match result {
                Ok(()) => info!("Tunnel closed"),
                Err(e) => error!("Tunnel error: {}", e),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl-C, shutting down gracefully...");
        }
    }

    Ok(())
}
