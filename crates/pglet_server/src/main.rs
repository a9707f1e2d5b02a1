use anyhow::Context as _;
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let addr: SocketAddr = std::env::var("PGLET_SERVER_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:8421".to_owned())
        .parse()
        .context("invalid PGLET_SERVER_ADDR")?;

    let config = pglet_server::ServerConfig::from_env()?;
    tracing::info!(root = %config.root.display(), "using data directory");

    let server = pglet_server::start_server_with_config(addr, config).await?;
    tracing::info!(addr = %server.addr, "pglet_server listening");

    let engine = server.engine.clone();
    tokio::select! {
        result = server.wait() => result?,
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for ctrl-c")?;
            if let Err(err) = engine.flush().await {
                tracing::warn!(error = %err, "failed to flush session on shutdown");
            }
            tracing::info!("shutting down");
        }
    }
    Ok(())
}
