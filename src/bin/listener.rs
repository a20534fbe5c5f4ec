//! Listener entry point: registry webhooks in, relay requests out.

use log::info;

use pushsync::auth::AuthToken;
use pushsync::config::{init_logging, ListenerConfig};
use pushsync::listener;
use pushsync::relay::RelayClient;
use pushsync::web;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = ListenerConfig::load()?;
    init_logging(cfg.debug);
    info!(
        "Starting pushsync listener relaying to {} (timeout {}s, {} attempt(s))",
        cfg.executor_url, cfg.relay_timeout_secs, cfg.relay_attempts
    );

    let relay = RelayClient::from_config(&cfg)?;
    let app = listener::router(AuthToken::new(&cfg.in_token), relay);
    web::serve(cfg.bind_addr(), app).await?;

    info!("Exiting");
    Ok(())
}
