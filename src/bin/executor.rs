//! Executor entry point: update requests in, compose reconciliations out.

use std::sync::Arc;
use std::time::Duration;

use log::info;

use pushsync::auth::AuthToken;
use pushsync::compose::DockerComposeCli;
use pushsync::config::{init_logging, ExecutorConfig};
use pushsync::executor;
use pushsync::orchestrator::Orchestrator;
use pushsync::runtime::DockerRuntime;
use pushsync::web;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = ExecutorConfig::load()?;
    init_logging(cfg.debug);
    info!(
        "Starting pushsync executor ({} concurrent runs, reconcile timeout {}s)",
        cfg.max_concurrent_runs, cfg.reconcile_timeout_secs
    );

    let orchestrator = Orchestrator::new(
        Arc::new(DockerRuntime::new()),
        Arc::new(
            DockerComposeCli::new(cfg.compose_command.clone())
                .with_deadline(Duration::from_secs(cfg.compose_deadline_secs)),
        ),
        Duration::from_secs(cfg.reconcile_timeout_secs),
    );
    let app = executor::router(
        AuthToken::new(&cfg.token),
        Arc::new(orchestrator),
        cfg.max_concurrent_runs,
    );
    web::serve(cfg.bind_addr(), app).await?;

    info!("Exiting");
    Ok(())
}
