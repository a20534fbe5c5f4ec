//! Turns pushed image references into compose project updates.
//!
//! Per image: discover containers, report standalone ones, resolve the
//! managed ones to deployments, then pull and reconcile each deployment
//! not already handled in this run. Failures end only the image or the
//! deployment they belong to.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info};
use serde::Serialize;

use crate::compose::{self, ComposeEngine, UpOptions};
use crate::discovery::discover;
use crate::error::UpdateError;
use crate::resolver::resolve;
use crate::runtime::ContainerRuntime;
use crate::types::{Deployment, ImageReference, RunSummary, UpdateResult};

pub struct Orchestrator {
    runtime: Arc<dyn ContainerRuntime>,
    engine: Arc<dyn ComposeEngine>,
    reconcile_timeout: Duration,
    stats: RunStats,
}

impl Orchestrator {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        engine: Arc<dyn ComposeEngine>,
        reconcile_timeout: Duration,
    ) -> Self {
        Self {
            runtime,
            engine,
            reconcile_timeout,
            stats: RunStats::default(),
        }
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub async fn run(&self, images: &[ImageReference]) -> RunSummary {
        let mut summary = RunSummary::default();
        let mut handled: HashSet<Deployment> = HashSet::new();

        for image in images {
            summary.images += 1;
            let discovered = match discover(self.runtime.as_ref(), image).await {
                Ok(d) => d,
                Err(e) => {
                    error!("{}", e);
                    summary.discovery_failures += 1;
                    continue;
                }
            };

            for container in &discovered.standalone {
                info!(
                    "Standalone container {} {:?} runs {}, not updating",
                    container.id, container.names, image
                );
            }
            summary.standalone += discovered.standalone.len();

            let deployments = resolve(&discovered.managed);
            debug!(
                "{} managed containers of {} resolve to {} deployments",
                discovered.managed.len(),
                image,
                deployments.len()
            );

            for deployment in deployments {
                if !handled.insert(deployment.clone()) {
                    debug!("Deployment {} already updated in this run", deployment);
                    continue;
                }
                summary.attempted += 1;
                let result = self.update(deployment).await;
                match &result.outcome {
                    Ok(()) => {
                        summary.updated += 1;
                        info!("Updated deployment {} for {}", result.deployment, image);
                    }
                    Err(e) => error!(
                        "Failed to update deployment {} for {}: {}",
                        result.deployment, image, e
                    ),
                }
            }
        }

        info!(
            "Run finished: {}/{} deployments updated across {} images",
            summary.updated, summary.attempted, summary.images
        );
        self.stats.record(&summary);
        summary
    }

    /// One pull + reconcile cycle. Nothing is rolled back on failure.
    pub async fn update(&self, deployment: Deployment) -> UpdateResult {
        let outcome = self.try_update(&deployment).await;
        UpdateResult {
            deployment,
            outcome,
        }
    }

    async fn try_update(&self, deployment: &Deployment) -> Result<(), UpdateError> {
        let environment = compose::load_environment(
            &deployment.working_directory,
            compose::process_environment(),
        )?;
        let project = compose::load_project(deployment, environment).await?;

        debug!("Pulling images for {}", deployment.name);
        self.engine.pull(&project).await?;

        debug!("Reconciling {}", deployment.name);
        self.engine
            .up(&project, &UpOptions::reconcile(self.reconcile_timeout))
            .await
    }
}

/// Process-lifetime counters across every run.
#[derive(Debug, Default)]
pub struct RunStats {
    runs: AtomicU64,
    images: AtomicU64,
    discovery_failures: AtomicU64,
    standalone: AtomicU64,
    attempted: AtomicU64,
    updated: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub runs: u64,
    pub images: u64,
    pub discovery_failures: u64,
    pub standalone: u64,
    pub attempted: u64,
    pub updated: u64,
    pub failed: u64,
}

impl RunStats {
    fn record(&self, summary: &RunSummary) {
        let add = |counter: &AtomicU64, n: usize| {
            counter.fetch_add(n as u64, Ordering::Relaxed);
        };
        add(&self.runs, 1);
        add(&self.images, summary.images);
        add(&self.discovery_failures, summary.discovery_failures);
        add(&self.standalone, summary.standalone);
        add(&self.attempted, summary.attempted);
        add(&self.updated, summary.updated);
        add(&self.failed, summary.failed());
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let get = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        StatsSnapshot {
            runs: get(&self.runs),
            images: get(&self.images),
            discovery_failures: get(&self.discovery_failures),
            standalone: get(&self.standalone),
            attempted: get(&self.attempted),
            updated: get(&self.updated),
            failed: get(&self.failed),
        }
    }
}
