use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use bollard::container::ListContainersOptions;
use bollard::models::ContainerSummary;
use bollard::Docker;
use log::debug;

use super::ContainerRuntime;
use crate::types::{Container, ImageReference};

/// Docker runtime client. A fresh daemon connection is opened per query.
#[derive(Debug, Default, Clone)]
pub struct DockerRuntime;

impl DockerRuntime {
    pub fn new() -> Self {
        Self
    }

    fn connect() -> Result<Docker> {
        // Honours DOCKER_HOST, falling back to the local unix socket.
        Docker::connect_with_local_defaults().map_err(Into::into)
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn containers_by_image(&self, image: &ImageReference) -> Result<Vec<Container>> {
        let docker = Self::connect()?;
        let opts = ListContainersOptions::<String> {
            all: false,
            filters: HashMap::from([("ancestor".to_string(), vec![image.to_string()])]),
            ..Default::default()
        };
        let summaries = docker.list_containers(Some(opts)).await?;
        debug!("Runtime listed {} containers for {}", summaries.len(), image);

        Ok(summaries
            .into_iter()
            .map(container_from_summary)
            .filter(|c| is_exact_match(c, image))
            .collect())
    }
}

// `ancestor` also matches containers of descendant images, and containers
// reported only by image id cannot be told apart from them.
fn is_exact_match(container: &Container, image: &ImageReference) -> bool {
    container.image == image.as_str()
}

fn container_from_summary(summary: ContainerSummary) -> Container {
    Container {
        id: summary.id.unwrap_or_default(),
        names: summary
            .names
            .unwrap_or_default()
            .into_iter()
            .map(|n| n.trim_start_matches('/').to_string())
            .collect(),
        labels: summary.labels.unwrap_or_default(),
        image: summary.image.unwrap_or_default(),
    }
}
