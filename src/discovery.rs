//! Finds the containers running an image and splits them by ownership.

use crate::error::DiscoveryError;
use crate::runtime::ContainerRuntime;
use crate::types::{Container, ImageReference};

/// Label compose stamps on every container it creates.
pub const PROJECT_LABEL: &str = "com.docker.compose.project";

#[derive(Debug, Default)]
pub struct Discovered {
    pub managed: Vec<Container>,
    pub standalone: Vec<Container>,
}

pub fn is_managed(container: &Container) -> bool {
    container.labels.contains_key(PROJECT_LABEL)
}

/// Stable partition of `containers`, listing order preserved on both sides.
pub fn classify(containers: Vec<Container>) -> Discovered {
    let (managed, standalone): (Vec<_>, Vec<_>) = containers.into_iter().partition(is_managed);
    Discovered {
        managed,
        standalone,
    }
}

pub async fn discover(
    runtime: &dyn ContainerRuntime,
    image: &ImageReference,
) -> Result<Discovered, DiscoveryError> {
    let containers = runtime
        .containers_by_image(image)
        .await
        .map_err(|source| DiscoveryError {
            image: image.to_string(),
            source: source.into(),
        })?;
    Ok(classify(containers))
}
