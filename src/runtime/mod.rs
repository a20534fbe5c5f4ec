use anyhow::Result;
use async_trait::async_trait;

use crate::types::{Container, ImageReference};

pub mod docker;
pub use docker::DockerRuntime;

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Lists running containers created from exactly `image`, in the
    /// runtime's listing order.
    async fn containers_by_image(&self, image: &ImageReference) -> Result<Vec<Container>>;
}
