//! Registry notification model and image extraction.
//!
//! The registry posts an envelope of events.  Only `push` events name an
//! image worth updating; every other action is dropped without error.

use std::collections::HashSet;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;
use crate::types::ImageReference;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookBatch {
    #[serde(default)]
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub action: Action,
    #[serde(default)]
    pub target: Target,
    #[serde(default)]
    pub source: Source,
    #[serde(default)]
    pub request: Request,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Push,
    Pull,
    Delete,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Target {
    #[serde(default)]
    pub repository: String,
    /// Only set on push.
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub digest: Option<String>,
    #[serde(default, rename = "mediaType")]
    pub media_type: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Source {
    #[serde(default, rename = "addr")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub host: String,
}

impl WebhookBatch {
    pub fn decode(body: &[u8]) -> Result<Self, DecodeError> {
        Ok(serde_json::from_slice(body)?)
    }

    /// Canonical references of every push event, first-seen order, no duplicates.
    pub fn images(&self) -> Vec<ImageReference> {
        let pushed = self.events.iter().filter_map(|event| match event.action {
            Action::Push => {
                debug!(
                    "Push received for {}:{} from {}",
                    event.target.repository, event.target.tag, event.request.host
                );
                Some(ImageReference::from_parts(
                    &event.request.host,
                    &event.target.repository,
                    &event.target.tag,
                ))
            }
            Action::Pull | Action::Delete => None,
            Action::Unknown => {
                debug!(
                    "Unknown webhook action for {}, skipping",
                    event.target.repository
                );
                None
            }
        });
        dedup_images(pushed)
    }
}

/// Collapses duplicates while keeping the first occurrence's position.
pub fn dedup_images(images: impl IntoIterator<Item = ImageReference>) -> Vec<ImageReference> {
    let mut seen = HashSet::new();
    images
        .into_iter()
        .filter(|image| seen.insert(image.clone()))
        .collect()
}
