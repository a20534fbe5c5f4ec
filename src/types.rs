//! Data structures shared by the listener and the executor.
//!
//! Image references travel between the two services as plain JSON
//! strings.  Containers and deployments only exist inside the executor
//! and are re-derived from the live runtime on every run; nothing here
//! is cached or persisted.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Canonical `host/repository:tag` string.
///
/// Used both as the dedup key inside a webhook batch and as the exact
/// image filter when querying the container runtime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageReference(String);

impl ImageReference {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Builds the canonical reference from the parts of a push event.
    pub fn from_parts(host: &str, repository: &str, tag: &str) -> Self {
        Self(format!("{}/{}:{}", host, repository, tag))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A container as reported by the runtime listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Container {
    pub id: String,
    pub names: Vec<String>,
    pub labels: HashMap<String, String>,
    pub image: String,
}

/// A compose project, identified by the triple of its three labels.
///
/// Equality and hashing cover exactly the identity triple, so two
/// containers of the same project collapse into one value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Deployment {
    pub name: String,
    pub definition_file: PathBuf,
    pub working_directory: PathBuf,
}

impl fmt::Display for Deployment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, {})",
            self.name,
            self.definition_file.display(),
            self.working_directory.display()
        )
    }
}

/// Outcome of one pull + reconcile cycle.
#[derive(Debug)]
pub struct UpdateResult {
    pub deployment: Deployment,
    pub outcome: Result<(), crate::error::UpdateError>,
}

/// Aggregate counts for one executor run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub images: usize,
    pub discovery_failures: usize,
    pub standalone: usize,
    pub attempted: usize,
    pub updated: usize,
}

impl RunSummary {
    pub fn failed(&self) -> usize {
        self.attempted - self.updated
    }
}
