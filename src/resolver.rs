//! Maps managed containers onto the compose projects that own them.

use std::collections::HashSet;
use std::path::PathBuf;

use log::warn;

use crate::discovery::PROJECT_LABEL;
use crate::error::ResolutionError;
use crate::types::{Container, Deployment};

pub const CONFIG_FILES_LABEL: &str = "com.docker.compose.project.config_files";
pub const WORKING_DIR_LABEL: &str = "com.docker.compose.project.working_dir";

pub fn deployment_of(container: &Container) -> Result<Deployment, ResolutionError> {
    Ok(Deployment {
        name: label(container, PROJECT_LABEL)?.to_string(),
        definition_file: PathBuf::from(label(container, CONFIG_FILES_LABEL)?),
        working_directory: PathBuf::from(label(container, WORKING_DIR_LABEL)?),
    })
}

fn label<'a>(container: &'a Container, key: &'static str) -> Result<&'a str, ResolutionError> {
    let value = container
        .labels
        .get(key)
        .ok_or_else(|| ResolutionError::MissingLabel {
            container: container.id.clone(),
            label: key,
        })?
        .trim();
    if value.is_empty() {
        return Err(ResolutionError::EmptyLabel {
            container: container.id.clone(),
            label: key,
        });
    }
    Ok(value)
}

/// Distinct deployments in first-seen order. Containers with unusable
/// labels are skipped.
pub fn resolve(managed: &[Container]) -> Vec<Deployment> {
    let mut seen = HashSet::new();
    let mut deployments = Vec::new();
    for container in managed {
        match deployment_of(container) {
            Ok(deployment) => {
                if seen.insert(deployment.clone()) {
                    deployments.push(deployment);
                }
            }
            Err(e) => warn!("Skipping container: {}", e),
        }
    }
    deployments
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn managed(id: &str, project: &str, file: &str, dir: &str) -> Container {
        Container {
            id: id.into(),
            labels: HashMap::from([
                (PROJECT_LABEL.to_string(), project.to_string()),
                (CONFIG_FILES_LABEL.to_string(), file.to_string()),
                (WORKING_DIR_LABEL.to_string(), dir.to_string()),
            ]),
            ..Default::default()
        }
    }

    #[test]
    fn same_triple_resolves_once() {
        let containers = vec![
            managed("web", "foo", "/a/docker-compose.yml", "/a"),
            managed("worker", "foo", "/a/docker-compose.yml", "/a"),
        ];
        let deployments = resolve(&containers);
        assert_eq!(deployments.len(), 1);
        assert_eq!(deployments[0].name, "foo");
        assert_eq!(deployments[0].working_directory, PathBuf::from("/a"));
    }

    #[test]
    fn dedup_is_independent_of_input_order() {
        let a = managed("1", "foo", "/a/docker-compose.yml", "/a");
        let b = managed("2", "bar", "/b/docker-compose.yml", "/b");
        let a2 = managed("3", "foo", "/a/docker-compose.yml", "/a");

        let forward = resolve(&[a.clone(), b.clone(), a2.clone()]);
        let reverse = resolve(&[a2, b, a]);
        assert_eq!(forward.len(), 2);
        assert_eq!(reverse.len(), 2);
        for d in &forward {
            assert_eq!(reverse.iter().filter(|r| *r == d).count(), 1);
        }
    }

    #[test]
    fn differing_working_dir_is_a_different_deployment() {
        let deployments = resolve(&[
            managed("1", "foo", "/a/docker-compose.yml", "/a"),
            managed("2", "foo", "/a/docker-compose.yml", "/elsewhere"),
        ]);
        assert_eq!(deployments.len(), 2);
    }

    #[test]
    fn malformed_labels_skip_only_that_container() {
        let mut broken = managed("broken", "foo", "/a/docker-compose.yml", "/a");
        broken.labels.remove(WORKING_DIR_LABEL);
        let blank = managed("blank", "baz", " ", "/c");

        assert_eq!(
            deployment_of(&broken),
            Err(ResolutionError::MissingLabel {
                container: "broken".into(),
                label: WORKING_DIR_LABEL,
            })
        );
        assert!(matches!(
            deployment_of(&blank),
            Err(ResolutionError::EmptyLabel { .. })
        ));

        let deployments = resolve(&[
            broken,
            blank,
            managed("ok", "bar", "/b/docker-compose.yml", "/b"),
        ]);
        assert_eq!(deployments.len(), 1);
        assert_eq!(deployments[0].name, "bar");
    }
}
