//! Boundary to the compose reconciliation engine.
//!
//! The executor prepares a [`ComposeProject`] (merged environment and
//! validated definition files) and hands it to a [`ComposeEngine`] for the
//! pull and reconcile steps. The production engine drives the
//! `docker compose` CLI.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use tokio::process::Command;

use crate::error::UpdateError;
use crate::types::Deployment;

const DOTENV_FILE: &str = ".env";

/// Everything the engine needs to act on one deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeProject {
    pub name: String,
    pub files: Vec<PathBuf>,
    pub working_dir: PathBuf,
    pub environment: HashMap<String, String>,
}

/// Options for the reconcile step.
///
/// Services are recreated only when their configuration diverged, anonymous
/// volumes carry over from the previous containers and pull progress is
/// suppressed. Those are the `up` defaults plus `--quiet-pull`, so only the
/// stop timeout is tunable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpOptions {
    pub timeout: Duration,
}

impl UpOptions {
    pub fn reconcile(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
pub trait ComposeEngine: Send + Sync {
    /// Pulls every image the project references, without progress output.
    async fn pull(&self, project: &ComposeProject) -> Result<(), UpdateError>;

    async fn up(&self, project: &ComposeProject, options: &UpOptions) -> Result<(), UpdateError>;
}

/// `.env` in `working_dir` overlaid by the process environment.
///
/// Process variables win on key collision. A missing `.env` is not an error.
pub fn load_environment(
    working_dir: &Path,
    process_env: impl IntoIterator<Item = (String, String)>,
) -> Result<HashMap<String, String>, UpdateError> {
    let path = working_dir.join(DOTENV_FILE);
    let mut env = HashMap::new();

    match dotenvy::from_path_iter(&path) {
        Ok(entries) => {
            for entry in entries {
                let (key, value) = entry.map_err(|source| UpdateError::Environment {
                    path: path.clone(),
                    source,
                })?;
                env.insert(key, value);
            }
        }
        Err(e) if e.not_found() => debug!("No {} in {}", DOTENV_FILE, working_dir.display()),
        Err(source) => return Err(UpdateError::Environment { path, source }),
    }

    env.extend(process_env);
    Ok(env)
}

/// The process environment, without the variables that are not valid UTF-8.
pub fn process_environment() -> Vec<(String, String)> {
    utf8_pairs(std::env::vars_os())
}

fn utf8_pairs(vars: impl IntoIterator<Item = (OsString, OsString)>) -> Vec<(String, String)> {
    vars.into_iter()
        .filter_map(|(key, value)| match (key.into_string(), value.into_string()) {
            (Ok(key), Ok(value)) => Some((key, value)),
            (key, _) => {
                debug!("Ignoring non UTF-8 environment variable {:?}", key);
                None
            }
        })
        .collect()
}

/// Reads and validates the deployment's definition file(s).
///
/// The compose label may list several comma separated files; relative
/// entries are taken from the working directory.
pub async fn load_project(
    deployment: &Deployment,
    environment: HashMap<String, String>,
) -> Result<ComposeProject, UpdateError> {
    let listed = deployment.definition_file.to_string_lossy();
    let mut files = Vec::new();
    let mut defines_services = false;
    for entry in listed.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let file = deployment.working_directory.join(entry);
        let contents =
            tokio::fs::read_to_string(&file)
                .await
                .map_err(|source| UpdateError::ReadDefinition {
                    path: file.clone(),
                    source,
                })?;
        defines_services |= validate_definition(&file, &contents)?;
        files.push(file);
    }
    if files.is_empty() {
        return Err(UpdateError::InvalidDefinition {
            path: deployment.definition_file.clone(),
            reason: "no definition files listed".into(),
        });
    }
    if !defines_services {
        return Err(UpdateError::InvalidDefinition {
            path: deployment.definition_file.clone(),
            reason: "no file defines a `services` section".into(),
        });
    }

    Ok(ComposeProject {
        name: deployment.name.clone(),
        files,
        working_dir: deployment.working_directory.clone(),
        environment,
    })
}

/// Checks one file of the project. Override files may leave `services`
/// out; returns whether this one defines it.
fn validate_definition(path: &Path, contents: &str) -> Result<bool, UpdateError> {
    let invalid = |reason: String| UpdateError::InvalidDefinition {
        path: path.to_path_buf(),
        reason,
    };
    let document: serde_yaml::Value =
        serde_yaml::from_str(contents).map_err(|e| invalid(e.to_string()))?;
    let root = document
        .as_mapping()
        .ok_or_else(|| invalid("top level is not a mapping".into()))?;
    match root.get("services") {
        Some(services) if services.is_mapping() => Ok(true),
        Some(_) => Err(invalid("`services` is not a mapping".into())),
        None => Ok(false),
    }
}

/// Drives `<command> compose ...` as a child process.
#[derive(Debug, Clone)]
pub struct DockerComposeCli {
    command: String,
    deadline: Duration,
}

impl DockerComposeCli {
    pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(600);

    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            deadline: Self::DEFAULT_DEADLINE,
        }
    }

    /// Upper bound on each child process. The child is killed once it passes.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    fn project_args(project: &ComposeProject) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "compose".into(),
            "--project-name".into(),
            project.name.clone().into(),
            "--project-directory".into(),
            project.working_dir.clone().into(),
        ];
        for file in &project.files {
            args.push("-f".into());
            args.push(file.clone().into());
        }
        args
    }

    fn pull_args(project: &ComposeProject) -> Vec<OsString> {
        let mut args = Self::project_args(project);
        args.push("pull".into());
        args.push("--quiet".into());
        args
    }

    fn up_args(project: &ComposeProject, options: &UpOptions) -> Vec<OsString> {
        let mut args = Self::project_args(project);
        args.push("up".into());
        args.push("--detach".into());
        args.push("--quiet-pull".into());
        args.push("--timeout".into());
        args.push(options.timeout.as_secs().to_string().into());
        args
    }

    async fn run(&self, project: &ComposeProject, args: Vec<OsString>) -> Result<(), String> {
        debug!("Running {} {:?}", self.command, args);
        let child = Command::new(&self.command)
            .args(&args)
            .current_dir(&project.working_dir)
            .env_clear()
            .envs(&project.environment)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();
        let output = tokio::time::timeout(self.deadline, child)
            .await
            .map_err(|_| {
                format!(
                    "{} timed out after {}s",
                    self.command,
                    self.deadline.as_secs_f32()
                )
            })?
            .map_err(|e| format!("unable to run {}: {}", self.command, e))?;

        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(format!("{} ({})", stderr, output.status))
    }
}

#[async_trait]
impl ComposeEngine for DockerComposeCli {
    async fn pull(&self, project: &ComposeProject) -> Result<(), UpdateError> {
        self.run(project, Self::pull_args(project))
            .await
            .map_err(UpdateError::Pull)
    }

    async fn up(&self, project: &ComposeProject, options: &UpOptions) -> Result<(), UpdateError> {
        self.run(project, Self::up_args(project, options))
            .await
            .map_err(UpdateError::Reconcile)
    }
}
