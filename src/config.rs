use std::net::SocketAddr;

use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

const ENV_PREFIX: &str = "PUSHSYNC_";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListenerConfig {
    pub web_port: u16,
    pub debug: bool,
    /// Token the registry must present.
    pub in_token: String,
    /// Token presented to the executor.
    pub out_token: String,
    pub executor_url: String,
    pub relay_timeout_secs: u64,
    pub relay_attempts: u32,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            web_port: 3000,
            debug: false,
            in_token: String::new(),
            out_token: String::new(),
            executor_url: String::new(),
            relay_timeout_secs: 2,
            relay_attempts: 1,
        }
    }
}

impl ListenerConfig {
    pub fn load() -> anyhow::Result<Self> {
        Self::from_figment(layered(
            Serialized::defaults(Self::default()),
            "pushsync-listener",
        ))
    }

    fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        let mut config: ListenerConfig = figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

        // Support Docker-style secrets
        if let Some(secret) = read_secret("PUSHSYNC_IN_TOKEN_FILE")? {
            config.in_token = secret;
        }
        if let Some(secret) = read_secret("PUSHSYNC_OUT_TOKEN_FILE")? {
            config.out_token = secret;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.in_token.trim().is_empty() {
            anyhow::bail!("in_token is required");
        }
        if self.executor_url.is_empty() {
            anyhow::bail!("executor_url is required");
        }
        let url = reqwest::Url::parse(&self.executor_url)
            .map_err(|e| anyhow::anyhow!("Unable to parse executor_url: {}", e))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("executor_url must be http or https, got {}", url.scheme());
        }
        if self.relay_attempts == 0 {
            anyhow::bail!("relay_attempts must be at least 1");
        }
        if self.relay_timeout_secs == 0 {
            anyhow::bail!("relay_timeout_secs must be at least 1");
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.web_port))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecutorConfig {
    pub web_port: u16,
    pub debug: bool,
    pub token: String,
    pub max_concurrent_runs: usize,
    pub reconcile_timeout_secs: u64,
    /// Binary providing the `compose` subcommand.
    pub compose_command: String,
    /// Kill a `pull` or `up` child still running after this long.
    pub compose_deadline_secs: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            web_port: 3000,
            debug: false,
            token: String::new(),
            max_concurrent_runs: 4,
            reconcile_timeout_secs: 10,
            compose_command: "docker".into(),
            compose_deadline_secs: 600,
        }
    }
}

impl ExecutorConfig {
    pub fn load() -> anyhow::Result<Self> {
        Self::from_figment(layered(
            Serialized::defaults(Self::default()),
            "pushsync-executor",
        ))
    }

    fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        let mut config: ExecutorConfig = figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

        if let Some(secret) = read_secret("PUSHSYNC_TOKEN_FILE")? {
            config.token = secret;
        }

        if config.token.trim().is_empty() {
            anyhow::bail!("token is required");
        }
        if config.max_concurrent_runs == 0 {
            anyhow::bail!("max_concurrent_runs must be at least 1");
        }
        if config.compose_deadline_secs == 0 {
            anyhow::bail!("compose_deadline_secs must be at least 1");
        }
        Ok(config)
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.web_port))
    }
}

fn layered(defaults: impl figment::Provider, file_stem: &str) -> Figment {
    Figment::from(defaults)
        .merge(Toml::file(format!("{}.toml", file_stem)))
        .merge(Json::file(format!("{}.json", file_stem)))
        .merge(Env::prefixed(ENV_PREFIX))
}

fn read_secret(var: &str) -> anyhow::Result<Option<String>> {
    match std::env::var(var) {
        Ok(path) => Ok(Some(std::fs::read_to_string(path)?.trim().to_string())),
        Err(_) => Ok(None),
    }
}

/// Initializes `env_logger`, honouring `RUST_LOG` over the debug toggle.
pub fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}
