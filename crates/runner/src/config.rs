use std::path::{Path, PathBuf};
use std::time::Duration;

use sandbox::ResourceLimits;
use sandbox_docker::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_ENDPOINT, DockerConfig};
use serde::{Deserialize, Serialize};

use crate::error::{RunnerError, RunnerResult};
use crate::executor::ExecutorConfig;

pub const DEFAULT_IMAGE: &str = "aardvarkx1/scnode:latest";
pub const DEFAULT_USER: &str = "app";
pub const DEFAULT_INTERPRETER: [&str; 2] = ["node", "-e"];
pub const DEFAULT_PIDS_LIMIT: i64 = 1000;
/// 200 MiB.
pub const DEFAULT_MEMORY_BYTES: i64 = 209_715_200;
pub const DEFAULT_STOP_GRACE_SECS: u64 = 1;
pub const DEFAULT_TIMEOUT_MS: u64 = 2000;

pub const CONFIG_FILE_NAME: &str = "runner.yaml";

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub runtime: RuntimeConfig,
    pub sandbox: SandboxConfig,
    pub deadline: DeadlineConfig,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub endpoint: String,
    pub connect_timeout_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.into(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    pub image: String,
    pub user: String,
    /// Entry point the script is appended to as a single argument.
    pub interpreter: Vec<String>,
    pub pids_limit: i64,
    pub memory_bytes: i64,
    pub stop_grace_secs: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            image: DEFAULT_IMAGE.into(),
            user: DEFAULT_USER.into(),
            interpreter: DEFAULT_INTERPRETER.iter().map(|s| (*s).to_owned()).collect(),
            pids_limit: DEFAULT_PIDS_LIMIT,
            memory_bytes: DEFAULT_MEMORY_BYTES,
            stop_grace_secs: DEFAULT_STOP_GRACE_SECS,
        }
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeadlineConfig {
    /// Deadline used when a request carries no timeout of its own.
    pub default_timeout_ms: u64,
    /// When false, every run uses `default_timeout_ms` regardless of the request.
    pub honor_request_timeout: bool,
}

impl Default for DeadlineConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            honor_request_timeout: true,
        }
    }
}

/// Load and validate a runner config from a YAML file.
///
/// Missing sections and fields take their defaults.
pub async fn load(path: &Path) -> RunnerResult<RunnerConfig> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| RunnerError::Config(format!("read {}: {e}", path.display())))?;
    let config: RunnerConfig = serde_yaml_ng::from_str(&content)
        .map_err(|e| RunnerError::Config(format!("parse {}: {e}", path.display())))?;
    config.validate()?;
    Ok(config)
}

/// Write `config` as `runner.yaml` into `dir`, returning the file path.
///
/// Refuses to replace an existing file unless `overwrite` is set.
pub async fn generate(config: &RunnerConfig, dir: &Path, overwrite: bool) -> RunnerResult<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| RunnerError::Config(format!("create {}: {e}", dir.display())))?;

    let config_path = dir.join(CONFIG_FILE_NAME);
    let exists = tokio::fs::try_exists(&config_path)
        .await
        .map_err(|e| RunnerError::Config(format!("check {}: {e}", config_path.display())))?;
    if exists && !overwrite {
        return Err(RunnerError::Config(format!(
            "{} already exists",
            config_path.display()
        )));
    }

    let content = serde_yaml_ng::to_string(config)
        .map_err(|e| RunnerError::Config(format!("serialize config: {e}")))?;
    tokio::fs::write(&config_path, content)
        .await
        .map_err(|e| RunnerError::Config(format!("write {}: {e}", config_path.display())))?;
    Ok(config_path)
}

impl RunnerConfig {
    pub fn validate(&self) -> RunnerResult<()> {
        let fail = |msg: &str| Err(RunnerError::Config(msg.into()));

        if self.runtime.endpoint.trim().is_empty() {
            return fail("runtime.endpoint must not be empty");
        }
        if self.sandbox.image.trim().is_empty() {
            return fail("sandbox.image must not be empty");
        }
        if self.sandbox.user.trim().is_empty() {
            return fail("sandbox.user must not be empty");
        }
        if self.sandbox.interpreter.is_empty() {
            return fail("sandbox.interpreter must name an entry point");
        }
        if self.sandbox.pids_limit <= 0 {
            return fail("sandbox.pids_limit must be positive");
        }
        if self.sandbox.memory_bytes <= 0 {
            return fail("sandbox.memory_bytes must be positive");
        }
        if self.deadline.default_timeout_ms == 0 {
            return fail("deadline.default_timeout_ms must be positive");
        }
        Ok(())
    }

    pub fn docker_config(&self) -> DockerConfig {
        DockerConfig {
            endpoint: self.runtime.endpoint.clone(),
            connect_timeout_secs: self.runtime.connect_timeout_secs,
        }
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            image: self.sandbox.image.clone(),
            user: self.sandbox.user.clone(),
            interpreter: self.sandbox.interpreter.clone(),
            resources: ResourceLimits {
                pids_limit: self.sandbox.pids_limit,
                memory_bytes: self.sandbox.memory_bytes,
            },
            default_timeout: Duration::from_millis(self.deadline.default_timeout_ms),
            honor_request_timeout: self.deadline.honor_request_timeout,
            stop_grace: Duration::from_secs(self.sandbox.stop_grace_secs),
        }
    }
}
