use std::time::Duration;

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::LogOutput;
use bollard::errors::Error as DockerError;
use bollard::models::{ContainerCreateBody, HostConfig};
use bollard::query_parameters::{
    CreateContainerOptions, LogsOptions, RemoveContainerOptions, StartContainerOptions,
    StopContainerOptions, WaitContainerOptions,
};
use futures_util::stream::StreamExt;
use sandbox::{Runtime, SandboxError, UnitExit, UnitHandle, UnitLogs, UnitSpec};
use tracing::{debug, info, warn};

use crate::config::{DockerConfig, Endpoint};

/// Container already stopped.
const NOT_MODIFIED: u16 = 304;
/// Container no longer exists.
const NOT_FOUND: u16 = 404;

/// [`Runtime`] backed by a Docker Engine reached over its control socket.
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect to the engine and check that it answers.
    pub async fn connect(config: &DockerConfig) -> sandbox::Result<Self> {
        let docker = match config.parse_endpoint()? {
            Endpoint::Unix(path) => Docker::connect_with_unix(
                path,
                config.connect_timeout_secs,
                bollard::API_DEFAULT_VERSION,
            ),
            Endpoint::Http(addr) => Docker::connect_with_http(
                addr,
                config.connect_timeout_secs,
                bollard::API_DEFAULT_VERSION,
            ),
        }
        .map_err(|e| SandboxError::BackendNotAvailable(format!("{}: {e}", config.endpoint)))?;

        docker
            .ping()
            .await
            .map_err(|e| SandboxError::BackendNotAvailable(format!("ping {}: {e}", config.endpoint)))?;
        info!(endpoint = %config.endpoint, "connected to docker engine");

        Ok(Self { docker })
    }
}

/// Translate a unit spec into the engine's container definition.
pub(crate) fn container_body(spec: &UnitSpec) -> ContainerCreateBody {
    ContainerCreateBody {
        image: Some(spec.image.clone()),
        user: Some(spec.user.clone()),
        cmd: Some(spec.command.clone()),
        tty: Some(false),
        attach_stdout: Some(true),
        attach_stderr: Some(true),
        host_config: Some(HostConfig {
            pids_limit: Some(spec.resources.pids_limit),
            memory: Some(spec.resources.memory_bytes),
            binds: Some(spec.binds.iter().map(ToString::to_string).collect()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn has_status(err: &DockerError, code: u16) -> bool {
    matches!(err, DockerError::DockerResponseServerError { status_code, .. } if *status_code == code)
}

/// Interpret the first item of a wait stream.
///
/// The engine reports a non-zero exit as a wait error carrying the code; that
/// is still a terminal state, not a failure to wait.
pub(crate) fn exit_from_wait(
    item: Option<Result<bollard::models::ContainerWaitResponse, DockerError>>,
) -> sandbox::Result<UnitExit> {
    match item {
        Some(Ok(response)) => Ok(UnitExit {
            status_code: response.status_code,
        }),
        Some(Err(DockerError::DockerContainerWaitError { code, .. })) => {
            Ok(UnitExit { status_code: code })
        }
        Some(Err(e)) => Err(SandboxError::WaitFailed(e.to_string())),
        None => Err(SandboxError::WaitFailed("wait stream ended".into())),
    }
}

fn grace_seconds(grace: Duration) -> i32 {
    i32::try_from(grace.as_secs()).unwrap_or(i32::MAX)
}

#[async_trait]
impl Runtime for DockerRuntime {
    fn name(&self) -> &str {
        "docker"
    }

    async fn create(&self, spec: &UnitSpec) -> sandbox::Result<UnitHandle> {
        let options = CreateContainerOptions {
            name: Some(spec.name.clone()),
            ..Default::default()
        };
        let response = self
            .docker
            .create_container(Some(options), container_body(spec))
            .await
            .map_err(|e| SandboxError::ProvisionFailed(e.to_string()))?;

        for warning in &response.warnings {
            warn!(unit = %spec.name, warning = %warning, "engine warning on create");
        }
        debug!(unit = %spec.name, id = %response.id, "container created");

        Ok(UnitHandle {
            id: response.id,
            name: spec.name.clone(),
        })
    }

    async fn start(&self, unit: &UnitHandle) -> sandbox::Result<()> {
        self.docker
            .start_container(&unit.id, None::<StartContainerOptions>)
            .await
            .map_err(|e| SandboxError::StartFailed(e.to_string()))
    }

    async fn wait(&self, unit: &UnitHandle) -> sandbox::Result<UnitExit> {
        let mut stream = self
            .docker
            .wait_container(&unit.id, None::<WaitContainerOptions>);
        exit_from_wait(stream.next().await)
    }

    async fn stop(&self, unit: &UnitHandle, grace: Duration) -> sandbox::Result<()> {
        let options = StopContainerOptions {
            t: Some(grace_seconds(grace)),
            ..Default::default()
        };
        match self.docker.stop_container(&unit.id, Some(options)).await {
            Ok(()) => Ok(()),
            Err(e) if has_status(&e, NOT_MODIFIED) => {
                debug!(unit = %unit, "container already stopped");
                Ok(())
            }
            Err(e) => Err(SandboxError::StopFailed(e.to_string())),
        }
    }

    async fn destroy(&self, unit: &UnitHandle) -> sandbox::Result<()> {
        let options = RemoveContainerOptions {
            force: true,
            v: false,
            ..Default::default()
        };
        match self.docker.remove_container(&unit.id, Some(options)).await {
            Ok(()) => Ok(()),
            Err(e) if has_status(&e, NOT_FOUND) => {
                warn!(unit = %unit, "container already removed");
                Ok(())
            }
            Err(e) => Err(SandboxError::DestroyFailed(e.to_string())),
        }
    }

    async fn logs(&self, unit: &UnitHandle) -> sandbox::Result<UnitLogs> {
        let options = LogsOptions {
            stdout: true,
            stderr: true,
            follow: false,
            ..Default::default()
        };
        let mut stream = self.docker.logs(&unit.id, Some(options));

        let mut logs = UnitLogs::default();
        while let Some(item) = stream.next().await {
            match item {
                Ok(LogOutput::StdOut { message }) => logs.stdout.extend_from_slice(&message),
                Ok(LogOutput::StdErr { message }) => logs.stderr.extend_from_slice(&message),
                Ok(_) => {}
                Err(e) if logs.is_empty() => return Err(SandboxError::LogsFailed(e.to_string())),
                Err(e) => {
                    warn!(unit = %unit, error = %e, "log stream broke off, keeping partial output");
                    break;
                }
            }
        }
        Ok(logs)
    }
}
