use sandbox::SandboxError;

pub const DEFAULT_ENDPOINT: &str = "unix:///var/run/docker.sock";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone)]
pub struct DockerConfig {
    /// Engine control socket, `unix://...` or `tcp://host:port`.
    pub endpoint: String,
    /// Per-request timeout of the engine client.
    pub connect_timeout_secs: u64,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.into(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Endpoint<'a> {
    Unix(&'a str),
    Http(&'a str),
}

impl DockerConfig {
    pub(crate) fn parse_endpoint(&self) -> Result<Endpoint<'_>, SandboxError> {
        let endpoint = self.endpoint.as_str();
        if let Some(path) = endpoint.strip_prefix("unix://") {
            return Ok(Endpoint::Unix(path));
        }
        if endpoint.starts_with('/') {
            return Ok(Endpoint::Unix(endpoint));
        }
        if endpoint.starts_with("tcp://") || endpoint.starts_with("http://") {
            return Ok(Endpoint::Http(endpoint));
        }
        Err(SandboxError::InvalidConfig(format!(
            "unsupported docker endpoint: {endpoint}"
        )))
    }
}
