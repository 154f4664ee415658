mod config;
mod runtime;

pub use config::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_ENDPOINT, DockerConfig};
pub use runtime::DockerRuntime;
