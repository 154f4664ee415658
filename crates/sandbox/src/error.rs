#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("backend not available: {0}")]
    BackendNotAvailable(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("entropy source unavailable: {0}")]
    EntropyUnavailable(String),

    #[error("unit provisioning failed: {0}")]
    ProvisionFailed(String),

    #[error("unit start failed: {0}")]
    StartFailed(String),

    #[error("unit wait failed: {0}")]
    WaitFailed(String),

    #[error("unit stop failed: {0}")]
    StopFailed(String),

    #[error("log fetch failed: {0}")]
    LogsFailed(String),

    #[error("unit destroy failed: {0}")]
    DestroyFailed(String),
}

pub type Result<T> = std::result::Result<T, SandboxError>;
