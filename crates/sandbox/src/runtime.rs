use std::time::Duration;

use async_trait::async_trait;

use crate::config::UnitSpec;
use crate::error::Result;
use crate::types::{UnitExit, UnitHandle, UnitLogs};

/// Capability interface to an isolation runtime (container engine, microVM, ...).
///
/// Every call may block on the backend and every call may fail. Implementations
/// must allow `wait` to run concurrently with `stop`, `logs` and `destroy` on
/// the same unit.
#[async_trait]
pub trait Runtime: Send + Sync {
    /// Human-readable name for this backend (e.g. "docker").
    fn name(&self) -> &str;

    // -- lifecycle --
    async fn create(&self, spec: &UnitSpec) -> Result<UnitHandle>;
    async fn start(&self, unit: &UnitHandle) -> Result<()>;
    /// Resolve once the unit has reached a terminal state.
    async fn wait(&self, unit: &UnitHandle) -> Result<UnitExit>;
    /// Forcefully terminate, allowing `grace` before the kill.
    async fn stop(&self, unit: &UnitHandle, grace: Duration) -> Result<()>;
    /// Remove the unit, killing it first if it is still running.
    async fn destroy(&self, unit: &UnitHandle) -> Result<()>;

    // -- output --
    /// Everything the unit wrote so far. Best effort: may be partial right
    /// after a forced stop.
    async fn logs(&self, unit: &UnitHandle) -> Result<UnitLogs>;
}
