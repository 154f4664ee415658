mod config;
mod error;
pub mod names;
mod runtime;
mod types;

pub use config::{Bind, ResourceLimits, UnitSpec};
pub use error::{Result, SandboxError};
pub use names::{EntropySource, NameGenerator, OsEntropy, UNIT_NAME_LENGTH};
pub use runtime::Runtime;
pub use types::{UnitExit, UnitHandle, UnitLogs};
