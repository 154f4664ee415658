mod exec;
mod init;

pub use exec::{ExecArgs, run_exec};
pub use init::{InitArgs, run_init};
