use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use sandbox::{Bind, Runtime};
use sandbox_docker::DockerRuntime;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::config::{self, RunnerConfig};
use crate::error::{RunnerError, RunnerResult};
use crate::executor::{ExecutionOptions, ExecutionResult, Executor};

/// Exit status reported when the deadline stopped the script.
const TIMEOUT_EXIT_STATUS: u8 = 124;

#[derive(Args)]
pub struct ExecArgs {
    /// Script passed to the interpreter as a single argument
    script: String,
    /// Path to runner.yaml (defaults apply when omitted)
    #[arg(long, short)]
    config: Option<PathBuf>,
    /// Container runtime endpoint (overrides config)
    #[arg(long, env = "RUNNER_ENDPOINT")]
    endpoint: Option<String>,
    /// Sandbox image (overrides config)
    #[arg(long, env = "RUNNER_IMAGE")]
    image: Option<String>,
    /// Deadline for this run in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
    /// Host directory to mount, as host:sandbox[:ro] (repeatable)
    #[arg(long = "bind", short = 'b')]
    binds: Vec<Bind>,
}

pub async fn run_exec(args: ExecArgs) -> RunnerResult<u8> {
    let mut config = match &args.config {
        Some(path) => config::load(path).await?,
        None => RunnerConfig::default(),
    };
    if let Some(endpoint) = args.endpoint {
        config.runtime.endpoint = endpoint;
    }
    if let Some(image) = args.image {
        config.sandbox.image = image;
    }
    config.validate()?;

    let runtime: Arc<dyn Runtime> = Arc::new(DockerRuntime::connect(&config.docker_config()).await?);
    let executor = Executor::new(runtime, config.executor_config());
    info!(
        endpoint = %config.runtime.endpoint,
        image = %executor.config().image,
        binds = args.binds.len(),
        "executing script"
    );

    let options = ExecutionOptions {
        timeout: args.timeout_ms.map(Duration::from_millis),
        binds: args.binds,
    };
    match executor.run(&args.script, &options).await {
        Ok(result) => {
            write_output(&result).await?;
            Ok(exit_status(&result))
        }
        Err(failure) => {
            // Whatever was captured before the failure is still useful.
            if let Err(e) = write_output(&failure.output).await {
                warn!(error = %e, "failed to write partial output");
            }
            Err(RunnerError::Exec(failure))
        }
    }
}

async fn write_output(result: &ExecutionResult) -> RunnerResult<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(&result.stdout).await?;
    stdout.flush().await?;
    let mut stderr = tokio::io::stderr();
    stderr.write_all(&result.stderr).await?;
    stderr.flush().await?;
    Ok(())
}

/// Map a finished run onto a process exit status.
fn exit_status(result: &ExecutionResult) -> u8 {
    if result.timed_out {
        return TIMEOUT_EXIT_STATUS;
    }
    match result.exit_code {
        None | Some(0) => 0,
        Some(code) => u8::try_from(code).unwrap_or(1),
    }
}
