use std::sync::Arc;
use std::time::Duration;

use sandbox::{
    Bind, NameGenerator, ResourceLimits, Runtime, SandboxError, UNIT_NAME_LENGTH, UnitHandle,
    UnitSpec,
};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::config::{
    DEFAULT_IMAGE, DEFAULT_INTERPRETER, DEFAULT_MEMORY_BYTES, DEFAULT_PIDS_LIMIT,
    DEFAULT_STOP_GRACE_SECS, DEFAULT_TIMEOUT_MS, DEFAULT_USER,
};
use crate::lease::UnitLease;

/// Fixed parameters shared by every run of an [`Executor`].
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub image: String,
    pub user: String,
    /// Entry point the script is appended to, e.g. `["node", "-e"]`.
    pub interpreter: Vec<String>,
    pub resources: ResourceLimits,
    /// Deadline when the request has none, or when requests are not honoured.
    pub default_timeout: Duration,
    pub honor_request_timeout: bool,
    /// Grace period given to a unit being stopped at the deadline.
    pub stop_grace: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            image: DEFAULT_IMAGE.into(),
            user: DEFAULT_USER.into(),
            interpreter: DEFAULT_INTERPRETER.iter().map(|s| (*s).to_owned()).collect(),
            resources: ResourceLimits {
                pids_limit: DEFAULT_PIDS_LIMIT,
                memory_bytes: DEFAULT_MEMORY_BYTES,
            },
            default_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            honor_request_timeout: true,
            stop_grace: Duration::from_secs(DEFAULT_STOP_GRACE_SECS),
        }
    }
}

/// Per-run options supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct ExecutionOptions {
    pub timeout: Option<Duration>,
    /// Passed to the runtime verbatim and in order.
    pub binds: Vec<Bind>,
}

/// Output captured from a unit after it reached a terminal state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Status of a unit that finished on its own.
    pub exit_code: Option<i64>,
    /// The deadline fired and the unit was stopped.
    pub timed_out: bool,
}

/// A failed run, with whatever output was captured before the failure.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct ExecFailure {
    #[source]
    pub error: SandboxError,
    pub output: ExecutionResult,
}

impl ExecFailure {
    fn without_output(error: SandboxError) -> Self {
        Self {
            error,
            output: ExecutionResult::default(),
        }
    }
}

/// Keeps the first error of a run; later ones are only logged.
#[derive(Default)]
struct FirstError(Option<SandboxError>);

impl FirstError {
    fn record(&mut self, err: SandboxError) {
        match &self.0 {
            None => self.0 = Some(err),
            Some(first) => warn!(error = %err, first = %first, "suppressing later error"),
        }
    }
}

/// Runs untrusted scripts in throwaway units, one unit per call.
///
/// Calls share nothing but the runtime, so one executor can serve concurrent
/// runs.
pub struct Executor {
    runtime: Arc<dyn Runtime>,
    config: ExecutorConfig,
    names: NameGenerator,
}

impl Executor {
    pub fn new(runtime: Arc<dyn Runtime>, config: ExecutorConfig) -> Self {
        Self::with_names(runtime, config, NameGenerator::default())
    }

    pub fn with_names(
        runtime: Arc<dyn Runtime>,
        config: ExecutorConfig,
        names: NameGenerator,
    ) -> Self {
        Self {
            runtime,
            config,
            names,
        }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run `script` in a fresh unit and return what it printed.
    ///
    /// The unit is destroyed before this returns, whatever the outcome. If
    /// several steps fail, the first failure is returned and the rest are
    /// logged.
    pub async fn run(
        &self,
        script: &str,
        options: &ExecutionOptions,
    ) -> Result<ExecutionResult, ExecFailure> {
        let deadline = self.deadline(options).map_err(ExecFailure::without_output)?;
        let name = self
            .names
            .generate(UNIT_NAME_LENGTH)
            .map_err(ExecFailure::without_output)?;
        let spec = self.unit_spec(name, script, options);

        // Armed before `create` so a cancelled call still removes the unit by
        // name. A create the engine completes after that removal is not covered.
        let mut lease = UnitLease::pending(Arc::clone(&self.runtime), &spec.name);
        match self.runtime.create(&spec).await {
            Ok(unit) => lease.attach(unit),
            Err(e) => {
                lease.disarm();
                warn!(unit = %spec.name, error = %e, "unit provisioning failed");
                return Err(ExecFailure::without_output(e));
            }
        }
        info!(unit = %lease.unit(), backend = self.runtime.name(), "unit provisioned");

        let mut output = ExecutionResult::default();
        let mut errors = FirstError::default();

        match self.runtime.start(lease.unit()).await {
            Ok(()) => {
                debug!(unit = %lease.unit(), ?deadline, "unit started");
                if let Err(e) = self.race(&mut lease, deadline, &mut output).await {
                    errors.record(e);
                }
                self.drain_logs(lease.unit(), &mut output).await;
            }
            Err(e) => {
                warn!(unit = %lease.unit(), error = %e, "unit start failed");
                errors.record(e);
            }
        }

        if let Err(e) = lease.release().await {
            errors.record(e);
        }

        match errors.0 {
            None => Ok(output),
            Some(error) => Err(ExecFailure { error, output }),
        }
    }

    fn deadline(&self, options: &ExecutionOptions) -> sandbox::Result<Duration> {
        let deadline = match options.timeout {
            Some(requested) if self.config.honor_request_timeout => requested,
            _ => self.config.default_timeout,
        };
        if deadline.is_zero() {
            return Err(SandboxError::InvalidConfig(
                "execution timeout must be greater than zero".into(),
            ));
        }
        Ok(deadline)
    }

    fn unit_spec(&self, name: String, script: &str, options: &ExecutionOptions) -> UnitSpec {
        let mut command = self.config.interpreter.clone();
        command.push(script.to_owned());
        UnitSpec {
            name,
            image: self.config.image.clone(),
            command,
            user: self.config.user.clone(),
            resources: self.config.resources,
            binds: options.binds.clone(),
        }
    }

    /// Wait for the unit to finish on its own, or stop it at the deadline.
    ///
    /// Only a failed stop is an error. The wait task that loses the race is
    /// left attached to the lease and aborted when the unit is released.
    async fn race(
        &self,
        lease: &mut UnitLease,
        deadline: Duration,
        output: &mut ExecutionResult,
    ) -> sandbox::Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        let runtime = Arc::clone(&self.runtime);
        let unit = lease.unit().clone();
        lease.watch(tokio::spawn(async move {
            let exit = runtime.wait(&unit).await;
            // The receiver is gone if the deadline won.
            let _ = done_tx.send(exit);
        }));

        tokio::select! {
            waited = done_rx => {
                match waited {
                    Ok(Ok(exit)) => {
                        info!(unit = %lease.unit(), status = exit.status_code, "unit finished");
                        output.exit_code = Some(exit.status_code);
                    }
                    Ok(Err(e)) => {
                        warn!(unit = %lease.unit(), error = %e, "wait failed, treating unit as finished");
                    }
                    Err(_) => {
                        warn!(unit = %lease.unit(), "wait task ended without a result");
                    }
                }
                Ok(())
            }
            () = tokio::time::sleep(deadline) => {
                output.timed_out = true;
                warn!(
                    unit = %lease.unit(),
                    ?deadline,
                    "deadline exceeded, stopping unit"
                );
                self.runtime.stop(lease.unit(), self.config.stop_grace).await.inspect_err(|e| {
                    warn!(unit = %lease.unit(), error = %e, "stop failed, unit may still be running");
                })
            }
        }
    }

    /// Best effort: a failure leaves the buffers empty and is not reported.
    async fn drain_logs(&self, unit: &UnitHandle, output: &mut ExecutionResult) {
        match self.runtime.logs(unit).await {
            Ok(logs) => {
                output.stdout = logs.stdout;
                output.stderr = logs.stderr;
            }
            Err(e) => warn!(unit = %unit, error = %e, "log drain failed, returning without output"),
        }
    }
}
