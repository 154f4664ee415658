//! In-memory runtime that records every call, for executor tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use sandbox::{
    ResourceLimits, Runtime, SandboxError, UnitExit, UnitHandle, UnitLogs, UnitSpec,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Create(UnitSpec),
    Start(String),
    Wait(String),
    Stop(String, Duration),
    Logs(String),
    Destroy(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Step {
    Create,
    Start,
    Stop,
    Logs,
    Destroy,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum WaitBehavior {
    /// Terminate immediately with this status.
    Exit(i64),
    /// Never terminate on its own.
    Hang,
    /// The wait call itself errors.
    Fail,
}

pub(crate) struct FakeRuntime {
    calls: Mutex<Vec<Call>>,
    faults: HashSet<Step>,
    delays: HashMap<Step, Duration>,
    wait: WaitBehavior,
    logs: UnitLogs,
}

impl Default for FakeRuntime {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            faults: HashSet::new(),
            delays: HashMap::new(),
            wait: WaitBehavior::Exit(0),
            logs: UnitLogs::default(),
        }
    }
}

impl FakeRuntime {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing(mut self, step: Step) -> Self {
        self.faults.insert(step);
        self
    }

    /// Make `step` take `delay` after the call is recorded.
    pub(crate) fn with_delay(mut self, step: Step, delay: Duration) -> Self {
        self.delays.insert(step, delay);
        self
    }

    pub(crate) fn with_wait(mut self, wait: WaitBehavior) -> Self {
        self.wait = wait;
        self
    }

    pub(crate) fn with_logs(mut self, stdout: &[u8], stderr: &[u8]) -> Self {
        self.logs = UnitLogs {
            stdout: stdout.to_vec(),
            stderr: stderr.to_vec(),
        };
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn created_specs(&self) -> Vec<UnitSpec> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Create(spec) => Some(spec),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn count(&self, step: Step) -> usize {
        self.calls()
            .iter()
            .filter(|call| {
                matches!(
                    (call, step),
                    (Call::Create(_), Step::Create)
                        | (Call::Start(_), Step::Start)
                        | (Call::Stop(..), Step::Stop)
                        | (Call::Logs(_), Step::Logs)
                        | (Call::Destroy(_), Step::Destroy)
                )
            })
            .count()
    }

    pub(crate) fn destroy_count(&self) -> usize {
        self.count(Step::Destroy)
    }

    /// Let spawned background tasks run to completion.
    pub(crate) async fn settle(&self) {
        for _ in 0..16 {
            tokio::task::yield_now().await;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    async fn pause(&self, step: Step) {
        if let Some(delay) = self.delays.get(&step) {
            tokio::time::sleep(*delay).await;
        }
    }

    fn check(&self, step: Step, err: fn(String) -> SandboxError) -> sandbox::Result<()> {
        if self.faults.contains(&step) {
            return Err(err(format!("injected {step:?} fault")));
        }
        Ok(())
    }
}

/// A spec with the default limits, for tests that create units directly.
pub(crate) fn spec(name: &str) -> UnitSpec {
    UnitSpec {
        name: name.into(),
        image: "test/image:latest".into(),
        command: vec!["node".into(), "-e".into(), String::new()],
        user: "app".into(),
        resources: ResourceLimits {
            pids_limit: 1000,
            memory_bytes: 209_715_200,
        },
        binds: Vec::new(),
    }
}

#[async_trait]
impl Runtime for FakeRuntime {
    fn name(&self) -> &str {
        "fake"
    }

    async fn create(&self, spec: &UnitSpec) -> sandbox::Result<UnitHandle> {
        self.record(Call::Create(spec.clone()));
        self.pause(Step::Create).await;
        self.check(Step::Create, SandboxError::ProvisionFailed)?;
        Ok(UnitHandle {
            id: format!("fake-{}", spec.name),
            name: spec.name.clone(),
        })
    }

    async fn start(&self, unit: &UnitHandle) -> sandbox::Result<()> {
        self.record(Call::Start(unit.name.clone()));
        self.pause(Step::Start).await;
        self.check(Step::Start, SandboxError::StartFailed)
    }

    async fn wait(&self, unit: &UnitHandle) -> sandbox::Result<UnitExit> {
        self.record(Call::Wait(unit.name.clone()));
        match self.wait {
            WaitBehavior::Exit(status_code) => Ok(UnitExit { status_code }),
            WaitBehavior::Hang => std::future::pending().await,
            WaitBehavior::Fail => Err(SandboxError::WaitFailed("injected wait fault".into())),
        }
    }

    async fn stop(&self, unit: &UnitHandle, grace: Duration) -> sandbox::Result<()> {
        self.record(Call::Stop(unit.name.clone(), grace));
        self.pause(Step::Stop).await;
        self.check(Step::Stop, SandboxError::StopFailed)
    }

    async fn destroy(&self, unit: &UnitHandle) -> sandbox::Result<()> {
        self.record(Call::Destroy(unit.name.clone()));
        self.pause(Step::Destroy).await;
        self.check(Step::Destroy, SandboxError::DestroyFailed)
    }

    async fn logs(&self, unit: &UnitHandle) -> sandbox::Result<UnitLogs> {
        self.record(Call::Logs(unit.name.clone()));
        self.pause(Step::Logs).await;
        self.check(Step::Logs, SandboxError::LogsFailed)?;
        Ok(self.logs.clone())
    }
}
