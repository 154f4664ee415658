//! Lifecycle checks against a real engine.
//!
//! Run with `cargo test -p sandbox-docker -- --ignored` on a host with Docker
//! and the `alpine:3` image available.

use std::time::Duration;

use sandbox::names::random_name;
use sandbox::{ResourceLimits, Runtime, UNIT_NAME_LENGTH, UnitSpec};
use sandbox_docker::{DockerConfig, DockerRuntime};

fn spec(script: &str) -> UnitSpec {
    UnitSpec {
        name: random_name(UNIT_NAME_LENGTH).unwrap(),
        image: "alpine:3".into(),
        command: vec!["sh".into(), "-c".into(), script.into()],
        user: "nobody".into(),
        resources: ResourceLimits {
            pids_limit: 64,
            memory_bytes: 64 * 1024 * 1024,
        },
        binds: Vec::new(),
    }
}

#[tokio::test]
#[ignore = "requires a running Docker daemon"]
async fn run_to_completion_and_collect_logs() {
    let runtime = DockerRuntime::connect(&DockerConfig::default()).await.unwrap();

    let unit = runtime.create(&spec("echo out; echo err >&2; exit 3")).await.unwrap();
    runtime.start(&unit).await.unwrap();
    let exit = runtime.wait(&unit).await.unwrap();
    let logs = runtime.logs(&unit).await.unwrap();
    runtime.destroy(&unit).await.unwrap();

    assert_eq!(exit.status_code, 3);
    assert_eq!(logs.stdout, b"out\n");
    assert_eq!(logs.stderr, b"err\n");
}

#[tokio::test]
#[ignore = "requires a running Docker daemon"]
async fn stop_then_destroy_long_running_unit() {
    let runtime = DockerRuntime::connect(&DockerConfig::default()).await.unwrap();

    let unit = runtime.create(&spec("echo started; sleep 60")).await.unwrap();
    runtime.start(&unit).await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    runtime.stop(&unit, Duration::from_secs(1)).await.unwrap();
    // Stopping an already stopped container is not an error.
    runtime.stop(&unit, Duration::from_secs(1)).await.unwrap();

    let logs = runtime.logs(&unit).await.unwrap();
    runtime.destroy(&unit).await.unwrap();
    // Removing a removed container is not an error either.
    runtime.destroy(&unit).await.unwrap();

    assert_eq!(logs.stdout, b"started\n");
}

#[tokio::test]
#[ignore = "requires a running Docker daemon"]
async fn missing_image_fails_provisioning() {
    let runtime = DockerRuntime::connect(&DockerConfig::default()).await.unwrap();

    let mut spec = spec("true");
    spec.image = "localhost/does-not-exist:never".into();
    let err = runtime.create(&spec).await.unwrap_err();
    assert!(matches!(err, sandbox::SandboxError::ProvisionFailed(_)), "{err}");
}
