//! Falsification Tests: Category B - Runtime Status Totality (F016-F030)
//!
//! # Toyota Way: Genchi Genbutsu (現地現物)
//! Read the supervisor's own answer; never guess.

use std::time::Duration;

use velador_core::backends::parse_sv_status;
use velador_core::{BackendKind, RuntimeStatus, ServiceStatus};
use velador_test::{ChaosConfig, ServiceHarness, TestError, gateway_spec};

fn tool(kind: BackendKind) -> &'static str {
    match kind {
        BackendKind::LaunchAgent => "launchctl",
        BackendKind::Systemd => "systemctl",
        BackendKind::ScheduledTask => "schtasks",
        BackendKind::Termux => "sv",
    }
}

// =============================================================================
// F016-F020: read_runtime never fails
// =============================================================================

/// F016: a running service reports running on every backend
#[tokio::test]
async fn f016_running() {
    for harness in ServiceHarness::all().unwrap() {
        let backend = harness.backend().unwrap();
        backend.install(&gateway_spec().unwrap()).await.unwrap();

        let runtime = backend.read_runtime().await;
        assert!(
            runtime.is_running(),
            "F016 FALSIFIED: {} reported {runtime}",
            harness.kind()
        );
    }
}

/// F017: pids come from the supervisor where it reports one
#[tokio::test]
async fn f017_running_pid() {
    for kind in [BackendKind::LaunchAgent, BackendKind::Systemd, BackendKind::Termux] {
        let harness = ServiceHarness::new(kind).unwrap();
        let backend = harness.backend().unwrap();
        backend.install(&gateway_spec().unwrap()).await.unwrap();

        let runtime = backend.read_runtime().await;
        assert_eq!(
            runtime.pid(),
            harness.service_state().pid,
            "F017 FALSIFIED: {kind} pid mismatch"
        );
        assert!(runtime.pid().is_some());
    }
}

/// F018: a stopped service reports stopped
#[tokio::test]
async fn f018_stopped() {
    for kind in [BackendKind::Systemd, BackendKind::ScheduledTask, BackendKind::Termux] {
        let harness = ServiceHarness::new(kind).unwrap();
        let backend = harness.backend().unwrap();
        backend.install(&gateway_spec().unwrap()).await.unwrap();
        backend.stop().await.unwrap();

        let runtime = backend.read_runtime().await;
        assert_eq!(
            runtime.status(),
            ServiceStatus::Stopped,
            "F018 FALSIFIED: {kind} reported {runtime}"
        );
        assert!(runtime.pid().is_none());
    }
}

/// F019: a never-installed service reads without failing
#[tokio::test]
async fn f019_never_installed() {
    for harness in ServiceHarness::all().unwrap() {
        let backend = harness.backend().unwrap();
        let runtime = backend.read_runtime().await;
        assert!(
            !runtime.is_running(),
            "F019 FALSIFIED: {} never installed but {runtime}",
            harness.kind()
        );
        assert!(backend.read_command().await.is_none());
        assert!(!backend.is_loaded().await);
    }
}

/// F020: a missing supervisor tool folds into unknown with the reason
#[tokio::test]
async fn f020_tool_missing_is_unknown() {
    for harness in ServiceHarness::all().unwrap() {
        harness.with_chaos(ChaosConfig::missing(tool(harness.kind())));
        let runtime = harness.backend().unwrap().read_runtime().await;
        assert_eq!(runtime.status(), ServiceStatus::Unknown, "F020 FALSIFIED");
        assert!(
            runtime.detail().unwrap_or_default().contains("not found"),
            "F020 FALSIFIED: {} detail {:?}",
            harness.kind(),
            runtime.detail()
        );
    }
}

// =============================================================================
// F021-F025: Termux status parsing
// =============================================================================

/// F021: "run:" lines parse to running with pid
#[test]
fn f021_sv_run_line() {
    let status = parse_sv_status("run: svc: (pid 1234) 5s");
    assert_eq!(status, RuntimeStatus::running("run", Some(1234)));
}

/// F022: "down:" lines parse to stopped
#[test]
fn f022_sv_down_line() {
    let status = parse_sv_status("down: svc: 2s, normally up");
    assert_eq!(status.status(), ServiceStatus::Stopped);
    assert_eq!(status.state(), Some("down"));
    assert_eq!(status.pid(), None);
}

/// F023: anything else parses to unknown carrying the text
#[test]
fn f023_sv_other_line() {
    let text = "warning: svc: unable to open supervise/ok: file does not exist";
    let status = parse_sv_status(text);
    assert_eq!(status.status(), ServiceStatus::Unknown);
    assert_eq!(status.detail(), Some(text));
}

/// F024: read_runtime with injected latency still answers within its deadline
#[tokio::test]
async fn f024_latency_tolerated() {
    let harness = ServiceHarness::new(BackendKind::Termux)
        .unwrap()
        .with_timeout(Duration::from_secs(2));
    harness.with_chaos(ChaosConfig::latency(Duration::from_millis(20)));
    let backend = harness.backend().unwrap();

    let runtime = harness.timed(backend.read_runtime()).await.unwrap();
    assert_eq!(runtime.status(), ServiceStatus::Unknown);
}

/// F025: a hung supervisor is caught by the caller's deadline
#[tokio::test]
async fn f025_hung_supervisor_times_out() {
    let harness = ServiceHarness::new(BackendKind::Systemd)
        .unwrap()
        .with_timeout(Duration::from_millis(10));
    harness.with_chaos(ChaosConfig::latency(Duration::from_secs(5)));
    let backend = harness.backend().unwrap();

    let err = harness.timed(backend.read_runtime()).await.unwrap_err();
    assert!(matches!(err, TestError::Timeout(_)), "F025 FALSIFIED: {err}");
}

// =============================================================================
// F026-F030: ServiceManager summary
// =============================================================================

/// F026: summary of an installed service is loaded with its command
#[tokio::test]
async fn f026_summary_installed() {
    for harness in ServiceHarness::all().unwrap() {
        let manager = harness.manager().unwrap();
        manager.install(&gateway_spec().unwrap()).await.unwrap();

        let summary = manager.summary().await;
        assert!(summary.loaded, "F026 FALSIFIED: {}", harness.kind());
        assert_eq!(summary.label, harness.kind().label());
        assert_eq!(summary.loaded_text, harness.kind().loaded_text());
        assert_eq!(
            summary.command.unwrap().program_arguments,
            ["node", "server.js"]
        );
        assert!(summary.runtime.is_running());
    }
}

/// F027: summary of a never-installed service is total
#[tokio::test]
async fn f027_summary_never_installed() {
    for harness in ServiceHarness::all().unwrap() {
        let summary = harness.manager().unwrap().summary().await;
        assert!(!summary.loaded);
        assert_eq!(summary.loaded_text, harness.kind().not_loaded_text());
        assert!(summary.command.is_none());
        assert!(!summary.runtime.is_running());
    }
}

/// F028: summary with every tool missing is still total
#[tokio::test]
async fn f028_summary_tool_missing() {
    for harness in ServiceHarness::all().unwrap() {
        harness.with_chaos(ChaosConfig::missing(tool(harness.kind())));
        let summary = harness.manager().unwrap().summary().await;
        assert_eq!(summary.runtime.status(), ServiceStatus::Unknown);
    }
}

/// F029: summaries serialize with camelCase keys
#[tokio::test]
async fn f029_summary_json() {
    let harness = ServiceHarness::new(BackendKind::Systemd).unwrap();
    let manager = harness.manager().unwrap();
    manager.install(&gateway_spec().unwrap()).await.unwrap();

    let json = serde_json::to_value(manager.summary().await).unwrap();
    assert_eq!(json["label"], "systemd");
    assert_eq!(json["loadedText"], "enabled");
    assert_eq!(json["command"]["environment"]["PORT"], "8080");
    assert_eq!(json["runtime"]["status"], "running");
}

/// F030: healing the supervisor restores normal answers
#[tokio::test]
async fn f030_heal_restores() {
    let harness = ServiceHarness::new(BackendKind::ScheduledTask).unwrap();
    let backend = harness.backend().unwrap();
    backend.install(&gateway_spec().unwrap()).await.unwrap();

    let injector = harness.with_chaos(ChaosConfig::missing("schtasks"));
    assert!(injector.is_active());
    assert!(!backend.is_loaded().await);

    harness.supervisor().heal();
    assert!(!injector.is_active());
    assert!(backend.is_loaded().await);
    assert!(backend.read_runtime().await.is_running());
}
