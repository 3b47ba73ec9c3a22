//! Falsification Tests: Category A - Install / Uninstall Lifecycle (F001-F015)
//!
//! # Toyota Way: Jidoka (自働化)
//! A failed enable step stops the line and leaves no half-installed service.

use velador_core::{ArtifactRemoval, BackendKind, DisableOutcome, InstallSpec};
use velador_test::{ChaosConfig, ServiceHarness, gateway_spec, init_tracing};

/// Supervisor command whose failure aborts the enable step.
fn enable_step(kind: BackendKind) -> (&'static str, &'static [&'static str]) {
    match kind {
        BackendKind::LaunchAgent => ("launchctl", &["bootstrap"]),
        BackendKind::Systemd => ("systemctl", &["--user", "enable"]),
        BackendKind::ScheduledTask => ("schtasks", &["/Create"]),
        BackendKind::Termux => ("sv-enable", &[]),
    }
}

// =============================================================================
// F001-F005: Install
// =============================================================================

/// F001: install then is_loaded is true on every backend
#[tokio::test]
async fn f001_install_then_loaded() {
    init_tracing();
    for harness in ServiceHarness::all().unwrap() {
        let backend = harness.backend().unwrap();
        let path = backend.install(&gateway_spec().unwrap()).await.unwrap();

        assert_eq!(path, backend.artifact_path());
        assert!(path.exists(), "F001 FALSIFIED: {} artifact missing", harness.kind());
        assert!(
            backend.is_loaded().await,
            "F001 FALSIFIED: {} not loaded after install",
            harness.kind()
        );
        harness.assert_registered(true).unwrap();
    }
}

/// F002: install starts the service
#[tokio::test]
async fn f002_install_starts_service() {
    for harness in ServiceHarness::all().unwrap() {
        let backend = harness.backend().unwrap();
        backend.install(&gateway_spec().unwrap()).await.unwrap();
        assert!(
            harness.service_state().running,
            "F002 FALSIFIED: {} not running after install",
            harness.kind()
        );
    }
}

/// F003: re-install replaces the artifact and stays loaded
#[tokio::test]
async fn f003_reinstall_replaces() {
    for harness in ServiceHarness::all().unwrap() {
        let backend = harness.backend().unwrap();
        backend.install(&gateway_spec().unwrap()).await.unwrap();

        let updated = InstallSpec::new(["node", "gateway.js"]).unwrap();
        backend.install(&updated).await.unwrap();

        let command = backend.read_command().await.unwrap();
        assert_eq!(
            command.program_arguments,
            ["node", "gateway.js"],
            "F003 FALSIFIED: {} kept the old command",
            harness.kind()
        );
        assert!(command.env("PORT").is_none());
        assert!(backend.is_loaded().await, "F003 FALSIFIED: {}", harness.kind());
    }
}

/// F004: an empty argument vector is rejected before anything is written
#[tokio::test]
async fn f004_invalid_spec_writes_nothing() {
    assert!(InstallSpec::new(Vec::<String>::new()).is_err());
    for harness in ServiceHarness::all().unwrap() {
        let err = InstallSpec::new([" "]).unwrap_err();
        assert!(err.to_string().contains("programArguments"));

        let backend = harness.backend().unwrap();
        assert!(!backend.artifact_path().exists());
        assert!(harness.supervisor().calls().is_empty());
    }
}

/// F005: a failed enable step on a fresh install leaves no artifact
#[tokio::test]
async fn f005_fresh_install_rolls_back() {
    for harness in ServiceHarness::all().unwrap() {
        let (program, prefix) = enable_step(harness.kind());
        harness.with_chaos(ChaosConfig::failing(program, prefix, 1, "Access denied"));

        let backend = harness.backend().unwrap();
        let err = backend.install(&gateway_spec().unwrap()).await.unwrap_err();

        assert!(err.is_install(), "F005 FALSIFIED: {} gave {err}", harness.kind());
        assert!(err.to_string().contains("Access denied"));
        assert!(
            !backend.artifact_path().exists(),
            "F005 FALSIFIED: {} left {}",
            harness.kind(),
            backend.artifact_path().display()
        );
        assert!(!backend.is_loaded().await);
    }
}

/// F006: a failed enable step on a re-install keeps the new artifact
#[tokio::test]
async fn f006_reinstall_failure_keeps_artifact() {
    for harness in ServiceHarness::all().unwrap() {
        let backend = harness.backend().unwrap();
        backend.install(&gateway_spec().unwrap()).await.unwrap();

        let (program, prefix) = enable_step(harness.kind());
        harness.with_chaos(ChaosConfig::failing(program, prefix, 1, "Access denied"));
        let updated = InstallSpec::new(["node", "v2.js"]).unwrap();
        assert!(backend.install(&updated).await.is_err());

        let command = backend.read_command().await.unwrap();
        assert_eq!(
            command.program_arguments,
            ["node", "v2.js"],
            "F006 FALSIFIED: {} rolled back a re-install",
            harness.kind()
        );
    }
}

/// F007: a missing supervisor tool is an install error naming the step
#[tokio::test]
async fn f007_missing_tool_install_error() {
    for (kind, tool, step) in [
        (BackendKind::Systemd, "systemctl", "systemctl daemon-reload"),
        (BackendKind::ScheduledTask, "schtasks", "schtasks create"),
        (BackendKind::Termux, "sv-enable", "sv-enable"),
    ] {
        let harness = ServiceHarness::new(kind).unwrap();
        harness.with_chaos(ChaosConfig::missing(tool));
        let err = harness
            .backend()
            .unwrap()
            .install(&gateway_spec().unwrap())
            .await
            .unwrap_err();
        assert!(
            err.to_string().starts_with(step),
            "F007 FALSIFIED: {kind} error was {err}"
        );
    }
}

// =============================================================================
// F008-F012: Uninstall
// =============================================================================

/// F008: install, uninstall, then is_loaded is false
#[tokio::test]
async fn f008_uninstall_then_not_loaded() {
    for harness in ServiceHarness::all().unwrap() {
        let backend = harness.backend().unwrap();
        backend.install(&gateway_spec().unwrap()).await.unwrap();

        let report = backend.uninstall().await.unwrap();
        assert!(report.removed(), "F008 FALSIFIED: {} removed nothing", harness.kind());
        assert_eq!(report.disable, DisableOutcome::Disabled);
        assert!(
            !backend.is_loaded().await,
            "F008 FALSIFIED: {} still loaded",
            harness.kind()
        );
        assert!(!backend.artifact_path().exists());
        harness.assert_registered(false).unwrap();
    }
}

/// F009: uninstall of a never-installed service succeeds with NotFound
#[tokio::test]
async fn f009_uninstall_never_installed() {
    for harness in ServiceHarness::all().unwrap() {
        let backend = harness.backend().unwrap();
        let report = backend.uninstall().await.unwrap();

        assert_eq!(
            report.artifact,
            ArtifactRemoval::NotFound(backend.artifact_path()),
            "F009 FALSIFIED: {}",
            harness.kind()
        );
        assert!(matches!(report.disable, DisableOutcome::Failed(_)));
        assert!(report.to_string().starts_with("Service not found at"));
    }
}

/// F010: uninstall removes the artifact even when the supervisor tool is gone
#[tokio::test]
async fn f010_uninstall_without_tool() {
    for (kind, tool) in [
        (BackendKind::LaunchAgent, "launchctl"),
        (BackendKind::Systemd, "systemctl"),
        (BackendKind::ScheduledTask, "schtasks"),
        (BackendKind::Termux, "sv-disable"),
    ] {
        let harness = ServiceHarness::new(kind).unwrap();
        let backend = harness.backend().unwrap();
        backend.install(&gateway_spec().unwrap()).await.unwrap();

        harness.with_chaos(ChaosConfig::missing(tool));
        let report = backend.uninstall().await.unwrap();
        assert!(report.removed(), "F010 FALSIFIED: {kind}");
        match report.disable {
            DisableOutcome::Failed(message) => assert!(message.contains("not found")),
            DisableOutcome::Disabled => panic!("F010 FALSIFIED: {kind} disable should fail"),
        }
    }
}

/// F011: uninstall twice is safe
#[tokio::test]
async fn f011_uninstall_is_idempotent() {
    for harness in ServiceHarness::all().unwrap() {
        let backend = harness.backend().unwrap();
        backend.install(&gateway_spec().unwrap()).await.unwrap();
        assert!(backend.uninstall().await.unwrap().removed());
        assert!(!backend.uninstall().await.unwrap().removed());
    }
}

// =============================================================================
// F012-F015: Stop / Restart
// =============================================================================

/// F012: stop halts the service on the restartable backends
#[tokio::test]
async fn f012_stop_then_restart() {
    for kind in [BackendKind::Systemd, BackendKind::ScheduledTask, BackendKind::Termux] {
        let harness = ServiceHarness::new(kind).unwrap();
        let manager = harness.manager().unwrap();
        manager.install(&gateway_spec().unwrap()).await.unwrap();

        manager.stop().await.unwrap();
        assert!(!harness.service_state().running, "F012 FALSIFIED: {kind} still running");
        assert!(manager.is_loaded().await, "F012 FALSIFIED: {kind} unloaded by stop");

        manager.restart().await.unwrap();
        assert!(harness.service_state().running, "F012 FALSIFIED: {kind} not restarted");
    }
}

/// F013: stopping a LaunchAgent unloads it, so restart needs a re-install
#[tokio::test]
async fn f013_launch_agent_stop_unloads() {
    let harness = ServiceHarness::new(BackendKind::LaunchAgent).unwrap();
    let manager = harness.manager().unwrap();
    manager.install(&gateway_spec().unwrap()).await.unwrap();

    manager.stop().await.unwrap();
    assert!(!manager.is_loaded().await);
    let err = manager.restart().await.unwrap_err();
    assert!(err.to_string().contains("Could not find service"));

    manager.install(&gateway_spec().unwrap()).await.unwrap();
    assert!(manager.is_loaded().await);
}

/// F014: restart with the supervisor tool missing propagates the error
#[tokio::test]
async fn f014_restart_without_tool() {
    for (kind, tool) in [
        (BackendKind::LaunchAgent, "launchctl"),
        (BackendKind::Systemd, "systemctl"),
        (BackendKind::ScheduledTask, "schtasks"),
        (BackendKind::Termux, "sv"),
    ] {
        let harness = ServiceHarness::new(kind).unwrap();
        harness.with_chaos(ChaosConfig::missing(tool));
        let err = harness.backend().unwrap().restart().await.unwrap_err();
        assert!(err.is_tool_missing(), "F014 FALSIFIED: {kind} gave {err}");
    }
}

/// F015: stop of a never-installed service follows the supervisor
#[tokio::test]
async fn f015_stop_never_installed() {
    for harness in ServiceHarness::all().unwrap() {
        let result = harness.backend().unwrap().stop().await;
        if harness.kind() == BackendKind::Systemd {
            assert!(result.is_ok(), "F015 FALSIFIED: systemctl stop of an unknown unit is a no-op");
            continue;
        }
        let err = result.unwrap_err();
        assert!(
            !err.to_string().is_empty(),
            "F015 FALSIFIED: {} stop error has no diagnostic",
            harness.kind()
        );
    }
}
