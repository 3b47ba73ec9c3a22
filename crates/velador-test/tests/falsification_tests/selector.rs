//! Falsification Tests: Category D - Selection and Termux Environment (F041-F050)
//!
//! # Toyota Way: Poka-Yoke (ポカヨケ)
//! Mistake-proofing across all supported platforms.

use std::sync::Arc;

use velador_core::{
    BackendKind, CommandRunner, HostEnv, OsSummary, ServiceConfig, ServiceError, select_backend,
};
use velador_termux::{is_termux_services_available, termux_doctor};
use velador_test::{ALL_KINDS, FakeSupervisor, ServiceHarness, Supervisor, gateway_spec};

fn runner() -> Arc<dyn CommandRunner> {
    FakeSupervisor::new()
}

// =============================================================================
// F041-F045: Backend selection
// =============================================================================

/// F041: every supported host selects exactly its backend
#[test]
fn f041_selector_table() {
    let cases = [
        ("macos", None, BackendKind::LaunchAgent),
        ("darwin", None, BackendKind::LaunchAgent),
        ("linux", None, BackendKind::Systemd),
        ("linux", Some("0.118.0"), BackendKind::Termux),
        ("windows", None, BackendKind::ScheduledTask),
        ("win32", None, BackendKind::ScheduledTask),
    ];
    for (os, termux, expected) in cases {
        let mut host = HostEnv::new(os).with_var("HOME", "/home/gw").with_uid(501);
        if let Some(version) = termux {
            host = host.with_var("TERMUX_VERSION", version);
        }
        let backend = select_backend(&host, &ServiceConfig::default(), runner()).unwrap();
        assert_eq!(
            backend.kind(),
            expected,
            "F041 FALSIFIED: {os} (termux={termux:?}) selected {}",
            backend.kind()
        );
    }
}

/// F042: any other host is rejected with no fallback
#[test]
fn f042_other_hosts_rejected() {
    for os in ["freebsd", "openbsd", "sunos", "aix", "android", ""] {
        let host = HostEnv::new(os).with_var("HOME", "/home/gw");
        let err = select_backend(&host, &ServiceConfig::default(), runner()).unwrap_err();
        assert!(
            matches!(err, ServiceError::UnsupportedPlatform(_)),
            "F042 FALSIFIED: {os:?} gave {err}"
        );
    }
}

/// F043: the harness builds each kind through the selector
#[test]
fn f043_harness_matches_selector() {
    for kind in ALL_KINDS {
        let harness = ServiceHarness::new(kind).unwrap();
        assert_eq!(harness.backend().unwrap().kind(), kind, "F043 FALSIFIED");
    }
}

/// F044: two profiles install side by side without touching each other
#[tokio::test]
async fn f044_profiles_are_isolated() {
    for kind in ALL_KINDS {
        let harness = ServiceHarness::new(kind).unwrap();
        let host = harness.host().clone();
        let supervisor: Arc<dyn CommandRunner> = harness.supervisor().clone();

        let work_config = ServiceConfig::default().with_profile("work");
        let work = select_backend(&host, &work_config, Arc::clone(&supervisor)).unwrap();
        let default = harness.backend().unwrap();
        assert_ne!(work.artifact_path(), default.artifact_path(), "F044 FALSIFIED: {kind}");

        work.install(&gateway_spec().unwrap()).await.unwrap();
        default.install(&gateway_spec().unwrap()).await.unwrap();
        default.uninstall().await.unwrap();

        assert!(work.is_loaded().await, "F044 FALSIFIED: {kind} lost the work profile");
        assert!(!default.is_loaded().await);
    }
}

/// F045: a TOML config file drives every artifact name
#[tokio::test]
async fn f045_config_file() {
    let harness = ServiceHarness::new(BackendKind::Systemd).unwrap();
    let path = harness.root().join("velador.toml");
    std::fs::write(&path, "name = \"edge-gw\"\nprofile = \"lab\"\n").unwrap();
    let config = ServiceConfig::load(&path).unwrap();

    let harness = harness.with_config(config);
    assert_eq!(harness.service_name(), "edge-gw-lab.service");

    let backend = harness.backend().unwrap();
    backend.install(&gateway_spec().unwrap()).await.unwrap();
    assert!(
        harness
            .supervisor()
            .state(Supervisor::Systemd, "edge-gw-lab.service")
            .loaded,
        "F045 FALSIFIED: unit not enabled under its configured name"
    );
    assert!(backend.artifact_path().ends_with("systemd/user/edge-gw-lab.service"));
}

// =============================================================================
// F046-F050: Termux environment
// =============================================================================

/// F046: doctor flags only the missing Termux:API package
#[tokio::test]
async fn f046_doctor_on_termux() {
    let harness = ServiceHarness::new(BackendKind::Termux).unwrap();
    let notes = termux_doctor(harness.host(), harness.supervisor().as_ref()).await;

    assert_eq!(notes.len(), 1, "F046 FALSIFIED: {notes:?}");
    assert_eq!(notes[0].title, "Termux");
    assert!(notes[0].message.contains("Fix: pkg install termux-api"));
    assert!(harness.supervisor().called("termux-notification -h"));
}

/// F047: doctor reports nothing off Termux
#[tokio::test]
async fn f047_doctor_off_termux() {
    for kind in [BackendKind::LaunchAgent, BackendKind::Systemd, BackendKind::ScheduledTask] {
        let harness = ServiceHarness::new(kind).unwrap();
        let notes = termux_doctor(harness.host(), harness.supervisor().as_ref()).await;
        assert!(notes.is_empty(), "F047 FALSIFIED: {kind} {notes:?}");
        assert!(harness.supervisor().calls().is_empty());
    }
}

/// F048: termux-services detection follows the sv tool
#[tokio::test]
async fn f048_termux_services_detection() {
    let harness = ServiceHarness::new(BackendKind::Termux).unwrap();
    assert!(is_termux_services_available(harness.supervisor().as_ref()).await);

    harness.with_chaos(velador_test::ChaosConfig::missing("sv"));
    assert!(!is_termux_services_available(harness.supervisor().as_ref()).await);
    let notes = termux_doctor(harness.host(), harness.supervisor().as_ref()).await;
    assert!(
        notes
            .iter()
            .any(|n| n.message.ends_with("Fix: pkg install termux-services")),
        "F048 FALSIFIED: {notes:?}"
    );
}

/// F049: OS summary labels distinguish Termux from plain Linux
#[test]
fn f049_os_summary() {
    let termux = ServiceHarness::new(BackendKind::Termux).unwrap();
    assert_eq!(
        OsSummary::resolve(termux.host()).label,
        "android termux 0.118.0 (arm64)"
    );

    let linux = ServiceHarness::new(BackendKind::Systemd).unwrap();
    assert_eq!(OsSummary::resolve(linux.host()).label, "linux 1.0.0 (arm64)");
}

/// F050: the Termux service lives under the host's PREFIX
#[tokio::test]
async fn f050_termux_prefix() {
    let harness = ServiceHarness::new(BackendKind::Termux).unwrap();
    let backend = harness.backend().unwrap();
    let dir = backend.install(&gateway_spec().unwrap()).await.unwrap();

    assert_eq!(dir, harness.root().join("usr/var/service/velador-gateway"));
    assert!(dir.join("run").is_file(), "F050 FALSIFIED: no run script");
    assert!(dir.join("log/run").is_file(), "F050 FALSIFIED: no log script");
}
