//! Falsification Tests: Category C - Persisted Command Round Trips (F031-F040)
//!
//! What `install` writes, `read_command` must read back. Termux keeps its
//! whitespace-splitting run-script format, so arguments containing spaces
//! are the one documented loss.

use std::collections::BTreeMap;
use std::path::PathBuf;

use velador_core::{BackendKind, InstallSpec};
use velador_test::{ServiceHarness, gateway_spec};

const QUOTING_BACKENDS: [BackendKind; 3] = [
    BackendKind::LaunchAgent,
    BackendKind::Systemd,
    BackendKind::ScheduledTask,
];

/// F031: argv and PORT survive install and read_command on every backend
#[tokio::test]
async fn f031_gateway_round_trip() {
    for harness in ServiceHarness::all().unwrap() {
        let backend = harness.backend().unwrap();
        backend.install(&gateway_spec().unwrap()).await.unwrap();

        let command = backend.read_command().await.unwrap();
        assert_eq!(
            command.program_arguments,
            ["node", "server.js"],
            "F031 FALSIFIED: {} argv",
            harness.kind()
        );
        assert_eq!(
            command.env("PORT"),
            Some("8080"),
            "F031 FALSIFIED: {} PORT",
            harness.kind()
        );
    }
}

/// F032: Termux splits arguments on spaces when reading back
#[tokio::test]
async fn f032_termux_lossy_split() {
    let harness = ServiceHarness::new(BackendKind::Termux).unwrap();
    let backend = harness.backend().unwrap();
    let spec = InstallSpec::new(["/bin/echo", "hello world"]).unwrap();
    backend.install(&spec).await.unwrap();

    let command = backend.read_command().await.unwrap();
    assert_eq!(command.program_arguments, ["/bin/echo", "hello", "world"]);
}

/// F033: the quoting backends keep arguments with spaces intact
#[tokio::test]
async fn f033_quoted_arguments_survive() {
    for kind in QUOTING_BACKENDS {
        let harness = ServiceHarness::new(kind).unwrap();
        let backend = harness.backend().unwrap();
        let spec = InstallSpec::new(["/opt/gw/bin/node", "hello world", "--title", "a & <b>"]).unwrap();
        backend.install(&spec).await.unwrap();

        let command = backend.read_command().await.unwrap();
        assert_eq!(
            command.program_arguments,
            spec.program_arguments(),
            "F033 FALSIFIED: {kind}"
        );
    }
}

/// F034: working directory round trips where the artifact records it
#[tokio::test]
async fn f034_working_directory() {
    for harness in ServiceHarness::all().unwrap() {
        let backend = harness.backend().unwrap();
        let spec = gateway_spec().unwrap().with_working_directory("/srv/gw");
        backend.install(&spec).await.unwrap();

        let command = backend.read_command().await.unwrap();
        let expected = (harness.kind() != BackendKind::Termux).then(|| PathBuf::from("/srv/gw"));
        assert_eq!(
            command.working_directory, expected,
            "F034 FALSIFIED: {}",
            harness.kind()
        );
    }
}

/// F035: no environment reads back as None, never as an empty map
#[tokio::test]
async fn f035_empty_environment_is_none() {
    for harness in ServiceHarness::all().unwrap() {
        let backend = harness.backend().unwrap();
        backend
            .install(&InstallSpec::new(["node"]).unwrap())
            .await
            .unwrap();
        let command = backend.read_command().await.unwrap();
        assert!(
            command.environment.is_none(),
            "F035 FALSIFIED: {} gave {:?}",
            harness.kind(),
            command.environment
        );
    }
}

/// F036: environment values with spaces survive on every backend
#[tokio::test]
async fn f036_environment_values() {
    for harness in ServiceHarness::all().unwrap() {
        let backend = harness.backend().unwrap();
        let spec = gateway_spec()
            .unwrap()
            .with_env("GREETING", "hello world")
            .with_env("GW_HOME", "/data/gw");
        backend.install(&spec).await.unwrap();

        let command = backend.read_command().await.unwrap();
        let expected: BTreeMap<String, String> = [
            ("GREETING", "hello world"),
            ("GW_HOME", "/data/gw"),
            ("PORT", "8080"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        assert_eq!(
            command.environment.as_ref(),
            Some(&expected),
            "F036 FALSIFIED: {}",
            harness.kind()
        );
    }
}

/// F037: the command records which artifact it came from
#[tokio::test]
async fn f037_source_path() {
    for harness in ServiceHarness::all().unwrap() {
        let backend = harness.backend().unwrap();
        backend.install(&gateway_spec().unwrap()).await.unwrap();

        let source = backend.read_command().await.unwrap().source_path.unwrap();
        assert!(
            source.starts_with(backend.artifact_path()),
            "F037 FALSIFIED: {} read {}",
            harness.kind(),
            source.display()
        );
    }
}

/// F038: a corrupted artifact reads back as None rather than failing
#[tokio::test]
async fn f038_corrupt_artifact() {
    for harness in ServiceHarness::all().unwrap() {
        let backend = harness.backend().unwrap();
        backend.install(&gateway_spec().unwrap()).await.unwrap();

        let source = backend.read_command().await.unwrap().source_path.unwrap();
        std::fs::write(&source, "garbage without a command marker\n").unwrap();
        let command = backend.read_command().await;
        if harness.kind() == BackendKind::ScheduledTask {
            // Any non-directive line is the command line of a .cmd script.
            assert_eq!(command.unwrap().program_arguments[0], "garbage");
        } else {
            assert!(command.is_none(), "F038 FALSIFIED: {}", harness.kind());
        }
    }
}

/// F039: uninstall leaves nothing to read back
#[tokio::test]
async fn f039_uninstall_clears_command() {
    for harness in ServiceHarness::all().unwrap() {
        let backend = harness.backend().unwrap();
        backend.install(&gateway_spec().unwrap()).await.unwrap();
        backend.uninstall().await.unwrap();
        assert!(backend.read_command().await.is_none(), "F039 FALSIFIED: {}", harness.kind());
    }
}

/// F040: the description is stored in the artifact without affecting argv
#[tokio::test]
async fn f040_description_ignored_on_read() {
    for harness in ServiceHarness::all().unwrap() {
        let backend = harness.backend().unwrap();
        let spec = gateway_spec().unwrap().with_description("Velador gateway (dev)");
        let path = backend.install(&spec).await.unwrap();

        let command = backend.read_command().await.unwrap();
        assert_eq!(command.program_arguments, ["node", "server.js"]);
        if path.is_file() {
            let content = std::fs::read_to_string(&path).unwrap();
            assert!(
                content.contains("Velador gateway (dev)"),
                "F040 FALSIFIED: {} dropped the description",
                harness.kind()
            );
        }
    }
}
