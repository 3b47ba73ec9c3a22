// Demos are allowed to use expect/unwrap for simplicity
#![allow(clippy::expect_used, clippy::unwrap_used)]

//! Velador Gateway Service Demo
//!
//! Drives the host's native supervisor through the velador service manager.
//!
//! # Usage
//!
//! ```bash
//! # Show backend, loaded state, persisted command and runtime
//! cargo run --example gateway
//!
//! # Install a command as the gateway service
//! cargo run --example gateway -- install /usr/bin/node /srv/gw/server.js
//!
//! # Restart, stop, uninstall
//! cargo run --example gateway -- restart
//! cargo run --example gateway -- stop
//! cargo run --example gateway -- uninstall
//!
//! # Termux package checks
//! cargo run --example gateway -- doctor
//!
//! # Use a separate profile
//! VELADOR_PROFILE=work cargo run --example gateway
//! ```

use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use velador::prelude::*;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let host = HostEnv::current();
    println!("Host: {}", OsSummary::resolve(&host).label);

    let config = ServiceConfig::from_env(&host).expect("invalid VELADOR_* environment");
    let manager = match ServiceManager::for_host(&host, &config, Arc::new(SystemRunner::new())) {
        Ok(manager) => manager,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(2);
        }
    };
    println!("Backend: {} ({})", manager.label(), manager.artifact_path().display());

    let result = match args.first().map(String::as_str) {
        None | Some("status") => {
            println!("{}", manager.summary().await);
            Ok(())
        }
        Some("install") if args.len() > 1 => match InstallSpec::new(args[1..].iter().cloned()) {
            Ok(spec) => manager
                .install(&spec.with_description("Velador gateway (demo)"))
                .await
                .map(|path| println!("Installed: {}", path.display())),
            Err(e) => Err(e),
        },
        Some("uninstall") => manager.uninstall().await.map(|report| println!("{report}")),
        Some("stop") => manager.stop().await,
        Some("restart") => manager.restart().await,
        Some("doctor") => {
            let notes = termux_doctor(&host, &SystemRunner::new()).await;
            if notes.is_empty() {
                println!("No issues found");
            }
            for note in notes {
                println!("{note}");
            }
            Ok(())
        }
        Some(other) => {
            eprintln!("unknown command: {other}");
            eprintln!("usage: gateway [status|install <argv>...|uninstall|stop|restart|doctor]");
            std::process::exit(64);
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
