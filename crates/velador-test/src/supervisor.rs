//! Simulated native supervisors.
//!
//! [`FakeSupervisor`] is a stateful [`CommandRunner`] that understands the
//! subset of `launchctl`, `systemctl`, `schtasks`, `sv`, `sv-enable` and
//! `sv-disable` the backends use. It keeps per-service loaded/running state
//! and answers in each tool's own output format, so backends run their real
//! parsing code against it.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use velador_core::{BackendKind, CommandOutput, CommandRunner, ToolError, ToolResult, command_line};

use crate::chaos::{ChaosConfig, ChaosInjector};

/// Which native supervisor a service is registered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Supervisor {
    /// launchd, via `launchctl`.
    Launchd,
    /// systemd, via `systemctl`.
    Systemd,
    /// Windows Task Scheduler, via `schtasks`.
    TaskScheduler,
    /// runit from termux-services, via `sv`.
    Runit,
}

impl Supervisor {
    /// Returns the supervisor behind a backend.
    #[must_use]
    pub const fn for_kind(kind: BackendKind) -> Self {
        match kind {
            BackendKind::LaunchAgent => Self::Launchd,
            BackendKind::Systemd => Self::Systemd,
            BackendKind::ScheduledTask => Self::TaskScheduler,
            BackendKind::Termux => Self::Runit,
        }
    }
}

/// Simulated state of one service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceState {
    /// Registered (loaded, enabled, or created).
    pub loaded: bool,
    /// Currently running.
    pub running: bool,
    /// Process id while running.
    pub pid: Option<u32>,
}

#[derive(Debug)]
struct State {
    services: HashMap<(Supervisor, String), ServiceState>,
    next_pid: u32,
}

impl State {
    fn get(&self, supervisor: Supervisor, name: &str) -> ServiceState {
        self.services
            .get(&(supervisor, name.to_string()))
            .copied()
            .unwrap_or_default()
    }

    fn entry(&mut self, supervisor: Supervisor, name: &str) -> &mut ServiceState {
        self.services.entry((supervisor, name.to_string())).or_default()
    }

    fn load(&mut self, supervisor: Supervisor, name: &str) {
        self.entry(supervisor, name).loaded = true;
    }

    fn unload(&mut self, supervisor: Supervisor, name: &str) {
        *self.entry(supervisor, name) = ServiceState::default();
    }

    fn start(&mut self, supervisor: Supervisor, name: &str) -> u32 {
        let pid = self.next_pid;
        self.next_pid += 1;
        let service = self.entry(supervisor, name);
        service.running = true;
        service.pid = Some(pid);
        pid
    }

    fn halt(&mut self, supervisor: Supervisor, name: &str) {
        let service = self.entry(supervisor, name);
        service.running = false;
        service.pid = None;
    }
}

/// Stateful stand-in for the host's service supervisors.
///
/// Programs it does not simulate fail as missing.
#[derive(Debug)]
pub struct FakeSupervisor {
    state: Mutex<State>,
    chaos: Mutex<Option<Arc<ChaosInjector>>>,
    calls: Mutex<Vec<String>>,
}

impl Default for FakeSupervisor {
    fn default() -> Self {
        Self {
            state: Mutex::new(State {
                services: HashMap::new(),
                next_pid: 1000,
            }),
            chaos: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl FakeSupervisor {
    /// Creates a supervisor with no registered services.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Installs and starts a fault injector, replacing any previous one.
    pub fn inject(&self, config: ChaosConfig) -> Arc<ChaosInjector> {
        let injector = Arc::new(ChaosInjector::new(config));
        injector.start();
        *self.chaos.lock() = Some(Arc::clone(&injector));
        injector
    }

    /// Removes fault injection.
    pub fn heal(&self) {
        if let Some(injector) = self.chaos.lock().take() {
            injector.stop();
        }
    }

    /// Returns the simulated state of a service.
    #[must_use]
    pub fn state(&self, supervisor: Supervisor, name: &str) -> ServiceState {
        self.state.lock().get(supervisor, name)
    }

    /// Returns every recorded command line, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Returns true if a recorded command line starts with `prefix`.
    #[must_use]
    pub fn called(&self, prefix: &str) -> bool {
        self.calls.lock().iter().any(|c| c.starts_with(prefix))
    }

    /// Forgets recorded calls.
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn simulate(&self, program: &str, args: &[&str]) -> Option<CommandOutput> {
        let mut state = self.state.lock();
        let output = match program {
            "launchctl" => launchctl(&mut state, args),
            "systemctl" => {
                let args = args.strip_prefix(&["--user"]).unwrap_or(args);
                systemctl(&mut state, args)
            }
            "schtasks" => schtasks(&mut state, args),
            "sv" => sv(&mut state, args),
            "sv-enable" => sv_enable(&mut state, args),
            "sv-disable" => sv_disable(&mut state, args),
            _ => return None,
        };
        Some(output)
    }
}

#[async_trait]
impl CommandRunner for FakeSupervisor {
    async fn output(&self, program: &str, args: &[&str]) -> ToolResult<CommandOutput> {
        self.calls.lock().push(command_line(program, args));

        let injector = self.chaos.lock().clone();
        if let Some(injector) = injector {
            if let Some(delay) = injector.latency() {
                tokio::time::sleep(delay).await;
            }
            if let Some(result) = injector.intercept(program, args) {
                tracing::debug!(command = %command_line(program, args), "injected fault");
                return result;
            }
        }

        self.simulate(program, args).ok_or_else(|| ToolError::Missing {
            program: program.to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        })
    }
}

fn last_segment(target: &str) -> &str {
    target.rsplit('/').next().unwrap_or(target)
}

fn launchctl(state: &mut State, args: &[&str]) -> CommandOutput {
    const S: Supervisor = Supervisor::Launchd;
    match args {
        ["bootstrap", _domain, plist] => {
            let path = Path::new(plist);
            let label = path.file_stem().map(|s| s.to_string_lossy().into_owned());
            match label {
                Some(label) if path.is_file() => {
                    if state.get(S, &label).loaded {
                        return CommandOutput::failed(5, "Bootstrap failed: 5: Input/output error");
                    }
                    state.load(S, &label);
                    state.start(S, &label);
                    CommandOutput::ok("")
                }
                _ => CommandOutput::failed(5, "Bootstrap failed: 5: Input/output error"),
            }
        }
        ["bootout", target] => {
            let label = last_segment(target);
            if state.get(S, label).loaded {
                state.unload(S, label);
                CommandOutput::ok("")
            } else {
                CommandOutput::failed(3, "Boot-out failed: 3: No such process")
            }
        }
        ["kickstart", "-k", target] | ["kickstart", target] => {
            let label = last_segment(target);
            if state.get(S, label).loaded {
                state.start(S, label);
                CommandOutput::ok("")
            } else {
                CommandOutput::failed(
                    113,
                    format!("Could not find service \"{label}\" in domain for port"),
                )
            }
        }
        ["print", target] => {
            let label = last_segment(target);
            let service = state.get(S, label);
            if !service.loaded {
                return CommandOutput::failed(
                    113,
                    format!("Could not find service \"{label}\" in domain for port"),
                );
            }
            let mut out = format!("{target} = {{\n\tactive count = 1\n\tpath = (simulated)\n");
            if let Some(pid) = service.pid {
                out.push_str(&format!("\tstate = running\n\tpid = {pid}\n"));
            } else {
                out.push_str("\tstate = not running\n");
            }
            out.push_str("}\n");
            CommandOutput::ok(out)
        }
        _ => CommandOutput::failed(64, "Unrecognized subcommand"),
    }
}

fn systemctl(state: &mut State, args: &[&str]) -> CommandOutput {
    const S: Supervisor = Supervisor::Systemd;
    match args {
        ["daemon-reload"] => CommandOutput::ok(""),
        ["enable", unit] => {
            state.load(S, unit);
            CommandOutput::ok("")
        }
        ["disable", "--now", unit] => {
            if state.get(S, unit).loaded {
                state.unload(S, unit);
                CommandOutput::ok("")
            } else {
                CommandOutput::failed(
                    1,
                    format!("Failed to disable unit: Unit file {unit} does not exist."),
                )
            }
        }
        ["restart", unit] | ["start", unit] => {
            if state.get(S, unit).loaded {
                state.start(S, unit);
                CommandOutput::ok("")
            } else {
                CommandOutput::failed(5, format!("Failed to restart {unit}: Unit {unit} not found."))
            }
        }
        // Stopping an unknown unit is a no-op.
        ["stop", unit] => {
            if state.get(S, unit).loaded {
                state.halt(S, unit);
            }
            CommandOutput::ok("")
        }
        ["is-enabled", unit] => {
            if state.get(S, unit).loaded {
                CommandOutput::ok("enabled\n")
            } else {
                CommandOutput {
                    code: Some(1),
                    stdout: "disabled\n".to_string(),
                    stderr: String::new(),
                }
            }
        }
        ["show", unit, ..] => {
            let service = state.get(S, unit);
            let out = match service.pid {
                Some(pid) => format!("ActiveState=active\nSubState=running\nMainPID={pid}\nExecMainStatus=0\n"),
                None => "ActiveState=inactive\nSubState=dead\nMainPID=0\nExecMainStatus=0\n".to_string(),
            };
            CommandOutput::ok(out)
        }
        _ => CommandOutput::failed(1, "Unknown command verb"),
    }
}

fn flag_value<'a>(args: &[&'a str], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a.eq_ignore_ascii_case(flag))
        .and_then(|i| args.get(i + 1))
        .copied()
}

const TASK_NOT_FOUND: &str = "ERROR: The system cannot find the file specified.";

fn schtasks(state: &mut State, args: &[&str]) -> CommandOutput {
    const S: Supervisor = Supervisor::TaskScheduler;
    let Some(name) = flag_value(args, "/TN") else {
        return CommandOutput::failed(1, "ERROR: Invalid syntax. Mandatory option '/TN' is missing.");
    };
    let service = state.get(S, name);
    match args.first().copied() {
        Some("/Create") => {
            state.load(S, name);
            CommandOutput::ok(format!(
                "SUCCESS: The scheduled task \"{name}\" has successfully been created."
            ))
        }
        Some(_) if !service.loaded => CommandOutput::failed(1, TASK_NOT_FOUND),
        Some("/Run") => {
            state.start(S, name);
            CommandOutput::ok(format!(
                "SUCCESS: Attempted to run the scheduled task \"{name}\"."
            ))
        }
        Some("/End") => {
            state.halt(S, name);
            CommandOutput::ok(format!(
                "SUCCESS: The scheduled task \"{name}\" has been terminated successfully."
            ))
        }
        Some("/Delete") => {
            state.unload(S, name);
            CommandOutput::ok(format!(
                "SUCCESS: The scheduled task \"{name}\" was successfully deleted."
            ))
        }
        Some("/Query") => {
            let status = if service.running { "Running" } else { "Ready" };
            CommandOutput::ok(format!(
                "\r\nFolder: \\\r\nHostName:      SIMULATED\r\nTaskName:      \\{name}\r\nStatus:        {status}\r\nLogon Mode:    Interactive only\r\n"
            ))
        }
        _ => CommandOutput::failed(1, "ERROR: Invalid argument/option."),
    }
}

fn sv(state: &mut State, args: &[&str]) -> CommandOutput {
    const S: Supervisor = Supervisor::Runit;
    let missing_dir =
        |name: &str| format!("fail: {name}: unable to change to service directory: file does not exist");
    match args {
        ["status", name] => {
            let service = state.get(S, name);
            if !service.loaded {
                return CommandOutput::failed(
                    1,
                    format!("warning: {name}: unable to open supervise/ok: file does not exist"),
                );
            }
            match service.pid {
                Some(pid) => CommandOutput::ok(format!("run: {name}: (pid {pid}) 5s\n")),
                None => CommandOutput::ok(format!("down: {name}: 3s, normally up\n")),
            }
        }
        ["stop", name] | ["down", name] => {
            if state.get(S, name).loaded {
                state.halt(S, name);
                CommandOutput::ok(format!("ok: down: {name}: 0s, normally up\n"))
            } else {
                CommandOutput::failed(1, missing_dir(name))
            }
        }
        ["restart", name] | ["start", name] | ["up", name] => {
            if state.get(S, name).loaded {
                let pid = state.start(S, name);
                CommandOutput::ok(format!("ok: run: {name}: (pid {pid}) 0s\n"))
            } else {
                CommandOutput::failed(1, missing_dir(name))
            }
        }
        _ => CommandOutput::failed(100, "usage: sv [-v] [-w sec] command service ..."),
    }
}

fn sv_enable(state: &mut State, args: &[&str]) -> CommandOutput {
    match args {
        [name] => {
            state.load(Supervisor::Runit, name);
            state.start(Supervisor::Runit, name);
            CommandOutput::ok("")
        }
        _ => CommandOutput::failed(1, "Usage: sv-enable <service>"),
    }
}

fn sv_disable(state: &mut State, args: &[&str]) -> CommandOutput {
    match args {
        [name] if state.get(Supervisor::Runit, name).loaded => {
            state.unload(Supervisor::Runit, name);
            CommandOutput::ok("")
        }
        [name] => CommandOutput::failed(1, format!("fail: {name}: unable to change to service directory: file does not exist")),
        _ => CommandOutput::failed(1, "Usage: sv-disable <service>"),
    }
}
