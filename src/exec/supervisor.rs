// src/exec/supervisor.rs

//! The kill → build → run → attach cycle.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::config::ConfigFile;
use crate::errors::{DevloopError, Result};
use crate::exec::port::{self, PORT_FREE_POLL, PORT_FREE_TIMEOUT};
use crate::exec::process::{ManagedProcess, ProcessState};
use crate::exec::toolchain::Toolchain;
use crate::types::ListenAddress;

/// Result of one rebuild cycle that did not hit a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Both the program and the debugger are up.
    Running { app_pid: u32, debugger_pid: u32 },
    /// The compiler failed; nothing was started.
    BuildFailed,
    /// The build succeeded but the program could not be started.
    AppStartFailed,
    /// The program runs but the debugger could not be attached.
    DebuggerStartFailed { app_pid: u32 },
}

/// Pids of the supervised pair, for signal-driven shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessIds {
    pub app: Option<u32>,
    pub debugger: Option<u32>,
}

/// Trait abstracting the rebuild target driven by the runtime.
///
/// Production code uses [`ProcessSupervisor`]; tests can provide a fake that
/// only records calls.
pub trait Supervisor: Send {
    /// Stop the running pair, rebuild, and start a fresh pair.
    ///
    /// Only failures that make further cycles pointless (no port can be
    /// obtained at all) are returned as errors.
    fn rebuild_and_restart(&mut self) -> Pin<Box<dyn Future<Output = Result<CycleOutcome>> + Send + '_>>;

    /// Stop the running pair for good.
    fn shutdown(&mut self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;

    fn process_ids(&mut self) -> ProcessIds;
}

/// Timing knobs of the cycle.
#[derive(Debug, Clone, Copy)]
pub struct SupervisorOptions {
    /// Pause after each launch so initial output is flushed before moving on.
    pub settle: Duration,
    pub port_free_timeout: Duration,
    pub port_free_poll: Duration,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(1),
            port_free_timeout: PORT_FREE_TIMEOUT,
            port_free_poll: PORT_FREE_POLL,
        }
    }
}

/// Sole owner of the program and debugger processes.
///
/// The program's listen address and the debugger port are negotiated on the
/// first cycle that needs them and reused afterwards, so a restarted program
/// comes back on the same address.
#[derive(Debug)]
pub struct ProcessSupervisor<T: Toolchain> {
    toolchain: T,
    project: PathBuf,
    app_name: String,
    build_args: Vec<String>,
    app_port: u16,
    listen_port: u16,
    listen_host: String,
    address: Option<ListenAddress>,
    debug_port: Option<u16>,
    app: ManagedProcess,
    debugger: ManagedProcess,
    options: SupervisorOptions,
}

impl<T: Toolchain> ProcessSupervisor<T> {
    pub fn new(cfg: &ConfigFile, toolchain: T) -> Self {
        Self {
            toolchain,
            project: cfg.app_path.clone(),
            app_name: cfg.app_name.clone(),
            build_args: cfg.build_args.clone(),
            app_port: cfg.app_port,
            listen_port: cfg.listen_port,
            listen_host: cfg.listen_host.clone(),
            address: cfg.app_address.clone(),
            debug_port: None,
            app: ManagedProcess::new("app"),
            debugger: ManagedProcess::new("debugger"),
            options: SupervisorOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SupervisorOptions) -> Self {
        self.options = options;
        self
    }

    /// Address handed to the program, once negotiated.
    pub fn address(&self) -> Option<&ListenAddress> {
        self.address.as_ref()
    }

    /// Debugger port, once negotiated.
    pub fn debug_port(&self) -> Option<u16> {
        self.debug_port
    }

    pub fn app_state(&mut self) -> ProcessState {
        self.app.state()
    }

    pub fn debugger_state(&mut self) -> ProcessState {
        self.debugger.state()
    }

    pub fn app_pid(&mut self) -> Option<u32> {
        self.app.pid()
    }

    pub fn debugger_pid(&mut self) -> Option<u32> {
        self.debugger.pid()
    }

    /// Run one full cycle. See [`Supervisor::rebuild_and_restart`].
    pub async fn rebuild_and_restart(&mut self) -> Result<CycleOutcome> {
        self.stop_processes().await;

        match self.build().await {
            Ok(()) => {}
            Err(DevloopError::Build {
                status,
                stdout,
                stderr,
            }) => {
                error!(
                    %status,
                    stdout = %stdout.trim_end(),
                    stderr = %stderr.trim_end(),
                    "failed to build binary"
                );
                return Ok(CycleOutcome::BuildFailed);
            }
            Err(err) => {
                error!(error = %err, "failed to build binary");
                return Ok(CycleOutcome::BuildFailed);
            }
        }

        let address = self.resolve_address().await?;
        let binary = self.project.join(&self.app_name);
        let mut cmd = self.toolchain.app_command(&binary, &address);
        cmd.current_dir(&self.project);
        let app_pid = match self.app.start(cmd) {
            Ok(pid) => {
                info!(address = %address, pid, "running on http://{address}");
                pid
            }
            Err(err) => {
                error!(error = %err, "failed to start program");
                return Ok(CycleOutcome::AppStartFailed);
            }
        };
        sleep(self.options.settle).await;

        let debug_port = self.resolve_debug_port().await?;
        if !port::wait_until_free(
            debug_port,
            self.options.port_free_timeout,
            self.options.port_free_poll,
        )
        .await
        {
            error!(port = debug_port, "debugger port still busy; starting debugger anyway");
        }

        let listen = ListenAddress::new(self.listen_host.clone(), debug_port);
        let mut cmd = self.toolchain.debugger_command(app_pid, &listen);
        cmd.current_dir(&self.project);
        let outcome = match self.debugger.start(cmd) {
            Ok(debugger_pid) => {
                info!(listen = %listen, pid = debugger_pid, "debugger attached");
                CycleOutcome::Running {
                    app_pid,
                    debugger_pid,
                }
            }
            Err(err) => {
                error!(error = %err, "failed to start debugger");
                return Ok(CycleOutcome::DebuggerStartFailed { app_pid });
            }
        };
        sleep(self.options.settle).await;

        Ok(outcome)
    }

    /// Kill both process groups. See [`Supervisor::shutdown`].
    pub async fn shutdown(&mut self) {
        self.stop_processes().await;
    }

    async fn stop_processes(&mut self) {
        self.app.terminate().await;
        self.debugger.terminate().await;
    }

    async fn build(&self) -> Result<()> {
        let mut cmd =
            self.toolchain
                .build_command(&self.project, &self.app_name, &self.build_args);
        cmd.current_dir(&self.project)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        info!(project = ?self.project, "building");
        let output = cmd.output().await.map_err(|source| DevloopError::ProcessStart {
            what: "compiler",
            source,
        })?;

        if !output.status.success() {
            return Err(DevloopError::build(
                output.status,
                &output.stdout,
                &output.stderr,
            ));
        }

        info!(
            binary = ?self.project.join(&self.app_name),
            "binary built"
        );
        Ok(())
    }

    async fn resolve_address(&mut self) -> Result<ListenAddress> {
        if let Some(address) = &self.address {
            return Ok(address.clone());
        }
        let port = port::allocate(self.app_port).await.inspect_err(|err| {
            error!(error = %err, "failed to configure an app address; set `app_address` in the config");
        })?;
        let address = ListenAddress::localhost(port);
        self.address = Some(address.clone());
        Ok(address)
    }

    async fn resolve_debug_port(&mut self) -> Result<u16> {
        if let Some(port) = self.debug_port {
            return Ok(port);
        }
        let port = port::allocate(self.listen_port).await?;
        if port != self.listen_port {
            warn!(preferred = self.listen_port, port, "debugger using alternate port");
        }
        self.debug_port = Some(port);
        Ok(port)
    }
}

impl<T: Toolchain> Supervisor for ProcessSupervisor<T> {
    fn rebuild_and_restart(&mut self) -> Pin<Box<dyn Future<Output = Result<CycleOutcome>> + Send + '_>> {
        Box::pin(ProcessSupervisor::rebuild_and_restart(self))
    }

    fn shutdown(&mut self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(ProcessSupervisor::shutdown(self))
    }

    fn process_ids(&mut self) -> ProcessIds {
        ProcessIds {
            app: self.app.pid(),
            debugger: self.debugger.pid(),
        }
    }
}
