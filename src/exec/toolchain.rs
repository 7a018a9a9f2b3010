// src/exec/toolchain.rs

//! Pluggable compiler / debugger invocation.
//!
//! The supervisor asks a [`Toolchain`] for the three commands it needs and
//! takes care of working directories, pipes and process groups itself. This
//! makes it easy to swap in shell scripts in tests while keeping the
//! production `go` + `dlv` invocation in [`GoToolchain`].

use std::path::Path;

use tokio::process::Command;

use crate::config::ToolchainSection;
use crate::types::ListenAddress;

/// Trait abstracting how the project is built, run and debugged.
pub trait Toolchain: Send + Sync {
    /// Command that compiles the project in `project` into `output`.
    fn build_command(&self, project: &Path, output: &str, build_args: &[String]) -> Command;

    /// Command that runs the built binary, listening on `address`.
    fn app_command(&self, binary: &Path, address: &ListenAddress) -> Command;

    /// Command that attaches a headless, multi-client debugger to `pid`,
    /// serving its API on `listen`.
    fn debugger_command(&self, pid: u32, listen: &ListenAddress) -> Command;
}

/// `go build` + Delve.
#[derive(Debug, Clone)]
pub struct GoToolchain {
    compiler: String,
    debugger: String,
}

impl GoToolchain {
    pub fn new(section: &ToolchainSection) -> Self {
        Self {
            compiler: section.compiler.clone(),
            debugger: section.debugger.clone(),
        }
    }
}

impl Toolchain for GoToolchain {
    fn build_command(&self, project: &Path, output: &str, build_args: &[String]) -> Command {
        let mut cmd = Command::new(&self.compiler);
        cmd.arg("build")
            .arg(format!("-C={}", project.display()))
            .arg("-o")
            .arg(output)
            .args(build_args);
        cmd
    }

    fn app_command(&self, binary: &Path, address: &ListenAddress) -> Command {
        let mut cmd = Command::new(binary);
        cmd.arg(address.to_string());
        cmd
    }

    fn debugger_command(&self, pid: u32, listen: &ListenAddress) -> Command {
        let mut cmd = Command::new(&self.debugger);
        cmd.arg("attach")
            .arg(format!("--listen={listen}"))
            .arg("--headless=true")
            .arg("--api-version=2")
            .arg(pid.to_string())
            .arg("--accept-multiclient")
            .arg("--continue");
        // An inherited CGO_CFLAGS makes Delve print a warning on every attach.
        cmd.env_clear();
        if let Some(path) = std::env::var_os("PATH") {
            cmd.env("PATH", path);
        }
        cmd
    }
}
