use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use devloop::exec::Toolchain;
use devloop::types::ListenAddress;
use tokio::process::Command;

/// A toolchain made of `sh -c` scripts:
/// - the "build" touches the output file, or fails with a compiler-like
///   message while `fail_builds` is set
/// - the "program" and the "debugger" just sleep
///
/// Counters are shared, so a test can keep a clone after handing the
/// toolchain to a supervisor.
#[derive(Debug, Clone, Default)]
pub struct ShellToolchain {
    pub fail_builds: Arc<AtomicBool>,
    pub builds: Arc<AtomicUsize>,
    pub app_addresses: Arc<Mutex<Vec<String>>>,
    pub attached_pids: Arc<Mutex<Vec<u32>>>,
}

impl ShellToolchain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_builds(&self, fail: bool) {
        self.fail_builds.store(fail, Ordering::SeqCst);
    }

    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn app_addresses(&self) -> Vec<String> {
        self.app_addresses.lock().unwrap().clone()
    }

    pub fn attached_pids(&self) -> Vec<u32> {
        self.attached_pids.lock().unwrap().clone()
    }
}

fn sh(script: &str, args: &[String]) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(script).arg("devloop-test");
    cmd.args(args);
    cmd
}

impl Toolchain for ShellToolchain {
    fn build_command(&self, project: &Path, output: &str, _build_args: &[String]) -> Command {
        self.builds.fetch_add(1, Ordering::SeqCst);
        if self.fail_builds.load(Ordering::SeqCst) {
            return sh("echo './main.go:3:1: syntax error' >&2; exit 2", &[]);
        }
        let target = project.join(output).display().to_string();
        sh("touch \"$1\"", &[target])
    }

    fn app_command(&self, _binary: &Path, address: &ListenAddress) -> Command {
        self.app_addresses.lock().unwrap().push(address.to_string());
        sh("echo \"listening on $1\"; exec sleep 30", &[address.to_string()])
    }

    fn debugger_command(&self, pid: u32, listen: &ListenAddress) -> Command {
        self.attached_pids.lock().unwrap().push(pid);
        sh(
            "echo \"API server listening at: $1\"; exec sleep 30",
            &[listen.to_string()],
        )
    }
}
