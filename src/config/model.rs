// src/config/model.rs

use std::path::PathBuf;

use serde::Deserialize;

use crate::types::ListenAddress;
use crate::watch::WatchRuleSet;

pub const DEFAULT_APP_NAME: &str = "devloop_binary";
pub const DEFAULT_APP_PORT: u16 = 8080;
pub const DEFAULT_LISTEN_PORT: u16 = 3811;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// app_name = "server"
/// app_path = "."
/// app_address = "localhost:8080"
/// build_args = ["-gcflags=all=-N -l"]
/// listen_port = 3811
///
/// exclude_dirs = ["vendor"]
/// include_dirs = ["vendor/mymodule"]
/// exclude_exts = ["_test.go", ".md"]
///
/// [toolchain]
/// compiler = "go"
/// debugger = "dlv"
/// ```
///
/// Every field is optional. Relative rule paths are resolved against
/// `app_path` by [`ConfigFile::resolve`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawConfigFile {
    pub app_name: String,
    pub app_path: Option<PathBuf>,
    pub app_address: Option<String>,
    /// Preferred port when `app_address` is not set.
    pub app_port: u16,
    pub build_args: Vec<String>,
    /// Preferred debugger port.
    pub listen_port: u16,
    /// Host the debugger binds to; empty means all interfaces.
    pub listen_host: String,

    pub exclude_dirs: Vec<String>,
    pub exclude_files: Vec<String>,
    pub exclude_exts: Vec<String>,
    pub exclude_prefix: Vec<String>,
    pub include_dirs: Vec<String>,
    pub include_files: Vec<String>,

    pub toolchain: ToolchainSection,
}

impl Default for RawConfigFile {
    fn default() -> Self {
        Self {
            app_name: DEFAULT_APP_NAME.to_string(),
            app_path: None,
            app_address: None,
            app_port: DEFAULT_APP_PORT,
            build_args: vec!["-gcflags=all=-N -l".to_string()],
            listen_port: DEFAULT_LISTEN_PORT,
            listen_host: String::new(),
            exclude_dirs: Vec::new(),
            exclude_files: Vec::new(),
            exclude_exts: Vec::new(),
            exclude_prefix: Vec::new(),
            include_dirs: Vec::new(),
            include_files: Vec::new(),
            toolchain: ToolchainSection::default(),
        }
    }
}

/// Programs used to compile and debug the project, from `[toolchain]`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolchainSection {
    pub compiler: String,
    pub debugger: String,
}

impl Default for ToolchainSection {
    fn default() -> Self {
        Self {
            compiler: "go".to_string(),
            debugger: "dlv".to_string(),
        }
    }
}

/// Validated, fully resolved configuration.
///
/// All paths are absolute. The binary produced by the build is always part
/// of `rules.exclude_files` so writing it never retriggers a rebuild.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub app_name: String,
    pub app_path: PathBuf,
    pub app_address: Option<ListenAddress>,
    pub app_port: u16,
    pub build_args: Vec<String>,
    pub listen_port: u16,
    pub listen_host: String,
    pub rules: WatchRuleSet,
    pub toolchain: ToolchainSection,
}

impl ConfigFile {
    /// Absolute path of the binary the build produces.
    pub fn binary_path(&self) -> PathBuf {
        self.app_path.join(&self.app_name)
    }
}
