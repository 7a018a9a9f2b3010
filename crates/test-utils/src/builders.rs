#![allow(dead_code)]

use std::path::{Path, PathBuf};

use devloop::config::{ConfigFile, RawConfigFile};

/// Builder for `ConfigFile` to simplify test setup.
///
/// Paths given to the rule methods are relative to the project directory,
/// exactly like entries in `devloop.toml`.
pub struct ConfigFileBuilder {
    base_dir: PathBuf,
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    /// Start from the defaults, with `project` as `app_path`.
    pub fn new(project: impl AsRef<Path>) -> Self {
        let project = project.as_ref().to_path_buf();
        Self {
            base_dir: project.clone(),
            config: RawConfigFile {
                app_path: Some(project),
                ..RawConfigFile::default()
            },
        }
    }

    pub fn app_name(mut self, name: &str) -> Self {
        self.config.app_name = name.to_string();
        self
    }

    pub fn app_address(mut self, address: &str) -> Self {
        self.config.app_address = Some(address.to_string());
        self
    }

    pub fn app_port(mut self, port: u16) -> Self {
        self.config.app_port = port;
        self
    }

    pub fn listen_port(mut self, port: u16) -> Self {
        self.config.listen_port = port;
        self
    }

    pub fn exclude_dir(mut self, dir: &str) -> Self {
        self.config.exclude_dirs.push(dir.to_string());
        self
    }

    pub fn exclude_file(mut self, file: &str) -> Self {
        self.config.exclude_files.push(file.to_string());
        self
    }

    pub fn exclude_ext(mut self, ext: &str) -> Self {
        self.config.exclude_exts.push(ext.to_string());
        self
    }

    pub fn exclude_prefix(mut self, prefix: &str) -> Self {
        self.config.exclude_prefix.push(prefix.to_string());
        self
    }

    pub fn include_dir(mut self, dir: &str) -> Self {
        self.config.include_dirs.push(dir.to_string());
        self
    }

    pub fn include_file(mut self, file: &str) -> Self {
        self.config.include_files.push(file.to_string());
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::resolve(self.config, &self.base_dir)
            .expect("Failed to build valid config from builder")
    }
}
