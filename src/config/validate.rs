// src/config/validate.rs

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{DevloopError, Result};
use crate::types::ListenAddress;
use crate::watch::WatchRuleSet;

impl ConfigFile {
    /// Validate a raw config and resolve every path against `base_dir`.
    ///
    /// `app_path` is resolved against `base_dir` (and canonicalized when it
    /// exists, so rule paths line up with the paths `notify` reports). Rule
    /// paths are resolved against the resulting `app_path`.
    pub fn resolve(raw: RawConfigFile, base_dir: &Path) -> Result<ConfigFile> {
        validate_raw_config(&raw)?;

        let app_path = match &raw.app_path {
            Some(p) => normalize(base_dir, p),
            None => normalize(base_dir, Path::new(".")),
        };
        let app_path = app_path.canonicalize().unwrap_or(app_path);

        let app_address = raw
            .app_address
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.parse::<ListenAddress>())
            .transpose()
            .map_err(|e| DevloopError::ConfigError(format!("app_address: {e}")))?;

        let resolve_all = |list: &[String]| -> Vec<String> {
            list.iter()
                .map(|entry| path_string(&normalize(&app_path, Path::new(entry))))
                .collect()
        };

        let include_files = resolve_all(&raw.include_files);
        let mut exclude_files = resolve_all(&raw.exclude_files);

        let binary = path_string(&app_path.join(&raw.app_name));
        if !exclude_files.contains(&binary) && !include_files.contains(&binary) {
            exclude_files.push(binary);
        }

        let rules = WatchRuleSet {
            exclude_dirs: resolve_all(&raw.exclude_dirs),
            exclude_files,
            exclude_exts: raw.exclude_exts.clone(),
            exclude_prefixes: raw.exclude_prefix.clone(),
            include_dirs: resolve_all(&raw.include_dirs),
            include_files,
        };
        ensure_disjoint("include_dirs", &rules.include_dirs, "exclude_dirs", &rules.exclude_dirs)?;
        ensure_disjoint(
            "include_files",
            &rules.include_files,
            "exclude_files",
            &rules.exclude_files,
        )?;

        Ok(ConfigFile {
            app_name: raw.app_name,
            app_path,
            app_address,
            app_port: raw.app_port,
            build_args: raw.build_args,
            listen_port: raw.listen_port,
            listen_host: raw.listen_host,
            rules,
            toolchain: raw.toolchain,
        })
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_app_name(&cfg.app_name)?;
    validate_toolchain(cfg)?;

    let lists: [(&str, &Vec<String>); 6] = [
        ("exclude_dirs", &cfg.exclude_dirs),
        ("exclude_files", &cfg.exclude_files),
        ("exclude_exts", &cfg.exclude_exts),
        ("exclude_prefix", &cfg.exclude_prefix),
        ("include_dirs", &cfg.include_dirs),
        ("include_files", &cfg.include_files),
    ];
    for (name, list) in lists {
        if list.iter().any(|entry| entry.trim().is_empty()) {
            return Err(DevloopError::ConfigError(format!(
                "`{name}` must not contain empty entries"
            )));
        }
    }

    Ok(())
}

fn validate_app_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(DevloopError::ConfigError(
            "`app_name` must not be empty".to_string(),
        ));
    }
    if name.contains('/') || name.contains('\\') || name == "." || name == ".." {
        return Err(DevloopError::ConfigError(format!(
            "`app_name` must be a plain file name (got '{name}')"
        )));
    }
    Ok(())
}

fn validate_toolchain(cfg: &RawConfigFile) -> Result<()> {
    if cfg.toolchain.compiler.trim().is_empty() {
        return Err(DevloopError::ConfigError(
            "[toolchain].compiler must not be empty".to_string(),
        ));
    }
    if cfg.toolchain.debugger.trim().is_empty() {
        return Err(DevloopError::ConfigError(
            "[toolchain].debugger must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn ensure_disjoint(a_name: &str, a: &[String], b_name: &str, b: &[String]) -> Result<()> {
    let a_set: HashSet<&String> = a.iter().collect();
    if let Some(both) = b.iter().find(|entry| a_set.contains(entry)) {
        return Err(DevloopError::ConfigError(format!(
            "'{both}' is listed in both `{a_name}` and `{b_name}`"
        )));
    }
    Ok(())
}

/// Join `path` onto `base` (unless already absolute) and fold `.`/`..`
/// lexically. Trailing separators disappear.
pub(crate) fn normalize(base: &Path, path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };

    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
