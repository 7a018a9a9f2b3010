// tests/config_loading.rs

mod common;
use crate::common::{init_tracing, write_file};

use std::error::Error;

use devloop::config::{load_and_validate, load_from_path};
use devloop::config::model::{DEFAULT_APP_NAME, DEFAULT_APP_PORT, DEFAULT_LISTEN_PORT};
use devloop::errors::DevloopError;
use devloop::types::ListenAddress;
use devloop_test_utils::builders::ConfigFileBuilder;

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn missing_file_yields_defaults() -> TestResult {
    init_tracing();
    let tmp = tempfile::tempdir()?;

    let raw = load_from_path(tmp.path().join("devloop.toml"))?;
    assert_eq!(raw.app_name, DEFAULT_APP_NAME);
    assert_eq!(raw.app_port, DEFAULT_APP_PORT);
    assert_eq!(raw.listen_port, DEFAULT_LISTEN_PORT);
    assert_eq!(raw.build_args, vec!["-gcflags=all=-N -l".to_string()]);
    assert_eq!(raw.toolchain.compiler, "go");
    assert_eq!(raw.toolchain.debugger, "dlv");
    Ok(())
}

#[test]
fn full_file_is_resolved_against_its_directory() -> TestResult {
    init_tracing();
    let tmp = tempfile::tempdir()?;
    let root = tmp.path().canonicalize()?;
    std::fs::create_dir_all(root.join("app/vendor/mymodule"))?;

    let config_path = root.join("devloop.toml");
    write_file(
        &config_path,
        r#"
app_name = "server"
app_path = "app"
app_address = "127.0.0.1:9000"
build_args = ["-race"]
listen_port = 2345

exclude_dirs = ["vendor"]
include_dirs = ["vendor/mymodule"]
exclude_files = ["notes.txt"]
exclude_exts = ["_test.go"]
exclude_prefix = ["tmp_"]
include_files = ["../shared/version.go"]

[toolchain]
compiler = "/usr/local/go/bin/go"
debugger = "dlv"
"#,
    );

    let cfg = load_and_validate(&config_path)?;
    let app = root.join("app");
    let at = |p: &str| app.join(p).to_string_lossy().into_owned();

    assert_eq!(cfg.app_path, app);
    assert_eq!(cfg.app_name, "server");
    assert_eq!(cfg.app_address, Some(ListenAddress::new("127.0.0.1", 9000)));
    assert_eq!(cfg.build_args, vec!["-race".to_string()]);
    assert_eq!(cfg.listen_port, 2345);
    assert_eq!(cfg.toolchain.compiler, "/usr/local/go/bin/go");

    assert_eq!(cfg.rules.exclude_dirs, vec![at("vendor")]);
    assert_eq!(cfg.rules.include_dirs, vec![at("vendor/mymodule")]);
    assert_eq!(cfg.rules.exclude_files, vec![at("notes.txt"), at("server")]);
    assert_eq!(
        cfg.rules.include_files,
        vec![root.join("shared/version.go").to_string_lossy().into_owned()]
    );
    assert_eq!(cfg.rules.exclude_exts, vec!["_test.go".to_string()]);
    assert_eq!(cfg.rules.exclude_prefixes, vec!["tmp_".to_string()]);

    // The vendor scenario, end to end from the file.
    assert!(!cfg.rules.is_excluded(&at("vendor/mymodule/x.go")));
    assert!(cfg.rules.is_excluded(&at("vendor/other/x.go")));
    assert!(cfg.rules.is_excluded(&at("server")));
    assert!(cfg.rules.is_excluded(&at("handler_test.go")));
    Ok(())
}

#[test]
fn unknown_keys_are_rejected() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let config_path = tmp.path().join("devloop.toml");
    write_file(&config_path, "app_nmae = \"typo\"\n");

    let err = load_and_validate(&config_path).unwrap_err();
    assert!(matches!(err, DevloopError::TomlError(_)), "got {err:?}");
    Ok(())
}

#[test]
fn invalid_address_is_a_config_error() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let config_path = tmp.path().join("devloop.toml");
    write_file(&config_path, "app_address = \"localhost\"\n");

    let err = load_and_validate(&config_path).unwrap_err();
    assert!(matches!(err, DevloopError::ConfigError(_)), "got {err:?}");
    Ok(())
}

#[test]
fn builder_matches_file_semantics() -> TestResult {
    let tmp = tempfile::tempdir()?;
    let root = tmp.path().canonicalize()?;

    let cfg = ConfigFileBuilder::new(&root)
        .app_name("api")
        .exclude_dir("vendor")
        .include_dir("vendor/mymodule")
        .build();

    assert_eq!(cfg.binary_path(), root.join("api"));
    assert!(
        cfg.rules
            .exclude_files
            .contains(&root.join("api").to_string_lossy().into_owned())
    );
    Ok(())
}
