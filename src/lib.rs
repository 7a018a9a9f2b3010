// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod types;
pub mod watch;

use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{ConfigFile, RawConfigFile, config_root_dir, load_from_path};
use crate::engine::{RebuildReason, RebuildRequester, Runtime, RuntimeEvent};
use crate::exec::{GoToolchain, ProcessSupervisor};
use crate::watch::spawn_watcher;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and CLI overrides
/// - supervisor / runtime
/// - (optional) file watcher
/// - Ctrl-C / SIGTERM handling
pub async fn run(args: CliArgs) -> Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), "devloop starting");

    let config_path = PathBuf::from(&args.config);
    let mut raw = load_from_path(&config_path)
        .with_context(|| format!("failed to load config {config_path:?}"))?;
    apply_overrides(&mut raw, &args)?;
    let cfg = ConfigFile::resolve(raw, &config_root_dir(&config_path))?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    // Runtime event channel.
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(16);
    let requester = RebuildRequester::new(rt_tx.clone());

    let supervisor = ProcessSupervisor::new(&cfg, GoToolchain::new(&cfg.toolchain));
    let runtime = tokio::spawn(Runtime::new(rt_rx, supervisor).run());

    spawn_signal_handler(rt_tx.clone());

    info!("building");
    requester.request_and_wait(RebuildReason::Startup).await;

    let watcher = if args.no_watch {
        info!("not watching for changes (--no-watch)");
        None
    } else {
        info!(project = ?cfg.app_path, "watching files");
        Some(spawn_watcher(&cfg, rt_tx.clone()))
    };

    info!("^C to exit");
    drop(requester);
    drop(rt_tx);

    let outcome = runtime.await.context("runtime task panicked")?;

    if let Some(watcher) = watcher {
        watcher.stop().await?;
    }

    outcome?;
    Ok(())
}

/// Apply `--path`, `--binary` and `--listen` on top of the file config.
fn apply_overrides(raw: &mut RawConfigFile, args: &CliArgs) -> Result<()> {
    if let Some(path) = &args.path {
        let cwd = std::env::current_dir().context("failed to read current directory")?;
        raw.app_path = Some(cwd.join(path));
    }
    if let Some(name) = &args.binary {
        raw.app_name = name.clone();
    }
    if let Some(port) = args.listen {
        raw.listen_port = port;
    }
    Ok(())
}

/// Stop the runtime (and with it the supervised processes) on Ctrl-C or
/// SIGTERM.
fn spawn_signal_handler(tx: mpsc::Sender<RuntimeEvent>) {
    tokio::spawn(async move {
        let mut term = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                if let Err(e) = tokio::signal::ctrl_c().await {
                    eprintln!("failed to listen for Ctrl+C: {e}");
                    return;
                }
                let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
                return;
            }
        };

        tokio::select! {
            res = tokio::signal::ctrl_c() => {
                if let Err(e) = res {
                    eprintln!("failed to listen for Ctrl+C: {e}");
                    return;
                }
            }
            _ = term.recv() => {}
        }
        info!("signal received; shutting down");
        let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
    });
}

/// Simple dry-run output: print the resolved configuration.
fn print_dry_run(cfg: &ConfigFile) {
    println!("devloop dry-run");
    println!("  app_name    = {}", cfg.app_name);
    println!("  app_path    = {}", cfg.app_path.display());
    println!("  binary      = {}", cfg.binary_path().display());
    match &cfg.app_address {
        Some(addr) => println!("  app_address = {addr}"),
        None => println!("  app_address = (negotiated, preferred port {})", cfg.app_port),
    }
    println!("  build_args  = {:?}", cfg.build_args);
    println!("  listen      = {}:{}", cfg.listen_host, cfg.listen_port);
    println!(
        "  toolchain   = {} / {}",
        cfg.toolchain.compiler, cfg.toolchain.debugger
    );
    println!();

    let rules = &cfg.rules;
    let lists: [(&str, &Vec<String>); 6] = [
        ("exclude_dirs", &rules.exclude_dirs),
        ("exclude_files", &rules.exclude_files),
        ("exclude_exts", &rules.exclude_exts),
        ("exclude_prefix", &rules.exclude_prefixes),
        ("include_dirs", &rules.include_dirs),
        ("include_files", &rules.include_files),
    ];
    println!("rules:");
    for (name, entries) in lists {
        if entries.is_empty() {
            continue;
        }
        println!("  {name}:");
        for entry in entries {
            println!("    - {entry}");
        }
    }

    debug!("dry-run complete (no execution)");
}
