// src/watch/watcher.rs

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use notify::event::{EventKind, ModifyKind, RenameMode};
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::ConfigFile;
use crate::engine::{RebuildRequester, RuntimeEvent};
use crate::errors::{DevloopError, Result};
use crate::watch::classifier::WatchRuleSet;
use crate::watch::debounce::{ChangeHandler, DEFAULT_DEBOUNCE, Debouncer};
use crate::watch::walker::enumerate_directories;

/// Subscription plus the directories already registered with it.
#[derive(Default)]
struct WatchState {
    subscription: Option<RecommendedWatcher>,
    registered: HashSet<PathBuf>,
}

impl WatchState {
    fn is_watching(&self) -> bool {
        self.subscription.is_some()
    }

    /// Register `path` (or its parent, if it is a file) unless that directory
    /// is already registered.
    fn register(&mut self, path: &Path, rules: &WatchRuleSet) -> Result<()> {
        let meta = std::fs::metadata(path).map_err(|e| DevloopError::Walk {
            path: path.to_path_buf(),
            source: e,
        })?;
        let dir = if meta.is_dir() {
            path.to_path_buf()
        } else {
            path.parent().map(Path::to_path_buf).unwrap_or_default()
        };

        if self.registered.contains(&dir) {
            return Ok(());
        }
        let Some(subscription) = self.subscription.as_mut() else {
            return Ok(());
        };

        subscription
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|source| DevloopError::WatchPath {
                path: dir.clone(),
                source,
            })?;

        if rules.is_excluded(&dir.to_string_lossy()) {
            debug!(dir = ?dir, "watching directory (changes excluded by rules)");
        } else {
            debug!(dir = ?dir, "watching directory");
        }
        self.registered.insert(dir);
        Ok(())
    }

    /// Drop `path` and every registered directory below it, so a directory
    /// recreated at the same place is registered again.
    fn forget(&mut self, path: &Path) {
        let gone: Vec<PathBuf> = self
            .registered
            .iter()
            .filter(|dir| dir.starts_with(path))
            .cloned()
            .collect();

        for dir in gone {
            self.registered.remove(&dir);
            if let Some(subscription) = self.subscription.as_mut() {
                // The kernel usually dropped the watch already.
                if let Err(err) = subscription.unwatch(&dir) {
                    debug!(dir = ?dir, error = %err, "unwatch of removed directory failed");
                }
            }
            debug!(dir = ?dir, "directory left the tree");
        }
    }
}

/// Watches a set of directories and calls a [`ChangeHandler`] once per
/// debounced burst of relevant changes.
///
/// Lifecycle: [`watch`](Self::watch) opens the subscription and runs until
/// another task calls [`stop`](Self::stop). While the handler runs, incoming
/// events are dropped so the rebuild's own writes cannot retrigger it.
pub struct ChangeWatcher {
    rules: Arc<WatchRuleSet>,
    state: Arc<Mutex<WatchState>>,
    debouncer: Debouncer,
}

impl std::fmt::Debug for ChangeWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeWatcher")
            .field("is_watching", &self.is_watching())
            .field("debouncer", &self.debouncer)
            .finish_non_exhaustive()
    }
}

impl ChangeWatcher {
    pub fn new(rules: WatchRuleSet, handler: Arc<dyn ChangeHandler>) -> Self {
        Self::with_debounce(rules, handler, DEFAULT_DEBOUNCE)
    }

    pub fn with_debounce(
        rules: WatchRuleSet,
        handler: Arc<dyn ChangeHandler>,
        debounce: Duration,
    ) -> Self {
        Self {
            rules: Arc::new(rules),
            state: Arc::new(Mutex::new(WatchState::default())),
            debouncer: Debouncer::new(debounce, handler),
        }
    }

    fn lock(&self) -> MutexGuard<'_, WatchState> {
        lock_state(&self.state)
    }

    pub fn is_watching(&self) -> bool {
        self.lock().is_watching()
    }

    /// Directories currently registered with the OS subscription.
    pub fn watched_dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = self.lock().registered.iter().cloned().collect();
        dirs.sort();
        dirs
    }

    /// Open the subscription, register `initial_paths`, and process events
    /// until [`stop`](Self::stop) is called.
    ///
    /// Failing to open the subscription or to register an initial path is
    /// fatal and returned; everything after that is logged and survived.
    pub async fn watch(&self, initial_paths: Vec<PathBuf>) -> Result<()> {
        let (event_tx, event_rx) = mpsc::unbounded_channel::<Event>();
        let (error_tx, error_rx) = mpsc::unbounded_channel::<notify::Error>();

        // Called synchronously on notify's own thread.
        let subscription = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let sent = match res {
                    Ok(event) => event_tx.send(event).is_ok(),
                    Err(err) => error_tx.send(err).is_ok(),
                };
                if !sent {
                    eprintln!("devloop: file watch event dropped (event loop gone)");
                }
            },
            Config::default(),
        )?;

        {
            let mut state = self.lock();
            state.subscription = Some(subscription);
            state.registered.clear();
        }

        let event_loop = tokio::spawn(event_loop(
            event_rx,
            error_rx,
            Arc::clone(&self.rules),
            Arc::clone(&self.state),
            self.debouncer.clone(),
        ));

        for path in &initial_paths {
            let registered = self.lock().register(path, &self.rules);
            match registered {
                Ok(()) => {}
                Err(DevloopError::Walk { path, source }) => {
                    error!(path = ?path, error = %source, "cannot watch missing path");
                }
                Err(err) => {
                    self.stop();
                    let _ = event_loop.await;
                    return Err(err);
                }
            }
        }

        info!(dirs = self.lock().registered.len(), "file watcher started");

        if let Err(err) = event_loop.await {
            warn!(error = %err, "watch event loop ended abnormally");
        }
        info!("file watcher stopped");
        Ok(())
    }

    /// Close the subscription; the running [`watch`](Self::watch) call
    /// returns once the event loop drains. Idempotent.
    pub fn stop(&self) {
        let subscription = self.lock().subscription.take();
        if let Some(subscription) = subscription {
            // Dropping the watcher drops the channel senders inside its
            // callback, which closes both channels.
            drop(subscription);
            self.debouncer.cancel();
            debug!("file watch subscription closed");
        }
    }
}

fn lock_state(state: &Mutex<WatchState>) -> MutexGuard<'_, WatchState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn event_loop(
    mut event_rx: mpsc::UnboundedReceiver<Event>,
    mut error_rx: mpsc::UnboundedReceiver<notify::Error>,
    rules: Arc<WatchRuleSet>,
    state: Arc<Mutex<WatchState>>,
    debouncer: Debouncer,
) {
    loop {
        tokio::select! {
            err = error_rx.recv() => match err {
                Some(err) => error!(error = %err, "file watch error"),
                None => break,
            },
            event = event_rx.recv() => match event {
                Some(event) => handle_event(event, &rules, &state, &debouncer).await,
                None => break,
            },
        }
    }
    debug!("watch event loop finished");
}

async fn handle_event(
    event: Event,
    rules: &Arc<WatchRuleSet>,
    state: &Arc<Mutex<WatchState>>,
    debouncer: &Debouncer,
) {
    if matches!(event.kind, EventKind::Access(_)) {
        return;
    }

    // The registered set follows the tree even while paused.
    let (gone, appeared) = tree_change(&event);
    if !gone.is_empty() {
        let mut state = lock_state(state);
        for path in gone {
            state.forget(path);
        }
    }
    for path in appeared {
        watch_new_tree(path.clone(), Arc::clone(rules), Arc::clone(state)).await;
    }

    if debouncer.is_paused() {
        return;
    }
    let accepted = event
        .paths
        .iter()
        .any(|path| !rules.is_excluded(&path.to_string_lossy()));

    if accepted {
        debug!(kind = ?event.kind, paths = ?event.paths, "change accepted");
        debouncer.trigger();
    }
}

const NO_PATHS: &[PathBuf] = &[];

/// Split an event into the paths that left the tree and the paths that
/// entered it (created, or moved in from elsewhere).
fn tree_change(event: &Event) -> (&[PathBuf], &[PathBuf]) {
    let paths = event.paths.as_slice();
    match event.kind {
        EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            (paths, NO_PATHS)
        }
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            (NO_PATHS, paths)
        }
        // `[from, to]`
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            paths.split_at(paths.len().min(1))
        }
        _ => (NO_PATHS, NO_PATHS),
    }
}

/// Register a directory that appeared during the watch, plus its subtree.
///
/// The walk and the OS registration run on the blocking pool.
async fn watch_new_tree(
    path: PathBuf,
    rules: Arc<WatchRuleSet>,
    state: Arc<Mutex<WatchState>>,
) {
    let hidden = path
        .file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with('.'));
    if hidden {
        return;
    }

    let registration = tokio::task::spawn_blocking(move || {
        if !path.is_dir() {
            return;
        }
        let dirs = match enumerate_directories(&path) {
            Ok(dirs) => dirs,
            Err(err) => {
                warn!(dir = ?path, error = %err, "failed to walk new directory");
                return;
            }
        };

        let mut state = lock_state(&state);
        for dir in dirs {
            if let Err(err) = state.register(&dir, &rules) {
                warn!(dir = ?dir, error = %err, "failed to watch new directory");
            }
        }
    })
    .await;

    if let Err(err) = registration {
        warn!(error = %err, "new directory registration did not finish");
    }
}

/// A watch running in its own task, started by [`spawn_watcher`].
#[derive(Debug)]
pub struct WatcherHandle {
    watcher: Arc<ChangeWatcher>,
    task: JoinHandle<Result<()>>,
}

impl WatcherHandle {
    /// Stop watching and report how the watch ended.
    pub async fn stop(self) -> Result<()> {
        self.watcher.stop();
        self.task.await.map_err(anyhow::Error::from)?
    }
}

/// Watch the project described by `cfg`, requesting rebuilds over `tx`.
///
/// If the watch cannot start (the project tree cannot be walked, or the
/// subscription cannot be opened) the runtime is asked to shut down and the
/// error is returned from [`WatcherHandle::stop`].
pub fn spawn_watcher(cfg: &ConfigFile, tx: mpsc::Sender<RuntimeEvent>) -> WatcherHandle {
    let watcher = Arc::new(ChangeWatcher::new(
        cfg.rules.clone(),
        Arc::new(RebuildRequester::new(tx.clone())),
    ));

    let task = {
        let watcher = Arc::clone(&watcher);
        let cfg = cfg.clone();
        tokio::spawn(async move {
            let result = match initial_watch_paths(&cfg) {
                Ok(paths) => watcher.watch(paths).await,
                Err(err) => Err(err),
            };
            if let Err(err) = &result {
                error!(error = %err, "file watcher failed; shutting down");
                let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
            }
            result
        })
    };

    WatcherHandle { watcher, task }
}

/// Initial watch set: the project tree, every include dir tree, and every
/// literal include file.
///
/// An unreadable project root is an error; an unreadable include dir is
/// logged and skipped.
pub fn initial_watch_paths(cfg: &ConfigFile) -> Result<Vec<PathBuf>> {
    let mut paths = enumerate_directories(&cfg.app_path)?;

    for dir in &cfg.rules.include_dirs {
        match enumerate_directories(Path::new(dir)) {
            Ok(dirs) => paths.extend(dirs),
            Err(err) => error!(dir = %dir, error = %err, "failed to walk include dir"),
        }
    }

    paths.extend(cfg.rules.include_files.iter().map(PathBuf::from));
    Ok(paths)
}
