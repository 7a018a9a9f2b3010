// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module is responsible for:
//! - Classifying changed paths against the include/exclude rules.
//! - Enumerating the directories to register with the OS (`notify`).
//! - Debouncing bursts of changes into a single rebuild signal.
//!
//! It does **not** know how a rebuild happens; it only calls the registered
//! [`ChangeHandler`].

pub mod classifier;
pub mod debounce;
pub mod walker;
pub mod watcher;

pub use classifier::WatchRuleSet;
pub use debounce::{ChangeHandler, DEFAULT_DEBOUNCE, Debouncer};
pub use walker::enumerate_directories;
pub use watcher::{ChangeWatcher, WatcherHandle, initial_watch_paths, spawn_watcher};
