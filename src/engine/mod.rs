// src/engine/mod.rs

//! Orchestration engine for devloop.
//!
//! The runtime owns the supervisor and reacts to:
//! - rebuild requests (startup, debounced file changes)
//! - shutdown signals
//!
//! Rebuild requests carry a completion sender, so whoever asked can wait
//! until the cycle is over.

use tokio::sync::oneshot;

pub mod requester;
pub mod runtime;

pub use requester::RebuildRequester;
pub use runtime::Runtime;

/// Why a rebuild was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildReason {
    /// First cycle at startup.
    Startup,
    /// A debounced burst of file changes.
    FileChange,
}

/// Events flowing into the runtime.
#[derive(Debug)]
pub enum RuntimeEvent {
    RebuildRequested {
        reason: RebuildReason,
        /// Signalled once the cycle has finished (successfully or not).
        done: Option<oneshot::Sender<()>>,
    },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}
