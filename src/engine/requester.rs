// src/engine/requester.rs

use std::future::Future;
use std::pin::Pin;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::engine::{RebuildReason, RuntimeEvent};
use crate::watch::ChangeHandler;

/// Cloneable handle that asks the runtime for a rebuild.
///
/// As a [`ChangeHandler`] it waits for the cycle to finish, which keeps the
/// watcher paused for the whole rebuild.
#[derive(Debug, Clone)]
pub struct RebuildRequester {
    tx: mpsc::Sender<RuntimeEvent>,
}

impl RebuildRequester {
    pub fn new(tx: mpsc::Sender<RuntimeEvent>) -> Self {
        Self { tx }
    }

    /// Queue a rebuild without waiting for it. Returns false if the runtime
    /// is gone.
    pub async fn request(&self, reason: RebuildReason) -> bool {
        self.tx
            .send(RuntimeEvent::RebuildRequested { reason, done: None })
            .await
            .is_ok()
    }

    /// Queue a rebuild and wait until the runtime has finished it.
    ///
    /// Returns false if the runtime went away before completing the cycle.
    pub async fn request_and_wait(&self, reason: RebuildReason) -> bool {
        let (done_tx, done_rx) = oneshot::channel();
        let event = RuntimeEvent::RebuildRequested {
            reason,
            done: Some(done_tx),
        };
        if self.tx.send(event).await.is_err() {
            warn!("runtime stopped; rebuild request dropped");
            return false;
        }
        done_rx.await.is_ok()
    }
}

impl ChangeHandler for RebuildRequester {
    fn on_change(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            if !self.request_and_wait(RebuildReason::FileChange).await {
                debug!("rebuild did not complete");
            }
        })
    }
}
