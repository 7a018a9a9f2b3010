// src/engine/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::errors::Result;
use crate::exec::{CycleOutcome, Supervisor};

use super::{RebuildReason, RuntimeEvent};

/// Serializes rebuild requests onto a single [`Supervisor`].
///
/// The runtime is the only owner of the supervisor, so at most one cycle is
/// in flight and processes are never touched concurrently.
pub struct Runtime<S: Supervisor> {
    event_rx: mpsc::Receiver<RuntimeEvent>,
    supervisor: S,
    cycles: u64,
}

impl<S: Supervisor> fmt::Debug for Runtime<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("cycles", &self.cycles)
            .finish_non_exhaustive()
    }
}

impl<S: Supervisor> Runtime<S> {
    pub fn new(event_rx: mpsc::Receiver<RuntimeEvent>, supervisor: S) -> Self {
        Self {
            event_rx,
            supervisor,
            cycles: 0,
        }
    }

    /// Main event loop.
    ///
    /// Runs until shutdown is requested, every sender is dropped, or a cycle
    /// fails fatally. The supervised processes are stopped in all three cases.
    pub async fn run(mut self) -> Result<()> {
        info!("devloop runtime started");

        let result = loop {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    info!("runtime event channel closed; exiting");
                    break Ok(());
                }
            };

            debug!(?event, "runtime received event");

            match event {
                RuntimeEvent::RebuildRequested { reason, done } => {
                    let outcome = self.rebuild(reason).await;
                    if let Some(done) = done {
                        // The requester may have given up waiting.
                        let _ = done.send(());
                    }
                    if let Err(err) = outcome {
                        error!(error = %err, "fatal error during rebuild");
                        break Err(err);
                    }
                }
                RuntimeEvent::ShutdownRequested => {
                    info!("shutdown requested, stopping runtime");
                    break Ok(());
                }
            }
        };

        self.supervisor.shutdown().await;
        info!(cycles = self.cycles, "runtime exiting");
        result
    }

    async fn rebuild(&mut self, reason: RebuildReason) -> Result<()> {
        self.cycles += 1;
        info!(cycle = self.cycles, ?reason, "rebuilding");

        match self.supervisor.rebuild_and_restart().await? {
            CycleOutcome::Running {
                app_pid,
                debugger_pid,
            } => info!(app_pid, debugger_pid, "app and debugger running"),
            CycleOutcome::BuildFailed => warn!("build failed; waiting for the next change"),
            CycleOutcome::AppStartFailed => warn!("program did not start; waiting for the next change"),
            CycleOutcome::DebuggerStartFailed { app_pid } => {
                warn!(app_pid, "program running without a debugger")
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::{Arc, Mutex};

    use tokio::sync::oneshot;

    use crate::errors::DevloopError;
    use crate::exec::ProcessIds;

    #[derive(Default)]
    struct Calls {
        rebuilds: usize,
        shutdowns: usize,
    }

    struct ScriptedSupervisor {
        calls: Arc<Mutex<Calls>>,
        fail_on: Option<usize>,
    }

    impl Supervisor for ScriptedSupervisor {
        fn rebuild_and_restart(
            &mut self,
        ) -> Pin<Box<dyn Future<Output = Result<CycleOutcome>> + Send + '_>> {
            Box::pin(async move {
                let n = {
                    let mut calls = self.calls.lock().unwrap();
                    calls.rebuilds += 1;
                    calls.rebuilds
                };
                if self.fail_on == Some(n) {
                    return Err(DevloopError::PortExhaustion {
                        preferred: 8080,
                        source: std::io::Error::other("no ports"),
                    });
                }
                Ok(CycleOutcome::BuildFailed)
            })
        }

        fn shutdown(&mut self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
            Box::pin(async move {
                self.calls.lock().unwrap().shutdowns += 1;
            })
        }

        fn process_ids(&mut self) -> ProcessIds {
            ProcessIds::default()
        }
    }

    #[tokio::test]
    async fn completes_requests_then_shuts_down() -> Result<()> {
        let calls = Arc::new(Mutex::new(Calls::default()));
        let (tx, rx) = mpsc::channel(8);
        let runtime = Runtime::new(
            rx,
            ScriptedSupervisor {
                calls: Arc::clone(&calls),
                fail_on: None,
            },
        );
        let handle = tokio::spawn(runtime.run());

        let (done_tx, done_rx) = oneshot::channel();
        tx.send(RuntimeEvent::RebuildRequested {
            reason: RebuildReason::Startup,
            done: Some(done_tx),
        })
        .await
        .unwrap();
        done_rx.await.unwrap();
        assert_eq!(calls.lock().unwrap().rebuilds, 1);

        tx.send(RuntimeEvent::ShutdownRequested).await.unwrap();
        handle.await.unwrap()?;

        let calls = calls.lock().unwrap();
        assert_eq!(calls.rebuilds, 1);
        assert_eq!(calls.shutdowns, 1);
        Ok(())
    }

    #[tokio::test]
    async fn port_exhaustion_is_fatal() {
        let calls = Arc::new(Mutex::new(Calls::default()));
        let (tx, rx) = mpsc::channel(8);
        let runtime = Runtime::new(
            rx,
            ScriptedSupervisor {
                calls: Arc::clone(&calls),
                fail_on: Some(2),
            },
        );

        for _ in 0..3 {
            tx.send(RuntimeEvent::RebuildRequested {
                reason: RebuildReason::FileChange,
                done: None,
            })
            .await
            .unwrap();
        }

        let err = runtime.run().await.unwrap_err();
        assert!(matches!(err, DevloopError::PortExhaustion { .. }));

        let calls = calls.lock().unwrap();
        assert_eq!(calls.rebuilds, 2);
        assert_eq!(calls.shutdowns, 1);
    }
}
