use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use devloop::errors::Result;
use devloop::exec::{CycleOutcome, ProcessIds, Supervisor};

/// What a [`FakeSupervisor`] was asked to do.
#[derive(Debug, Default)]
pub struct SupervisorLog {
    pub rebuilds: usize,
    pub shutdowns: usize,
    /// Set while a fake rebuild is in progress.
    pub in_flight: bool,
    /// Highest number of rebuilds observed running at the same time.
    pub max_concurrent: usize,
}

/// A fake supervisor that:
/// - records rebuild / shutdown calls
/// - returns scripted outcomes (then `Running` forever)
/// - optionally takes a while per rebuild, to exercise the watcher's pause
pub struct FakeSupervisor {
    log: Arc<Mutex<SupervisorLog>>,
    outcomes: VecDeque<Result<CycleOutcome>>,
    rebuild_time: Duration,
    running: ProcessIds,
}

impl FakeSupervisor {
    pub fn new(log: Arc<Mutex<SupervisorLog>>) -> Self {
        Self {
            log,
            outcomes: VecDeque::new(),
            rebuild_time: Duration::ZERO,
            running: ProcessIds::default(),
        }
    }

    pub fn with_outcome(mut self, outcome: Result<CycleOutcome>) -> Self {
        self.outcomes.push_back(outcome);
        self
    }

    pub fn with_rebuild_time(mut self, rebuild_time: Duration) -> Self {
        self.rebuild_time = rebuild_time;
        self
    }
}

impl Supervisor for FakeSupervisor {
    fn rebuild_and_restart(
        &mut self,
    ) -> Pin<Box<dyn Future<Output = Result<CycleOutcome>> + Send + '_>> {
        Box::pin(async move {
            let n = {
                let mut log = self.log.lock().unwrap();
                log.rebuilds += 1;
                let concurrent = if log.in_flight { 2 } else { 1 };
                log.max_concurrent = log.max_concurrent.max(concurrent);
                log.in_flight = true;
                log.rebuilds as u32
            };

            if !self.rebuild_time.is_zero() {
                tokio::time::sleep(self.rebuild_time).await;
            }

            let outcome = self.outcomes.pop_front().unwrap_or(Ok(CycleOutcome::Running {
                app_pid: 1000 + n,
                debugger_pid: 2000 + n,
            }));
            self.running = match &outcome {
                Ok(CycleOutcome::Running {
                    app_pid,
                    debugger_pid,
                }) => ProcessIds {
                    app: Some(*app_pid),
                    debugger: Some(*debugger_pid),
                },
                Ok(CycleOutcome::DebuggerStartFailed { app_pid }) => ProcessIds {
                    app: Some(*app_pid),
                    debugger: None,
                },
                _ => ProcessIds::default(),
            };

            self.log.lock().unwrap().in_flight = false;
            outcome
        })
    }

    fn shutdown(&mut self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            self.running = ProcessIds::default();
            self.log.lock().unwrap().shutdowns += 1;
        })
    }

    fn process_ids(&mut self) -> ProcessIds {
        self.running
    }
}
