// src/watch/debounce.rs

//! Trailing-edge debounce with a pause window around the handler.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Delay between the last accepted change and the handler firing.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Observer notified once per coalesced burst of changes.
///
/// The returned future is awaited on the timer task; while it runs the
/// watcher is paused and drops incoming events. Any
/// `Fn() -> impl Future<Output = ()>` closure implements this trait.
pub trait ChangeHandler: Send + Sync + 'static {
    fn on_change(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

impl<F, Fut> ChangeHandler for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn on_change(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(self())
    }
}

/// Pause flag plus the single pending timer, guarded together.
#[derive(Debug, Default)]
struct DebounceState {
    paused: bool,
    /// Bumped on every re-arm; a timer only fires if it is still current.
    generation: u64,
    pending: Option<JoinHandle<()>>,
}

struct Shared {
    delay: Duration,
    handler: Arc<dyn ChangeHandler>,
    state: Mutex<DebounceState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, DebounceState> {
        // A poisoned lock only means a handler panicked; the state is
        // still a pair of plain values.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn fire(self: Arc<Self>, generation: u64) {
        {
            let mut state = self.lock();
            if state.generation != generation {
                return;
            }
            state.pending = None;
            if state.paused {
                return;
            }
            state.paused = true;
        }

        let _resume = ResumeOnDrop(Arc::clone(&self));
        debug!("debounce window elapsed; running change handler");
        self.handler.on_change().await;
    }
}

/// Clears the pause flag when the handler finishes, panics or is dropped.
struct ResumeOnDrop(Arc<Shared>);

impl Drop for ResumeOnDrop {
    fn drop(&mut self) {
        self.0.lock().paused = false;
    }
}

/// Collapses bursts of [`trigger`](Debouncer::trigger) calls into one
/// handler invocation `delay` after the last call.
///
/// Cloning yields another handle to the same timer.
#[derive(Clone)]
pub struct Debouncer {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Debouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("delay", &self.shared.delay)
            .field("paused", &self.is_paused())
            .finish_non_exhaustive()
    }
}

impl Debouncer {
    pub fn new(delay: Duration, handler: Arc<dyn ChangeHandler>) -> Self {
        Self {
            shared: Arc::new(Shared {
                delay,
                handler,
                state: Mutex::new(DebounceState::default()),
            }),
        }
    }

    /// True while the handler is running.
    pub fn is_paused(&self) -> bool {
        self.shared.lock().paused
    }

    /// (Re)arm the timer. Returns false, arming nothing, while paused.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn trigger(&self) -> bool {
        let mut state = self.shared.lock();
        if state.paused {
            return false;
        }

        state.generation = state.generation.wrapping_add(1);
        if let Some(previous) = state.pending.take() {
            previous.abort();
        }

        let shared = Arc::clone(&self.shared);
        let generation = state.generation;
        state.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(shared.delay).await;
            shared.fire(generation).await;
        }));
        true
    }

    /// Drop a pending (not yet fired) timer. A running handler is unaffected.
    pub fn cancel(&self) {
        let mut state = self.shared.lock();
        state.generation = state.generation.wrapping_add(1);
        if let Some(pending) = state.pending.take() {
            pending.abort();
            warn!("pending rebuild discarded");
        }
    }
}
