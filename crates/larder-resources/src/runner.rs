//! Single-shot cancelable units of backend work.
//!
//! A runner wraps one backend future (a load, a locate or a catalog scan)
//! in a shared, abortable future. Every caller asking for the same work
//! awaits the same runner; the settle step attached at construction runs
//! exactly once, when the backend future finishes.

use std::cell::Cell;
use std::rc::Rc;

use futures::future::{AbortHandle, Abortable, Aborted, FutureExt, LocalBoxFuture, Shared};
use tokio_util::sync::CancellationToken;

use crate::error::{ResourceError, ResourceResult};

/// Future type returned by backends.
pub type RunFuture<T> = LocalBoxFuture<'static, ResourceResult<T>>;

/// Lifecycle of a runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RunnerState {
    /// The backend work has not finished yet.
    Pending,
    /// The backend work finished, successfully or not.
    Done,
    /// The runner was canceled before the work finished.
    Canceled,
}

pub(crate) struct Runner<O: Clone + 'static> {
    id: u64,
    path: String,
    state: Rc<Cell<RunnerState>>,
    waiters: Rc<Cell<usize>>,
    abort: AbortHandle,
    outcome: Shared<LocalBoxFuture<'static, ResourceResult<O>>>,
}

impl<O: Clone + 'static> Clone for Runner<O> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            path: self.path.clone(),
            state: Rc::clone(&self.state),
            waiters: Rc::clone(&self.waiters),
            abort: self.abort.clone(),
            outcome: self.outcome.clone(),
        }
    }
}

impl<O: Clone + 'static> Runner<O> {
    /// Wrap `work` in a runner. `settle` receives the backend outcome once
    /// and maps it; its return value is what every awaiter observes.
    ///
    /// Nothing runs until the first call to [`Runner::wait`] polls it.
    pub(crate) fn start<I, S>(id: u64, path: impl Into<String>, work: RunFuture<I>, settle: S) -> Self
    where
        I: 'static,
        S: FnOnce(ResourceResult<I>) -> ResourceResult<O> + 'static,
    {
        let path = path.into();
        let (abort, registration) = AbortHandle::new_pair();
        let state = Rc::new(Cell::new(RunnerState::Pending));

        let task_state = Rc::clone(&state);
        let task_path = path.clone();
        let outcome = async move {
            let result = match Abortable::new(work, registration).await {
                Ok(result) => {
                    task_state.set(RunnerState::Done);
                    result
                }
                Err(Aborted) => {
                    task_state.set(RunnerState::Canceled);
                    Err(ResourceError::Canceled { path: task_path })
                }
            };
            settle(result)
        }
        .boxed_local()
        .shared();

        Self {
            id,
            path,
            state,
            waiters: Rc::new(Cell::new(0)),
            abort,
            outcome,
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn state(&self) -> RunnerState {
        self.state.get()
    }

    #[cfg(test)]
    pub(crate) fn waiters(&self) -> usize {
        self.waiters.get()
    }

    /// Abort the backend work. Current awaiters resolve with
    /// [`ResourceError::Canceled`].
    pub(crate) fn cancel(&self) {
        if self.state.get() == RunnerState::Pending {
            tracing::debug!("Canceling runner #{} for '{}'", self.id, self.path);
            self.state.set(RunnerState::Canceled);
            self.abort.abort();
        }
    }

    /// Await the runner's outcome.
    ///
    /// When `cancel` fires, this caller stops waiting and gets
    /// [`ResourceError::Canceled`]. The runner itself keeps going for the
    /// other awaiters; only when the last awaiter leaves a pending runner is
    /// it canceled, and `abandon` is called so the owner can drop it.
    pub(crate) async fn wait<F>(self, cancel: &CancellationToken, abandon: F) -> ResourceResult<O>
    where
        F: FnOnce() + 'static,
    {
        self.waiters.set(self.waiters.get() + 1);
        let guard = WaiterGuard {
            runner: &self,
            abandon: Some(Box::new(abandon)),
        };

        let canceled = async {
            cancel.cancelled().await;
            Err(ResourceError::Canceled {
                path: self.path.clone(),
            })
        };
        let result = futures_lite::future::or(self.outcome.clone(), canceled).await;

        drop(guard);
        result
    }
}

struct WaiterGuard<'a, O: Clone + 'static> {
    runner: &'a Runner<O>,
    abandon: Option<Box<dyn FnOnce()>>,
}

impl<O: Clone + 'static> Drop for WaiterGuard<'_, O> {
    fn drop(&mut self) {
        let remaining = self.runner.waiters.get().saturating_sub(1);
        self.runner.waiters.set(remaining);

        if remaining == 0 && self.runner.state() == RunnerState::Pending {
            self.runner.cancel();
            if let Some(abandon) = self.abandon.take() {
                abandon();
            }
        }
    }
}
