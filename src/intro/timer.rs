//! Cancellable timers.
//!
//! Each scheduled callback runs on its own tokio task. A `TimerSet` owns the
//! handles for one phase; cancelling it (or dropping it) aborts every timer
//! that has not fired yet.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

/// The timers registered by one owner.
#[derive(Debug, Default)]
pub struct TimerSet {
    handles: Vec<JoinHandle<()>>,
}

impl TimerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` once `delay` has elapsed.
    pub fn schedule<F>(&mut self, delay: Duration, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.schedule_at(Instant::now() + delay, f);
    }

    /// Run `f` at `deadline`.
    pub fn schedule_at<F>(&mut self, deadline: Instant, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            f();
        });
    }

    /// Track an arbitrary timed task (e.g. a reveal loop).
    pub fn spawn<Fut>(&mut self, fut: Fut)
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.handles.retain(|h| !h.is_finished());
        self.handles.push(tokio::spawn(fut));
    }

    /// Number of timers that have not fired or been cancelled.
    pub fn pending(&self) -> usize {
        self.handles.iter().filter(|h| !h.is_finished()).count()
    }

    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }

    /// Abort every outstanding timer.
    pub fn cancel_all(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }

    /// Take over another set's timers.
    pub fn absorb(&mut self, mut other: TimerSet) {
        self.handles.append(&mut other.handles);
    }
}

impl Drop for TimerSet {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
