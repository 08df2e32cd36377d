//! Trailing-edge debounce backed by a replaceable tokio task

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Delivers only the last value scheduled within `delay` of quiescence.
///
/// Each [`schedule`](Debouncer::schedule) aborts the pending timer task and spawns a
/// new one, so at most one timer is live at a time. Fired values queue on a channel
/// until the owner drains them. Dropping the debouncer aborts the pending timer.
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<JoinHandle<()>>,
    tx: mpsc::UnboundedSender<T>,
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            delay,
            pending: None,
            tx,
            rx,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Replace any pending value with `value`, restarting the timer.
    ///
    /// Outside a tokio runtime there is nothing to run the timer on, so the value
    /// is queued immediately.
    pub fn schedule(&mut self, value: T) {
        self.abort_pending();

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let tx = self.tx.clone();
                let delay = self.delay;
                self.pending = Some(runtime.spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = tx.send(value);
                }));
            }
            Err(_) => {
                tracing::debug!("no async runtime, committing debounced value immediately");
                let _ = self.tx.send(value);
            }
        }
    }

    /// Whether a timer is still counting down
    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Drop the pending timer and any fired but undrained values
    pub fn cancel(&mut self) {
        self.abort_pending();
        while self.rx.try_recv().is_ok() {}
    }

    /// Take the most recent fired value, discarding older ones
    pub fn take_latest(&mut self) -> Option<T> {
        let mut latest = None;
        while let Ok(value) = self.rx.try_recv() {
            latest = Some(value);
        }
        latest
    }

    /// Wait for the pending timer to fire and return its value.
    ///
    /// Returns `None` straight away when nothing is queued or pending.
    pub async fn next(&mut self) -> Option<T> {
        if let Some(value) = self.take_latest() {
            return Some(value);
        }
        let handle = self.pending.take()?;
        let _ = handle.await;
        self.take_latest()
    }

    fn abort_pending(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl<T> std::fmt::Debug for Debouncer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("delay", &self.delay)
            .field("pending", &self.pending.is_some())
            .finish()
    }
}
