use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Handle to a live count published by a background task.
///
/// Dropping the handle aborts the task, which closes the channel for every
/// cloned receiver.
pub struct CountSubscription {
    receiver: watch::Receiver<u64>,
    task: JoinHandle<()>,
}

impl CountSubscription {
    pub fn new(receiver: watch::Receiver<u64>, task: JoinHandle<()>) -> Self {
        Self { receiver, task }
    }

    pub fn current(&self) -> u64 {
        *self.receiver.borrow()
    }

    /// A receiver that observes the same count; it closes when this handle
    /// is dropped.
    pub fn receiver(&self) -> watch::Receiver<u64> {
        self.receiver.clone()
    }

    /// Wait for the next change. `None` once the publisher is gone.
    pub async fn changed(&mut self) -> Option<u64> {
        self.receiver.changed().await.ok()?;
        Some(*self.receiver.borrow_and_update())
    }

    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for CountSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl std::fmt::Debug for CountSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountSubscription")
            .field("current", &self.current())
            .field("active", &self.is_active())
            .finish()
    }
}
