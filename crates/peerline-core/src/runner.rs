//! Task runner.
//!
//! Resolutions and transfers are network-bound, so they run as
//! independent units of work instead of blocking the submitter. Each
//! submission gets its own outcome channel: exactly one terminal outcome
//! is delivered per unit of work, and independently submitted tasks are
//! unordered with respect to each other.

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Error awaiting a submitted task's outcome
#[derive(Debug, Clone, thiserror::Error)]
pub enum RunnerError {
    /// The unit of work ended without delivering an outcome
    #[error("task ended without an outcome")]
    Abandoned,
}

/// Handle to one submitted unit of work.
///
/// Dropping the handle detaches the task: it keeps running and its
/// outcome is discarded.
#[derive(Debug)]
pub struct TaskHandle<T> {
    outcome: oneshot::Receiver<T>,
    join: JoinHandle<()>,
}

impl<T> TaskHandle<T> {
    /// Wait for the task's single terminal outcome.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Abandoned`] if the task ended without
    /// producing one (it panicked or was shut down with the runtime).
    pub async fn outcome(self) -> Result<T, RunnerError> {
        self.outcome.await.map_err(|_| RunnerError::Abandoned)
    }

    /// Abort the underlying task.
    ///
    /// In-flight network calls are abandoned, not interrupted; awaiting
    /// the outcome afterwards yields [`RunnerError::Abandoned`] unless
    /// the task already finished.
    pub fn abort(&self) {
        self.join.abort();
    }
}

/// Executes units of work independently of their submitters
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskRunner;

impl TaskRunner {
    /// Create a runner on the current tokio runtime
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Submit one unit of work.
    ///
    /// The work starts immediately; its outcome is delivered through the
    /// returned handle rather than a blocking return value.
    pub fn submit<F, T>(&self, work: F) -> TaskHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let join = tokio::spawn(async move {
            // The receiver may be gone; the work still ran to completion.
            let _ = tx.send(work.await);
        });
        TaskHandle { outcome: rx, join }
    }
}
