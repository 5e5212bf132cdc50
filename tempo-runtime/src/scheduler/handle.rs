use tokio::task::JoinHandle;
use tracing::info;

/// Handle for a running driver.
/// Used to stop the tick loop; the scheduler itself is left intact.
pub struct DriverHandle {
    pub(crate) task: JoinHandle<()>,
}

impl DriverHandle {
    /// Stop the tick loop and wait for it to wind down.
    pub async fn shutdown(self) {
        self.task.abort();
        // An aborted task resolves with a cancellation error; nothing to report.
        let _ = self.task.await;
        info!("Scheduler driver stopped");
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
