use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Manages the background tasks of one connection.
///
/// Tasks receive the manager's cancellation token and are expected to stop
/// once it fires.
pub struct TaskManager {
    token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl TaskManager {
    /// Create a new empty task manager
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            handles: Vec::new(),
        }
    }

    /// Token cancelled when the tasks are asked to stop
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Spawn a task and track it
    pub fn spawn<F>(&mut self, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(future);
        self.handles.push(handle);
    }

    /// Signal all tasks to stop and wait up to `timeout` for each of them,
    /// aborting the ones still running.
    pub async fn shutdown(self, timeout: Duration) {
        self.token.cancel();
        for mut handle in self.handles {
            if tokio::time::timeout(timeout, &mut handle).await.is_err() {
                tracing::warn!("Background task did not stop within {:?}, aborting", timeout);
                handle.abort();
            }
        }
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}
