use crate::infrastructure::TaskManager;
use crate::types::Result;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        };
        f.write_str(name)
    }
}

/// Caller parked until the current connection attempt settles
pub type ConnectWaiter = oneshot::Sender<Result<()>>;

/// Everything detached from the state by a teardown, cleaned up once the
/// state lock has been released.
pub struct DetachedConnection {
    /// Keys to report to the disconnect hook (only set when a client id was)
    pub hook_keys: Option<Vec<String>>,
    /// Cancel key of the in-flight subscription submission
    pub cancel_key: Option<String>,
    /// Reader task of the torn-down connection
    pub tasks: TaskManager,
    /// Waiters to release (full disconnect only)
    pub waiters: Vec<ConnectWaiter>,
    /// Scheduled retry to abort (full disconnect only)
    pub reconnect_task: Option<JoinHandle<()>>,
}
