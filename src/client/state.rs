use super::connection::{ConnectWaiter, ConnectionState, DetachedConnection};
use crate::infrastructure::TaskManager;
use crate::subscription::SubscriptionRegistry;
use crate::types::subscriptions_cancel_key;
use tokio::task::JoinHandle;

/// Consolidated mutable state for RealtimeClient
/// Every field sits behind the same lock so registry changes and connection
/// transitions cannot interleave
pub struct ClientState {
    /// Current connection state
    pub connection: ConnectionState,

    /// Server-assigned id of the current connection (empty unless connected)
    pub client_id: String,

    /// Failed attempts since the last successful connect
    pub reconnect_attempts: u32,

    /// Bumped on every teardown; results of older attempts are discarded
    pub generation: u64,

    /// Subscription key → listeners
    pub subscriptions: SubscriptionRegistry,

    /// Keys included in the last submission
    pub last_sent_subscriptions: Vec<String>,

    /// Callers waiting for the current connection attempt
    pub pending_connects: Vec<ConnectWaiter>,

    /// Reader task of the current connection
    pub task_manager: TaskManager,

    /// Retry scheduled after a failure
    pub reconnect_task: Option<JoinHandle<()>>,
}

impl ClientState {
    pub fn new() -> Self {
        Self {
            connection: ConnectionState::Disconnected,
            client_id: String::new(),
            reconnect_attempts: 0,
            generation: 0,
            subscriptions: SubscriptionRegistry::new(),
            last_sent_subscriptions: Vec::new(),
            pending_connects: Vec::new(),
            task_manager: TaskManager::new(),
            reconnect_task: None,
        }
    }

    /// Connected, with a client id, and outside the handshake grace window
    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionState::Connected
            && !self.client_id.is_empty()
            && self.pending_connects.is_empty()
    }

    /// Whether the registry holds keys the server has not been told about
    pub fn has_unsent_subscriptions(&self) -> bool {
        let keys = self.subscriptions.keys();
        keys.len() != self.last_sent_subscriptions.len()
            || keys
                .iter()
                .any(|key| !self.last_sent_subscriptions.contains(key))
    }

    /// Moves to `Disconnected` and hands back what must be cleaned up.
    ///
    /// A full teardown (`from_reconnect == false`) also resets the retry
    /// counter and releases the waiters.
    pub fn detach(&mut self, from_reconnect: bool) -> DetachedConnection {
        let (hook_keys, cancel_key) = if self.client_id.is_empty() {
            (None, None)
        } else {
            (
                Some(self.subscriptions.keys()),
                Some(subscriptions_cancel_key(&self.client_id)),
            )
        };

        let tasks = std::mem::take(&mut self.task_manager);
        self.client_id.clear();
        self.connection = ConnectionState::Disconnected;
        self.generation += 1;

        let (waiters, reconnect_task) = if from_reconnect {
            (Vec::new(), None)
        } else {
            self.reconnect_attempts = 0;
            (
                std::mem::take(&mut self.pending_connects),
                self.reconnect_task.take(),
            )
        };

        DetachedConnection {
            hook_keys,
            cancel_key,
            tasks,
            waiters,
            reconnect_task,
        }
    }
}

impl Default for ClientState {
    fn default() -> Self {
        Self::new()
    }
}
