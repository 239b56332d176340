use super::SseEvent;
use crate::client::ClientState;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Routes incoming events to the listeners of matching subscriptions
#[derive(Clone)]
pub struct MessageRouter {
    state: Arc<Mutex<ClientState>>,
}

impl MessageRouter {
    pub fn new_with_state(state: Arc<Mutex<ClientState>>) -> Self {
        Self { state }
    }

    /// Routes a decoded stream event
    pub async fn route(&self, event: SseEvent) {
        tracing::debug!("Routing event: event={}, data={}", event.event, event.data);
        let payload = event.payload();
        self.dispatch(&event.event, payload).await;
    }

    /// Invokes every listener whose key belongs to `event_type`.
    ///
    /// Listeners run outside the state lock (they may subscribe or
    /// unsubscribe) and a failing listener never stops the others.
    pub async fn dispatch(&self, event_type: &str, payload: Value) {
        let entries = self.state.lock().await.subscriptions.matching(event_type);

        for entry in entries {
            for listener in entry.listeners {
                if let Err(e) = listener.invoke(payload.clone()).await {
                    tracing::warn!(
                        "Listener {} for '{}' failed: {}",
                        listener.id(),
                        entry.key,
                        e
                    );
                }
            }
        }
    }
}
