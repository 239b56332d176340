use tokio::sync::watch;

/// Source of the `Authorization` value attached to realtime requests.
pub trait TokenProvider: Send + Sync {
    /// Current token, `None` when unauthenticated.
    fn token(&self) -> Option<String>;
}

/// A token that never changes.
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

impl TokenProvider for StaticToken {
    fn token(&self) -> Option<String> {
        Some(self.0.clone()).filter(|token| !token.is_empty())
    }
}

/// In-memory token holder with change notification.
#[derive(Debug)]
pub struct MemoryTokenStore {
    tx: watch::Sender<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Replaces the stored token and notifies watchers.
    pub fn save(&self, token: impl Into<String>) {
        let token = token.into();
        self.tx
            .send_replace(Some(token).filter(|token| !token.is_empty()));
    }

    /// Removes the stored token and notifies watchers.
    pub fn clear(&self) {
        self.tx.send_replace(None);
    }

    /// Watches token changes.
    pub fn watch(&self) -> watch::Receiver<Option<String>> {
        self.tx.subscribe()
    }
}

impl Default for MemoryTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenProvider for MemoryTokenStore {
    fn token(&self) -> Option<String> {
        self.tx.borrow().clone()
    }
}
