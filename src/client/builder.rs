use super::{ClientState, RealtimeClient};
use crate::infrastructure::{HttpTransport, Timer, TokenProvider, Transport};
use crate::messaging::MessageRouter;
use crate::types::{
    DEFAULT_MAX_CONNECT_TIMEOUT, DEFAULT_READER_JOIN_TIMEOUT, RealtimeError, Result,
    default_reconnect_intervals,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Called with the active subscription keys when a connection is torn down.
pub type DisconnectHook = Arc<dyn Fn(Vec<String>) + Send + Sync>;

#[derive(Clone)]
pub struct RealtimeClientOptions {
    /// Upper bound for opening the stream and receiving `PB_CONNECT`
    pub max_connect_timeout: Duration,
    /// Automatic retries before giving up (`None` retries forever)
    pub max_reconnect_attempts: Option<u32>,
    /// Backoff table indexed by attempt, clamped to its last entry
    pub reconnect_intervals: Vec<Duration>,
    /// How long a disconnect waits for the reader task before aborting it
    pub reader_join_timeout: Duration,
    pub on_disconnect: Option<DisconnectHook>,
}

impl Default for RealtimeClientOptions {
    fn default() -> Self {
        Self {
            max_connect_timeout: Duration::from_millis(DEFAULT_MAX_CONNECT_TIMEOUT),
            max_reconnect_attempts: None,
            reconnect_intervals: default_reconnect_intervals(),
            reader_join_timeout: Duration::from_millis(DEFAULT_READER_JOIN_TIMEOUT),
            on_disconnect: None,
        }
    }
}

impl std::fmt::Debug for RealtimeClientOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeClientOptions")
            .field("max_connect_timeout", &self.max_connect_timeout)
            .field("max_reconnect_attempts", &self.max_reconnect_attempts)
            .field("reconnect_intervals", &self.reconnect_intervals)
            .field("reader_join_timeout", &self.reader_join_timeout)
            .field("on_disconnect", &self.on_disconnect.is_some())
            .finish()
    }
}

/// Builder for RealtimeClient that wires its collaborators
pub struct RealtimeClientBuilder {
    base_url: String,
    options: RealtimeClientOptions,
    transport: Option<Arc<dyn Transport>>,
    auth: Option<Arc<dyn TokenProvider>>,
}

impl RealtimeClientBuilder {
    /// Create a new builder
    pub fn new(base_url: impl Into<String>, options: RealtimeClientOptions) -> Result<Self> {
        let base_url = base_url.into();

        if base_url.trim().is_empty() {
            return Err(RealtimeError::InvalidArgument(
                "base URL is required".to_string(),
            ));
        }

        Ok(Self {
            base_url,
            options,
            transport: None,
            auth: None,
        })
    }

    /// Use a custom transport instead of [`HttpTransport`]
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Attach an auth token source to every transport call
    pub fn with_token_provider(mut self, auth: Arc<dyn TokenProvider>) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn on_disconnect<F>(mut self, hook: F) -> Self
    where
        F: Fn(Vec<String>) + Send + Sync + 'static,
    {
        self.options.on_disconnect = Some(Arc::new(hook));
        self
    }

    /// Build the client. No connection is opened until the first subscription.
    pub fn build(self) -> Result<RealtimeClient> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(&self.base_url)?),
        };

        let state = Arc::new(Mutex::new(ClientState::new()));
        let router = MessageRouter::new_with_state(Arc::clone(&state));
        let timer = Timer::new(self.options.reconnect_intervals.clone());

        Ok(RealtimeClient {
            options: Arc::new(self.options),
            transport,
            auth: self.auth,
            state,
            submissions: Arc::new(Mutex::new(())),
            router,
            timer,
        })
    }
}
