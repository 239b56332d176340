use crate::messaging::SseEvent;
use crate::types::{Result, SubscriptionsRequest};
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Stream of decoded events coming from the server.
pub type EventStream = BoxStream<'static, Result<SseEvent>>;

/// Network side of the realtime client.
///
/// [`HttpTransport`](super::HttpTransport) talks to a real server; tests and
/// embedders can plug in their own implementation.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Opens the event stream. The first event is expected to be `PB_CONNECT`.
    async fn connect(&self, token: Option<String>) -> Result<EventStream>;

    /// Sends the current subscription list for a connection.
    ///
    /// The request is registered under `cancel_key`; a call to
    /// [`cancel_request`](Self::cancel_request) with the same key (or a newer
    /// request with the same key) makes it fail with
    /// [`RealtimeError::RequestCancelled`](crate::RealtimeError::RequestCancelled).
    async fn submit_subscriptions(
        &self,
        token: Option<String>,
        request: &SubscriptionsRequest,
        cancel_key: &str,
    ) -> Result<()>;

    /// Aborts the in-flight request registered under `cancel_key`, if any.
    fn cancel_request(&self, cancel_key: &str);
}
