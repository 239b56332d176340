use super::sse::decode_stream;
use super::transport::{EventStream, Transport};
use crate::types::{REALTIME_PATH, RealtimeError, Result, SubscriptionsRequest};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{ACCEPT, AUTHORIZATION, CACHE_CONTROL};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;
use url::Url;

/// In-flight requests that can be aborted by key.
///
/// Registering a key that is already in flight cancels the older request.
#[derive(Debug, Default)]
pub struct RequestRegistry {
    next_id: AtomicU64,
    requests: Mutex<HashMap<String, (u64, CancellationToken)>>,
}

impl RequestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a request under `key` and returns its id and token.
    pub fn register(&self, key: &str) -> (u64, CancellationToken) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();

        let mut requests = self.requests.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((_, previous)) = requests.insert(key.to_string(), (id, token.clone())) {
            tracing::debug!("Auto-cancelling previous request '{}'", key);
            previous.cancel();
        }
        (id, token)
    }

    /// Cancels the request registered under `key`, if any.
    pub fn cancel(&self, key: &str) {
        let mut requests = self.requests.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((_, token)) = requests.remove(key) {
            tracing::debug!("Cancelling request '{}'", key);
            token.cancel();
        }
    }

    /// Forgets request `id` once it completed, unless a newer one took its key.
    pub fn finish(&self, key: &str, id: u64) {
        let mut requests = self.requests.lock().unwrap_or_else(PoisonError::into_inner);
        if requests.get(key).is_some_and(|(current, _)| *current == id) {
            requests.remove(key);
        }
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }
}

/// [`Transport`] over HTTP: a `GET` for the event stream and a `POST` for the
/// subscription list, both on `/api/realtime`.
pub struct HttpTransport {
    base_url: String,
    http: reqwest::Client,
    requests: RequestRegistry,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_client(base_url, reqwest::Client::new())
    }

    /// Uses a preconfigured reqwest client (proxies, TLS, default headers...).
    pub fn with_client(base_url: &str, http: reqwest::Client) -> Result<Self> {
        let parsed = Url::parse(base_url)?;
        if parsed.cannot_be_a_base() {
            return Err(RealtimeError::InvalidArgument(format!(
                "'{}' cannot be used as a base URL",
                base_url
            )));
        }

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            requests: RequestRegistry::new(),
        })
    }

    pub fn realtime_url(&self) -> String {
        format!("{}{}", self.base_url, REALTIME_PATH)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(RealtimeError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn connect(&self, token: Option<String>) -> Result<EventStream> {
        let url = self.realtime_url();
        tracing::info!("Opening event stream at {}", url);

        let mut request = self
            .http
            .get(&url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-store");
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RealtimeError::Connection(format!("Failed to open event stream: {}", e)))?;
        let response = Self::check_status(response).await?;

        Ok(decode_stream(response.bytes_stream()).boxed())
    }

    async fn submit_subscriptions(
        &self,
        token: Option<String>,
        request: &SubscriptionsRequest,
        cancel_key: &str,
    ) -> Result<()> {
        let mut builder = self.http.post(self.realtime_url()).json(request);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, token);
        }

        let (id, cancel) = self.requests.register(cancel_key);
        let result = tokio::select! {
            _ = cancel.cancelled() => Err(RealtimeError::RequestCancelled),
            response = builder.send() => match response {
                Ok(response) => Self::check_status(response).await.map(|_| ()),
                Err(e) => Err(RealtimeError::Http(e)),
            },
        };
        self.requests.finish(cancel_key, id);

        if result.is_ok() {
            tracing::debug!(
                "Submitted {} subscription(s) for client {}",
                request.subscriptions.len(),
                request.client_id
            );
        }
        result
    }

    fn cancel_request(&self, cancel_key: &str) {
        self.requests.cancel(cancel_key);
    }
}
