use super::connection::DetachedConnection;
use super::{ClientState, ConnectionState, RealtimeClientBuilder, RealtimeClientOptions};
use crate::infrastructure::{EventStream, Timer, TokenProvider, Transport};
use crate::messaging::{MessageRouter, SseEvent};
use crate::subscription::{Listener, SubscriptionOptions, encode_key};
use crate::types::{
    MAX_RESUBMIT_RETRIES, RealtimeError, Result, SubscriptionsRequest, subscriptions_cancel_key,
};
use futures::FutureExt;
use futures::future::BoxFuture;
use futures::stream::StreamExt;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// Client for the PocketBase realtime API.
///
/// `RealtimeClient` keeps a registry of topic listeners and a single event
/// stream to the server. The stream is opened lazily by the first
/// subscription, re-established with a fixed backoff after failures and
/// closed once the last listener goes away.
///
/// # Example
///
/// ```no_run
/// use pocketbase_realtime_rs::{Listener, RealtimeClient, RealtimeClientOptions};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = RealtimeClient::new("http://127.0.0.1:8090", RealtimeClientOptions::default())?;
///
/// let handle = client
///     .subscribe("posts", Listener::new(|payload| println!("{payload}")), None)
///     .await?;
///
/// // Later
/// handle.unsubscribe().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RealtimeClient {
    pub(crate) options: Arc<RealtimeClientOptions>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) auth: Option<Arc<dyn TokenProvider>>,

    // Consolidated mutable state
    pub(crate) state: Arc<Mutex<ClientState>>,

    // Serializes submissions so they reach the transport in snapshot order
    pub(crate) submissions: Arc<Mutex<()>>,

    pub(crate) router: MessageRouter,
    pub(crate) timer: Timer,
}

/// What has to happen after a registry removal.
enum Followup {
    Nothing,
    Submit,
    /// The registry emptied; the connection was detached under the same lock
    Disconnect(DetachedConnection),
}

impl RealtimeClient {
    /// Creates a client talking to the PocketBase instance at `base_url`.
    ///
    /// No connection is opened here; the first [`subscribe`](Self::subscribe)
    /// does that.
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::UrlParse`] or [`RealtimeError::InvalidArgument`]
    /// if `base_url` is not a usable base URL.
    pub fn new(base_url: impl Into<String>, options: RealtimeClientOptions) -> Result<Self> {
        RealtimeClientBuilder::new(base_url, options)?.build()
    }

    pub fn builder(
        base_url: impl Into<String>,
        options: RealtimeClientOptions,
    ) -> Result<RealtimeClientBuilder> {
        RealtimeClientBuilder::new(base_url, options)
    }

    /// Registers `listener` for `topic` and makes sure the server knows about it.
    ///
    /// When the client is not connected this awaits a connection attempt. If
    /// that attempt fails the error is returned, but the listener stays
    /// registered and the scheduled reconnect will submit it.
    ///
    /// # Errors
    ///
    /// - [`RealtimeError::InvalidArgument`] for an empty topic (nothing is registered)
    /// - the connect error, or a submission error other than cancellation
    pub async fn subscribe(
        &self,
        topic: &str,
        listener: Listener,
        options: Option<SubscriptionOptions>,
    ) -> Result<Unsubscribe> {
        if topic.is_empty() {
            return Err(RealtimeError::InvalidArgument(
                "topic must be set".to_string(),
            ));
        }

        let key = encode_key(topic, options.as_ref())?;

        let (count, connected) = {
            let mut state = self.state.lock().await;
            let count = state.subscriptions.add(key.clone(), listener.clone());
            (count, state.is_connected())
        };
        tracing::debug!("Registered listener {} under '{}'", listener.id(), key);

        let handle = Unsubscribe {
            client: self.clone(),
            topic: topic.to_string(),
            listener,
            done: AtomicBool::new(false),
        };

        if !connected {
            self.connect().await?;

            // The post-connect submissions may all have been taken before
            // this key was registered
            let unsent = {
                let state = self.state.lock().await;
                state.is_connected() && state.has_unsent_subscriptions()
            };
            if unsent {
                self.submit_subscriptions().await?;
            }
        } else if count == 1 {
            self.submit_subscriptions().await?;
        }

        Ok(handle)
    }

    /// Removes the listeners of `topic` (every options variant), or of every
    /// topic when `None`.
    pub async fn unsubscribe(&self, topic: Option<&str>) -> Result<()> {
        let followup = {
            let mut state = self.state.lock().await;
            let removed = match topic {
                Some(topic) => state.subscriptions.remove_topic(topic),
                None => {
                    state.subscriptions.clear();
                    true
                }
            };
            Self::followup(&mut state, removed)
        };

        self.apply(followup).await
    }

    /// Removes every subscription whose key starts with `prefix`.
    pub async fn unsubscribe_by_prefix(&self, prefix: &str) -> Result<()> {
        let followup = {
            let mut state = self.state.lock().await;
            if !state.subscriptions.remove_prefix(prefix) {
                return Ok(());
            }
            Self::followup(&mut state, true)
        };

        self.apply(followup).await
    }

    /// Removes one occurrence of `listener` from every key of `topic`.
    pub async fn unsubscribe_by_topic_and_listener(
        &self,
        topic: &str,
        listener: &Listener,
    ) -> Result<()> {
        let followup = {
            let mut state = self.state.lock().await;
            let key_dropped = state.subscriptions.remove_listener(topic, listener);
            Self::followup(&mut state, key_dropped)
        };

        self.apply(followup).await
    }

    /// Decided under the same lock as the removal, so a concurrent subscribe
    /// cannot slip in between the emptiness check and the teardown.
    fn followup(state: &mut ClientState, changed: bool) -> Followup {
        if state.subscriptions.is_empty() {
            Followup::Disconnect(state.detach(false))
        } else if changed {
            Followup::Submit
        } else {
            Followup::Nothing
        }
    }

    async fn apply(&self, followup: Followup) -> Result<()> {
        match followup {
            Followup::Nothing => Ok(()),
            Followup::Submit => self.submit_subscriptions().await,
            Followup::Disconnect(detached) => {
                tracing::info!("No listeners left, disconnecting from realtime server");
                self.finish(detached).await;
                Ok(())
            }
        }
    }

    /// Waits until the client holds a usable connection, starting an attempt
    /// if none is running.
    ///
    /// Returns immediately while an automatic reconnect is scheduled; that
    /// reconnect submits the current subscriptions on its own.
    pub async fn connect(&self) -> Result<()> {
        let waiter = {
            let mut state = self.state.lock().await;
            if state.is_connected() {
                return Ok(());
            }
            if state.reconnect_attempts > 0 {
                tracing::debug!(
                    "Reconnect in flight (attempt {}), skipping connect",
                    state.reconnect_attempts
                );
                return Ok(());
            }

            let (tx, rx) = oneshot::channel();
            state.pending_connects.push(tx);

            if state.connection == ConnectionState::Disconnected {
                state.connection = ConnectionState::Connecting;
                tokio::spawn(self.clone().establish(state.generation));
            }
            rx
        };

        waiter.await.unwrap_or_else(|_| {
            Err(RealtimeError::Connection(
                "connection attempt was dropped".to_string(),
            ))
        })
    }

    /// Runs one connection attempt for `generation`.
    ///
    /// Boxed because the attempt can schedule the next one.
    fn establish(self, generation: u64) -> BoxFuture<'static, ()> {
        async move {
            let timeout = self.options.max_connect_timeout;
            let opened = match tokio::time::timeout(timeout, self.open()).await {
                Ok(result) => result,
                Err(_) => Err(RealtimeError::Timeout),
            };

            let result = match opened {
                Ok((stream, connect_event)) => {
                    self.on_connected(generation, stream, connect_event).await
                }
                Err(e) => Err(e),
            };

            match result {
                Ok(()) => self.release_waiters(generation).await,
                Err(e) => self.handle_connect_error(generation, e).await,
            }
        }
        .boxed()
    }

    /// Opens the stream and reads up to the `PB_CONNECT` event.
    async fn open(&self) -> Result<(EventStream, SseEvent)> {
        tracing::info!("Opening realtime stream");
        let mut stream = self.transport.connect(self.token()).await?;

        while let Some(event) = stream.next().await {
            let event = event?;
            if event.is_connect() {
                return Ok((stream, event));
            }
            tracing::debug!("Skipping '{}' received before PB_CONNECT", event.event);
        }

        Err(RealtimeError::Connection(
            "stream ended before PB_CONNECT".to_string(),
        ))
    }

    async fn on_connected(
        &self,
        generation: u64,
        stream: EventStream,
        connect_event: SseEvent,
    ) -> Result<()> {
        let client_id = connect_event
            .client_id()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| RealtimeError::Connection("PB_CONNECT without client id".to_string()))?;

        {
            let mut state = self.state.lock().await;
            if state.generation != generation {
                tracing::debug!("Connection superseded during handshake, dropping stream");
                return Ok(());
            }

            state.connection = ConnectionState::Connected;
            state.client_id = client_id.clone();
            state.reconnect_attempts = 0;

            let (events_tx, events_rx) = mpsc::unbounded_channel();
            let token = state.task_manager.token();

            // PB_CONNECT goes first so its listeners see it before stream events
            let _ = events_tx.send(connect_event);

            // The dispatcher is not tracked: listeners may call disconnect,
            // which joins the tracked tasks.
            tokio::spawn(Self::dispatch_loop(
                self.router.clone(),
                events_rx,
                token.clone(),
            ));
            state
                .task_manager
                .spawn(self.clone().read_loop(generation, stream, events_tx, token));
        }
        tracing::info!("Connected to realtime server, client id {}", client_id);

        self.submit_subscriptions().await?;

        let mut retries = 0;
        while retries < MAX_RESUBMIT_RETRIES && self.state.lock().await.has_unsent_subscriptions() {
            retries += 1;
            tracing::debug!("Registry changed during submission, resubmitting ({})", retries);
            self.submit_subscriptions().await?;
        }

        Ok(())
    }

    async fn release_waiters(&self, generation: u64) {
        let waiters = {
            let mut state = self.state.lock().await;
            if state.generation != generation {
                return;
            }
            std::mem::take(&mut state.pending_connects)
        };

        for waiter in waiters {
            let _ = waiter.send(Ok(()));
        }
    }

    async fn read_loop(
        self,
        generation: u64,
        mut stream: EventStream,
        events: mpsc::UnboundedSender<SseEvent>,
        token: CancellationToken,
    ) {
        tracing::info!("Starting read task");

        let failure = loop {
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::info!("Read task cancelled");
                    return;
                }
                next = stream.next() => match next {
                    Some(Ok(event)) => {
                        tracing::debug!("Received event '{}'", event.event);
                        let _ = events.send(event);
                    }
                    Some(Err(e)) => break e,
                    None => break RealtimeError::Connection("stream closed by server".to_string()),
                },
            }
        };

        tracing::error!("Realtime stream lost: {}", failure);
        // Teardown joins this task, so it runs elsewhere
        tokio::spawn(self.handle_connect_error(generation, failure));
    }

    async fn dispatch_loop(
        router: MessageRouter,
        mut events: mpsc::UnboundedReceiver<SseEvent>,
        token: CancellationToken,
    ) {
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => router.route(event).await,
                    None => break,
                },
            }
        }
        tracing::debug!("Dispatch task finished");
    }

    /// Failure path shared by connect attempts and lost streams.
    ///
    /// Tears the connection down (keeping the retry counter), fails the
    /// waiters and schedules the next attempt unless there is nothing left
    /// to serve or the retry budget is spent.
    async fn handle_connect_error(self, generation: u64, error: RealtimeError) {
        let (waiters, detached) = {
            let mut state = self.state.lock().await;
            if state.generation != generation {
                tracing::debug!("Ignoring failure of a superseded connection: {}", error);
                return;
            }

            let waiters = std::mem::take(&mut state.pending_connects);
            let exhausted = self
                .options
                .max_reconnect_attempts
                .is_some_and(|max| state.reconnect_attempts >= max);
            let give_up = state.subscriptions.is_empty() || exhausted;

            let detached = state.detach(true);

            // May be the task running this; dropping the handle only detaches it
            state.reconnect_task = None;

            if give_up {
                if exhausted {
                    tracing::warn!(
                        "Giving up after {} reconnect attempts: {}",
                        state.reconnect_attempts,
                        error
                    );
                }
                state.reconnect_attempts = 0;
            } else {
                let delay = self.timer.delay_for(state.reconnect_attempts);
                state.reconnect_attempts += 1;
                tracing::error!(
                    "Realtime connection failed: {}. Retrying in {:?} (attempt {})",
                    error,
                    delay,
                    state.reconnect_attempts
                );

                let client = self.clone();
                let next_generation = state.generation;
                state.reconnect_task = Some(tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    client.reconnect(next_generation).await;
                }));
            }

            (waiters, detached)
        };

        for waiter in waiters {
            let _ = waiter.send(Err(error.for_waiter()));
        }
        self.finish(detached).await;
    }

    async fn reconnect(self, generation: u64) {
        {
            let mut state = self.state.lock().await;
            if state.generation != generation || state.connection != ConnectionState::Disconnected
            {
                return;
            }
            if state.subscriptions.is_empty() {
                state.reconnect_attempts = 0;
                return;
            }
            state.connection = ConnectionState::Connecting;
            tracing::info!("Reconnecting (attempt {})", state.reconnect_attempts);
        }

        self.establish(generation).await;
    }

    /// Closes the stream.
    ///
    /// Calls the disconnect hook with the active keys (only when a client id
    /// was assigned), cancels the in-flight submission, stops the reader,
    /// resets the retry counter and releases anyone waiting in
    /// [`connect`](Self::connect).
    pub async fn disconnect(&self) {
        let detached = self.state.lock().await.detach(false);
        tracing::info!("Disconnecting from realtime server");
        self.finish(detached).await;
    }

    /// Cleanup that must run without the state lock held.
    async fn finish(&self, detached: DetachedConnection) {
        if let (Some(hook), Some(keys)) = (&self.options.on_disconnect, detached.hook_keys) {
            hook(keys);
        }
        if let Some(cancel_key) = detached.cancel_key {
            self.transport.cancel_request(&cancel_key);
        }
        if let Some(task) = detached.reconnect_task {
            task.abort();
        }

        detached.tasks.shutdown(self.options.reader_join_timeout).await;

        for waiter in detached.waiters {
            let _ = waiter.send(Ok(()));
        }
    }

    /// Sends the current subscription keys for this connection.
    ///
    /// Does nothing without a client id. A submission cancelled by a newer
    /// one or by a disconnect is not an error.
    pub async fn submit_subscriptions(&self) -> Result<()> {
        let _turn = self.submissions.lock().await;

        let (request, cancel_key) = {
            let mut state = self.state.lock().await;
            if state.client_id.is_empty() {
                return Ok(());
            }
            let keys = state.subscriptions.keys();
            state.last_sent_subscriptions = keys.clone();
            (
                SubscriptionsRequest::new(state.client_id.clone(), keys),
                subscriptions_cancel_key(&state.client_id),
            )
        };

        tracing::debug!("Submitting subscriptions: {:?}", request.subscriptions);
        match self
            .transport
            .submit_subscriptions(self.token(), &request, &cancel_key)
            .await
        {
            Err(e) if e.is_cancelled() => {
                tracing::debug!("Subscription submission cancelled");
                Ok(())
            }
            other => other,
        }
    }

    /// Invokes every listener registered for `event`.
    pub async fn dispatch(&self, event: &str, payload: Value) {
        self.router.dispatch(event, payload).await;
    }

    fn token(&self) -> Option<String> {
        self.auth.as_ref().and_then(|auth| auth.token())
    }

    pub async fn client_id(&self) -> String {
        self.state.lock().await.client_id.clone()
    }

    /// Connected, with a client id, and no attempt still settling
    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.is_connected()
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.state.lock().await.connection
    }

    pub async fn reconnect_attempts(&self) -> u32 {
        self.state.lock().await.reconnect_attempts
    }

    /// Keys that currently hold listeners, in registration order
    pub async fn subscription_keys(&self) -> Vec<String> {
        self.state.lock().await.subscriptions.keys()
    }

    pub async fn last_sent_subscriptions(&self) -> Vec<String> {
        self.state.lock().await.last_sent_subscriptions.clone()
    }

    /// Whether `topic` (any options variant) has listeners, or any key does
    /// when `None`.
    pub async fn has_subscription_listeners(&self, topic: Option<&str>) -> bool {
        let state = self.state.lock().await;
        match topic {
            Some(topic) => !state.subscriptions.matching(topic).is_empty(),
            None => !state.subscriptions.is_empty(),
        }
    }

    /// Number of listeners registered under the exact `key`
    pub async fn listener_count(&self, key: &str) -> usize {
        self.state
            .lock()
            .await
            .subscriptions
            .listeners(key)
            .map_or(0, <[Listener]>::len)
    }
}

/// Handle returned by [`RealtimeClient::subscribe`].
///
/// Removes exactly the `(topic, listener)` pair it was created for; calling
/// it again does nothing.
pub struct Unsubscribe {
    client: RealtimeClient,
    topic: String,
    listener: Listener,
    done: AtomicBool,
}

impl Unsubscribe {
    pub async fn unsubscribe(&self) -> Result<()> {
        if self.done.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.client
            .unsubscribe_by_topic_and_listener(&self.topic, &self.listener)
            .await
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn listener(&self) -> &Listener {
        &self.listener
    }
}

impl std::fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("topic", &self.topic)
            .field("listener", &self.listener.id())
            .field("done", &self.done.load(Ordering::SeqCst))
            .finish()
    }
}
