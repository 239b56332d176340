#![allow(dead_code)]

use async_trait::async_trait;
use futures::StreamExt;
use futures::channel::mpsc::{UnboundedSender, unbounded};
use pocketbase_realtime_rs::{
    EventStream, RealtimeClient, RealtimeClientBuilder, RealtimeClientOptions, RealtimeError,
    Result, SseEvent, SubscriptionsRequest, Transport,
};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const BASE_URL: &str = "http://127.0.0.1:8090";

/// How the mock answers `connect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectMode {
    /// Stream opens and announces `PB_CONNECT` right away
    Handshake,
    /// Stream opens but stays silent
    Silent,
    /// Stream ends before announcing anything
    Closed,
}

#[derive(Debug, Clone)]
pub struct Submission {
    pub token: Option<String>,
    pub request: SubscriptionsRequest,
    pub cancel_key: String,
}

/// In-memory transport: every connect opens a channel-backed stream the test
/// can feed or close.
pub struct MockTransport {
    connects: AtomicUsize,
    failures_left: AtomicUsize,
    always_fail: AtomicBool,
    cancel_submissions: AtomicBool,
    mode: Mutex<ConnectMode>,
    submit_delay: Mutex<Duration>,
    tokens: Mutex<Vec<Option<String>>>,
    streams: Mutex<Vec<UnboundedSender<Result<SseEvent>>>>,
    submissions: Mutex<Vec<Submission>>,
    cancelled: Mutex<Vec<String>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            connects: AtomicUsize::new(0),
            failures_left: AtomicUsize::new(0),
            always_fail: AtomicBool::new(false),
            cancel_submissions: AtomicBool::new(false),
            mode: Mutex::new(ConnectMode::Handshake),
            submit_delay: Mutex::new(Duration::ZERO),
            tokens: Mutex::new(Vec::new()),
            streams: Mutex::new(Vec::new()),
            submissions: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
        })
    }

    /// Fail the next `count` connects.
    pub fn fail_next(&self, count: usize) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    pub fn fail_always(&self, fail: bool) {
        self.always_fail.store(fail, Ordering::SeqCst);
    }

    pub fn cancel_submissions(&self, cancel: bool) {
        self.cancel_submissions.store(cancel, Ordering::SeqCst);
    }

    pub fn set_mode(&self, mode: ConnectMode) {
        *self.mode.lock().unwrap() = mode;
    }

    /// Makes every submission take `delay` after being recorded.
    pub fn set_submit_delay(&self, delay: Duration) {
        *self.submit_delay.lock().unwrap() = delay;
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn tokens(&self) -> Vec<Option<String>> {
        self.tokens.lock().unwrap().clone()
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn last_submitted(&self) -> Option<Vec<String>> {
        self.submissions
            .lock()
            .unwrap()
            .last()
            .map(|submission| submission.request.subscriptions.clone())
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().unwrap().clone()
    }

    /// Pushes an event into the most recent stream.
    pub fn emit(&self, event: SseEvent) {
        let streams = self.streams.lock().unwrap();
        let stream = streams.last().expect("no stream opened");
        stream.unbounded_send(Ok(event)).expect("stream closed");
    }

    /// Fails the most recent stream with a transport error.
    pub fn break_stream(&self) {
        let streams = self.streams.lock().unwrap();
        let stream = streams.last().expect("no stream opened");
        let _ = stream.unbounded_send(Err(RealtimeError::Connection("reset by peer".into())));
    }

    /// Ends the most recent stream.
    pub fn close_stream(&self) {
        if let Some(stream) = self.streams.lock().unwrap().last() {
            stream.close_channel();
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, token: Option<String>) -> Result<EventStream> {
        let attempt = self.connects.fetch_add(1, Ordering::SeqCst) + 1;
        self.tokens.lock().unwrap().push(token);

        let pending_failure = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if pending_failure || self.always_fail.load(Ordering::SeqCst) {
            return Err(RealtimeError::Connection("connection refused".into()));
        }

        let (tx, rx) = unbounded();
        match *self.mode.lock().unwrap() {
            ConnectMode::Handshake => {
                let connect = SseEvent::new("PB_CONNECT", format!(r#"{{"clientId":"client-{attempt}"}}"#))
                    .with_id(format!("client-{attempt}"));
                tx.unbounded_send(Ok(connect)).expect("fresh channel");
            }
            ConnectMode::Silent => {}
            ConnectMode::Closed => tx.close_channel(),
        }
        self.streams.lock().unwrap().push(tx);

        Ok(rx.boxed())
    }

    async fn submit_subscriptions(
        &self,
        token: Option<String>,
        request: &SubscriptionsRequest,
        cancel_key: &str,
    ) -> Result<()> {
        self.submissions.lock().unwrap().push(Submission {
            token,
            request: request.clone(),
            cancel_key: cancel_key.to_string(),
        });

        let delay = *self.submit_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.cancel_submissions.load(Ordering::SeqCst) {
            return Err(RealtimeError::RequestCancelled);
        }
        Ok(())
    }

    fn cancel_request(&self, cancel_key: &str) {
        self.cancelled.lock().unwrap().push(cancel_key.to_string());
    }
}

pub fn client(transport: &Arc<MockTransport>) -> RealtimeClient {
    client_with(transport, RealtimeClientOptions::default())
}

pub fn client_with(transport: &Arc<MockTransport>, options: RealtimeClientOptions) -> RealtimeClient {
    builder(transport, options).build().unwrap()
}

pub fn builder(transport: &Arc<MockTransport>, options: RealtimeClientOptions) -> RealtimeClientBuilder {
    RealtimeClientBuilder::new(BASE_URL, options)
        .unwrap()
        .with_transport(transport.clone())
}

/// Polls `check` until it holds, failing the test after two seconds.
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within 2s");
}
