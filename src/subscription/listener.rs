use crate::types::{RealtimeError, Result};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Error type listeners may return from fallible handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

type Handler = dyn Fn(Value) -> BoxFuture<'static, std::result::Result<(), BoxError>> + Send + Sync;

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

/// A subscription callback.
///
/// Synchronous and asynchronous handlers are stored behind the same
/// interface; the dispatcher awaits every invocation either way.
///
/// Listeners are compared by identity: every constructor call produces a new
/// listener, while clones share the identity of their origin. Registering
/// the same listener twice yields two independent registrations, and removing
/// it removes a single one.
#[derive(Clone)]
pub struct Listener {
    id: u64,
    handler: Arc<Handler>,
}

impl Listener {
    /// Wraps a synchronous handler.
    ///
    /// # Example
    ///
    /// ```
    /// use pocketbase_realtime_rs::Listener;
    ///
    /// let listener = Listener::new(|payload| println!("event: {}", payload));
    /// ```
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        Self::from_handler(Arc::new(move |payload| {
            let handler = Arc::clone(&handler);
            async move {
                handler(payload);
                Ok::<(), BoxError>(())
            }
            .boxed()
        }))
    }

    /// Wraps a synchronous handler that may fail.
    pub fn fallible<F, E>(handler: F) -> Self
    where
        F: Fn(Value) -> std::result::Result<(), E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        let handler = Arc::new(handler);
        Self::from_handler(Arc::new(move |payload| {
            let handler = Arc::clone(&handler);
            async move { handler(payload).map_err(Into::<BoxError>::into) }.boxed()
        }))
    }

    /// Wraps an asynchronous handler.
    ///
    /// # Example
    ///
    /// ```
    /// use pocketbase_realtime_rs::Listener;
    ///
    /// let listener = Listener::from_async(|payload| async move {
    ///     println!("event: {}", payload);
    /// });
    /// ```
    pub fn from_async<F, Fut>(handler: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self::from_handler(Arc::new(move |payload| {
            let future = handler(payload);
            async move {
                future.await;
                Ok::<(), BoxError>(())
            }
            .boxed()
        }))
    }

    /// Wraps an asynchronous handler that may fail.
    pub fn try_async<F, Fut, E>(handler: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), E>> + Send + 'static,
        E: Into<BoxError>,
    {
        Self::from_handler(Arc::new(move |payload| {
            let future = handler(payload);
            async move { future.await.map_err(Into::<BoxError>::into) }.boxed()
        }))
    }

    fn from_handler(handler: Arc<Handler>) -> Self {
        Self {
            id: NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed),
            handler,
        }
    }

    /// Identity of this listener (shared by its clones).
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Invokes the handler, turning returned errors and panics into
    /// [`RealtimeError::Callback`].
    pub(crate) async fn invoke(&self, payload: Value) -> Result<()> {
        let handler = Arc::clone(&self.handler);
        let future = std::panic::catch_unwind(AssertUnwindSafe(move || handler(payload)))
            .map_err(|panic| RealtimeError::Callback(panic_message(panic.as_ref())))?;

        match AssertUnwindSafe(future).catch_unwind().await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(RealtimeError::Callback(e.to_string())),
            Err(panic) => Err(RealtimeError::Callback(panic_message(panic.as_ref()))),
        }
    }
}

impl PartialEq for Listener {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Listener {}

impl std::fmt::Debug for Listener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener").field("id", &self.id).finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        format!("listener panicked: {}", msg)
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        format!("listener panicked: {}", msg)
    } else {
        "listener panicked".to_string()
    }
}
