//! # PocketBase Realtime Rust
//!
//! An unofficial Rust client for the PocketBase realtime API (server-sent events).
//!
//! The client keeps one event stream per instance, opened by the first
//! subscription and closed with the last one. Subscriptions are submitted to
//! the server whenever they change and re-submitted after every reconnect.
//!
//! ## Example
//!
//! ```no_run
//! use pocketbase_realtime_rs::{Listener, RealtimeClient, RealtimeClientOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = RealtimeClient::new("http://127.0.0.1:8090", RealtimeClientOptions::default())?;
//!
//!     let handle = client
//!         .subscribe("posts", Listener::new(|event| println!("{event}")), None)
//!         .await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     handle.unsubscribe().await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod infrastructure;
pub mod messaging;
pub mod subscription;
pub mod types;

pub use client::{
    ConnectionState, DisconnectHook, RealtimeClient, RealtimeClientBuilder, RealtimeClientOptions,
    Unsubscribe,
};
pub use infrastructure::{
    EventStream, HttpTransport, MemoryTokenStore, StaticToken, TokenProvider, Transport,
};
pub use messaging::SseEvent;
pub use subscription::{BoxError, Listener, SubscriptionOptions};
pub use types::{RealtimeError, Result, SubscriptionsRequest, parse_message};
