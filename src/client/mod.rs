// Module declarations
mod builder;
mod connection;
mod core;
mod state;

// Public API exports
pub use builder::{DisconnectHook, RealtimeClientBuilder, RealtimeClientOptions};
pub use connection::ConnectionState;
pub use self::core::{RealtimeClient, Unsubscribe};
pub use state::ClientState;
