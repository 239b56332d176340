// Infrastructure module - Transport, background services and utilities
pub mod auth;
pub mod http;
pub mod sse;
pub mod task_manager;
pub mod timer;
pub mod transport;

pub use auth::{MemoryTokenStore, StaticToken, TokenProvider};
pub use http::{HttpTransport, RequestRegistry};
pub use sse::{SseDecoder, decode_stream};
pub use task_manager::TaskManager;
pub use timer::Timer;
pub use transport::{EventStream, Transport};
